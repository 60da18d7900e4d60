use anyhow::Result;
use tracing::info;

use crate::{
  approval::{ApprovalEventRow, LookupWindow},
  config::{Role, Roles},
  export::{Exporter, Report},
  pipeline::PipelineRow,
};

/// Reads the report data visible to one set of credentials
#[allow(async_fn_in_trait)]
pub trait Collector {
  /// Pipelines sourced from S3
  async fn pipelines(&self) -> Result<Vec<PipelineRow>>;

  /// Manual approval decisions made within the window
  async fn approvals(&self, window: &LookupWindow) -> Result<Vec<ApprovalEventRow>>;
}

/// Acquires credentials for a role and returns a collector scoped to them
#[allow(async_fn_in_trait)]
pub trait Connector {
  type Collector: Collector;

  async fn connect(&self, role: &Role) -> Result<Self::Collector>;
}

/// Totals for a completed run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
  pub roles: usize,
  pub pipelines: usize,
  pub approvals: usize,
}

/// Collect the reports for every role, in order, appending the rows as each role completes
///
/// Headers are written before the first role is visited. The approval log report is only produced when a
/// lookup window is provided. The first error stops the run; rows already appended are left in place.
pub async fn collect<C: Connector>(
  connector: &C,
  roles: &Roles,
  exporter: &Exporter,
  approval_window: Option<&LookupWindow>,
) -> Result<Summary> {
  exporter.write_header(Report::ActivePipelines)?;
  if approval_window.is_some() {
    exporter.write_header(Report::ApprovalLogs)?;
  }

  info!("getting all the information you need");

  let mut summary = Summary::default();

  for role in &roles.roles {
    let collector = connector.connect(role).await?;

    let pipelines = collector.pipelines().await?;
    exporter.append(Report::ActivePipelines, &pipelines)?;
    summary.pipelines += pipelines.len();

    if let Some(window) = approval_window {
      let approvals = collector.approvals(window).await?;
      exporter.append(Report::ApprovalLogs, &approvals)?;
      summary.approvals += approvals.len();
    }

    summary.roles += 1;
  }

  Ok(summary)
}
