use std::path::{Path, PathBuf};

use anstyle::{AnsiColor, Color, Style};
use anyhow::Result;
use chrono::Utc;
use clap::{builder::Styles, Parser};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::info;

use crate::{
  approval::LookupWindow,
  collect::{collect, Summary},
  config::Roles,
  export::{Exporter, Report},
  session::AwsConnector,
};

fn bold(color: AnsiColor) -> Style {
  Style::new().bold().fg_color(Some(Color::Ansi(color)))
}

/// Styles for CLI
fn get_styles() -> Styles {
  Styles::styled()
    .header(bold(AnsiColor::Green).underline())
    .usage(bold(AnsiColor::Green))
    .literal(bold(AnsiColor::BrightCyan))
    .placeholder(bold(AnsiColor::Yellow).underline())
    .error(bold(AnsiColor::Red))
    .invalid(bold(AnsiColor::Yellow))
}

/// Report the S3 sources of CodePipeline pipelines and their manual approvals across accounts
#[derive(Debug, Parser)]
#[command(author, about, version)]
#[command(styles=get_styles())]
pub struct Cli {
  /// /path/to/config.json listing the roles and regions to audit (required)
  #[arg(long, value_name = "PATH")]
  pub config: Option<PathBuf>,

  /// Directory where the reports are saved (required)
  #[arg(long, value_name = "PATH")]
  pub destdir: Option<PathBuf>,

  /// Only report pipelines; CloudTrail is not queried for approval logs
  #[arg(long)]
  pub skip_approval_logs: bool,

  /// Disable colored log output
  #[arg(long)]
  pub no_color: bool,

  #[clap(flatten)]
  pub verbose: Verbosity<InfoLevel>,
}

/// A required flag that was not supplied
#[derive(Debug, PartialEq, Eq)]
pub struct MissingFlag {
  pub message: &'static str,
  pub exit_code: i32,
}

impl Cli {
  /// The config file and destination directory, which must both be supplied
  pub fn required_paths(&self) -> std::result::Result<(&Path, &Path), MissingFlag> {
    let Some(config) = self.config.as_deref() else {
      return Err(MissingFlag {
        message: "--config <config filename> is required",
        exit_code: 1,
      });
    };
    let Some(destdir) = self.destdir.as_deref() else {
      return Err(MissingFlag {
        message: "--destdir <directory name> is required",
        exit_code: 2,
      });
    };

    Ok((config, destdir))
  }

  /// Collect the reports for every role in the config file
  ///
  /// The config file is read before any AWS call is made or any report is written
  pub async fn run(&self, config: &Path, dest_dir: &Path) -> Result<Summary> {
    let roles = Roles::read(config)?;
    let exporter = Exporter::new(dest_dir);

    let window = match self.skip_approval_logs {
      true => None,
      false => Some(LookupWindow::trailing_month(Utc::now())?),
    };

    let summary = collect(&AwsConnector, &roles, &exporter, window.as_ref()).await?;
    info!(
      "collected {} pipelines and {} approval events across {} roles",
      summary.pipelines, summary.approvals, summary.roles
    );

    info!("saved to {}", exporter.path(Report::ActivePipelines).display());
    if window.is_some() {
      info!("saved to {}", exporter.path(Report::ApprovalLogs).display());
    }

    Ok(summary)
  }
}
