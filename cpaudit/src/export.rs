use std::{
  fs::OpenOptions,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

/// The CSV reports produced by a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Report {
  /// Pipelines sourced from S3, one row per pipeline
  ActivePipelines,
  /// Manual approval decisions recorded in CloudTrail, one row per event
  ApprovalLogs,
}

impl Report {
  pub fn file_name(&self) -> &'static str {
    match self {
      Report::ActivePipelines => "getActivePipelinesInfoResults.csv",
      Report::ApprovalLogs => "getApprovalLogsInfoResults.csv",
    }
  }

  pub fn header(&self) -> &'static [&'static str] {
    match self {
      Report::ActivePipelines => &["PipelineName", "S3Bucket", "S3ObjectKey"],
      Report::ApprovalLogs => &[
        "UserIdentity",
        "AwsRegion",
        "SourceIPAddress",
        "Status",
        "Summary",
        "StageName",
        "PipelineName",
        "ApprovedAt",
        "RequestId",
        "EventId",
      ],
    }
  }
}

/// Appends report rows to CSV files within a destination directory
#[derive(Debug)]
pub struct Exporter {
  dest_dir: PathBuf,
}

impl Exporter {
  pub fn new<P: AsRef<Path>>(dest_dir: P) -> Self {
    Self {
      dest_dir: dest_dir.as_ref().to_path_buf(),
    }
  }

  pub fn path(&self, report: Report) -> PathBuf {
    self.dest_dir.join(report.file_name())
  }

  /// Write the header record for the report
  ///
  /// Headers are appended like any other record; a file that already exists gets a second header
  pub fn write_header(&self, report: Report) -> Result<()> {
    let path = self.path(report);
    let mut writer = self.open(&path)?;
    writer
      .write_record(report.header())
      .with_context(|| format!("Failed to write header to {}", path.display()))?;
    writer
      .flush()
      .with_context(|| format!("Failed to flush {}", path.display()))?;

    Ok(())
  }

  /// Append rows to the report, creating the file if it does not exist
  pub fn append<R: Serialize>(&self, report: Report, rows: &[R]) -> Result<()> {
    let path = self.path(report);
    let mut writer = self.open(&path)?;
    for row in rows {
      writer
        .serialize(row)
        .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
      .flush()
      .with_context(|| format!("Failed to flush {}", path.display()))?;

    Ok(())
  }

  fn open(&self, path: &Path) -> Result<csv::Writer<std::fs::File>> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
      use std::os::unix::fs::OpenOptionsExt;
      options.mode(0o600);
    }

    let file = options
      .open(path)
      .with_context(|| format!("Failed to open {}", path.display()))?;

    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
  }
}
