use std::{collections::HashMap, fmt};

use anyhow::{Context, Result};
use aws_sdk_codepipeline::{
  types::{PipelineDeclaration, PipelineSummary},
  Client,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Configuration key of the S3 source action holding the bucket name
const S3_BUCKET: &str = "S3Bucket";
/// Configuration key of the S3 source action holding the object key
const S3_OBJECT_KEY: &str = "S3ObjectKey";

/// A pipeline whose source is an object in S3
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineRow {
  pub pipeline_name: String,
  pub s3_bucket: String,
  pub s3_object_key: String,
}

/// Configuration of the first action of the first stage, which is taken to be the source action
pub fn first_source_configuration(pipeline: &PipelineDeclaration) -> Option<&HashMap<String, String>> {
  pipeline
    .stages()
    .first()
    .and_then(|stage| stage.actions().first())
    .and_then(|action| action.configuration())
}

/// Build the report row for a pipeline when its source action reads from S3
///
/// Both the bucket and the object key must be present, otherwise the pipeline is not S3 sourced
pub fn source_row(name: &str, configuration: Option<&HashMap<String, String>>) -> Option<PipelineRow> {
  let configuration = configuration?;
  let bucket = configuration.get(S3_BUCKET)?;
  let key = configuration.get(S3_OBJECT_KEY)?;

  Some(PipelineRow {
    pipeline_name: name.to_owned(),
    s3_bucket: bucket.to_owned(),
    s3_object_key: key.to_owned(),
  })
}

/// A pipeline left out of the report because its source action does not read from S3
#[derive(Debug, PartialEq, Eq)]
pub struct NotS3Source(pub String);

impl fmt::Display for NotS3Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} is not using S3 as source", self.0)
  }
}

/// Decide whether the pipeline is reported, inspecting only the first action of the first stage
///
/// A pipeline without stages or actions is treated like any other non-S3 source
pub fn inspect(name: &str, pipeline: &PipelineDeclaration) -> Result<PipelineRow, NotS3Source> {
  source_row(name, first_source_configuration(pipeline)).ok_or_else(|| NotS3Source(name.to_owned()))
}

fn listed_name(summary: &PipelineSummary) -> Result<&str> {
  summary
    .name()
    .context("ListPipelines returned a pipeline without a name")
}

/// Collect the S3 source details of every pipeline visible to the client
///
/// Only the first page of `ListPipelines` is read
pub async fn get_active_pipelines(client: &Client) -> Result<Vec<PipelineRow>> {
  let listed = client
    .list_pipelines()
    .send()
    .await
    .context("Failed to list pipelines")?;

  let mut rows = Vec::new();

  for summary in listed.pipelines() {
    let name = listed_name(summary)?;

    let response = client
      .get_pipeline()
      .name(name)
      .send()
      .await
      .with_context(|| format!("Failed to get pipeline {name}"))?;
    let pipeline = response
      .pipeline()
      .with_context(|| format!("Pipeline {name} returned no definition"))?;

    match inspect(name, pipeline) {
      Ok(row) => {
        debug!("{name} is sourced from s3://{}/{}", row.s3_bucket, row.s3_object_key);
        rows.push(row);
      }
      Err(skipped) => warn!("{skipped}"),
    }
  }

  Ok(rows)
}

#[cfg(test)]
mod tests {
  use aws_sdk_codepipeline::types::{ActionCategory, ActionDeclaration, ActionOwner, ActionTypeId, StageDeclaration};
  use rstest::*;

  use super::*;

  fn configuration(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn it_builds_row_for_s3_source() {
    let config = configuration(&[
      ("S3Bucket", "artifacts"),
      ("S3ObjectKey", "app/source.zip"),
      ("PollForSourceChanges", "false"),
    ]);

    let result = source_row("app", Some(&config));
    let expected = PipelineRow {
      pipeline_name: "app".to_string(),
      s3_bucket: "artifacts".to_string(),
      s3_object_key: "app/source.zip".to_string(),
    };
    assert_eq!(result, Some(expected));
  }

  #[rstest]
  #[case(&[("S3Bucket", "artifacts")])]
  #[case(&[("S3ObjectKey", "app/source.zip")])]
  #[case(&[("RepositoryName", "app"), ("BranchName", "main")])]
  #[case(&[])]
  fn it_skips_non_s3_source(#[case] pairs: &[(&str, &str)]) {
    let config = configuration(pairs);
    assert_eq!(source_row("app", Some(&config)), None);
  }

  #[test]
  fn it_skips_missing_configuration() {
    assert_eq!(source_row("app", None), None);
  }

  fn action(name: &str, provider: &str, pairs: &[(&str, &str)]) -> ActionDeclaration {
    let action_type_id = ActionTypeId::builder()
      .category(ActionCategory::Source)
      .owner(ActionOwner::Aws)
      .provider(provider)
      .version("1")
      .build()
      .unwrap();
    let mut builder = ActionDeclaration::builder().name(name).action_type_id(action_type_id);
    for (k, v) in pairs {
      builder = builder.configuration(*k, *v);
    }
    builder.build().unwrap()
  }

  fn stage(name: &str, actions: Vec<ActionDeclaration>) -> StageDeclaration {
    StageDeclaration::builder()
      .name(name)
      .set_actions(Some(actions))
      .build()
      .unwrap()
  }

  fn declaration(stages: Vec<StageDeclaration>) -> PipelineDeclaration {
    PipelineDeclaration::builder()
      .name("app")
      .role_arn("arn:aws:iam::111111111111:role/pipeline")
      .set_stages(Some(stages))
      .build()
      .unwrap()
  }

  fn s3_action() -> ActionDeclaration {
    action("Source", "S3", &[("S3Bucket", "artifacts"), ("S3ObjectKey", "app/source.zip")])
  }

  fn codecommit_action() -> ActionDeclaration {
    action("Source", "CodeCommit", &[("RepositoryName", "app"), ("BranchName", "main")])
  }

  #[test]
  fn it_reports_s3_first_action() {
    let pipeline = declaration(vec![
      stage("Source", vec![s3_action(), codecommit_action()]),
      stage("Deploy", vec![codecommit_action()]),
    ]);

    let result = inspect("app", &pipeline).unwrap();
    let expected = PipelineRow {
      pipeline_name: "app".to_string(),
      s3_bucket: "artifacts".to_string(),
      s3_object_key: "app/source.zip".to_string(),
    };
    assert_eq!(result, expected);
  }

  #[rstest]
  // S3 configuration only on the second action of the first stage
  #[case(vec![stage("Source", vec![codecommit_action(), s3_action()])])]
  // S3 configuration only in the second stage
  #[case(vec![stage("Source", vec![codecommit_action()]), stage("Build", vec![s3_action()])])]
  // First stage without actions
  #[case(vec![stage("Source", vec![]), stage("Build", vec![s3_action()])])]
  // No stages at all
  #[case(vec![])]
  fn it_inspects_only_first_action_of_first_stage(#[case] stages: Vec<StageDeclaration>) {
    let pipeline = declaration(stages);

    let result = inspect("app", &pipeline).unwrap_err();
    assert_eq!(result, NotS3Source("app".to_string()));
    assert_eq!(result.to_string(), "app is not using S3 as source");
  }

  #[test]
  fn it_skips_action_without_configuration() {
    let pipeline = declaration(vec![stage("Source", vec![action("Source", "S3", &[])])]);
    assert!(inspect("app", &pipeline).is_err());
  }

  #[test]
  fn it_requires_listed_pipeline_name() {
    let summary = PipelineSummary::builder().build();
    let err = listed_name(&summary).unwrap_err();
    assert!(err.to_string().contains("without a name"));

    let summary = PipelineSummary::builder().name("app").build();
    assert_eq!(listed_name(&summary).unwrap(), "app");
  }
}
