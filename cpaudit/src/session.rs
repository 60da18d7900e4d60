use anyhow::Result;
use aws_config::{
  meta::region::RegionProviderChain, retry::RetryConfig, sts::AssumeRoleProvider, BehaviorVersion, SdkConfig,
};
use aws_types::region::Region;
use tracing::{debug, info};

use crate::{
  approval::{self, ApprovalEventRow, LookupWindow},
  collect::{Collector, Connector},
  config::Role,
  pipeline::{self, PipelineRow},
};

/// Session name recorded by STS for assumed role sessions
const SESSION_NAME: &str = "cpaudit";

fn region_provider(region: &str) -> RegionProviderChain {
  let region = match region {
    "" => None,
    region => Some(Region::new(region.to_owned())),
  };

  RegionProviderChain::first_try(region).or_default_provider()
}

/// Get the configuration to authn/authz with AWS for the role provided
///
/// When the role ARN is set, credentials are obtained by assuming that role with the ambient credentials.
/// Otherwise the ambient credentials are used directly. An empty region falls back to the default region chain.
pub async fn get_sdk_config(role: &Role) -> Result<SdkConfig> {
  let ambient = aws_config::defaults(BehaviorVersion::latest())
    .region(region_provider(&role.region))
    .load()
    .await;

  if role.role_arn.is_empty() {
    debug!("Using ambient credentials in {:?}", ambient.region());
    return Ok(ambient);
  }

  let mut provider = AssumeRoleProvider::builder(role.role_arn.clone())
    .session_name(SESSION_NAME)
    .configure(&ambient);
  if let Some(region) = ambient.region() {
    provider = provider.region(region.clone());
  }
  let provider = provider.build().await;

  let config = aws_config::defaults(BehaviorVersion::latest())
    .region(region_provider(&role.region))
    .credentials_provider(provider)
    .load()
    .await;
  debug!("Assuming {} in {:?}", role.role_arn, config.region());

  Ok(config)
}

/// CodePipeline and CloudTrail clients sharing one set of credentials
#[derive(Debug)]
pub struct AwsCollector {
  codepipeline: aws_sdk_codepipeline::Client,
  cloudtrail: aws_sdk_cloudtrail::Client,
}

impl AwsCollector {
  /// Construct the clients; failed calls are surfaced immediately rather than retried
  pub fn new(config: &SdkConfig) -> Self {
    let codepipeline = aws_sdk_codepipeline::Client::from_conf(
      aws_sdk_codepipeline::config::Builder::from(config)
        .retry_config(RetryConfig::disabled())
        .build(),
    );
    let cloudtrail = aws_sdk_cloudtrail::Client::from_conf(
      aws_sdk_cloudtrail::config::Builder::from(config)
        .retry_config(RetryConfig::disabled())
        .build(),
    );

    Self {
      codepipeline,
      cloudtrail,
    }
  }
}

impl Collector for AwsCollector {
  async fn pipelines(&self) -> Result<Vec<PipelineRow>> {
    pipeline::get_active_pipelines(&self.codepipeline).await
  }

  async fn approvals(&self, window: &LookupWindow) -> Result<Vec<ApprovalEventRow>> {
    approval::get_approval_logs(&self.cloudtrail, window).await
  }
}

/// Connects to AWS with the credentials of each role in turn
#[derive(Debug, Default)]
pub struct AwsConnector;

impl Connector for AwsConnector {
  type Collector = AwsCollector;

  async fn connect(&self, role: &Role) -> Result<AwsCollector> {
    let config = get_sdk_config(role).await?;
    let region = config.region().map(ToString::to_string).unwrap_or_else(|| "<no region>".to_string());
    match role.role_arn.as_str() {
      "" => info!("Collecting with ambient credentials in {region}"),
      arn => info!("Collecting as {arn} in {region}"),
    }

    Ok(AwsCollector::new(&config))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn it_prefers_configured_region() {
    let region = region_provider("eu-west-1").region().await;
    assert_eq!(region, Some(Region::new("eu-west-1")));
  }
}
