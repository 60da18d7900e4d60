use anyhow::{bail, Context, Result};
use aws_sdk_cloudtrail::{
  primitives::DateTime,
  types::{Event, LookupAttribute, LookupAttributeKey},
  Client,
};
use chrono::{Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// CloudTrail event name recorded when a manual approval action is approved or rejected
const APPROVAL_EVENT_NAME: &str = "PutApprovalResult";

/// Time range searched for approval events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupWindow {
  pub start: chrono::DateTime<Utc>,
  pub end: chrono::DateTime<Utc>,
}

impl LookupWindow {
  /// The month leading up to `end`
  ///
  /// When the prior month is shorter, the start day is clamped to its last day (Mar 31 -> Feb 28)
  pub fn trailing_month(end: chrono::DateTime<Utc>) -> Result<Self> {
    let Some(start) = end.checked_sub_months(Months::new(1)) else {
      bail!("Unable to compute the month preceding {end}");
    };

    Ok(Self { start, end })
  }
}

/// A manual approval decision as reported
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovalEventRow {
  pub user_identity_arn: String,
  pub aws_region: String,
  pub source_ip_address: String,
  pub status: String,
  pub summary: String,
  pub stage_name: String,
  pub pipeline_name: String,
  pub approved_at: String,
  pub request_id: String,
  pub event_id: String,
}

/// The subset of the `PutApprovalResult` CloudTrail record that is reported
///
/// Every field is required; a record missing any of them is rejected
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRecord {
  user_identity: UserIdentity,
  aws_region: String,
  #[serde(rename = "sourceIPAddress")]
  source_ip_address: String,
  request_parameters: RequestParameters,
  response_elements: ResponseElements,
  #[serde(rename = "requestID")]
  request_id: String,
  #[serde(rename = "eventID")]
  event_id: String,
}

#[derive(Debug, Deserialize)]
struct UserIdentity {
  arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestParameters {
  stage_name: String,
  result: ApprovalResult,
}

#[derive(Debug, Deserialize)]
struct ApprovalResult {
  status: String,
  summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseElements {
  approved_at: String,
}

impl ApprovalEventRow {
  /// Flatten a CloudTrail `PutApprovalResult` payload into a row
  pub fn parse(payload: &str, pipeline_name: &str) -> Result<Self> {
    let record: ApprovalRecord = serde_json::from_str(payload).context("Malformed PutApprovalResult event")?;

    Ok(Self {
      user_identity_arn: record.user_identity.arn,
      aws_region: record.aws_region,
      source_ip_address: record.source_ip_address,
      status: record.request_parameters.result.status,
      summary: record.request_parameters.result.summary,
      stage_name: record.request_parameters.stage_name,
      pipeline_name: pipeline_name.to_owned(),
      approved_at: record.response_elements.approved_at,
      request_id: record.request_id,
      event_id: record.event_id,
    })
  }

  /// Build the row from a looked up event; the pipeline is the first resource of the event
  pub fn from_event(event: &Event) -> Result<Self> {
    let event_id = event.event_id().unwrap_or("unknown");
    let payload = event
      .cloud_trail_event()
      .with_context(|| format!("Event {event_id} has no CloudTrail payload"))?;
    let pipeline_name = event
      .resources()
      .first()
      .and_then(|resource| resource.resource_name())
      .with_context(|| format!("Event {event_id} does not reference a pipeline"))?;

    Self::parse(payload, pipeline_name).with_context(|| format!("Failed to read event {event_id}"))
  }
}

/// Look up the approval decisions recorded within the window
///
/// Only the first page of `LookupEvents` is read
pub async fn get_approval_logs(client: &Client, window: &LookupWindow) -> Result<Vec<ApprovalEventRow>> {
  let attribute = LookupAttribute::builder()
    .attribute_key(LookupAttributeKey::EventName)
    .attribute_value(APPROVAL_EVENT_NAME)
    .build()?;

  let response = client
    .lookup_events()
    .start_time(DateTime::from_secs(window.start.timestamp()))
    .end_time(DateTime::from_secs(window.end.timestamp()))
    .lookup_attributes(attribute)
    .send()
    .await
    .context("Failed to look up approval events")?;

  let events = response.events();
  debug!("Found {} approval events between {} and {}", events.len(), window.start, window.end);

  events.iter().map(ApprovalEventRow::from_event).collect()
}
