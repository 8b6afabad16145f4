// draftflow/src/model/draft.rs

//! The `Draft` record and the enums that describe where it is in its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::data::DraftData;

/// Revision ceiling applied to drafts created without an explicit override.
pub const DEFAULT_MAX_REVISIONS: u32 = 3;

/// How the design behind a draft is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftMethod {
  Upload,
  Ai,
  /// Designer-assisted. Only this path goes through preview/revision.
  Artist,
}

impl DraftMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      DraftMethod::Upload => "upload",
      DraftMethod::Ai => "ai",
      DraftMethod::Artist => "artist",
    }
  }
}

impl fmt::Display for DraftMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DraftMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "upload" => Ok(DraftMethod::Upload),
      "ai" => Ok(DraftMethod::Ai),
      "artist" => Ok(DraftMethod::Artist),
      other => Err(format!("unknown draft method '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
  Pending,
  InProgress,
  PreviewSent,
  Revision,
  Completed,
  Canceled,
}

impl WorkflowStatus {
  /// Every status from which further transitions are still possible.
  pub const NON_TERMINAL: &'static [WorkflowStatus] = &[
    WorkflowStatus::Pending,
    WorkflowStatus::InProgress,
    WorkflowStatus::PreviewSent,
    WorkflowStatus::Revision,
  ];

  pub fn is_terminal(&self) -> bool {
    matches!(self, WorkflowStatus::Completed | WorkflowStatus::Canceled)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      WorkflowStatus::Pending => "PENDING",
      WorkflowStatus::InProgress => "IN_PROGRESS",
      WorkflowStatus::PreviewSent => "PREVIEW_SENT",
      WorkflowStatus::Revision => "REVISION",
      WorkflowStatus::Completed => "COMPLETED",
      WorkflowStatus::Canceled => "CANCELED",
    }
  }
}

impl fmt::Display for WorkflowStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for WorkflowStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "PENDING" => Ok(WorkflowStatus::Pending),
      "IN_PROGRESS" => Ok(WorkflowStatus::InProgress),
      "PREVIEW_SENT" => Ok(WorkflowStatus::PreviewSent),
      "REVISION" => Ok(WorkflowStatus::Revision),
      "COMPLETED" => Ok(WorkflowStatus::Completed),
      "CANCELED" => Ok(WorkflowStatus::Canceled),
      other => Err(format!("unknown workflow status '{}'", other)),
    }
  }
}

/// Shipping snapshot captured on the draft.
///
/// Only the carrier fields are interpreted by this crate; everything else the
/// API layer stores rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSnapshot {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recipient_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub carrier_code: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub carrier_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tracking_number: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl ShippingSnapshot {
  /// Carrier code and tracking number, when both are present and non-blank.
  pub fn tracking(&self) -> Option<(&str, &str)> {
    let code = self.carrier_code.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let number = self.tracking_number.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some((code, number))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCard {
  pub id: Uuid,
  pub name: String,
  pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
  pub id: Uuid,
  pub user_id: Uuid,
  pub method: DraftMethod,
  pub workflow_status: WorkflowStatus,
  pub revision_count: u32,
  pub max_revisions: u32,
  pub assigned_designer_id: Option<Uuid>,
  pub message_card_id: Option<Uuid>,
  pub shipping: Option<ShippingSnapshot>,
  pub data: DraftData,
  pub committed_at: Option<DateTime<Utc>>,
  /// Bumped by the store on every write; the commit path compares-and-sets on it.
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Draft {
  pub fn is_committed(&self) -> bool {
    self.committed_at.is_some()
  }

  /// Terminal by status, or frozen by commit.
  pub fn is_terminal(&self) -> bool {
    self.workflow_status.is_terminal() || self.is_committed()
  }

  pub fn is_owned_by(&self, user_id: Uuid) -> bool {
    self.user_id == user_id
  }

  pub fn is_assigned_to(&self, designer_id: Uuid) -> bool {
    self.assigned_designer_id == Some(designer_id)
  }
}

/// A draft loaded together with the records the commit path prices from.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftWithRelations {
  pub draft: Draft,
  pub message_card: Option<MessageCard>,
}

/// Input for `DraftStore::create`. New drafts always start in `PENDING`.
#[derive(Debug, Clone)]
pub struct NewDraft {
  pub user_id: Uuid,
  pub method: DraftMethod,
  pub max_revisions: u32,
  pub message_card_id: Option<Uuid>,
  pub shipping: Option<ShippingSnapshot>,
  pub data: DraftData,
}

impl NewDraft {
  pub fn new(user_id: Uuid, method: DraftMethod) -> Self {
    Self {
      user_id,
      method,
      max_revisions: DEFAULT_MAX_REVISIONS,
      message_card_id: None,
      shipping: None,
      data: DraftData::default(),
    }
  }

  pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
    self.max_revisions = max_revisions;
    self
  }

  pub fn with_message_card(mut self, message_card_id: Uuid) -> Self {
    self.message_card_id = Some(message_card_id);
    self
  }

  pub fn with_shipping(mut self, shipping: ShippingSnapshot) -> Self {
    self.shipping = Some(shipping);
    self
  }

  pub fn with_data(mut self, data: DraftData) -> Self {
    self.data = data;
    self
  }
}
