// draftflow/src/model/event.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
  DesignerAssigned,
  PreviewSent,
  RevisionRequested,
  Approved,
  Canceled,
}

impl WorkflowEventKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      WorkflowEventKind::DesignerAssigned => "designer_assigned",
      WorkflowEventKind::PreviewSent => "preview_sent",
      WorkflowEventKind::RevisionRequested => "revision_requested",
      WorkflowEventKind::Approved => "approved",
      WorkflowEventKind::Canceled => "canceled",
    }
  }

  /// Events that make up a draft's preview/revision history.
  pub fn is_revision_cycle(&self) -> bool {
    matches!(
      self,
      WorkflowEventKind::PreviewSent | WorkflowEventKind::RevisionRequested | WorkflowEventKind::Approved
    )
  }
}

impl fmt::Display for WorkflowEventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for WorkflowEventKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "designer_assigned" => Ok(WorkflowEventKind::DesignerAssigned),
      "preview_sent" => Ok(WorkflowEventKind::PreviewSent),
      "revision_requested" => Ok(WorkflowEventKind::RevisionRequested),
      "approved" => Ok(WorkflowEventKind::Approved),
      "canceled" => Ok(WorkflowEventKind::Canceled),
      other => Err(format!("unknown workflow event '{}'", other)),
    }
  }
}

/// Append-only audit record. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
  pub id: Uuid,
  pub draft_id: Uuid,
  pub event: WorkflowEventKind,
  pub actor_id: Uuid,
  pub metadata: Value,
  pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
  pub fn new(draft_id: Uuid, event: WorkflowEventKind, actor_id: Uuid, metadata: Value) -> Self {
    Self {
      id: Uuid::new_v4(),
      draft_id,
      event,
      actor_id,
      metadata,
      occurred_at: Utc::now(),
    }
  }
}
