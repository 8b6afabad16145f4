// draftflow/src/effects/notification.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  DesignerAssigned,
  PreviewReady,
  RevisionRequested,
  DesignApproved,
  DraftCanceled,
  OrderCommitted,
}

impl NotificationKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NotificationKind::DesignerAssigned => "designer_assigned",
      NotificationKind::PreviewReady => "preview_ready",
      NotificationKind::RevisionRequested => "revision_requested",
      NotificationKind::DesignApproved => "design_approved",
      NotificationKind::DraftCanceled => "draft_canceled",
      NotificationKind::OrderCommitted => "order_committed",
    }
  }
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub user_id: Uuid,
  #[serde(rename = "type")]
  pub kind: NotificationKind,
  pub payload: Value,
}

/// Delivers notifications (email, SMS, in-app) on behalf of the core.
///
/// Callers treat every error as logged and non-fatal.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
  async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
  async fn send(&self, notification: Notification) -> anyhow::Result<()> {
    info!(
      user_id = %notification.user_id,
      kind = %notification.kind,
      payload = %notification.payload,
      "Notification (log only)."
    );
    Ok(())
  }
}
