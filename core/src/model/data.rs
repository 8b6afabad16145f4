// draftflow/src/model/data.rs

//! Typed access to the draft's free-form `data` bag.
//!
//! The bag is stored as an opaque JSON object. Business logic never touches the
//! map directly; it goes through the accessors below, and storage-level partial
//! merges are expressed as `DataPatch` values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

const REVISION_NOTES_KEY: &str = "revisionNotes";
const CANCELLATION_REASON_KEY: &str = "cancellationReason";
const BILLING_KEY: &str = "billing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionNote {
  /// 1-based revision number this note opened.
  pub revision: u32,
  pub note: String,
  pub requested_by: Uuid,
  pub requested_at: DateTime<Utc>,
}

/// Billing details copied onto an invoice at commit time.
/// Independent of any reusable address record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSnapshot {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftData(Map<String, Value>);

impl DraftData {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wraps a raw map coming from the storage boundary.
  pub fn from_map(map: Map<String, Value>) -> Self {
    Self(map)
  }

  pub fn into_map(self) -> Map<String, Value> {
    self.0
  }

  pub fn revision_notes(&self) -> Vec<RevisionNote> {
    match self.0.get(REVISION_NOTES_KEY) {
      Some(Value::Array(items)) => items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RevisionNote>(item.clone()) {
          Ok(note) => Some(note),
          Err(e) => {
            warn!(error = %e, "Skipping malformed revision note in draft data.");
            None
          }
        })
        .collect(),
      _ => Vec::new(),
    }
  }

  pub fn append_revision_note(&mut self, note: RevisionNote) {
    let value = serde_json::to_value(note).unwrap_or(Value::Null);
    match self.0.get_mut(REVISION_NOTES_KEY) {
      Some(Value::Array(items)) => items.push(value),
      _ => {
        self.0.insert(REVISION_NOTES_KEY.to_string(), Value::Array(vec![value]));
      }
    }
  }

  pub fn cancellation_reason(&self) -> Option<&str> {
    self.0.get(CANCELLATION_REASON_KEY).and_then(Value::as_str)
  }

  pub fn set_cancellation_reason(&mut self, reason: impl Into<String>) {
    self
      .0
      .insert(CANCELLATION_REASON_KEY.to_string(), Value::String(reason.into()));
  }

  /// `None` when absent or not shaped like a billing object.
  pub fn billing_snapshot(&self) -> Option<BillingSnapshot> {
    let raw = self.0.get(BILLING_KEY)?;
    if !raw.is_object() {
      return None;
    }
    match serde_json::from_value(raw.clone()) {
      Ok(billing) => Some(billing),
      Err(e) => {
        warn!(error = %e, "Ignoring malformed billing snapshot in draft data.");
        None
      }
    }
  }

  pub fn set_billing_snapshot(&mut self, billing: BillingSnapshot) {
    let value = serde_json::to_value(billing).unwrap_or(Value::Null);
    self.0.insert(BILLING_KEY.to_string(), value);
  }

  pub fn apply(&mut self, patch: DataPatch) {
    match patch {
      DataPatch::AppendRevisionNote(note) => self.append_revision_note(note),
      DataPatch::SetCancellationReason(reason) => self.set_cancellation_reason(reason),
      DataPatch::SetBillingSnapshot(billing) => self.set_billing_snapshot(billing),
    }
  }
}

/// A partial merge into `Draft.data`, applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPatch {
  AppendRevisionNote(RevisionNote),
  SetCancellationReason(String),
  SetBillingSnapshot(BillingSnapshot),
}
