// draftflow/src/store/mod.rs

//! Persistence boundary.
//!
//! `DraftStore` and `WorkflowEventLog` serve the workflow state machine
//! directly. `TransactionalStore` hands out `StoreTransaction`s, which the
//! transaction manager drives for the commit pipeline.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DraftflowResult;
use crate::model::{
  DataPatch, Draft, DraftWithRelations, Invoice, MessageCard, NewDraft, Order, OrderItem, WorkflowEvent, WorkflowStatus,
};
use crate::transaction::IsolationLevel;

/// A guarded partial update of one draft.
///
/// Guards are evaluated by the store atomically with the write:
/// - the draft must not be committed,
/// - when `expected_status` is set, the current status must be one of them,
/// - when `increment_revision` is set, `revision_count` must be below `max_revisions`.
///
/// With `increment_revision`, an appended revision note is stamped with the new count.
///
/// If any guard fails nothing is written and the current row comes back as
/// `UpdateOutcome::Rejected`.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
  pub expected_status: Option<&'static [WorkflowStatus]>,
  pub status: Option<WorkflowStatus>,
  /// Moves `PENDING` to `IN_PROGRESS`; any other status is left alone.
  pub start_if_pending: bool,
  pub assigned_designer_id: Option<Uuid>,
  /// Atomic `revision_count + 1`, never a read-modify-write by the caller.
  pub increment_revision: bool,
  pub data_patch: Option<DataPatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
  Applied(Draft),
  Rejected(Draft),
}

#[async_trait]
pub trait DraftStore: Send + Sync {
  async fn find_by_id(&self, id: Uuid) -> DraftflowResult<Option<Draft>>;

  async fn find_with_relations(&self, id: Uuid) -> DraftflowResult<Option<DraftWithRelations>>;

  /// Fails with `NotFound` when the draft does not exist.
  async fn update(&self, id: Uuid, update: DraftUpdate) -> DraftflowResult<UpdateOutcome>;

  async fn create(&self, draft: NewDraft) -> DraftflowResult<Draft>;
}

#[async_trait]
pub trait WorkflowEventLog: Send + Sync {
  async fn append(&self, event: WorkflowEvent) -> DraftflowResult<()>;

  /// Events for one draft, oldest first.
  async fn events_for(&self, draft_id: Uuid) -> DraftflowResult<Vec<WorkflowEvent>>;
}

#[async_trait]
pub trait TransactionalStore: Send + Sync {
  async fn begin(&self, isolation: IsolationLevel) -> DraftflowResult<Box<dyn StoreTransaction>>;
}

/// One open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
  async fn load_draft(&mut self, id: Uuid) -> DraftflowResult<Option<Draft>>;

  async fn load_message_card(&mut self, id: Uuid) -> DraftflowResult<Option<MessageCard>>;

  async fn insert_order(&mut self, order: &Order) -> DraftflowResult<()>;

  async fn insert_order_item(&mut self, item: &OrderItem) -> DraftflowResult<()>;

  /// Sets `committed_at`, provided the row is still at `expected_version`.
  /// A lost race surfaces as a retryable `StoreError::WriteConflict`.
  async fn mark_committed(&mut self, draft_id: Uuid, expected_version: i64, at: DateTime<Utc>) -> DraftflowResult<()>;

  /// A failure here must leave the rest of the transaction usable.
  async fn insert_invoice(&mut self, invoice: &Invoice) -> DraftflowResult<()>;

  async fn commit(self: Box<Self>) -> DraftflowResult<()>;

  async fn rollback(self: Box<Self>) -> DraftflowResult<()>;
}
