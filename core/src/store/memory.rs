// draftflow/src/store/memory.rs

//! In-process store used by tests, benches, and embedders without a database.
//!
//! Transactions buffer their writes and validate at commit time:
//! - `Serializable` re-checks the version of every draft the transaction read,
//! - every isolation level re-checks the version a `mark_committed` was issued against.
//!
//! A failed check is reported as a retryable `StoreError`, the same way a
//! database reports a serialization failure.
//!
//! Fault injection (`inject_*`, `set_latency`) lets tests drive the retry,
//! timeout, and best-effort paths deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{event, Level};
use uuid::Uuid;

use super::{DraftStore, DraftUpdate, StoreTransaction, TransactionalStore, UpdateOutcome, WorkflowEventLog};
use crate::error::{DraftflowError, DraftflowResult, StoreError};
use crate::model::{
  DataPatch, Draft, DraftWithRelations, Invoice, MessageCard, NewDraft, Order, OrderItem, WorkflowEvent, WorkflowStatus,
};
use crate::transaction::IsolationLevel;

#[derive(Debug, Default)]
struct MemoryState {
  drafts: HashMap<Uuid, Draft>,
  message_cards: HashMap<Uuid, MessageCard>,
  orders: Vec<Order>,
  order_items: Vec<OrderItem>,
  invoices: Vec<Invoice>,
  events: Vec<WorkflowEvent>,
  transactions_committed: u64,
  transactions_rolled_back: u64,
}

#[derive(Debug, Default)]
struct FaultPlan {
  /// Number of upcoming transaction commits that fail with a serialization failure.
  serialization_failures: u32,
  /// Number of upcoming transaction commits that fail with a deadlock.
  deadlocks: u32,
  fail_invoices: bool,
  fail_event_appends: bool,
  latency: Option<Duration>,
  begin_latency: Option<Duration>,
  commit_latency: Option<Duration>,
}

/// Cheap to clone; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
  state: Arc<Mutex<MemoryState>>,
  faults: Arc<Mutex<FaultPlan>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  // --- Seeding and inspection ---

  pub fn insert_message_card(&self, card: MessageCard) {
    self.state.lock().message_cards.insert(card.id, card);
  }

  /// Stores a fully-formed draft as-is, bypassing `create`.
  pub fn insert_draft(&self, draft: Draft) {
    self.state.lock().drafts.insert(draft.id, draft);
  }

  pub fn draft(&self, id: Uuid) -> Option<Draft> {
    self.state.lock().drafts.get(&id).cloned()
  }

  pub fn orders(&self) -> Vec<Order> {
    self.state.lock().orders.clone()
  }

  pub fn order_items(&self) -> Vec<OrderItem> {
    self.state.lock().order_items.clone()
  }

  pub fn invoices(&self) -> Vec<Invoice> {
    self.state.lock().invoices.clone()
  }

  pub fn events(&self) -> Vec<WorkflowEvent> {
    self.state.lock().events.clone()
  }

  pub fn transactions_committed(&self) -> u64 {
    self.state.lock().transactions_committed
  }

  pub fn transactions_rolled_back(&self) -> u64 {
    self.state.lock().transactions_rolled_back
  }

  // --- Fault injection ---

  pub fn inject_serialization_failures(&self, count: u32) {
    self.faults.lock().serialization_failures = count;
  }

  pub fn inject_deadlocks(&self, count: u32) {
    self.faults.lock().deadlocks = count;
  }

  pub fn fail_invoices(&self, fail: bool) {
    self.faults.lock().fail_invoices = fail;
  }

  pub fn fail_event_appends(&self, fail: bool) {
    self.faults.lock().fail_event_appends = fail;
  }

  /// Delay applied to every store operation. Without one, operations still yield once.
  pub fn set_latency(&self, latency: Option<Duration>) {
    self.faults.lock().latency = latency;
  }

  /// Extra delay when a transaction begins, as a pool waiting for a connection would.
  pub fn set_begin_latency(&self, latency: Option<Duration>) {
    self.faults.lock().begin_latency = latency;
  }

  /// Extra delay before a transaction's writes are applied. Abandoning the
  /// commit during the delay applies nothing.
  pub fn set_commit_latency(&self, latency: Option<Duration>) {
    self.faults.lock().commit_latency = latency;
  }

  async fn pause(&self) {
    let latency = self.faults.lock().latency;
    match latency {
      Some(d) => tokio::time::sleep(d).await,
      None => tokio::task::yield_now().await,
    }
  }
}

#[async_trait]
impl DraftStore for InMemoryStore {
  async fn find_by_id(&self, id: Uuid) -> DraftflowResult<Option<Draft>> {
    self.pause().await;
    Ok(self.state.lock().drafts.get(&id).cloned())
  }

  async fn find_with_relations(&self, id: Uuid) -> DraftflowResult<Option<DraftWithRelations>> {
    self.pause().await;
    let state = self.state.lock();
    Ok(state.drafts.get(&id).map(|draft| DraftWithRelations {
      draft: draft.clone(),
      message_card: draft
        .message_card_id
        .and_then(|card_id| state.message_cards.get(&card_id).cloned()),
    }))
  }

  async fn update(&self, id: Uuid, update: DraftUpdate) -> DraftflowResult<UpdateOutcome> {
    self.pause().await;
    let mut state = self.state.lock();
    let draft = state
      .drafts
      .get_mut(&id)
      .ok_or_else(|| DraftflowError::draft_not_found(id))?;

    let status_ok = update
      .expected_status
      .map_or(true, |allowed| allowed.contains(&draft.workflow_status));
    let revision_ok = !update.increment_revision || draft.revision_count < draft.max_revisions;
    if draft.is_committed() || !status_ok || !revision_ok {
      return Ok(UpdateOutcome::Rejected(draft.clone()));
    }

    if let Some(status) = update.status {
      draft.workflow_status = status;
    }
    if update.start_if_pending && draft.workflow_status == WorkflowStatus::Pending {
      draft.workflow_status = WorkflowStatus::InProgress;
    }
    if let Some(designer_id) = update.assigned_designer_id {
      draft.assigned_designer_id = Some(designer_id);
    }
    if update.increment_revision {
      draft.revision_count += 1;
    }
    if let Some(mut patch) = update.data_patch {
      if update.increment_revision {
        if let DataPatch::AppendRevisionNote(note) = &mut patch {
          note.revision = draft.revision_count;
        }
      }
      draft.data.apply(patch);
    }
    draft.version += 1;
    draft.updated_at = Utc::now();
    Ok(UpdateOutcome::Applied(draft.clone()))
  }

  async fn create(&self, new_draft: NewDraft) -> DraftflowResult<Draft> {
    self.pause().await;
    let now = Utc::now();
    let draft = Draft {
      id: Uuid::new_v4(),
      user_id: new_draft.user_id,
      method: new_draft.method,
      workflow_status: WorkflowStatus::Pending,
      revision_count: 0,
      max_revisions: new_draft.max_revisions,
      assigned_designer_id: None,
      message_card_id: new_draft.message_card_id,
      shipping: new_draft.shipping,
      data: new_draft.data,
      committed_at: None,
      version: 1,
      created_at: now,
      updated_at: now,
    };
    self.state.lock().drafts.insert(draft.id, draft.clone());
    Ok(draft)
  }
}

#[async_trait]
impl WorkflowEventLog for InMemoryStore {
  async fn append(&self, event: WorkflowEvent) -> DraftflowResult<()> {
    self.pause().await;
    if self.faults.lock().fail_event_appends {
      return Err(StoreError::Backend(anyhow::anyhow!("injected event log failure")).into());
    }
    self.state.lock().events.push(event);
    Ok(())
  }

  async fn events_for(&self, draft_id: Uuid) -> DraftflowResult<Vec<WorkflowEvent>> {
    self.pause().await;
    Ok(
      self
        .state
        .lock()
        .events
        .iter()
        .filter(|e| e.draft_id == draft_id)
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
  async fn begin(&self, isolation: IsolationLevel) -> DraftflowResult<Box<dyn StoreTransaction>> {
    self.pause().await;
    let begin_latency = self.faults.lock().begin_latency;
    if let Some(d) = begin_latency {
      tokio::time::sleep(d).await;
    }
    Ok(Box::new(MemoryTransaction {
      store: self.clone(),
      isolation,
      reads: HashMap::new(),
      writes: Vec::new(),
    }))
  }
}

#[derive(Debug)]
enum BufferedWrite {
  Order(Order),
  Item(OrderItem),
  Invoice(Invoice),
  Committed {
    draft_id: Uuid,
    expected_version: i64,
    at: DateTime<Utc>,
  },
}

struct MemoryTransaction {
  store: InMemoryStore,
  isolation: IsolationLevel,
  /// Draft id -> version observed by this transaction.
  reads: HashMap<Uuid, i64>,
  writes: Vec<BufferedWrite>,
}

impl MemoryTransaction {
  fn validate(&self, state: &MemoryState) -> Result<(), StoreError> {
    if self.isolation == IsolationLevel::Serializable {
      for (draft_id, seen) in &self.reads {
        let current = state.drafts.get(draft_id).map(|d| d.version);
        if current != Some(*seen) {
          return Err(StoreError::SerializationFailure(format!(
            "draft {} changed since it was read (read version {}, now {:?})",
            draft_id, seen, current
          )));
        }
      }
    }
    for write in &self.writes {
      if let BufferedWrite::Committed {
        draft_id,
        expected_version,
        ..
      } = write
      {
        match state.drafts.get(draft_id) {
          None => {
            return Err(StoreError::Missing {
              resource: "draft",
              id: *draft_id,
            })
          }
          Some(d) if d.version != *expected_version => {
            return Err(StoreError::WriteConflict {
              resource: "draft",
              id: *draft_id,
              expected: *expected_version,
            })
          }
          Some(_) => {}
        }
      }
    }
    Ok(())
  }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
  async fn load_draft(&mut self, id: Uuid) -> DraftflowResult<Option<Draft>> {
    self.store.pause().await;
    let draft = self.store.state.lock().drafts.get(&id).cloned();
    if let Some(d) = &draft {
      self.reads.entry(d.id).or_insert(d.version);
    }
    Ok(draft)
  }

  async fn load_message_card(&mut self, id: Uuid) -> DraftflowResult<Option<MessageCard>> {
    self.store.pause().await;
    Ok(self.store.state.lock().message_cards.get(&id).cloned())
  }

  async fn insert_order(&mut self, order: &Order) -> DraftflowResult<()> {
    self.store.pause().await;
    self.writes.push(BufferedWrite::Order(order.clone()));
    Ok(())
  }

  async fn insert_order_item(&mut self, item: &OrderItem) -> DraftflowResult<()> {
    self.store.pause().await;
    self.writes.push(BufferedWrite::Item(item.clone()));
    Ok(())
  }

  async fn mark_committed(&mut self, draft_id: Uuid, expected_version: i64, at: DateTime<Utc>) -> DraftflowResult<()> {
    self.store.pause().await;
    self.writes.push(BufferedWrite::Committed {
      draft_id,
      expected_version,
      at,
    });
    Ok(())
  }

  async fn insert_invoice(&mut self, invoice: &Invoice) -> DraftflowResult<()> {
    self.store.pause().await;
    if self.store.faults.lock().fail_invoices {
      return Err(StoreError::Backend(anyhow::anyhow!("injected invoice failure")).into());
    }
    self.writes.push(BufferedWrite::Invoice(invoice.clone()));
    Ok(())
  }

  async fn commit(self: Box<Self>) -> DraftflowResult<()> {
    self.store.pause().await;
    let commit_latency = self.store.faults.lock().commit_latency;
    if let Some(d) = commit_latency {
      tokio::time::sleep(d).await;
    }
    {
      let mut faults = self.store.faults.lock();
      if faults.serialization_failures > 0 {
        faults.serialization_failures -= 1;
        drop(faults);
        self.store.state.lock().transactions_rolled_back += 1;
        return Err(StoreError::SerializationFailure("injected serialization failure".to_string()).into());
      }
      if faults.deadlocks > 0 {
        faults.deadlocks -= 1;
        drop(faults);
        self.store.state.lock().transactions_rolled_back += 1;
        return Err(StoreError::Deadlock("injected deadlock".to_string()).into());
      }
    }

    let store = self.store.clone();
    let mut state = store.state.lock();
    if let Err(e) = self.validate(&state) {
      state.transactions_rolled_back += 1;
      event!(Level::DEBUG, error = %e, "In-memory transaction failed validation.");
      return Err(e.into());
    }

    let MemoryTransaction { writes, .. } = *self;
    for write in writes {
      match write {
        BufferedWrite::Order(order) => state.orders.push(order),
        BufferedWrite::Item(item) => state.order_items.push(item),
        BufferedWrite::Invoice(invoice) => state.invoices.push(invoice),
        BufferedWrite::Committed { draft_id, at, .. } => {
          if let Some(draft) = state.drafts.get_mut(&draft_id) {
            draft.committed_at = Some(at);
            draft.version += 1;
            draft.updated_at = at;
          }
        }
      }
    }
    state.transactions_committed += 1;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> DraftflowResult<()> {
    self.store.state.lock().transactions_rolled_back += 1;
    Ok(())
  }
}
