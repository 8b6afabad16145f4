// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use async_trait::async_trait;
use chrono::Utc;
use draftflow::{
  BillingSnapshot, CommitPipeline, CommitServices, ContextData, Draft, DraftData, DraftMethod, DraftflowConfig,
  DraftflowError, EffectDispatcher, InMemoryStore, MessageCard, Notification, NotificationDispatcher,
  NotificationKind, PipelineControl, Shipment, ShipmentRequest, ShipmentService, ShippingSnapshot, TransactionManager,
  WorkflowEngine, WorkflowStatus,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Recording collaborators ---

#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<Notification>>,
  pub fail: AtomicBool,
}

impl RecordingNotifier {
  pub fn kinds_for(&self, user_id: Uuid) -> Vec<NotificationKind> {
    self.sent.lock().iter().filter(|n| n.user_id == user_id).map(|n| n.kind).collect()
  }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
  async fn send(&self, notification: Notification) -> anyhow::Result<()> {
    if self.fail.load(Ordering::SeqCst) {
      anyhow::bail!("notification gateway unavailable");
    }
    self.sent.lock().push(notification);
    Ok(())
  }
}

#[derive(Default)]
pub struct RecordingShipments {
  pub requests: Mutex<Vec<ShipmentRequest>>,
  pub fail: AtomicBool,
}

#[async_trait]
impl ShipmentService for RecordingShipments {
  async fn create_and_register_shipment(&self, request: ShipmentRequest) -> anyhow::Result<Shipment> {
    if self.fail.load(Ordering::SeqCst) {
      anyhow::bail!("carrier API rejected tracking number");
    }
    self.requests.lock().push(request.clone());
    Ok(Shipment {
      id: Uuid::new_v4(),
      order_id: request.order_id,
      carrier_code: request.carrier_code,
      tracking_number: request.tracking_number,
    })
  }
}

// --- Harness ---

pub const CARD_PRICE_CENTS: i64 = 1_250;
pub const SHIPPING_COST_CENTS: i64 = 399;

/// Everything a test needs, wired against one in-memory store.
pub struct Harness {
  pub store: InMemoryStore,
  pub notifier: Arc<RecordingNotifier>,
  pub shipments: Arc<RecordingShipments>,
  pub effects: EffectDispatcher,
  pub engine: WorkflowEngine,
  pub commits: CommitPipeline,
  pub transactions: Arc<TransactionManager>,
  pub config: DraftflowConfig,
  pub card: MessageCard,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_config(test_config())
  }

  pub fn with_config(config: DraftflowConfig) -> Self {
    let store = InMemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let shipments = Arc::new(RecordingShipments::default());
    let effects = EffectDispatcher::new();
    let transactions = Arc::new(TransactionManager::new(
      Arc::new(store.clone()),
      config.transactions.clone(),
    ));

    let engine = WorkflowEngine::new(
      Arc::new(store.clone()),
      Arc::new(store.clone()),
      notifier.clone(),
      effects.clone(),
    );
    let commits = CommitPipeline::new(CommitServices {
      drafts: Arc::new(store.clone()),
      transactions: transactions.clone(),
      notifier: notifier.clone(),
      shipments: shipments.clone(),
      effects: effects.clone(),
      config: config.clone(),
    });

    let card = MessageCard {
      id: Uuid::new_v4(),
      name: "Thank You Card".to_string(),
      price_cents: CARD_PRICE_CENTS,
    };
    store.insert_message_card(card.clone());

    Self {
      store,
      notifier,
      shipments,
      effects,
      engine,
      commits,
      transactions,
      config,
      card,
    }
  }

  /// Stores a draft in any state, bypassing the workflow.
  pub fn seed(&self, draft: Draft) -> Draft {
    self.store.insert_draft(draft.clone());
    draft
  }

  /// A draft ready to commit: message card and shipping set.
  pub fn seed_committable(&self, method: DraftMethod, status: WorkflowStatus) -> Draft {
    let mut draft = draft_fixture(Uuid::new_v4(), method, status);
    draft.message_card_id = Some(self.card.id);
    draft.shipping = Some(shipping_fixture(false));
    self.seed(draft)
  }

  /// An artist draft with a designer assigned, in `status`.
  pub fn seed_artist(&self, status: WorkflowStatus, designer_id: Uuid) -> Draft {
    let mut draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, status);
    draft.assigned_designer_id = Some(designer_id);
    self.seed(draft)
  }
}

pub fn test_config() -> DraftflowConfig {
  let mut config = DraftflowConfig::default();
  config.shipping_cost_cents = SHIPPING_COST_CENTS;
  // Keep retry backoff out of test timings.
  let profiles = config.transactions.clone();
  for tx in profiles.iter() {
    let mut tx = *tx;
    tx.retry_backoff_ms = 1;
    config.transactions.set(tx);
  }
  config
}

// --- Fixtures ---

pub fn draft_fixture(user_id: Uuid, method: DraftMethod, status: WorkflowStatus) -> Draft {
  let now = Utc::now();
  Draft {
    id: Uuid::new_v4(),
    user_id,
    method,
    workflow_status: status,
    revision_count: 0,
    max_revisions: 3,
    assigned_designer_id: None,
    message_card_id: None,
    shipping: None,
    data: DraftData::new(),
    committed_at: None,
    version: 1,
    created_at: now,
    updated_at: now,
  }
}

pub fn shipping_fixture(with_tracking: bool) -> ShippingSnapshot {
  let mut shipping = ShippingSnapshot {
    recipient_name: Some("Ada Lovelace".to_string()),
    ..Default::default()
  };
  if with_tracking {
    shipping.carrier_code = Some("ups".to_string());
    shipping.carrier_name = Some("UPS".to_string());
    shipping.tracking_number = Some("1Z999AA10123456784".to_string());
  }
  shipping
}

pub fn billing_fixture() -> BillingSnapshot {
  BillingSnapshot {
    name: Some("Ada Lovelace".to_string()),
    email: Some("ada@example.com".to_string()),
    ..Default::default()
  }
}

// --- Pipeline test helpers ---

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

pub fn create_simple_handler(step_name: &'static str, message_to_append: &'static str) -> draftflow::Handler<TestContext> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name.to_string());
      if guard.should_stop_at.as_deref() == Some(step_name) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_failing_handler(step_name: &'static str, error_message: &'static str) -> draftflow::Handler<TestContext> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(DraftflowError::Internal(error_message.to_string()))
    })
  })
}
