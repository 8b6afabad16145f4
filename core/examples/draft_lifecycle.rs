// draftflow/examples/draft_lifecycle.rs

use draftflow::{
  CommitPipeline, CommitServices, DraftMethod, DraftStore, DraftflowConfig, DraftflowError, EffectDispatcher,
  InMemoryStore, LogNotifier, MessageCard, Shipment, ShipmentRequest, ShipmentService, ShippingSnapshot,
  TransactionManager, WorkflowEngine,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

// Stand-in for a carrier integration.
struct PrintingShipments;

#[async_trait::async_trait]
impl ShipmentService for PrintingShipments {
  async fn create_and_register_shipment(&self, request: ShipmentRequest) -> anyhow::Result<Shipment> {
    info!(order_id = %request.order_id, tracking = %request.tracking_number, "Registering shipment.");
    Ok(Shipment {
      id: Uuid::new_v4(),
      order_id: request.order_id,
      carrier_code: request.carrier_code,
      tracking_number: request.tracking_number,
    })
  }
}

#[tokio::main]
async fn main() -> Result<(), DraftflowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Draft Lifecycle Example ---");

  let config = DraftflowConfig::from_env()?;
  let store = InMemoryStore::new();
  let effects = EffectDispatcher::new();
  let notifier = Arc::new(LogNotifier);

  let card = MessageCard {
    id: Uuid::new_v4(),
    name: "Birthday Card".to_string(),
    price_cents: 1_500,
  };
  store.insert_message_card(card.clone());

  let engine = WorkflowEngine::new(
    Arc::new(store.clone()),
    Arc::new(store.clone()),
    notifier.clone(),
    effects.clone(),
  );
  let commits = CommitPipeline::new(CommitServices {
    drafts: Arc::new(store.clone()),
    transactions: Arc::new(TransactionManager::new(Arc::new(store.clone()), config.transactions.clone())),
    notifier,
    shipments: Arc::new(PrintingShipments),
    effects: effects.clone(),
    config: config.clone(),
  });

  let customer = Uuid::new_v4();
  let designer = Uuid::new_v4();
  let shipping = ShippingSnapshot {
    recipient_name: Some("Grace Hopper".to_string()),
    carrier_code: Some("usps".to_string()),
    tracking_number: Some("9400111899223856928499".to_string()),
    ..Default::default()
  };
  let new_draft = config
    .new_draft(customer, DraftMethod::Artist)
    .with_message_card(card.id)
    .with_shipping(shipping);
  let draft = store.create(new_draft).await?;
  info!(draft_id = %draft.id, status = %draft.workflow_status, "Draft created.");

  engine.assign_designer(draft.id, designer, customer).await?;
  engine.send_preview(draft.id, designer).await?;
  engine
    .request_revision(draft.id, customer, Some("Make the balloons red".to_string()))
    .await?;
  engine.send_preview(draft.id, designer).await?;

  // Committing before approval is refused.
  if let Err(e) = commits.commit(draft.id, customer).await {
    info!(error = %e, "Commit refused as expected.");
  }

  let approved = engine.approve(draft.id, customer).await?;
  info!(
    status = %approved.workflow_status,
    revisions = approved.revision_count,
    "Design approved."
  );

  let receipt = commits.commit(draft.id, customer).await?;
  info!(
    order_id = %receipt.order.id,
    total_cents = receipt.order.total_cents,
    currency = %receipt.order.currency,
    "Order created."
  );

  for event in engine.events(draft.id).await? {
    info!(event = %event.event, actor = %event.actor_id, metadata = %event.metadata, "History.");
  }

  effects.drain().await;
  info!("--- Draft Lifecycle Example Finished ---");
  Ok(())
}
