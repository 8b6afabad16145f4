// draftflow/src/commit/pipeline.rs

//! `commit(draft_id, user_id)` as a step pipeline:
//!
//! 1. `load_draft`: draft with relations, ownership check.
//! 2. `check_commit_preconditions`: `can_commit`.
//! 3. `price_order`: card price plus configured shipping cost.
//! 4. `persist_order`: order, item, `committed_at` and invoice under `DRAFT_COMMIT`.
//! 5. `dispatch_post_commit_effects` (optional): designer notification and
//!    shipment registration, submitted to the effect dispatcher and not awaited.
//!
//! Embedders can add their own steps through `pipeline_mut`.

use serde_json::json;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::context::CommitCtxData;
use super::guard::can_commit;
use super::persist::{persist_commit, CommitPlan};
use crate::config::DraftflowConfig;
use crate::core::{ContextData, PipelineControl};
use crate::effects::{EffectDispatcher, Notification, NotificationDispatcher, NotificationKind};
use crate::effects::{ShipmentRequest, ShipmentService};
use crate::error::{DraftflowError, DraftflowResult};
use crate::model::CommitReceipt;
use crate::pipeline::Pipeline;
use crate::store::DraftStore;
use crate::transaction::{TransactionManager, TransactionProfile};

pub const LOAD_DRAFT: &str = "load_draft";
pub const CHECK_COMMIT_PRECONDITIONS: &str = "check_commit_preconditions";
pub const PRICE_ORDER: &str = "price_order";
pub const PERSIST_ORDER: &str = "persist_order";
pub const DISPATCH_POST_COMMIT_EFFECTS: &str = "dispatch_post_commit_effects";

/// Collaborators the commit steps run against.
pub struct CommitServices {
  pub drafts: Arc<dyn DraftStore>,
  pub transactions: Arc<TransactionManager>,
  pub notifier: Arc<dyn NotificationDispatcher>,
  pub shipments: Arc<dyn ShipmentService>,
  pub effects: EffectDispatcher,
  pub config: DraftflowConfig,
}

pub struct CommitPipeline {
  pipeline: Pipeline<CommitCtxData>,
}

impl CommitPipeline {
  pub fn new(services: CommitServices) -> Self {
    let services = Arc::new(services);
    let mut p = Pipeline::<CommitCtxData>::new(&[
      (LOAD_DRAFT, false, None),
      (CHECK_COMMIT_PRECONDITIONS, false, None),
      (PRICE_ORDER, false, None),
      (PERSIST_ORDER, false, None),
      (DISPATCH_POST_COMMIT_EFFECTS, true, None),
    ]);

    let svc = services.clone();
    p.on_step(LOAD_DRAFT, move |ctx_data: ContextData<CommitCtxData>| {
      let svc = svc.clone();
      Box::pin(async move {
        let (draft_id, user_id) = {
          let guard = ctx_data.read();
          (guard.draft_id, guard.user_id)
        };
        let loaded = svc
          .drafts
          .find_with_relations(draft_id)
          .await?
          .ok_or_else(|| DraftflowError::draft_not_found(draft_id))?;
        if !loaded.draft.is_owned_by(user_id) {
          return Err(DraftflowError::Forbidden(
            "only the draft owner may commit this draft".to_string(),
          ));
        }
        ctx_data.write().loaded = Some(loaded);
        Ok::<_, DraftflowError>(PipelineControl::Continue)
      })
    });

    p.on_step(CHECK_COMMIT_PRECONDITIONS, |ctx_data: ContextData<CommitCtxData>| {
      Box::pin(async move {
        let guard = ctx_data.read();
        let loaded = guard.loaded.as_ref().ok_or_else(|| missing_context(LOAD_DRAFT))?;
        can_commit(&loaded.draft)?;
        Ok::<_, DraftflowError>(PipelineControl::Continue)
      })
    });

    let svc = services.clone();
    p.on_step(PRICE_ORDER, move |ctx_data: ContextData<CommitCtxData>| {
      let svc = svc.clone();
      Box::pin(async move {
        let mut guard = ctx_data.write();
        let loaded = guard.loaded.as_ref().ok_or_else(|| missing_context(LOAD_DRAFT))?;
        let card = match (&loaded.message_card, loaded.draft.message_card_id) {
          (Some(card), _) => card,
          (None, Some(card_id)) => {
            return Err(DraftflowError::NotFound {
              resource: "message card",
              id: card_id,
            })
          }
          (None, None) => {
            return Err(DraftflowError::MissingCommitFields {
              fields: vec!["messageCardId"],
            })
          }
        };
        let plan = CommitPlan {
          draft_id: guard.draft_id,
          user_id: guard.user_id,
          draft_version: loaded.draft.version,
          message_card_id: card.id,
          unit_price_cents: card.price_cents,
          shipping_cost_cents: svc.config.shipping_cost_cents,
          currency: svc.config.currency.clone(),
        };
        let total_cents = plan.total_cents()?;
        event!(Level::DEBUG, total_cents, "Order priced.");
        guard.plan = Some(plan);
        Ok::<_, DraftflowError>(PipelineControl::Continue)
      })
    });

    let svc = services.clone();
    p.on_step(PERSIST_ORDER, move |ctx_data: ContextData<CommitCtxData>| {
      let svc = svc.clone();
      Box::pin(async move {
        let plan = ctx_data.read().plan.clone().ok_or_else(|| missing_context(PRICE_ORDER))?;
        let receipt = svc
          .transactions
          .execute::<CommitReceipt, _>(TransactionProfile::DraftCommit, move |tx| {
            let plan = plan.clone();
            Box::pin(async move { persist_commit(tx, &plan).await })
          })
          .await?;
        event!(
          Level::INFO,
          order_id = %receipt.order.id,
          total_cents = receipt.order.total_cents,
          invoiced = receipt.invoice.is_some(),
          "Draft committed."
        );
        ctx_data.write().receipt = Some(receipt);
        Ok::<_, DraftflowError>(PipelineControl::Continue)
      })
    });

    let svc = services;
    p.on_step(DISPATCH_POST_COMMIT_EFFECTS, move |ctx_data: ContextData<CommitCtxData>| {
      let svc = svc.clone();
      Box::pin(async move {
        let receipt = ctx_data.read().receipt.clone();
        let receipt = receipt.ok_or_else(|| missing_context(PERSIST_ORDER))?;
        dispatch_post_commit_effects(&svc, &receipt);
        Ok::<_, DraftflowError>(PipelineControl::Continue)
      })
    });

    Self { pipeline: p }
  }

  /// For inserting or replacing steps around the built-in ones.
  pub fn pipeline_mut(&mut self) -> &mut Pipeline<CommitCtxData> {
    &mut self.pipeline
  }

  /// Converts the draft into an order. Succeeds at most once per draft.
  #[instrument(name = "CommitPipeline::commit", skip_all, fields(%draft_id, %user_id), err(Display))]
  pub async fn commit(&self, draft_id: Uuid, user_id: Uuid) -> DraftflowResult<CommitReceipt> {
    let ctx_data = ContextData::new(CommitCtxData::new(draft_id, user_id));
    let result = self.pipeline.run(ctx_data.clone()).await?;
    let receipt = ctx_data.write().receipt.take();
    receipt.ok_or_else(|| {
      DraftflowError::Internal(format!(
        "commit pipeline finished ({:?}) without persisting an order",
        result
      ))
    })
  }
}

fn dispatch_post_commit_effects(svc: &CommitServices, receipt: &CommitReceipt) {
  if let Some(designer_id) = receipt.assigned_designer_id {
    let notifier = svc.notifier.clone();
    let notification = Notification {
      user_id: designer_id,
      kind: NotificationKind::OrderCommitted,
      payload: json!({
        "draftId": receipt.item.reference_id,
        "orderId": receipt.order.id,
      }),
    };
    svc
      .effects
      .submit("notify_designer", async move { notifier.send(notification).await });
  }

  if let Some((carrier_code, tracking_number)) = receipt.order.shipping.tracking() {
    let shipments = svc.shipments.clone();
    let request = ShipmentRequest {
      order_id: receipt.order.id,
      carrier_code: carrier_code.to_string(),
      carrier_name: receipt.order.shipping.carrier_name.clone(),
      tracking_number: tracking_number.to_string(),
    };
    svc.effects.submit("register_shipment", async move {
      let shipment = shipments.create_and_register_shipment(request).await?;
      event!(Level::INFO, shipment_id = %shipment.id, "Shipment registered for committed order.");
      Ok(())
    });
  }
}

fn missing_context(step: &str) -> DraftflowError {
  DraftflowError::Internal(format!("commit context not populated; step '{}' must run first", step))
}
