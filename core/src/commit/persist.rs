// draftflow/src/commit/persist.rs

//! The unit of work that runs inside the `DRAFT_COMMIT` transaction.
//!
//! It may run more than once (retries), so it only touches the transaction it
//! is handed: ids and timestamps are generated fresh on every attempt.

use chrono::Utc;
use tracing::{event, Level};
use uuid::Uuid;

use super::guard::can_commit;
use crate::error::{DraftflowError, DraftflowResult};
use crate::model::{CommitReceipt, Draft, Invoice, MessageCard, Order, OrderItem, OrderItemKind, OrderStatus};
use crate::store::StoreTransaction;

/// Pricing decided before the transaction starts, pinned to the draft version
/// and card it was computed from. `persist_commit` reprices when either moved.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPlan {
  pub draft_id: Uuid,
  pub user_id: Uuid,
  pub draft_version: i64,
  pub message_card_id: Uuid,
  pub unit_price_cents: i64,
  pub shipping_cost_cents: i64,
  pub currency: String,
}

impl CommitPlan {
  pub fn total_cents(&self) -> DraftflowResult<i64> {
    self.unit_price_cents.checked_add(self.shipping_cost_cents).ok_or_else(|| {
      DraftflowError::Internal(format!(
        "order total overflows: unit price {} + shipping {}",
        self.unit_price_cents, self.shipping_cost_cents
      ))
    })
  }

  fn repriced(&self, draft: &Draft, card: &MessageCard) -> CommitPlan {
    CommitPlan {
      draft_version: draft.version,
      message_card_id: card.id,
      unit_price_cents: card.price_cents,
      ..self.clone()
    }
  }
}

pub async fn persist_commit(tx: &mut dyn StoreTransaction, plan: &CommitPlan) -> DraftflowResult<CommitReceipt> {
  // Re-read inside the transaction; the pre-check outside it is advisory only.
  let draft = tx
    .load_draft(plan.draft_id)
    .await?
    .ok_or_else(|| DraftflowError::draft_not_found(plan.draft_id))?;
  if !draft.is_owned_by(plan.user_id) {
    return Err(DraftflowError::Forbidden("only the draft owner may commit this draft".to_string()));
  }
  can_commit(&draft)?;
  let shipping = draft
    .shipping
    .clone()
    .ok_or_else(|| DraftflowError::MissingCommitFields { fields: vec!["shipping"] })?;

  let plan = if draft.version == plan.draft_version && draft.message_card_id == Some(plan.message_card_id) {
    plan.clone()
  } else {
    let card_id = draft
      .message_card_id
      .ok_or_else(|| DraftflowError::MissingCommitFields { fields: vec!["messageCardId"] })?;
    let card = tx.load_message_card(card_id).await?.ok_or(DraftflowError::NotFound {
      resource: "message card",
      id: card_id,
    })?;
    let repriced = plan.repriced(&draft, &card);
    event!(
      Level::INFO,
      priced_version = plan.draft_version,
      current_version = draft.version,
      unit_price_cents = repriced.unit_price_cents,
      "Draft changed since pricing; repriced inside the transaction."
    );
    repriced
  };
  let total_cents = plan.total_cents()?;

  let now = Utc::now();
  let order = Order {
    id: Uuid::new_v4(),
    user_id: plan.user_id,
    status: OrderStatus::PaymentDue,
    total_cents,
    shipping_cost_cents: plan.shipping_cost_cents,
    currency: plan.currency.clone(),
    shipping,
    created_at: now,
  };
  tx.insert_order(&order).await?;

  let item = OrderItem {
    id: Uuid::new_v4(),
    order_id: order.id,
    kind: OrderItemKind::Draft,
    reference_id: draft.id,
    quantity: 1,
    unit_price_cents: plan.unit_price_cents,
  };
  tx.insert_order_item(&item).await?;

  tx.mark_committed(draft.id, draft.version, now).await?;

  let invoice = match draft.data.billing_snapshot() {
    None => {
      event!(Level::INFO, order_id = %order.id, "No billing snapshot on draft; invoice left to the payment flow.");
      None
    }
    Some(billing) => {
      let invoice = Invoice {
        id: Uuid::new_v4(),
        order_id: order.id,
        user_id: plan.user_id,
        amount_cents: order.total_cents,
        currency: order.currency.clone(),
        billing,
        issued_at: now,
      };
      match tx.insert_invoice(&invoice).await {
        Ok(()) => Some(invoice),
        Err(e) => {
          event!(Level::WARN, order_id = %order.id, error = %e, "Invoice snapshot failed; order kept without invoice.");
          None
        }
      }
    }
  };

  Ok(CommitReceipt {
    order,
    item,
    invoice,
    committed_at: now,
    assigned_designer_id: draft.assigned_designer_id,
  })
}
