// draftflow/src/model/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::data::BillingSnapshot;
use super::draft::ShippingSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  /// Created by commit; the payment flow moves it on from here.
  PaymentDue,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::PaymentDue => "PAYMENT_DUE",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub status: OrderStatus,
  /// Server-computed: message card price plus configured shipping cost.
  pub total_cents: i64,
  pub shipping_cost_cents: i64,
  pub currency: String,
  pub shipping: ShippingSnapshot,
  pub created_at: DateTime<Utc>,
}

/// Line item kinds an order can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderItemKind {
  Draft,
}

impl OrderItemKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderItemKind::Draft => "draft",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub kind: OrderItemKind,
  /// The committed draft's id.
  pub reference_id: Uuid,
  pub quantity: i32,
  pub unit_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
  pub id: Uuid,
  pub order_id: Uuid,
  pub user_id: Uuid,
  pub amount_cents: i64,
  pub currency: String,
  pub billing: BillingSnapshot,
  pub issued_at: DateTime<Utc>,
}

/// Everything a successful commit produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
  pub order: Order,
  pub item: OrderItem,
  /// `None` when the draft had no billing snapshot or invoice creation failed.
  pub invoice: Option<Invoice>,
  pub committed_at: DateTime<Utc>,
  /// Designer on the draft as read inside the commit transaction.
  pub assigned_designer_id: Option<Uuid>,
}
