// draftflow/src/effects/shipment.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
  pub order_id: Uuid,
  pub carrier_code: String,
  pub carrier_name: Option<String>,
  pub tracking_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub carrier_code: String,
  pub tracking_number: String,
}

/// Registers shipments with the tracking subsystem.
#[async_trait]
pub trait ShipmentService: Send + Sync {
  async fn create_and_register_shipment(&self, request: ShipmentRequest) -> anyhow::Result<Shipment>;
}
