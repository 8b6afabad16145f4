// draftflow/src/effects/mod.rs

//! Side effects triggered by workflow transitions and commits. None of them can
//! fail the operation that triggered it.

pub mod dispatcher;
pub mod notification;
pub mod shipment;

pub use dispatcher::EffectDispatcher;
pub use notification::{LogNotifier, Notification, NotificationDispatcher, NotificationKind};
pub use shipment::{Shipment, ShipmentRequest, ShipmentService};
