// draftflow/src/model/mod.rs

//! Records owned or produced by the draft workflow.

pub mod data;
pub mod draft;
pub mod event;
pub mod order;

pub use data::{BillingSnapshot, DataPatch, DraftData, RevisionNote};
pub use draft::{
  Draft, DraftMethod, DraftWithRelations, MessageCard, NewDraft, ShippingSnapshot, WorkflowStatus,
  DEFAULT_MAX_REVISIONS,
};
pub use event::{WorkflowEvent, WorkflowEventKind};
pub use order::{CommitReceipt, Invoice, Order, OrderItem, OrderItemKind, OrderStatus};
