// src/lib.rs

//! Draftflow: the lifecycle core of designer-assisted orders.
//!
//! A customer composes a *draft*; for the artist path a designer iterates on it
//! through previews and revisions. The draft is finally *committed* into an
//! order, an order item and (when billing details exist) an invoice.
//!
//!  - `workflow`: the static transition table and the `WorkflowEngine` applying it.
//!  - `transaction`: isolation-level-aware execution with bounded retries under
//!    five named profiles.
//!  - `commit`: the commit pipeline, built on the step `pipeline` executor.
//!  - `effects`: best-effort notifications and shipment registration.
//!  - `store`: persistence traits, an in-memory store and (feature `postgres`) a sqlx store.

pub mod commit;
pub mod config;
pub mod core;
pub mod effects;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod transaction;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::pipeline::definition::Pipeline;

pub use crate::commit::{can_commit, CommitCtxData, CommitPipeline, CommitServices};
pub use crate::config::DraftflowConfig;
pub use crate::effects::{
  EffectDispatcher, LogNotifier, Notification, NotificationDispatcher, NotificationKind, Shipment, ShipmentRequest,
  ShipmentService,
};
pub use crate::error::{DraftflowError, DraftflowResult, ErrorKind, StoreError};
pub use crate::model::{
  BillingSnapshot, CommitReceipt, DataPatch, Draft, DraftData, DraftMethod, DraftWithRelations, Invoice, MessageCard,
  NewDraft, Order, OrderItem, RevisionNote, ShippingSnapshot, WorkflowEvent, WorkflowEventKind, WorkflowStatus,
};
pub use crate::store::memory::InMemoryStore;
pub use crate::store::{DraftStore, DraftUpdate, StoreTransaction, TransactionalStore, UpdateOutcome, WorkflowEventLog};
pub use crate::transaction::{
  IsolationLevel, TransactionConfig, TransactionManager, TransactionProfile, TransactionProfiles, TxFuture,
};
pub use crate::workflow::{validate_transition, WorkflowAction, WorkflowEngine};

