// draftflow/src/commit/mod.rs

//! One-way conversion of a draft into an order, order item and invoice.

pub mod context;
pub mod guard;
pub mod persist;
pub mod pipeline;

pub use context::CommitCtxData;
pub use guard::{can_commit, missing_commit_fields};
pub use persist::{persist_commit, CommitPlan};
pub use pipeline::{CommitPipeline, CommitServices};
