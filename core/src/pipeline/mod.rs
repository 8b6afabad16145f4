// draftflow/src/pipeline/mod.rs

//! `Pipeline<TData>`: construction, handler registration, and execution.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Pipeline;
