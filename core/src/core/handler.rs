// draftflow/src/core/handler.rs

use std::future::Future;
use std::pin::Pin;

use super::context_data::ContextData;
use super::control::PipelineControl;
use crate::error::DraftflowResult;

/// A step handler: takes a clone of the shared context and resolves to a flow signal.
///
/// Handlers lock the context to read or write state and drop the guard before
/// awaiting anything.
pub type Handler<TData> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = DraftflowResult<PipelineControl>> + Send>>
    + Send
    + Sync,
>;
