// draftflow/src/pipeline/hooks.rs

//! Handler registration. A handler may fail with any error convertible into
//! `DraftflowError`; the conversion happens once, at registration.

use std::future::Future;

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::core::handler::Handler;
use crate::error::DraftflowError;
use crate::pipeline::definition::Pipeline;

fn wrap<TData, F, E>(handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static) -> Handler<TData>
where
  TData: 'static + Send + Sync,
  F: Future<Output = Result<PipelineControl, E>> + Send + 'static,
  E: Into<DraftflowError> + Send + 'static,
{
  Box::new(move |ctx_data| {
    let user_fut = handler_fn(ctx_data);
    Box::pin(async move { user_fut.await.map_err(Into::into) })
  })
}

impl<TData> Pipeline<TData>
where
  TData: 'static + Send + Sync,
{
  pub fn before_step<F, E>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, E>> + Send + 'static,
    E: Into<DraftflowError> + Send + 'static,
  {
    self.step_index(step_name);
    self.before.entry(step_name.to_string()).or_default().push(wrap(handler_fn));
  }

  pub fn on_step<F, E>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, E>> + Send + 'static,
    E: Into<DraftflowError> + Send + 'static,
  {
    self.step_index(step_name);
    self.on.entry(step_name.to_string()).or_default().push(wrap(handler_fn));
  }

  pub fn after_step<F, E>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, E>> + Send + 'static,
    E: Into<DraftflowError> + Send + 'static,
  {
    self.step_index(step_name);
    self.after.entry(step_name.to_string()).or_default().push(wrap(handler_fn));
  }
}
