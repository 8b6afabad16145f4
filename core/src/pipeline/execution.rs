// draftflow/src/pipeline/execution.rs

//! `Pipeline::run`.

use tracing::{event, info_span, instrument, Instrument, Level};

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::handler::Handler;
use crate::core::step::StepDef;
use crate::error::{DraftflowError, DraftflowResult};
use crate::pipeline::definition::Pipeline;

impl<TData> Pipeline<TData>
where
  TData: 'static + Send + Sync,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// - A step whose `skip_if` returns true is skipped.
  /// - A non-optional step without handlers fails the run with `HandlerMissing`.
  /// - A handler error in a non-optional step fails the run. In an optional
  ///   step it is logged and the run moves on to the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_context_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> DraftflowResult<PipelineResult> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = info_span!(
        "pipeline_step_execution",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          step_span.in_scope(|| event!(Level::INFO, "Step skipped due to 'skip_if' condition."));
          continue;
        }
      }

      if !self.has_handlers(&step_def.name) {
        if step_def.optional {
          step_span.in_scope(|| event!(Level::DEBUG, "Optional step has no handlers, skipping."));
          continue;
        }
        step_span.in_scope(|| event!(Level::ERROR, "Non-optional step has no handlers."));
        return Err(DraftflowError::HandlerMissing {
          step_name: step_def.name.clone(),
        });
      }

      match self.run_step(step_def, &ctx_data).instrument(step_span.clone()).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          step_span.in_scope(|| event!(Level::INFO, "Pipeline stopped by a handler."));
          return Ok(PipelineResult::Stopped);
        }
        Err(e) if step_def.optional => {
          step_span.in_scope(|| event!(Level::WARN, error = %e, "Optional step failed; continuing."));
        }
        Err(e) => return Err(e),
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(PipelineResult::Completed)
  }

  fn has_handlers(&self, step_name: &str) -> bool {
    [&self.before, &self.on, &self.after]
      .iter()
      .any(|phase| phase.get(step_name).map_or(false, |v| !v.is_empty()))
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> DraftflowResult<PipelineControl> {
    let phases = [("before", &self.before), ("on", &self.on), ("after", &self.after)];
    for (phase, handlers) in phases {
      if let Some(handlers) = handlers.get(&step_def.name) {
        if run_handlers(phase, handlers, ctx_data).await? == PipelineControl::Stop {
          return Ok(PipelineControl::Stop);
        }
      }
    }
    event!(Level::DEBUG, "Step processing finished successfully.");
    Ok(PipelineControl::Continue)
  }
}

async fn run_handlers<TData>(
  phase: &'static str,
  handlers: &[Handler<TData>],
  ctx_data: &ContextData<TData>,
) -> DraftflowResult<PipelineControl>
where
  TData: 'static + Send + Sync,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    let span = info_span!("step_handler", phase, handler_index = handler_idx);
    match handler_fn(ctx_data.clone()).instrument(span).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
      Err(e) => {
        event!(Level::DEBUG, phase, error = %e, "Handler failed.");
        return Err(e);
      }
    }
  }
  Ok(PipelineControl::Continue)
}
