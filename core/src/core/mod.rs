// draftflow/src/core/mod.rs

//! Building blocks of the step pipeline: shared context, handlers, flow control.

pub mod context_data;
pub mod control;
pub mod handler;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use handler::Handler;
pub use step::{SkipCondition, StepDef};
