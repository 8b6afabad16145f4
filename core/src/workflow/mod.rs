// draftflow/src/workflow/mod.rs

//! The draft workflow state machine: a static transition table plus the
//! engine that applies it to stored drafts.

pub mod engine;
pub mod transitions;

pub use engine::WorkflowEngine;
pub use transitions::{
  can_assign_designer, can_request_revision, rule_for, validate_named_transition, validate_transition, ActorRole,
  Precondition, TransitionRule, WorkflowAction, TRANSITIONS,
};
