// draftflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;
use uuid::Uuid;

use crate::model::WorkflowStatus;
use crate::transaction::TransactionProfile;
use crate::workflow::WorkflowAction;

/// Caller-facing classification of a failure.
///
/// `Timeout` is kept apart from `BadRequest` so an API layer can tell
/// "try again later" from "this request is invalid".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  BadRequest,
  Forbidden,
  Conflict,
  Timeout,
  Internal,
}

/// Failures reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("serialization failure: {0}")]
  SerializationFailure(String),

  #[error("deadlock detected: {0}")]
  Deadlock(String),

  /// An optimistic compare-and-set on a row version lost the race.
  #[error("write conflict on {resource} {id}: expected version {expected}")]
  WriteConflict { resource: &'static str, id: Uuid, expected: i64 },

  #[error("{resource} {id} not found in store")]
  Missing { resource: &'static str, id: Uuid },

  #[error("store backend error: {0}")]
  Backend(#[source] AnyhowError),
}

impl StoreError {
  /// Transient concurrency conflicts that are safe to retry by re-running the whole transaction.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      StoreError::SerializationFailure(_) | StoreError::Deadlock(_) | StoreError::WriteConflict { .. }
    )
  }
}

#[derive(Debug, Error)]
pub enum DraftflowError {
  #[error("{resource} not found: {id}")]
  NotFound { resource: &'static str, id: Uuid },

  #[error("cannot {action} from current status {status}")]
  InvalidTransition { action: WorkflowAction, status: WorkflowStatus },

  #[error("unknown workflow action: {0}")]
  UnknownAction(String),

  #[error("cannot assign designer from current status {status}")]
  AssignmentClosed { status: WorkflowStatus },

  #[error("cannot {action}: {reason}")]
  PreconditionFailed { action: WorkflowAction, reason: String },

  #[error("draft cannot be committed, missing required fields: {}", fields.join(", "))]
  MissingCommitFields { fields: Vec<&'static str> },

  #[error("draft {draft_id} is already committed")]
  AlreadyCommitted { draft_id: Uuid },

  #[error("draft {draft_id} cannot be committed before design approval (current status {status})")]
  ApprovalRequired { draft_id: Uuid, status: WorkflowStatus },

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("transaction conflict under {profile} after {attempts} attempt(s)")]
  Conflict { profile: TransactionProfile, attempts: u32 },

  #[error("transaction under {profile} exceeded {timeout_ms}ms")]
  Timeout { profile: TransactionProfile, timeout_ms: u64 },

  #[error("storage error: {0}")]
  Storage(#[from] StoreError),

  #[error("configuration error: {0}")]
  Config(String),

  #[error("handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("error in collaborator or handler. Source: {source}")]
  Collaborator {
    #[source]
    source: AnyhowError,
  },

  #[error("internal draftflow error: {0}")]
  Internal(String),
}

impl DraftflowError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      DraftflowError::NotFound { .. } => ErrorKind::NotFound,
      DraftflowError::InvalidTransition { .. }
      | DraftflowError::UnknownAction(_)
      | DraftflowError::AssignmentClosed { .. }
      | DraftflowError::PreconditionFailed { .. }
      | DraftflowError::MissingCommitFields { .. }
      | DraftflowError::AlreadyCommitted { .. }
      | DraftflowError::ApprovalRequired { .. } => ErrorKind::BadRequest,
      DraftflowError::Forbidden(_) => ErrorKind::Forbidden,
      DraftflowError::Conflict { .. } => ErrorKind::Conflict,
      DraftflowError::Timeout { .. } => ErrorKind::Timeout,
      DraftflowError::Storage(StoreError::Missing { .. }) => ErrorKind::NotFound,
      DraftflowError::Storage(_)
      | DraftflowError::Config(_)
      | DraftflowError::HandlerMissing { .. }
      | DraftflowError::Collaborator { .. }
      | DraftflowError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// True when the transaction manager may re-run the unit of work.
  pub fn is_retryable(&self) -> bool {
    matches!(self, DraftflowError::Storage(e) if e.is_retryable())
  }

  pub(crate) fn draft_not_found(id: Uuid) -> Self {
    DraftflowError::NotFound { resource: "draft", id }
  }
}

impl From<AnyhowError> for DraftflowError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap an already-typed error instead of nesting it inside Collaborator.
    match err.downcast::<DraftflowError>() {
      Ok(inner) => inner,
      Err(err) => DraftflowError::Collaborator { source: err },
    }
  }
}

pub type DraftflowResult<T, E = DraftflowError> = std::result::Result<T, E>;
