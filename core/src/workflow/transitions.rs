// draftflow/src/workflow/transitions.rs

//! The transition table and the pure checks built on it.
//!
//! ```text
//! PENDING -> IN_PROGRESS -> { PREVIEW_SENT <-> REVISION } -> COMPLETED
//!         \_____________ any non-terminal ____________/ -> CANCELED
//! ```
//!
//! `PENDING -> IN_PROGRESS` happens through designer assignment, which is not
//! an entry in the table.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DraftflowError, DraftflowResult};
use crate::model::{Draft, WorkflowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowAction {
  SendPreview,
  RequestRevision,
  Approve,
  Cancel,
}

impl WorkflowAction {
  pub const ALL: [WorkflowAction; 4] = [
    WorkflowAction::SendPreview,
    WorkflowAction::RequestRevision,
    WorkflowAction::Approve,
    WorkflowAction::Cancel,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      WorkflowAction::SendPreview => "sendPreview",
      WorkflowAction::RequestRevision => "requestRevision",
      WorkflowAction::Approve => "approve",
      WorkflowAction::Cancel => "cancel",
    }
  }
}

impl fmt::Display for WorkflowAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for WorkflowAction {
  type Err = DraftflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    WorkflowAction::ALL
      .into_iter()
      .find(|action| action.as_str() == s)
      .ok_or_else(|| DraftflowError::UnknownAction(s.to_string()))
  }
}

/// Who must be performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
  DraftOwner,
  AssignedDesigner,
}

impl ActorRole {
  pub fn matches(&self, draft: &Draft, actor_id: Uuid) -> bool {
    match self {
      ActorRole::DraftOwner => draft.is_owned_by(actor_id),
      ActorRole::AssignedDesigner => draft.is_assigned_to(actor_id),
    }
  }
}

impl fmt::Display for ActorRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ActorRole::DraftOwner => f.write_str("draft owner"),
      ActorRole::AssignedDesigner => f.write_str("assigned designer"),
    }
  }
}

/// Extra condition a transition needs beyond its source status.
#[derive(Debug, Clone, Copy)]
pub enum Precondition {
  None,
  Requires {
    check: fn(&Draft) -> bool,
    reason: &'static str,
  },
}

#[derive(Debug)]
pub struct TransitionRule {
  pub action: WorkflowAction,
  pub from: &'static [WorkflowStatus],
  pub to: WorkflowStatus,
  pub actor: ActorRole,
  pub precondition: Precondition,
}

pub static TRANSITIONS: [TransitionRule; 4] = [
  TransitionRule {
    action: WorkflowAction::SendPreview,
    from: &[WorkflowStatus::InProgress, WorkflowStatus::Revision],
    to: WorkflowStatus::PreviewSent,
    actor: ActorRole::AssignedDesigner,
    precondition: Precondition::None,
  },
  TransitionRule {
    action: WorkflowAction::RequestRevision,
    from: &[WorkflowStatus::PreviewSent],
    to: WorkflowStatus::Revision,
    actor: ActorRole::DraftOwner,
    precondition: Precondition::Requires {
      check: can_request_revision,
      reason: "revision limit reached",
    },
  },
  TransitionRule {
    action: WorkflowAction::Approve,
    from: &[WorkflowStatus::PreviewSent],
    to: WorkflowStatus::Completed,
    actor: ActorRole::DraftOwner,
    precondition: Precondition::None,
  },
  TransitionRule {
    action: WorkflowAction::Cancel,
    from: WorkflowStatus::NON_TERMINAL,
    to: WorkflowStatus::Canceled,
    actor: ActorRole::DraftOwner,
    precondition: Precondition::None,
  },
];

pub fn rule_for(action: WorkflowAction) -> &'static TransitionRule {
  match action {
    WorkflowAction::SendPreview => &TRANSITIONS[0],
    WorkflowAction::RequestRevision => &TRANSITIONS[1],
    WorkflowAction::Approve => &TRANSITIONS[2],
    WorkflowAction::Cancel => &TRANSITIONS[3],
  }
}

pub fn can_request_revision(draft: &Draft) -> bool {
  draft.revision_count < draft.max_revisions
}

pub fn can_assign_designer(draft: &Draft) -> bool {
  !draft.is_terminal()
}

/// Checks `action` against the draft's current state without touching storage.
pub fn validate_transition(draft: &Draft, action: WorkflowAction) -> DraftflowResult<&'static TransitionRule> {
  if draft.is_committed() {
    return Err(DraftflowError::AlreadyCommitted { draft_id: draft.id });
  }
  let rule = rule_for(action);
  if !rule.from.contains(&draft.workflow_status) {
    return Err(DraftflowError::InvalidTransition {
      action,
      status: draft.workflow_status,
    });
  }
  if let Precondition::Requires { check, reason } = rule.precondition {
    if !check(draft) {
      return Err(DraftflowError::PreconditionFailed {
        action,
        reason: format!("{} ({}/{})", reason, draft.revision_count, draft.max_revisions),
      });
    }
  }
  Ok(rule)
}

/// Same as `validate_transition`, for an action named on the wire (`"sendPreview"`, ...).
pub fn validate_named_transition(draft: &Draft, action: &str) -> DraftflowResult<&'static TransitionRule> {
  let action: WorkflowAction = action.parse()?;
  validate_transition(draft, action)
}
