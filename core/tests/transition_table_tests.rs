// tests/transition_table_tests.rs
mod common;

use chrono::Utc;
use common::*;
use draftflow::workflow::{can_assign_designer, can_request_revision, rule_for, validate_named_transition, ActorRole};
use draftflow::{validate_transition, DraftMethod, DraftflowError, ErrorKind, WorkflowAction, WorkflowStatus};
use uuid::Uuid;

const ALL_STATUSES: [WorkflowStatus; 6] = [
  WorkflowStatus::Pending,
  WorkflowStatus::InProgress,
  WorkflowStatus::PreviewSent,
  WorkflowStatus::Revision,
  WorkflowStatus::Completed,
  WorkflowStatus::Canceled,
];

fn allowed_sources(action: WorkflowAction) -> &'static [WorkflowStatus] {
  match action {
    WorkflowAction::SendPreview => &[WorkflowStatus::InProgress, WorkflowStatus::Revision],
    WorkflowAction::RequestRevision => &[WorkflowStatus::PreviewSent],
    WorkflowAction::Approve => &[WorkflowStatus::PreviewSent],
    WorkflowAction::Cancel => &[
      WorkflowStatus::Pending,
      WorkflowStatus::InProgress,
      WorkflowStatus::PreviewSent,
      WorkflowStatus::Revision,
    ],
  }
}

#[test]
fn test_every_action_status_pair_matches_the_table() {
  for action in WorkflowAction::ALL {
    for status in ALL_STATUSES {
      let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, status);
      let result = validate_transition(&draft, action);
      if allowed_sources(action).contains(&status) {
        let rule = result.unwrap_or_else(|e| panic!("{} from {} should be allowed, got {}", action, status, e));
        assert_eq!(rule.action, action);
      } else {
        match result {
          Err(DraftflowError::InvalidTransition { action: a, status: s }) => {
            assert_eq!(a, action);
            assert_eq!(s, status);
          }
          other => panic!("{} from {} should be rejected, got {:?}", action, status, other.map(|r| r.to)),
        }
      }
    }
  }
}

#[test]
fn test_targets_and_roles() {
  assert_eq!(rule_for(WorkflowAction::SendPreview).to, WorkflowStatus::PreviewSent);
  assert_eq!(rule_for(WorkflowAction::RequestRevision).to, WorkflowStatus::Revision);
  assert_eq!(rule_for(WorkflowAction::Approve).to, WorkflowStatus::Completed);
  assert_eq!(rule_for(WorkflowAction::Cancel).to, WorkflowStatus::Canceled);

  assert_eq!(rule_for(WorkflowAction::SendPreview).actor, ActorRole::AssignedDesigner);
  for action in [WorkflowAction::RequestRevision, WorkflowAction::Approve, WorkflowAction::Cancel] {
    assert_eq!(rule_for(action).actor, ActorRole::DraftOwner);
  }
}

#[test]
fn test_invalid_transition_names_action_and_status() {
  let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, WorkflowStatus::Pending);
  let err = validate_transition(&draft, WorkflowAction::Approve).unwrap_err();
  assert_eq!(err.to_string(), "cannot approve from current status PENDING");
  assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn test_revision_limit_precondition() {
  let mut draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, WorkflowStatus::PreviewSent);
  draft.max_revisions = 2;
  draft.revision_count = 1;
  assert!(can_request_revision(&draft));
  assert!(validate_transition(&draft, WorkflowAction::RequestRevision).is_ok());

  draft.revision_count = 2;
  assert!(!can_request_revision(&draft));
  let err = validate_transition(&draft, WorkflowAction::RequestRevision).unwrap_err();
  assert!(matches!(err, DraftflowError::PreconditionFailed { .. }));
  assert_eq!(err.kind(), ErrorKind::BadRequest);
  assert!(err.to_string().contains("revision limit reached (2/2)"));

  // Approval is still open once revisions run out.
  assert!(validate_transition(&draft, WorkflowAction::Approve).is_ok());
}

#[test]
fn test_zero_revision_ceiling_blocks_first_request() {
  let mut draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, WorkflowStatus::PreviewSent);
  draft.max_revisions = 0;
  assert!(validate_transition(&draft, WorkflowAction::RequestRevision).is_err());
}

#[test]
fn test_committed_draft_rejects_every_action() {
  let mut draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, WorkflowStatus::PreviewSent);
  draft.committed_at = Some(Utc::now());
  for action in WorkflowAction::ALL {
    let err = validate_transition(&draft, action).unwrap_err();
    assert!(matches!(err, DraftflowError::AlreadyCommitted { .. }), "{}: {}", action, err);
  }
  assert!(!can_assign_designer(&draft));
}

#[test]
fn test_can_assign_designer_only_before_terminal() {
  for status in ALL_STATUSES {
    let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, status);
    assert_eq!(can_assign_designer(&draft), !status.is_terminal(), "{}", status);
  }
}

#[test]
fn test_actions_parse_from_wire_names() {
  for action in WorkflowAction::ALL {
    assert_eq!(action.as_str().parse::<WorkflowAction>().unwrap(), action);
  }
  let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Artist, WorkflowStatus::InProgress);
  assert!(validate_named_transition(&draft, "sendPreview").is_ok());

  let err = validate_named_transition(&draft, "publish").unwrap_err();
  assert!(matches!(err, DraftflowError::UnknownAction(ref name) if name == "publish"));
  assert_eq!(err.kind(), ErrorKind::BadRequest);
}
