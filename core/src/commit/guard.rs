// draftflow/src/commit/guard.rs

use crate::error::{DraftflowError, DraftflowResult};
use crate::model::{Draft, DraftMethod, WorkflowStatus};

/// Whether `draft` may be turned into an order right now.
///
/// Fails with, in order of precedence:
/// - `AlreadyCommitted` when `committed_at` is set,
/// - `MissingCommitFields` naming every missing field at once,
/// - `ApprovalRequired` for an artist draft that is not `COMPLETED`.
pub fn can_commit(draft: &Draft) -> DraftflowResult<()> {
  if draft.is_committed() {
    return Err(DraftflowError::AlreadyCommitted { draft_id: draft.id });
  }

  let fields = missing_commit_fields(draft);
  if !fields.is_empty() {
    return Err(DraftflowError::MissingCommitFields { fields });
  }

  if draft.method == DraftMethod::Artist && draft.workflow_status != WorkflowStatus::Completed {
    return Err(DraftflowError::ApprovalRequired {
      draft_id: draft.id,
      status: draft.workflow_status,
    });
  }
  Ok(())
}

pub fn missing_commit_fields(draft: &Draft) -> Vec<&'static str> {
  let mut fields = Vec::new();
  if draft.message_card_id.is_none() {
    fields.push("messageCardId");
  }
  if draft.shipping.is_none() {
    fields.push("shipping");
  }
  fields
}
