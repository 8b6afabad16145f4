// draftflow/src/workflow/engine.rs

//! Applies workflow transitions to stored drafts.
//!
//! Every write is a guarded `DraftUpdate` carrying the rule's source statuses,
//! so a caller that loses a race against another transition gets the same
//! `InvalidTransition` it would have seen had it read the newer status.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::transitions::{can_assign_designer, rule_for, validate_transition, WorkflowAction};
use crate::effects::{EffectDispatcher, Notification, NotificationDispatcher, NotificationKind};
use crate::error::{DraftflowError, DraftflowResult};
use crate::model::{DataPatch, Draft, RevisionNote, WorkflowEvent, WorkflowEventKind, WorkflowStatus};
use crate::store::{DraftStore, DraftUpdate, UpdateOutcome, WorkflowEventLog};

pub struct WorkflowEngine {
  drafts: Arc<dyn DraftStore>,
  events: Arc<dyn WorkflowEventLog>,
  notifier: Arc<dyn NotificationDispatcher>,
  effects: EffectDispatcher,
}

impl WorkflowEngine {
  pub fn new(
    drafts: Arc<dyn DraftStore>,
    events: Arc<dyn WorkflowEventLog>,
    notifier: Arc<dyn NotificationDispatcher>,
    effects: EffectDispatcher,
  ) -> Self {
    Self {
      drafts,
      events,
      notifier,
      effects,
    }
  }

  /// Binds `designer_id` to the draft. A `PENDING` draft moves to `IN_PROGRESS`
  /// in the same write. Reassigning to another designer is allowed.
  #[instrument(name = "WorkflowEngine::assign_designer", skip_all, fields(%draft_id, %designer_id), err(Display))]
  pub async fn assign_designer(&self, draft_id: Uuid, designer_id: Uuid, assigned_by: Uuid) -> DraftflowResult<Draft> {
    let draft = self.load(draft_id).await?;
    check_assignable(&draft)?;

    let update = DraftUpdate {
      expected_status: Some(WorkflowStatus::NON_TERMINAL),
      start_if_pending: true,
      assigned_designer_id: Some(designer_id),
      ..Default::default()
    };
    let updated = match self.drafts.update(draft_id, update).await? {
      UpdateOutcome::Applied(updated) => updated,
      UpdateOutcome::Rejected(current) => {
        check_assignable(&current)?;
        return Err(DraftflowError::AssignmentClosed {
          status: current.workflow_status,
        });
      }
    };

    event!(
      Level::INFO,
      from = %draft.workflow_status,
      to = %updated.workflow_status,
      "Designer assigned."
    );
    let metadata = json!({
      "designerId": designer_id,
      "previousDesignerId": draft.assigned_designer_id,
      "fromStatus": draft.workflow_status,
      "toStatus": updated.workflow_status,
    });
    self
      .record(WorkflowEvent::new(draft_id, WorkflowEventKind::DesignerAssigned, assigned_by, metadata))
      .await;
    self.notify(
      designer_id,
      NotificationKind::DesignerAssigned,
      json!({ "draftId": draft_id, "status": updated.workflow_status }),
    );
    Ok(updated)
  }

  pub async fn send_preview(&self, draft_id: Uuid, designer_id: Uuid) -> DraftflowResult<Draft> {
    self.perform(draft_id, designer_id, WorkflowAction::SendPreview, None).await
  }

  /// `note` is appended to the draft's revision notes.
  pub async fn request_revision(&self, draft_id: Uuid, user_id: Uuid, note: Option<String>) -> DraftflowResult<Draft> {
    self.perform(draft_id, user_id, WorkflowAction::RequestRevision, note).await
  }

  pub async fn approve(&self, draft_id: Uuid, user_id: Uuid) -> DraftflowResult<Draft> {
    self.perform(draft_id, user_id, WorkflowAction::Approve, None).await
  }

  /// Idempotent: on a draft that is already terminal (or committed) the
  /// current draft comes back unchanged and no event is recorded.
  pub async fn cancel(&self, draft_id: Uuid, user_id: Uuid, reason: Option<String>) -> DraftflowResult<Draft> {
    self.perform(draft_id, user_id, WorkflowAction::Cancel, reason).await
  }

  /// Runs one transition-table action on behalf of `actor_id`.
  ///
  /// `note` is the revision note for `requestRevision` and the reason for
  /// `cancel`; other actions ignore it.
  #[instrument(name = "WorkflowEngine::perform", skip_all, fields(%draft_id, %actor_id, %action), err(Display))]
  pub async fn perform(
    &self,
    draft_id: Uuid,
    actor_id: Uuid,
    action: WorkflowAction,
    note: Option<String>,
  ) -> DraftflowResult<Draft> {
    let draft = self.load(draft_id).await?;
    let rule = rule_for(action);

    if !rule.actor.matches(&draft, actor_id) {
      return Err(DraftflowError::Forbidden(format!(
        "only the {} may {} this draft",
        rule.actor, action
      )));
    }

    if action == WorkflowAction::Cancel && draft.is_terminal() {
      event!(Level::DEBUG, status = %draft.workflow_status, "Cancel on terminal draft is a no-op.");
      return Ok(draft);
    }

    validate_transition(&draft, action)?;

    let update = DraftUpdate {
      expected_status: Some(rule.from),
      status: Some(rule.to),
      increment_revision: action == WorkflowAction::RequestRevision,
      data_patch: data_patch_for(action, actor_id, note.clone()),
      ..Default::default()
    };

    let updated = match self.drafts.update(draft_id, update).await? {
      UpdateOutcome::Applied(updated) => updated,
      UpdateOutcome::Rejected(current) => {
        if action == WorkflowAction::Cancel && current.is_terminal() {
          return Ok(current);
        }
        event!(Level::DEBUG, status = %current.workflow_status, "Guarded update rejected; draft changed underneath.");
        validate_transition(&current, action)?;
        return Err(DraftflowError::InvalidTransition {
          action,
          status: current.workflow_status,
        });
      }
    };

    event!(
      Level::INFO,
      from = %draft.workflow_status,
      to = %updated.workflow_status,
      revision_count = updated.revision_count,
      "Workflow transition applied."
    );

    let mut metadata = json!({
      "fromStatus": draft.workflow_status,
      "toStatus": updated.workflow_status,
      "revisionCount": updated.revision_count,
    });
    if let (Some(note), Value::Object(map)) = (note, &mut metadata) {
      map.insert("note".to_string(), Value::String(note));
    }
    self
      .record(WorkflowEvent::new(draft_id, event_kind_for(action), actor_id, metadata))
      .await;

    self.notify_counterpart(action, &updated);
    Ok(updated)
  }

  /// Every workflow event recorded for the draft, oldest first.
  pub async fn events(&self, draft_id: Uuid) -> DraftflowResult<Vec<WorkflowEvent>> {
    self.events.events_for(draft_id).await
  }

  /// The preview/revision/approval events, oldest first.
  pub async fn revision_history(&self, draft_id: Uuid) -> DraftflowResult<Vec<WorkflowEvent>> {
    let mut events = self.events.events_for(draft_id).await?;
    events.retain(|e| e.event.is_revision_cycle());
    Ok(events)
  }

  async fn load(&self, draft_id: Uuid) -> DraftflowResult<Draft> {
    self
      .drafts
      .find_by_id(draft_id)
      .await?
      .ok_or_else(|| DraftflowError::draft_not_found(draft_id))
  }

  /// The transition already happened; a lost audit record is logged, not returned.
  async fn record(&self, workflow_event: WorkflowEvent) {
    let kind = workflow_event.event;
    if let Err(e) = self.events.append(workflow_event).await {
      event!(Level::ERROR, event_kind = %kind, error = %e, "Failed to append workflow event.");
    }
  }

  fn notify_counterpart(&self, action: WorkflowAction, draft: &Draft) {
    let (recipient, kind) = match action {
      WorkflowAction::SendPreview => (Some(draft.user_id), NotificationKind::PreviewReady),
      WorkflowAction::RequestRevision => (draft.assigned_designer_id, NotificationKind::RevisionRequested),
      WorkflowAction::Approve => (draft.assigned_designer_id, NotificationKind::DesignApproved),
      WorkflowAction::Cancel => (draft.assigned_designer_id, NotificationKind::DraftCanceled),
    };
    let Some(recipient) = recipient else {
      return;
    };
    self.notify(
      recipient,
      kind,
      json!({
        "draftId": draft.id,
        "status": draft.workflow_status,
        "revisionCount": draft.revision_count,
      }),
    );
  }

  fn notify(&self, user_id: Uuid, kind: NotificationKind, payload: Value) {
    let notifier = self.notifier.clone();
    self.effects.submit("workflow_notification", async move {
      notifier.send(Notification { user_id, kind, payload }).await
    });
  }
}

fn check_assignable(draft: &Draft) -> DraftflowResult<()> {
  if draft.is_committed() {
    return Err(DraftflowError::AlreadyCommitted { draft_id: draft.id });
  }
  if !can_assign_designer(draft) {
    return Err(DraftflowError::AssignmentClosed {
      status: draft.workflow_status,
    });
  }
  Ok(())
}

fn event_kind_for(action: WorkflowAction) -> WorkflowEventKind {
  match action {
    WorkflowAction::SendPreview => WorkflowEventKind::PreviewSent,
    WorkflowAction::RequestRevision => WorkflowEventKind::RevisionRequested,
    WorkflowAction::Approve => WorkflowEventKind::Approved,
    WorkflowAction::Cancel => WorkflowEventKind::Canceled,
  }
}

fn data_patch_for(action: WorkflowAction, actor_id: Uuid, note: Option<String>) -> Option<DataPatch> {
  let note = note?;
  match action {
    // Stamped by the store along with the revision increment.
    WorkflowAction::RequestRevision => Some(DataPatch::AppendRevisionNote(RevisionNote {
      revision: 0,
      note,
      requested_by: actor_id,
      requested_at: chrono::Utc::now(),
    })),
    WorkflowAction::Cancel => Some(DataPatch::SetCancellationReason(note)),
    WorkflowAction::SendPreview | WorkflowAction::Approve => None,
  }
}
