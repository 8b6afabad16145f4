// draftflow/src/commit/context.rs

use uuid::Uuid;

use super::persist::CommitPlan;
use crate::model::{CommitReceipt, DraftWithRelations};

/// State shared by the commit pipeline's steps. Each step fills in the next field.
#[derive(Debug, Clone)]
pub struct CommitCtxData {
  pub draft_id: Uuid,
  pub user_id: Uuid,
  pub loaded: Option<DraftWithRelations>,
  pub plan: Option<CommitPlan>,
  pub receipt: Option<CommitReceipt>,
}

impl CommitCtxData {
  pub fn new(draft_id: Uuid, user_id: Uuid) -> Self {
    Self {
      draft_id,
      user_id,
      loaded: None,
      plan: None,
      receipt: None,
    }
  }
}
