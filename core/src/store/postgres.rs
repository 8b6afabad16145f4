// draftflow/src/store/postgres.rs

//! Postgres-backed store (feature `postgres`).
//!
//! Guards that the in-memory store checks in Rust are expressed here in the
//! `WHERE` clause of a single `UPDATE`, so they hold under concurrent writers
//! at any isolation level. SQLSTATE `40001` and `40P01` are reported as the
//! retryable `StoreError` variants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{event, Level};
use uuid::Uuid;

use super::{DraftStore, DraftUpdate, StoreTransaction, TransactionalStore, UpdateOutcome, WorkflowEventLog};
use crate::error::{DraftflowError, DraftflowResult, StoreError};
use crate::model::{
  DataPatch, Draft, DraftData, DraftWithRelations, Invoice, MessageCard, NewDraft, Order, OrderItem, ShippingSnapshot,
  WorkflowEvent,
};
use crate::transaction::IsolationLevel;

const DRAFT_COLUMNS: &str = "id, user_id, method, workflow_status, revision_count, max_revisions, \
  assigned_designer_id, message_card_id, shipping, data, committed_at, version, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str, max_connections: u32) -> DraftflowResult<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await
      .map_err(store_error)?;
    Ok(Self::new(pool))
  }

  /// Applies the bundled migrations in `migrations/`.
  pub async fn migrate(&self) -> DraftflowResult<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| StoreError::Backend(e.into()))?;
    Ok(())
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  pub async fn insert_message_card(&self, card: &MessageCard) -> DraftflowResult<()> {
    sqlx::query("INSERT INTO message_cards (id, name, price_cents) VALUES ($1, $2, $3)")
      .bind(card.id)
      .bind(&card.name)
      .bind(card.price_cents)
      .execute(&self.pool)
      .await
      .map_err(store_error)?;
    Ok(())
  }

  async fn fetch_draft(&self, id: Uuid) -> DraftflowResult<Option<Draft>> {
    let row: Option<DraftRow> = sqlx::query_as(&format!("SELECT {} FROM drafts WHERE id = $1", DRAFT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_error)?;
    row.map(Draft::try_from).transpose()
  }
}

#[derive(Debug, FromRow)]
struct DraftRow {
  id: Uuid,
  user_id: Uuid,
  method: String,
  workflow_status: String,
  revision_count: i32,
  max_revisions: i32,
  assigned_designer_id: Option<Uuid>,
  message_card_id: Option<Uuid>,
  shipping: Option<Json<ShippingSnapshot>>,
  data: Json<DraftData>,
  committed_at: Option<DateTime<Utc>>,
  version: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<DraftRow> for Draft {
  type Error = DraftflowError;

  fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
    Ok(Draft {
      id: row.id,
      user_id: row.user_id,
      method: row.method.parse().map_err(corrupt_row)?,
      workflow_status: row.workflow_status.parse().map_err(corrupt_row)?,
      revision_count: u32::try_from(row.revision_count).map_err(corrupt_row)?,
      max_revisions: u32::try_from(row.max_revisions).map_err(corrupt_row)?,
      assigned_designer_id: row.assigned_designer_id,
      message_card_id: row.message_card_id,
      shipping: row.shipping.map(|Json(s)| s),
      data: row.data.0,
      committed_at: row.committed_at,
      version: row.version,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
struct MessageCardRow {
  id: Uuid,
  name: String,
  price_cents: i64,
}

#[derive(Debug, FromRow)]
struct EventRow {
  id: Uuid,
  draft_id: Uuid,
  event: String,
  actor_id: Uuid,
  metadata: Json<Value>,
  occurred_at: DateTime<Utc>,
}

/// `(revision notes to append, object to shallow-merge)` for the `data` column.
fn patch_params(patch: Option<DataPatch>) -> (Option<Json<Value>>, Option<Json<Value>>) {
  match patch {
    None => (None, None),
    Some(DataPatch::AppendRevisionNote(note)) => (Some(Json(json!([note]))), None),
    Some(DataPatch::SetCancellationReason(reason)) => (None, Some(Json(json!({ "cancellationReason": reason })))),
    Some(DataPatch::SetBillingSnapshot(billing)) => (None, Some(Json(json!({ "billing": billing })))),
  }
}

#[async_trait]
impl DraftStore for PgStore {
  async fn find_by_id(&self, id: Uuid) -> DraftflowResult<Option<Draft>> {
    self.fetch_draft(id).await
  }

  async fn find_with_relations(&self, id: Uuid) -> DraftflowResult<Option<DraftWithRelations>> {
    let Some(draft) = self.fetch_draft(id).await? else {
      return Ok(None);
    };
    let message_card = match draft.message_card_id {
      None => None,
      Some(card_id) => {
        let row: Option<MessageCardRow> = sqlx::query_as("SELECT id, name, price_cents FROM message_cards WHERE id = $1")
          .bind(card_id)
          .fetch_optional(&self.pool)
          .await
          .map_err(store_error)?;
        row.map(|r| MessageCard {
          id: r.id,
          name: r.name,
          price_cents: r.price_cents,
        })
      }
    };
    Ok(Some(DraftWithRelations { draft, message_card }))
  }

  async fn update(&self, id: Uuid, update: DraftUpdate) -> DraftflowResult<UpdateOutcome> {
    let expected: Option<Vec<String>> = update
      .expected_status
      .map(|allowed| allowed.iter().map(|s| s.as_str().to_string()).collect());
    let (append_notes, merge) = patch_params(update.data_patch);

    let sql = format!(
      "UPDATE drafts SET \
         workflow_status = CASE \
           WHEN $3::text IS NOT NULL THEN $3::text \
           WHEN $4 AND workflow_status = 'PENDING' THEN 'IN_PROGRESS' \
           ELSE workflow_status END, \
         assigned_designer_id = COALESCE($5, assigned_designer_id), \
         revision_count = revision_count + CASE WHEN $6 THEN 1 ELSE 0 END, \
         data = CASE WHEN $7::jsonb IS NULL THEN data \
           ELSE jsonb_set(data, '{{revisionNotes}}', COALESCE(data->'revisionNotes', '[]'::jsonb) || jsonb_build_array( \
             ($7::jsonb -> 0) || CASE WHEN $6 THEN jsonb_build_object('revision', revision_count + 1) ELSE '{{}}'::jsonb END)) END \
           || COALESCE($8::jsonb, '{{}}'::jsonb), \
         version = version + 1, \
         updated_at = now() \
       WHERE id = $1 \
         AND committed_at IS NULL \
         AND ($2::text[] IS NULL OR workflow_status = ANY($2::text[])) \
         AND (NOT $6 OR revision_count < max_revisions) \
       RETURNING {}",
      DRAFT_COLUMNS
    );

    let row: Option<DraftRow> = sqlx::query_as(&sql)
      .bind(id)
      .bind(expected)
      .bind(update.status.map(|s| s.as_str()))
      .bind(update.start_if_pending)
      .bind(update.assigned_designer_id)
      .bind(update.increment_revision)
      .bind(append_notes)
      .bind(merge)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_error)?;

    match row {
      Some(row) => Ok(UpdateOutcome::Applied(Draft::try_from(row)?)),
      None => match self.fetch_draft(id).await? {
        Some(current) => Ok(UpdateOutcome::Rejected(current)),
        None => Err(DraftflowError::draft_not_found(id)),
      },
    }
  }

  async fn create(&self, new_draft: NewDraft) -> DraftflowResult<Draft> {
    let sql = format!(
      "INSERT INTO drafts (id, user_id, method, workflow_status, max_revisions, message_card_id, shipping, data) \
       VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $7) RETURNING {}",
      DRAFT_COLUMNS
    );
    let max_revisions = i32::try_from(new_draft.max_revisions).map_err(corrupt_row)?;
    let row: DraftRow = sqlx::query_as(&sql)
      .bind(Uuid::new_v4())
      .bind(new_draft.user_id)
      .bind(new_draft.method.as_str())
      .bind(max_revisions)
      .bind(new_draft.message_card_id)
      .bind(new_draft.shipping.map(Json))
      .bind(Json(new_draft.data))
      .fetch_one(&self.pool)
      .await
      .map_err(store_error)?;
    Draft::try_from(row)
  }
}

#[async_trait]
impl WorkflowEventLog for PgStore {
  async fn append(&self, workflow_event: WorkflowEvent) -> DraftflowResult<()> {
    sqlx::query(
      "INSERT INTO workflow_events (id, draft_id, event, actor_id, metadata, occurred_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(workflow_event.id)
    .bind(workflow_event.draft_id)
    .bind(workflow_event.event.as_str())
    .bind(workflow_event.actor_id)
    .bind(Json(workflow_event.metadata))
    .bind(workflow_event.occurred_at)
    .execute(&self.pool)
    .await
    .map_err(store_error)?;
    Ok(())
  }

  async fn events_for(&self, draft_id: Uuid) -> DraftflowResult<Vec<WorkflowEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(
      "SELECT id, draft_id, event, actor_id, metadata, occurred_at FROM workflow_events \
       WHERE draft_id = $1 ORDER BY occurred_at, id",
    )
    .bind(draft_id)
    .fetch_all(&self.pool)
    .await
    .map_err(store_error)?;

    rows
      .into_iter()
      .map(|r| -> DraftflowResult<WorkflowEvent> {
        Ok(WorkflowEvent {
          id: r.id,
          draft_id: r.draft_id,
          event: r.event.parse().map_err(corrupt_row)?,
          actor_id: r.actor_id,
          metadata: r.metadata.0,
          occurred_at: r.occurred_at,
        })
      })
      .collect()
  }
}

#[async_trait]
impl TransactionalStore for PgStore {
  async fn begin(&self, isolation: IsolationLevel) -> DraftflowResult<Box<dyn StoreTransaction>> {
    let mut tx = self.pool.begin().await.map_err(store_error)?;
    sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql()))
      .execute(&mut *tx)
      .await
      .map_err(store_error)?;
    Ok(Box::new(PgTransaction { tx }))
  }
}

struct PgTransaction {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
  async fn load_draft(&mut self, id: Uuid) -> DraftflowResult<Option<Draft>> {
    let row: Option<DraftRow> = sqlx::query_as(&format!(
      "SELECT {} FROM drafts WHERE id = $1 FOR UPDATE",
      DRAFT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(store_error)?;
    row.map(Draft::try_from).transpose()
  }

  async fn load_message_card(&mut self, id: Uuid) -> DraftflowResult<Option<MessageCard>> {
    let row: Option<MessageCardRow> = sqlx::query_as("SELECT id, name, price_cents FROM message_cards WHERE id = $1")
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(store_error)?;
    Ok(row.map(|r| MessageCard {
      id: r.id,
      name: r.name,
      price_cents: r.price_cents,
    }))
  }

  async fn insert_order(&mut self, order: &Order) -> DraftflowResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, user_id, status, total_cents, shipping_cost_cents, currency, shipping, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.status.as_str())
    .bind(order.total_cents)
    .bind(order.shipping_cost_cents)
    .bind(&order.currency)
    .bind(Json(&order.shipping))
    .bind(order.created_at)
    .execute(&mut *self.tx)
    .await
    .map_err(store_error)?;
    Ok(())
  }

  async fn insert_order_item(&mut self, item: &OrderItem) -> DraftflowResult<()> {
    sqlx::query(
      "INSERT INTO order_items (id, order_id, kind, reference_id, quantity, unit_price_cents) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(item.id)
    .bind(item.order_id)
    .bind(item.kind.as_str())
    .bind(item.reference_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .execute(&mut *self.tx)
    .await
    .map_err(store_error)?;
    Ok(())
  }

  async fn mark_committed(&mut self, draft_id: Uuid, expected_version: i64, at: DateTime<Utc>) -> DraftflowResult<()> {
    let result = sqlx::query(
      "UPDATE drafts SET committed_at = $3, version = version + 1, updated_at = $3 \
       WHERE id = $1 AND version = $2 AND committed_at IS NULL",
    )
    .bind(draft_id)
    .bind(expected_version)
    .bind(at)
    .execute(&mut *self.tx)
    .await
    .map_err(store_error)?;
    if result.rows_affected() == 1 {
      return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM drafts WHERE id = $1)")
      .bind(draft_id)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(store_error)?;
    if exists {
      Err(
        StoreError::WriteConflict {
          resource: "draft",
          id: draft_id,
          expected: expected_version,
        }
        .into(),
      )
    } else {
      Err(StoreError::Missing {
        resource: "draft",
        id: draft_id,
      }
      .into())
    }
  }

  async fn insert_invoice(&mut self, invoice: &Invoice) -> DraftflowResult<()> {
    sqlx::query("SAVEPOINT invoice_snapshot")
      .execute(&mut *self.tx)
      .await
      .map_err(store_error)?;

    let inserted = sqlx::query(
      "INSERT INTO invoices (id, order_id, user_id, amount_cents, currency, billing, issued_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(invoice.id)
    .bind(invoice.order_id)
    .bind(invoice.user_id)
    .bind(invoice.amount_cents)
    .bind(&invoice.currency)
    .bind(Json(&invoice.billing))
    .bind(invoice.issued_at)
    .execute(&mut *self.tx)
    .await;

    match inserted {
      Ok(_) => {
        sqlx::query("RELEASE SAVEPOINT invoice_snapshot")
          .execute(&mut *self.tx)
          .await
          .map_err(store_error)?;
        Ok(())
      }
      Err(e) => {
        sqlx::query("ROLLBACK TO SAVEPOINT invoice_snapshot")
          .execute(&mut *self.tx)
          .await
          .map_err(store_error)?;
        Err(store_error(e))
      }
    }
  }

  async fn commit(self: Box<Self>) -> DraftflowResult<()> {
    self.tx.commit().await.map_err(store_error)?;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> DraftflowResult<()> {
    self.tx.rollback().await.map_err(store_error)?;
    Ok(())
  }
}

fn store_error(err: sqlx::Error) -> DraftflowError {
  let sqlstate = match &err {
    sqlx::Error::Database(db) => db.code().map(|c| (c.into_owned(), db.message().to_string())),
    _ => None,
  };
  let store_err = match sqlstate {
    Some((code, message)) if code == "40001" => StoreError::SerializationFailure(message),
    Some((code, message)) if code == "40P01" => StoreError::Deadlock(message),
    _ => StoreError::Backend(err.into()),
  };
  if store_err.is_retryable() {
    event!(Level::DEBUG, error = %store_err, "Transient database conflict.");
  }
  store_err.into()
}

fn corrupt_row(err: impl std::fmt::Display) -> DraftflowError {
  StoreError::Backend(anyhow::anyhow!("unreadable row: {}", err)).into()
}
