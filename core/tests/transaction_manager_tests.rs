// tests/transaction_manager_tests.rs
mod common;

use common::*;
use draftflow::{
  DataPatch, DraftMethod, DraftStore, DraftUpdate, DraftflowError, ErrorKind, InMemoryStore, IsolationLevel,
  TransactionConfig, TransactionManager, TransactionProfile, WorkflowStatus,
};
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn manager_for(store: &InMemoryStore) -> TransactionManager {
  TransactionManager::new(Arc::new(store.clone()), test_config().transactions)
}

#[tokio::test]
#[serial]
async fn test_profiles_carry_their_isolation_levels() {
  setup_tracing();
  let manager = manager_for(&InMemoryStore::new());

  assert_eq!(manager.profile(TransactionProfile::Payment).isolation_level, IsolationLevel::Serializable);
  assert_eq!(manager.profile(TransactionProfile::DraftCommit).isolation_level, IsolationLevel::Serializable);
  assert_eq!(
    manager.profile(TransactionProfile::DesignerAssignment).isolation_level,
    IsolationLevel::RepeatableRead
  );
  assert_eq!(manager.profile(TransactionProfile::General).isolation_level, IsolationLevel::ReadCommitted);
  assert_eq!(manager.profile(TransactionProfile::DraftCommit).max_retries, 3);
}

#[tokio::test]
#[serial]
async fn test_retries_serialization_failures_and_deadlocks() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = manager_for(&store);
  store.inject_serialization_failures(2);
  store.inject_deadlocks(1);

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let value = manager
    .execute::<u32, _>(TransactionProfile::DraftCommit, move |_tx| {
      let a = a.clone();
      Box::pin(async move { Ok(a.fetch_add(1, Ordering::SeqCst) + 1) })
    })
    .await
    .unwrap();

  assert_eq!(value, 4);
  assert_eq!(attempts.load(Ordering::SeqCst), 4);
  assert_eq!(store.transactions_rolled_back(), 3);
  assert_eq!(store.transactions_committed(), 1);
}

#[tokio::test]
#[serial]
async fn test_exhausted_retries_report_conflict() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = manager_for(&store);
  store.inject_serialization_failures(10);

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let err = manager
    .execute::<(), _>(TransactionProfile::Payment, move |_tx| {
      a.fetch_add(1, Ordering::SeqCst);
      Box::pin(async { Ok(()) })
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    DraftflowError::Conflict {
      profile: TransactionProfile::Payment,
      attempts: 4
    }
  ));
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert_eq!(attempts.load(Ordering::SeqCst), 4);
  assert_eq!(store.transactions_committed(), 0);
}

#[tokio::test]
#[serial]
async fn test_general_profile_does_not_retry() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = manager_for(&store);
  store.inject_deadlocks(1);

  let err = manager
    .execute::<(), _>(TransactionProfile::General, |_tx| Box::pin(async { Ok(()) }))
    .await
    .unwrap_err();
  assert!(matches!(err, DraftflowError::Conflict { attempts: 1, .. }));
}

#[tokio::test]
#[serial]
async fn test_timeout_is_not_retried() {
  setup_tracing();
  let store = InMemoryStore::new();
  let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Upload, WorkflowStatus::Pending);
  store.insert_draft(draft.clone());

  let mut config = test_config();
  config.transactions.set(TransactionConfig {
    timeout_ms: 20,
    ..config.transactions.get(TransactionProfile::DraftCommit)
  });
  let manager = TransactionManager::new(Arc::new(store.clone()), config.transactions);
  let draft_id = draft.id;

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let err = manager
    .execute::<(), _>(TransactionProfile::DraftCommit, move |tx| {
      a.fetch_add(1, Ordering::SeqCst);
      Box::pin(async move {
        tx.load_draft(draft_id).await?;
        tokio::time::sleep(Duration::from_millis(60)).await;
        Ok(())
      })
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    DraftflowError::Timeout {
      profile: TransactionProfile::DraftCommit,
      timeout_ms: 20
    }
  ));
  assert_eq!(err.kind(), ErrorKind::Timeout);
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  assert_eq!(store.transactions_rolled_back(), 1);
}

#[tokio::test]
#[serial]
async fn test_non_retryable_error_propagates_unchanged() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = manager_for(&store);

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let err = manager
    .execute::<(), _>(TransactionProfile::DraftCommit, move |_tx| {
      a.fetch_add(1, Ordering::SeqCst);
      Box::pin(async { Err(DraftflowError::Forbidden("not yours".to_string())) })
    })
    .await
    .unwrap_err();

  assert!(matches!(err, DraftflowError::Forbidden(ref msg) if msg == "not yours"));
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  assert_eq!(store.transactions_rolled_back(), 1);
}

#[tokio::test]
#[serial]
async fn test_stale_compare_and_set_is_retried_then_reported() {
  setup_tracing();
  let store = InMemoryStore::new();
  let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Upload, WorkflowStatus::Pending);
  store.insert_draft(draft.clone());
  let manager = manager_for(&store);
  let (draft_id, stale_version) = (draft.id, draft.version + 5);

  let err = manager
    .execute::<(), _>(TransactionProfile::DesignerAssignment, move |tx| {
      Box::pin(async move {
        tx.mark_committed(draft_id, stale_version, chrono::Utc::now()).await?;
        Ok(())
      })
    })
    .await
    .unwrap_err();

  // DESIGNER_ASSIGNMENT allows two retries.
  assert!(matches!(err, DraftflowError::Conflict { attempts: 3, .. }));
  assert!(!store.draft(draft.id).unwrap().is_committed());
}

#[tokio::test]
#[serial]
async fn test_serializable_detects_concurrent_write_but_read_committed_does_not() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = manager_for(&store);

  for (profile, expected_attempts) in [(TransactionProfile::DraftCommit, 2), (TransactionProfile::General, 1)] {
    let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Upload, WorkflowStatus::Pending);
    store.insert_draft(draft.clone());
    let draft_id = draft.id;

    let attempts = Arc::new(AtomicU32::new(0));
    let a = attempts.clone();
    let writer = store.clone();
    manager
      .execute::<(), _>(profile, move |tx| {
        let a = a.clone();
        let writer = writer.clone();
        Box::pin(async move {
          tx.load_draft(draft_id).await?;
          if a.fetch_add(1, Ordering::SeqCst) == 0 {
            // A concurrent writer bumps the row after this transaction read it.
            let update = DraftUpdate {
              data_patch: Some(DataPatch::SetCancellationReason("concurrent".to_string())),
              ..Default::default()
            };
            writer.update(draft_id, update).await?;
          }
          Ok(())
        })
      })
      .await
      .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), expected_attempts, "{}", profile);
  }
}

fn short_timeout_manager(store: &InMemoryStore, timeout_ms: u64) -> TransactionManager {
  let mut config = test_config();
  config.transactions.set(TransactionConfig {
    timeout_ms,
    ..config.transactions.get(TransactionProfile::DraftCommit)
  });
  TransactionManager::new(Arc::new(store.clone()), config.transactions)
}

#[tokio::test]
#[serial]
async fn test_slow_begin_counts_against_timeout() {
  setup_tracing();
  let store = InMemoryStore::new();
  let manager = short_timeout_manager(&store, 100);
  store.set_begin_latency(Some(Duration::from_millis(150)));

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let started = tokio::time::Instant::now();
  let err = manager
    .execute::<(), _>(TransactionProfile::DraftCommit, move |_tx| {
      a.fetch_add(1, Ordering::SeqCst);
      Box::pin(async { Ok(()) })
    })
    .await
    .unwrap_err();

  assert!(matches!(err, DraftflowError::Timeout { timeout_ms: 100, .. }), "{}", err);
  assert_eq!(attempts.load(Ordering::SeqCst), 0);
  assert!(started.elapsed() < Duration::from_millis(150));
  assert_eq!(store.transactions_committed(), 0);
}

#[tokio::test]
#[serial]
async fn test_slow_commit_counts_against_timeout() {
  setup_tracing();
  let store = InMemoryStore::new();
  let draft = draft_fixture(Uuid::new_v4(), DraftMethod::Upload, WorkflowStatus::Pending);
  store.insert_draft(draft.clone());
  let manager = short_timeout_manager(&store, 100);
  store.set_latency(Some(Duration::from_millis(30)));
  store.set_commit_latency(Some(Duration::from_millis(60)));
  let draft_id = draft.id;

  let attempts = Arc::new(AtomicU32::new(0));
  let a = attempts.clone();
  let started = tokio::time::Instant::now();
  // begin and load (30ms each) fit the budget; commit (30ms + 60ms) does not.
  let err = manager
    .execute::<(), _>(TransactionProfile::DraftCommit, move |tx| {
      a.fetch_add(1, Ordering::SeqCst);
      Box::pin(async move {
        tx.load_draft(draft_id).await?;
        Ok(())
      })
    })
    .await
    .unwrap_err();

  assert!(matches!(err, DraftflowError::Timeout { timeout_ms: 100, .. }), "{}", err);
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  assert!(started.elapsed() < Duration::from_millis(180));
  assert_eq!(store.transactions_committed(), 0);
}
