// tests/config_tests.rs
mod common;

use common::*;
use draftflow::{DraftMethod, DraftflowConfig, DraftflowError, ErrorKind, IsolationLevel, TransactionProfile};
use std::collections::HashMap;
use uuid::Uuid;

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
  let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
  move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_when_nothing_is_set() {
  setup_tracing();
  let config = DraftflowConfig::from_lookup(lookup_from(&[])).unwrap();
  assert_eq!(config, DraftflowConfig::default());
  assert_eq!(config.shipping_cost_cents, 500);
  assert_eq!(config.default_max_revisions, 3);
  assert_eq!(config.currency, "USD");

  let commit = config.transactions.get(TransactionProfile::DraftCommit);
  assert_eq!(commit.isolation_level, IsolationLevel::Serializable);
  assert_eq!(commit.timeout_ms, 15_000);
  assert_eq!(commit.max_retries, 3);

  let general = config.transactions.get(TransactionProfile::General);
  assert_eq!(general.isolation_level, IsolationLevel::ReadCommitted);
  assert_eq!(general.max_retries, 0);
}

#[test]
fn test_overrides_are_applied() {
  setup_tracing();
  let config = DraftflowConfig::from_lookup(lookup_from(&[
    ("DRAFTFLOW_SHIPPING_COST_CENTS", "750"),
    ("DRAFTFLOW_DEFAULT_MAX_REVISIONS", "5"),
    ("DRAFTFLOW_CURRENCY", " eur "),
    ("DRAFTFLOW_TX_DRAFT_COMMIT_ISOLATION", "repeatable read"),
    ("DRAFTFLOW_TX_DRAFT_COMMIT_TIMEOUT_MS", "2500"),
    ("DRAFTFLOW_TX_GENERAL_MAX_RETRIES", "2"),
    ("DRAFTFLOW_TX_GENERAL_RETRY_BACKOFF_MS", "10"),
  ]))
  .unwrap();

  assert_eq!(config.shipping_cost_cents, 750);
  assert_eq!(config.default_max_revisions, 5);
  assert_eq!(config.currency, "EUR");

  let commit = config.transactions.get(TransactionProfile::DraftCommit);
  assert_eq!(commit.isolation_level, IsolationLevel::RepeatableRead);
  assert_eq!(commit.timeout_ms, 2_500);
  assert_eq!(commit.max_retries, 3);

  let general = config.transactions.get(TransactionProfile::General);
  assert_eq!(general.max_retries, 2);
  assert_eq!(general.retry_backoff_ms, 10);

  // Untouched profiles keep their defaults.
  assert_eq!(
    config.transactions.get(TransactionProfile::Payment),
    DraftflowConfig::default().transactions.get(TransactionProfile::Payment)
  );
}

#[test]
fn test_invalid_values_are_config_errors() {
  setup_tracing();
  let cases: &[(&str, &str)] = &[
    ("DRAFTFLOW_SHIPPING_COST_CENTS", "five dollars"),
    ("DRAFTFLOW_SHIPPING_COST_CENTS", "-1"),
    ("DRAFTFLOW_DEFAULT_MAX_REVISIONS", "-2"),
    ("DRAFTFLOW_CURRENCY", "   "),
    ("DRAFTFLOW_TX_PAYMENT_ISOLATION", "snapshot"),
    ("DRAFTFLOW_TX_PAYMENT_TIMEOUT_MS", "0"),
    ("DRAFTFLOW_TX_CREDIT_OPERATIONS_MAX_RETRIES", "many"),
  ];
  for (key, value) in cases {
    let err = DraftflowConfig::from_lookup(lookup_from(&[(*key, *value)])).unwrap_err();
    assert!(matches!(err, DraftflowError::Config(_)), "{}={} gave {}", key, value, err);
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains(key), "{}", err);
  }
}

#[test]
fn test_new_draft_uses_configured_revision_ceiling() {
  let config = DraftflowConfig::from_lookup(lookup_from(&[("DRAFTFLOW_DEFAULT_MAX_REVISIONS", "1")])).unwrap();
  let user_id = Uuid::new_v4();
  let new_draft = config.new_draft(user_id, DraftMethod::Artist);
  assert_eq!(new_draft.user_id, user_id);
  assert_eq!(new_draft.max_revisions, 1);
}
