// draftflow/src/config.rs

use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DraftflowError, DraftflowResult};
use crate::model::{DraftMethod, NewDraft, DEFAULT_MAX_REVISIONS};
use crate::transaction::{IsolationLevel, TransactionProfile, TransactionProfiles};

pub const DEFAULT_SHIPPING_COST_CENTS: i64 = 500;
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct DraftflowConfig {
  /// Flat shipping charge added to every committed order. Never client-supplied.
  pub shipping_cost_cents: i64,
  /// Applied to drafts created through `new_draft`.
  pub default_max_revisions: u32,
  pub currency: String,
  pub transactions: TransactionProfiles,
}

impl Default for DraftflowConfig {
  fn default() -> Self {
    Self {
      shipping_cost_cents: DEFAULT_SHIPPING_COST_CENTS,
      default_max_revisions: DEFAULT_MAX_REVISIONS,
      currency: DEFAULT_CURRENCY.to_string(),
      transactions: TransactionProfiles::default(),
    }
  }
}

impl DraftflowConfig {
  /// Loads `.env` if present, then reads `DRAFTFLOW_*` variables.
  ///
  /// Recognised variables:
  /// - `DRAFTFLOW_SHIPPING_COST_CENTS`, `DRAFTFLOW_DEFAULT_MAX_REVISIONS`, `DRAFTFLOW_CURRENCY`
  /// - `DRAFTFLOW_TX_<PROFILE>_ISOLATION`, `_TIMEOUT_MS`, `_MAX_RETRIES`, `_RETRY_BACKOFF_MS`
  ///   where `<PROFILE>` is one of `PAYMENT`, `DRAFT_COMMIT`, `DESIGNER_ASSIGNMENT`,
  ///   `CREDIT_OPERATIONS`, `GENERAL`.
  ///
  /// Unset variables keep their defaults. Malformed ones fail with `DraftflowError::Config`.
  pub fn from_env() -> DraftflowResult<Self> {
    dotenv().ok();
    let config = Self::from_lookup(|key| env::var(key).ok())?;
    tracing::info!("Draftflow configuration loaded successfully.");
    Ok(config)
  }

  /// Same as `from_env`, reading variables through `lookup` instead of the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DraftflowResult<Self> {
    let defaults = Self::default();

    let shipping_cost_cents = parse_var(&lookup, "DRAFTFLOW_SHIPPING_COST_CENTS")?.unwrap_or(defaults.shipping_cost_cents);
    if shipping_cost_cents < 0 {
      return Err(DraftflowError::Config(format!(
        "DRAFTFLOW_SHIPPING_COST_CENTS must not be negative, got {}",
        shipping_cost_cents
      )));
    }

    let default_max_revisions =
      parse_var(&lookup, "DRAFTFLOW_DEFAULT_MAX_REVISIONS")?.unwrap_or(defaults.default_max_revisions);

    let currency = match lookup("DRAFTFLOW_CURRENCY") {
      Some(raw) if raw.trim().is_empty() => {
        return Err(DraftflowError::Config("DRAFTFLOW_CURRENCY must not be empty".to_string()))
      }
      Some(raw) => raw.trim().to_ascii_uppercase(),
      None => defaults.currency,
    };

    let mut transactions = defaults.transactions;
    for profile in TransactionProfile::ALL {
      let mut tx = transactions.get(profile);
      let prefix = format!("DRAFTFLOW_TX_{}", profile.as_str());
      if let Some(isolation) = parse_var::<IsolationLevel>(&lookup, &format!("{}_ISOLATION", prefix))? {
        tx.isolation_level = isolation;
      }
      if let Some(timeout_ms) = parse_var::<u64>(&lookup, &format!("{}_TIMEOUT_MS", prefix))? {
        if timeout_ms == 0 {
          return Err(DraftflowError::Config(format!("{}_TIMEOUT_MS must be positive", prefix)));
        }
        tx.timeout_ms = timeout_ms;
      }
      if let Some(max_retries) = parse_var(&lookup, &format!("{}_MAX_RETRIES", prefix))? {
        tx.max_retries = max_retries;
      }
      if let Some(backoff) = parse_var(&lookup, &format!("{}_RETRY_BACKOFF_MS", prefix))? {
        tx.retry_backoff_ms = backoff;
      }
      transactions.set(tx);
    }

    Ok(Self {
      shipping_cost_cents,
      default_max_revisions,
      currency,
      transactions,
    })
  }

  /// A `NewDraft` carrying the configured revision ceiling.
  pub fn new_draft(&self, user_id: Uuid, method: DraftMethod) -> NewDraft {
    NewDraft::new(user_id, method).with_max_revisions(self.default_max_revisions)
  }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> DraftflowResult<Option<T>>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match lookup(name) {
    None => Ok(None),
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|e| DraftflowError::Config(format!("Invalid {} value '{}': {}", name, raw, e))),
  }
}
