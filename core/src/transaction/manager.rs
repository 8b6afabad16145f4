// draftflow/src/transaction/manager.rs

//! Runs a unit of work inside a store transaction configured by a named profile.
//!
//! Retry policy: only failures the store classifies as transient
//! (serialization failure, deadlock, optimistic write conflict) re-run the
//! whole unit of work, up to `max_retries` times. Once the budget is spent the
//! caller gets `DraftflowError::Conflict`. Timeouts and every other error end
//! the attempt immediately and are returned as-is.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{event, instrument, Level};

use super::profile::{TransactionConfig, TransactionProfile, TransactionProfiles};
use crate::error::{DraftflowError, DraftflowResult};
use crate::store::{StoreTransaction, TransactionalStore};

/// Future returned by a unit of work; borrows the transaction for `'t`.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = DraftflowResult<T>> + Send + 't>>;

pub struct TransactionManager {
  store: Arc<dyn TransactionalStore>,
  profiles: TransactionProfiles,
}

impl TransactionManager {
  pub fn new(store: Arc<dyn TransactionalStore>, profiles: TransactionProfiles) -> Self {
    Self { store, profiles }
  }

  pub fn profile(&self, profile: TransactionProfile) -> TransactionConfig {
    self.profiles.get(profile)
  }

  /// Runs `operation` under the configured settings for `profile`.
  pub async fn execute<T, F>(&self, profile: TransactionProfile, operation: F) -> DraftflowResult<T>
  where
    T: Send,
    F: for<'t> Fn(&'t mut dyn StoreTransaction) -> TxFuture<'t, T> + Send + Sync,
  {
    let config = self.profiles.get(profile);
    self.execute_with_isolation(operation, config).await
  }

  /// Begins a transaction at `config.isolation_level`, runs `operation`, commits.
  ///
  /// `operation` may run more than once and must not carry side effects
  /// outside the transaction it is handed.
  #[instrument(
    name = "TransactionManager::execute_with_isolation",
    skip_all,
    fields(
      profile = %config.profile,
      isolation = %config.isolation_level,
      timeout_ms = config.timeout_ms,
      max_retries = config.max_retries,
    )
  )]
  pub async fn execute_with_isolation<T, F>(&self, operation: F, config: TransactionConfig) -> DraftflowResult<T>
  where
    T: Send,
    F: for<'t> Fn(&'t mut dyn StoreTransaction) -> TxFuture<'t, T> + Send + Sync,
  {
    let mut attempt: u32 = 0;
    loop {
      attempt += 1;
      match self.run_once(&operation, &config).await {
        Ok(value) => {
          if attempt > 1 {
            event!(Level::INFO, attempt, "Transaction committed after retry.");
          }
          return Ok(value);
        }
        Err(err) if err.is_retryable() => {
          if attempt > config.max_retries {
            event!(Level::WARN, attempt, error = %err, "Retry budget exhausted; reporting conflict.");
            return Err(DraftflowError::Conflict {
              profile: config.profile,
              attempts: attempt,
            });
          }
          let delay = config.backoff_for(attempt);
          event!(Level::DEBUG, attempt, error = %err, delay_ms = delay.as_millis() as u64, "Transient conflict; retrying transaction.");
          if !delay.is_zero() {
            tokio::time::sleep(delay).await;
          }
        }
        Err(err) => return Err(err),
      }
    }
  }

  /// One attempt. Begin, the unit of work and commit share a single deadline.
  async fn run_once<T, F>(&self, operation: &F, config: &TransactionConfig) -> DraftflowResult<T>
  where
    T: Send,
    F: for<'t> Fn(&'t mut dyn StoreTransaction) -> TxFuture<'t, T> + Send + Sync,
  {
    let deadline = Instant::now() + config.timeout();

    let begun = timeout_at(deadline, self.store.begin(config.isolation_level)).await;
    let mut tx = match begun {
      Ok(tx) => tx?,
      Err(_elapsed) => {
        event!(Level::WARN, "Transaction timed out before it began.");
        return Err(timed_out(config));
      }
    };

    let outcome = timeout_at(deadline, operation(tx.as_mut())).await;
    let value = match outcome {
      Ok(Ok(value)) => value,
      Ok(Err(err)) => {
        rollback_quietly(tx).await;
        return Err(err);
      }
      Err(_elapsed) => {
        event!(Level::WARN, "Transaction exceeded its timeout; rolling back.");
        rollback_quietly(tx).await;
        return Err(timed_out(config));
      }
    };

    let committed = timeout_at(deadline, tx.commit()).await;
    match committed {
      Ok(result) => result.map(|()| value),
      Err(_elapsed) => {
        // The abandoned commit is discarded with the transaction.
        event!(Level::WARN, "Transaction exceeded its timeout while committing.");
        Err(timed_out(config))
      }
    }
  }
}

fn timed_out(config: &TransactionConfig) -> DraftflowError {
  DraftflowError::Timeout {
    profile: config.profile,
    timeout_ms: config.timeout_ms,
  }
}

async fn rollback_quietly(tx: Box<dyn StoreTransaction>) {
  if let Err(e) = tx.rollback().await {
    event!(Level::WARN, error = %e, "Rollback failed; the backend discards the transaction on drop.");
  }
}
