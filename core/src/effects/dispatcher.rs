// draftflow/src/effects/dispatcher.rs

//! Fire-and-forget execution of best-effort side effects.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{event, Instrument, Level};

/// Spawns side effects onto the tokio runtime behind their own error boundary.
///
/// A failing or panicking effect is logged and never reaches the operation that
/// submitted it. `submit` does not wait for the effect; `drain` does.
#[derive(Debug, Clone, Default)]
pub struct EffectDispatcher {
  in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EffectDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Must be called from within a tokio runtime.
  pub fn submit<F>(&self, effect: &'static str, fut: F)
  where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    let span = tracing::info_span!("side_effect", effect);
    let handle = tokio::spawn(
      async move {
        match fut.await {
          Ok(()) => event!(Level::DEBUG, "Effect completed."),
          Err(e) => event!(Level::WARN, error = %e, "Best-effort effect failed; ignoring."),
        }
      }
      .instrument(span),
    );

    let mut in_flight = self.in_flight.lock();
    in_flight.retain(|h| !h.is_finished());
    in_flight.push(handle);
  }

  /// Number of effects that have not finished yet.
  pub fn pending(&self) -> usize {
    self.in_flight.lock().iter().filter(|h| !h.is_finished()).count()
  }

  /// Waits for every effect submitted so far.
  pub async fn drain(&self) {
    loop {
      let batch: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
      if batch.is_empty() {
        return;
      }
      for handle in batch {
        if let Err(e) = handle.await {
          event!(Level::WARN, error = %e, "Effect task panicked or was cancelled.");
        }
      }
    }
  }
}
