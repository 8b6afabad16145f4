// draftflow/src/transaction/profile.rs

//! Named transaction configurations.

use std::fmt;
use std::time::Duration;

use super::isolation::IsolationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionProfile {
  Payment,
  DraftCommit,
  DesignerAssignment,
  CreditOperations,
  General,
}

impl TransactionProfile {
  pub const ALL: [TransactionProfile; 5] = [
    TransactionProfile::Payment,
    TransactionProfile::DraftCommit,
    TransactionProfile::DesignerAssignment,
    TransactionProfile::CreditOperations,
    TransactionProfile::General,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      TransactionProfile::Payment => "PAYMENT",
      TransactionProfile::DraftCommit => "DRAFT_COMMIT",
      TransactionProfile::DesignerAssignment => "DESIGNER_ASSIGNMENT",
      TransactionProfile::CreditOperations => "CREDIT_OPERATIONS",
      TransactionProfile::General => "GENERAL",
    }
  }
}

impl fmt::Display for TransactionProfile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// `{isolationLevel, timeoutMs, maxRetries}` for one named profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
  pub profile: TransactionProfile,
  pub isolation_level: IsolationLevel,
  pub timeout_ms: u64,
  /// Re-runs allowed after the first attempt, for retryable failures only.
  pub max_retries: u32,
  /// Base delay before a retry; doubled per attempt.
  pub retry_backoff_ms: u64,
}

impl TransactionConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn backoff_for(&self, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
  }

  pub fn defaults_for(profile: TransactionProfile) -> Self {
    let (isolation_level, timeout_ms, max_retries, retry_backoff_ms) = match profile {
      TransactionProfile::Payment => (IsolationLevel::Serializable, 10_000, 3, 50),
      TransactionProfile::DraftCommit => (IsolationLevel::Serializable, 15_000, 3, 50),
      TransactionProfile::DesignerAssignment => (IsolationLevel::RepeatableRead, 5_000, 2, 25),
      TransactionProfile::CreditOperations => (IsolationLevel::Serializable, 10_000, 3, 50),
      TransactionProfile::General => (IsolationLevel::ReadCommitted, 5_000, 0, 0),
    };
    Self {
      profile,
      isolation_level,
      timeout_ms,
      max_retries,
      retry_backoff_ms,
    }
  }
}

/// The five profiles, each individually overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionProfiles {
  configs: [TransactionConfig; 5],
}

impl TransactionProfiles {
  pub fn get(&self, profile: TransactionProfile) -> TransactionConfig {
    self.configs[Self::slot(profile)]
  }

  pub fn set(&mut self, config: TransactionConfig) {
    self.configs[Self::slot(config.profile)] = config;
  }

  pub fn with(mut self, config: TransactionConfig) -> Self {
    self.set(config);
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = &TransactionConfig> {
    self.configs.iter()
  }

  fn slot(profile: TransactionProfile) -> usize {
    match profile {
      TransactionProfile::Payment => 0,
      TransactionProfile::DraftCommit => 1,
      TransactionProfile::DesignerAssignment => 2,
      TransactionProfile::CreditOperations => 3,
      TransactionProfile::General => 4,
    }
  }
}

impl Default for TransactionProfiles {
  fn default() -> Self {
    Self {
      configs: TransactionProfile::ALL.map(TransactionConfig::defaults_for),
    }
  }
}
