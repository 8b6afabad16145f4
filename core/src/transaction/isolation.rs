// draftflow/src/transaction/isolation.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
  ReadUncommitted,
  ReadCommitted,
  RepeatableRead,
  Serializable,
}

impl IsolationLevel {
  /// SQL keyword form, as used in `SET TRANSACTION ISOLATION LEVEL ...`.
  pub fn as_sql(&self) -> &'static str {
    match self {
      IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
      IsolationLevel::ReadCommitted => "READ COMMITTED",
      IsolationLevel::RepeatableRead => "REPEATABLE READ",
      IsolationLevel::Serializable => "SERIALIZABLE",
    }
  }
}

impl fmt::Display for IsolationLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_sql())
  }
}

impl FromStr for IsolationLevel {
  type Err = String;

  /// Accepts `serializable`, `repeatable_read`, `REPEATABLE READ`, `ReadCommitted`, ...
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized: String = s
      .chars()
      .filter(|c| !matches!(c, ' ' | '_' | '-'))
      .collect::<String>()
      .to_ascii_lowercase();
    match normalized.as_str() {
      "readuncommitted" => Ok(IsolationLevel::ReadUncommitted),
      "readcommitted" => Ok(IsolationLevel::ReadCommitted),
      "repeatableread" => Ok(IsolationLevel::RepeatableRead),
      "serializable" => Ok(IsolationLevel::Serializable),
      _ => Err(format!("unknown isolation level '{}'", s)),
    }
  }
}
