//! Error types for `defect-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid issue status: {0:?}")]
  InvalidIssueStatus(String),

  #[error("invalid severity level: {0:?}")]
  InvalidSeverityLevel(String),

  #[error("system version must not be empty")]
  EmptySystemVersion,

  #[error("invalid url: {0:?}")]
  InvalidUrl(String),

  #[error("invalid bulletin identification: {0:?}")]
  InvalidBulletinId(String),

  #[error("bulletin sequence exhausted for year {0}")]
  SequenceExhausted(i32),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
