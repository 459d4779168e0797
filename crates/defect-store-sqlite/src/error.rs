//! Error type for `defect-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] defect_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("defect already exists: {org}/{number}")]
  AlreadyExists { org: String, number: String },

  #[error("defect not found: {org}/{number}")]
  NotFound { org: String, number: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
