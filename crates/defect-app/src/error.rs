//! Error type for `defect-app`.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store: {0}")]
  Store(#[source] BoxError),

  #[error("cve backend: {0}")]
  Backend(#[source] BoxError),

  #[error("cve backend answered code {code}: {msg}")]
  BackendStatus { code: i64, msg: String },

  #[error("upload: {0}")]
  Upload(#[source] BoxError),

  #[error(transparent)]
  Core(#[from] defect_core::Error),

  #[error(transparent)]
  Http(#[from] defect_gitee::Error),

  #[error("xml error: {0}")]
  Xml(String),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
