//! Error type for `defect-issue`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("hosting client: {0}")]
  Gitee(#[from] defect_gitee::Error),

  #[error(transparent)]
  Template(#[from] defect_template::Error),

  #[error(transparent)]
  Core(#[from] defect_core::Error),

  #[error("store: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
