//! The CVE backend: where published bulletins are recorded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An issue with the versions its bulletins already cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedDefect {
  pub issue_num: String,
  pub versions:  Vec<String>,
}

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait CveBackend: Send + Sync {
  /// The most recent bulletin identifier; empty when none was published.
  async fn max_bulletin_id(&self) -> Result<String, BackendError>;

  async fn published_defects(&self) -> Result<Vec<PublishedDefect>, BackendError>;
}
