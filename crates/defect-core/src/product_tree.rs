//! Product tree: the RPM layout of a component across OS versions.
//!
//! The tree is resolved by an external collaborator; this crate only fixes
//! its shape so the bulletin formatter can render it.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dp::SystemVersion;

/// The RPMs built for one OS version and CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBranch {
  pub version: SystemVersion,
  pub arch:    String,
  /// Full file names, e.g. `foo-1.2-3.oe2203.x86_64.rpm`.
  pub rpms:    Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTree {
  pub branches: Vec<ProductBranch>,
}

impl ProductTree {
  pub fn is_empty(&self) -> bool { self.branches.iter().all(|b| b.rpms.is_empty()) }
}

pub type ResolverError = Box<dyn std::error::Error + Send + Sync>;

/// Resolves product trees.
///
/// Implementations may hold a cache that is only valid between
/// [`init_cache`](Self::init_cache) and [`clean_cache`](Self::clean_cache);
/// two runs must not overlap.
#[async_trait]
pub trait ProductTreeResolver: Send + Sync {
  fn init_cache(&self);

  fn clean_cache(&self);

  /// Build the tree of `component` for every version in `versions`.
  async fn get_tree(
    &self,
    defect_time: DateTime<Utc>,
    component: &str,
    versions: &BTreeSet<SystemVersion>,
  ) -> Result<ProductTree, ResolverError>;

  /// The RPM manifest of `component` on `version`; empty when none exists.
  async fn parse_rpm(
    &self,
    defect_time: DateTime<Utc>,
    component: &str,
    version: &str,
  ) -> String;
}
