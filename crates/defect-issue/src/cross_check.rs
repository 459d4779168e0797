//! Which affected branches already carry a merged fix.

use std::collections::BTreeSet;

use defect_gitee::client::PullRequest;

/// Outcome of matching an issue's linked pull requests against the versions
/// an analyst declared affected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossCheck {
  /// Maintained branches with a merged pull request from the source
  /// namespace. This is the defect's fixed-version set.
  pub merged:     BTreeSet<String>,
  /// Declared, maintained versions still lacking a merged pull request, in
  /// declaration order.
  pub not_merged: Vec<String>,
}

impl CrossCheck {
  pub fn can_close(&self) -> bool { self.not_merged.is_empty() }
}

pub fn cross_check(
  prs: &[PullRequest],
  declared: &[String],
  maintained: &[String],
  source_namespace: &str,
) -> CrossCheck {
  let is_maintained = |v: &str| maintained.iter().any(|m| m == v);

  let merged: BTreeSet<String> = prs
    .iter()
    .filter(|pr| pr.base_namespace() == source_namespace)
    .filter(|pr| is_maintained(pr.base.branch.as_str()))
    .filter(|pr| pr.is_merged())
    .map(|pr| pr.base.branch.clone())
    .collect();

  let mut not_merged: Vec<String> = Vec::new();
  for v in declared {
    if is_maintained(v.as_str()) && !merged.contains(v) && !not_merged.contains(v) {
      not_merged.push(v.clone());
    }
  }

  CrossCheck { merged, not_merged }
}
