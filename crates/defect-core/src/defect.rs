//! The `Defect` entity and the issue that owns it.
//!
//! A defect is keyed by its issue's `(org, number)`. Repeated webhook events
//! mutate the same record in place; nothing is ever deleted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dp::{IssueStatus, SeverityLevel, SystemVersion, Url};

/// The issue-tracker side of a defect. `(org, number)` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  pub org:    String,
  pub number: String,
  pub repo:   String,
  pub title:  String,
  pub status: IssueStatus,
}

/// A normalised defect record.
///
/// Invariant: `unpublished_version ⊆ fixed_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
  pub issue:               Issue,
  pub kernel:              String,
  pub component:           String,
  pub component_version:   String,
  /// The OS version the defect was reported against.
  pub system_version:      Option<SystemVersion>,
  pub description:         String,
  pub reference_url:       Option<Url>,
  pub guidance_url:        Option<Url>,
  pub influence:           String,
  pub severity_level:      Option<SeverityLevel>,
  pub root_cause:          String,
  /// Declared affected by the analyst.
  pub affected_version:    BTreeSet<SystemVersion>,
  /// Maintained versions whose linked pull request is merged.
  pub fixed_version:       BTreeSet<SystemVersion>,
  /// Fixed versions without a published bulletin.
  pub unpublished_version: BTreeSet<SystemVersion>,
  pub abi:                 String,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
}

impl Defect {
  /// A defect carrying only its issue; every analysed field empty.
  pub fn skeleton(issue: Issue) -> Self {
    let now = Utc::now();
    Self {
      component: issue.repo.clone(),
      issue,
      kernel: String::new(),
      component_version: String::new(),
      system_version: None,
      description: String::new(),
      reference_url: None,
      guidance_url: None,
      influence: String::new(),
      severity_level: None,
      root_cause: String::new(),
      affected_version: BTreeSet::new(),
      fixed_version: BTreeSet::new(),
      unpublished_version: BTreeSet::new(),
      abi: String::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_fixed_on(&self, version: &str) -> bool {
    self.fixed_version.iter().any(|v| v.as_str() == version)
  }

  /// Set `unpublished_version` to the fixed versions not in `published`.
  ///
  /// When the backend reports as many published versions as there are fixed
  /// versions, everything counts as published.
  pub fn mark_published(&mut self, published: &[String]) {
    if published.len() == self.fixed_version.len() {
      self.unpublished_version.clear();
      return;
    }
    self.unpublished_version = self
      .fixed_version
      .iter()
      .filter(|v| !published.iter().any(|p| p == v.as_str()))
      .cloned()
      .collect();
  }
}
