//! Settings of the issue workflow.

use defect_gitee::GiteeConfig;
use serde::Deserialize;

/// Per-component deadline override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PkgPolicy {
  pub component: String,
  pub days:      u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueConfig {
  pub robot_token:         String,
  #[serde(default)]
  pub enterprise_token:    String,
  #[serde(default)]
  pub enterprise_id:       String,
  /// Issue type handled by the bot, e.g. `缺陷`.
  pub issue_type:          String,
  pub maintain_version:    Vec<String>,
  /// Versions under development; their issues are left alone.
  #[serde(default)]
  pub develop_version:     Vec<String>,
  #[serde(default)]
  pub pkg_policy:          Vec<PkgPolicy>,
  /// Only pull requests against this organisation count as fixes.
  #[serde(default = "default_source_namespace")]
  pub source_namespace:    String,
  #[serde(default = "default_api_base")]
  pub api_base:            String,
  #[serde(default = "default_enterprise_api_base")]
  pub enterprise_api_base: String,
}

fn default_source_namespace() -> String { "src-openeuler".to_owned() }
fn default_api_base() -> String { "https://gitee.com/api/v5".to_owned() }
fn default_enterprise_api_base() -> String { "https://api.gitee.com".to_owned() }

impl IssueConfig {
  /// Settings of the hosting client built from this section.
  pub fn gitee(&self) -> GiteeConfig {
    GiteeConfig {
      api_base:            self.api_base.clone(),
      enterprise_api_base: self.enterprise_api_base.clone(),
      robot_token:         self.robot_token.clone(),
      enterprise_token:    self.enterprise_token.clone(),
      enterprise_id:       self.enterprise_id.clone(),
    }
  }

  /// Deadline override in days for `component`, if any.
  pub fn policy_days(&self, component: &str) -> Option<u32> {
    self
      .pkg_policy
      .iter()
      .find(|p| p.component == component)
      .map(|p| p.days)
  }

  /// True when `os` names a develop version.
  pub fn is_develop(&self, os: &str) -> bool {
    self.develop_version.iter().any(|v| os.contains(v.as_str()))
  }

  /// Problems that make this section unusable, in a human-readable form.
  pub fn problems(&self) -> Vec<String> {
    let mut problems = Vec::new();
    if self.issue_type.trim().is_empty() {
      problems.push("issue.issue_type must not be empty".to_owned());
    }
    if self.maintain_version.is_empty() {
      problems.push("issue.maintain_version must not be empty".to_owned());
    }
    for v in &self.develop_version {
      if self.maintain_version.contains(v) {
        problems.push(format!("{v} is both maintained and under development"));
      }
    }
    for p in self.pkg_policy.iter().filter(|p| p.days == 0) {
      problems.push(format!("pkg_policy for {} must be at least one day", p.component));
    }
    problems
  }
}
