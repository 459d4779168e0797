//! Webhook payloads.
//!
//! Only the fields the defect manager reads are declared; everything else
//! in the platform's payload is ignored. Missing fields fall back to their
//! defaults so a sparse payload still decodes.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Value of the `X-Gitee-Event` header for issue events.
pub const ISSUE_HOOK: &str = "Issue Hook";

/// Value of the `X-Gitee-Event` header for comment events.
pub const NOTE_HOOK: &str = "Note Hook";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserHook {
  pub login:     String,
  pub name:      String,
  pub user_name: String,
}

impl UserHook {
  /// The handle to `@`-mention.
  pub fn mention(&self) -> &str {
    if self.user_name.is_empty() { &self.login } else { &self.user_name }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LabelHook {
  pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IssueHook {
  /// Platform-wide identifier, used by the enterprise API.
  pub id:         i64,
  pub number:     String,
  pub title:      String,
  pub body:       Option<String>,
  pub state:      String,
  /// Workflow state, e.g. `待办的`.
  pub state_name: String,
  /// Issue type, e.g. `缺陷`.
  pub type_name:  String,
  pub labels:     Vec<LabelHook>,
  pub created_at: Option<DateTime<FixedOffset>>,
  pub user:       Option<UserHook>,
  pub assignee:   Option<UserHook>,
}

impl IssueHook {
  pub fn body(&self) -> &str { self.body.as_deref().unwrap_or_default() }

  pub fn label_names(&self) -> Vec<&str> {
    self.labels.iter().map(|l| l.name.as_str()).collect()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectHook {
  /// The owning organisation, e.g. `src-openeuler`.
  pub namespace:           String,
  pub name:                String,
  pub path:                String,
  pub path_with_namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IssueEvent {
  pub action:   Option<String>,
  pub issue:    IssueHook,
  pub project:  ProjectHook,
  pub sender:   UserHook,
  pub assignee: Option<UserHook>,
}

impl IssueEvent {
  pub fn is_assign(&self) -> bool { self.action.as_deref() == Some("assign") }
}

/// A comment, as delivered in a hook or listed through the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Note {
  pub id:   i64,
  pub body: String,
  pub user: UserHook,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteEvent {
  pub action:        Option<String>,
  pub comment:       Note,
  pub issue:         Option<IssueHook>,
  pub project:       ProjectHook,
  pub noteable_type: String,
  pub sender:        UserHook,
}

impl NoteEvent {
  /// The commented issue, when the comment was made on an issue.
  pub fn issue(&self) -> Option<&IssueHook> {
    self.issue.as_ref().filter(|_| self.noteable_type == "Issue")
  }
}
