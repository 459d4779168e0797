//! Domain primitives: constrained strings with validating constructors.
//!
//! The issue tracker speaks Chinese status names; the enum keeps them as the
//! canonical wire and storage form.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Issue status ────────────────────────────────────────────────────────────

/// Workflow state of an issue on the code-hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
  #[serde(rename = "待办的")]
  Todo,
  #[serde(rename = "修复中")]
  Repairing,
  #[serde(rename = "已确认")]
  Confirmed,
  #[serde(rename = "已完成")]
  Finished,
  #[serde(rename = "已验收")]
  Accepted,
  #[serde(rename = "已挂起")]
  Suspended,
  #[serde(rename = "已取消")]
  Cancelled,
}

impl IssueStatus {
  pub const ALL: [IssueStatus; 7] = [
    Self::Todo,
    Self::Repairing,
    Self::Confirmed,
    Self::Finished,
    Self::Accepted,
    Self::Suspended,
    Self::Cancelled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Todo => "待办的",
      Self::Repairing => "修复中",
      Self::Confirmed => "已确认",
      Self::Finished => "已完成",
      Self::Accepted => "已验收",
      Self::Suspended => "已挂起",
      Self::Cancelled => "已取消",
    }
  }

  /// Finished or accepted: the analysis must be complete.
  pub fn is_closed(self) -> bool { matches!(self, Self::Finished | Self::Accepted) }

  /// Cancelled or suspended: the operator must give a reason.
  pub fn is_rejected(self) -> bool {
    matches!(self, Self::Cancelled | Self::Suspended)
  }
}

impl FromStr for IssueStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::InvalidIssueStatus(s.to_owned()))
  }
}

impl fmt::Display for IssueStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Severity level ──────────────────────────────────────────────────────────

/// Severity declared by the analyst, ordered from least to most severe.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SeverityLevel {
  Low,
  Moderate,
  High,
  Critical,
}

impl SeverityLevel {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "Low",
      Self::Moderate => "Moderate",
      Self::High => "High",
      Self::Critical => "Critical",
    }
  }
}

impl FromStr for SeverityLevel {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "Low" => Ok(Self::Low),
      "Moderate" => Ok(Self::Moderate),
      "High" => Ok(Self::High),
      "Critical" => Ok(Self::Critical),
      other => Err(Error::InvalidSeverityLevel(other.to_owned())),
    }
  }
}

impl fmt::Display for SeverityLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── System version ──────────────────────────────────────────────────────────

/// An OS release name such as `openEuler-22.03-LTS`.
///
/// Not checked against the maintained-version list: stored records must stay
/// readable after that list changes.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SystemVersion(String);

impl SystemVersion {
  pub fn new(s: impl Into<String>) -> Result<Self> {
    let s = s.into();
    if s.trim().is_empty() {
      return Err(Error::EmptySystemVersion);
    }
    Ok(Self(s))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for SystemVersion {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::new(s) }
}

impl From<SystemVersion> for String {
  fn from(v: SystemVersion) -> Self { v.0 }
}

impl fmt::Display for SystemVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── URL ─────────────────────────────────────────────────────────────────────

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^https?://[^\s/?#]+[^\s]*$").expect("static url regex")
});

/// An absolute `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Url(String);

impl Url {
  pub fn new(s: impl Into<String>) -> Result<Self> {
    let s = s.into();
    if !URL_RE.is_match(&s) {
      return Err(Error::InvalidUrl(s));
    }
    Ok(Self(s))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Url {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::new(s) }
}

impl From<Url> for String {
  fn from(u: Url) -> Self { u.0 }
}

impl fmt::Display for Url {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn issue_status_round_trips_through_chinese_names() {
    for status in IssueStatus::ALL {
      assert_eq!(status.as_str().parse::<IssueStatus>().unwrap(), status);
    }
    assert!("closed".parse::<IssueStatus>().is_err());
  }

  #[test]
  fn issue_status_serializes_as_platform_name() {
    let json = serde_json::to_string(&IssueStatus::Finished).unwrap();
    assert_eq!(json, "\"已完成\"");
  }

  #[test]
  fn closed_and_rejected_partition() {
    assert!(IssueStatus::Finished.is_closed());
    assert!(IssueStatus::Accepted.is_closed());
    assert!(IssueStatus::Suspended.is_rejected());
    assert!(IssueStatus::Cancelled.is_rejected());
    assert!(!IssueStatus::Todo.is_closed());
    assert!(!IssueStatus::Todo.is_rejected());
  }

  #[test]
  fn severity_level_accepts_only_the_four_levels() {
    assert_eq!("High".parse::<SeverityLevel>().unwrap(), SeverityLevel::High);
    assert!("high".parse::<SeverityLevel>().is_err());
    assert!("Urgent".parse::<SeverityLevel>().is_err());
    assert!(SeverityLevel::Critical > SeverityLevel::Low);
  }

  #[test]
  fn system_version_rejects_blank() {
    assert!(SystemVersion::new("").is_err());
    assert!(SystemVersion::new("  ").is_err());
    assert_eq!(
      SystemVersion::new("openEuler-22.03-LTS").unwrap().as_str(),
      "openEuler-22.03-LTS"
    );
  }

  #[test]
  fn system_version_deserialize_validates() {
    assert!(serde_json::from_str::<SystemVersion>("\"\"").is_err());
    let v: SystemVersion = serde_json::from_str("\"openEuler-24.03-LTS\"").unwrap();
    assert_eq!(v.to_string(), "openEuler-24.03-LTS");
  }

  #[test]
  fn url_requires_http_scheme_and_host() {
    assert!(Url::new("https://gitee.com/help/articles/4142").is_ok());
    assert!(Url::new("http://example.com").is_ok());
    assert!(Url::new("gitee.com/help").is_err());
    assert!(Url::new("ftp://example.com").is_err());
    assert!(Url::new("https://exa mple.com").is_err());
    assert!(Url::new("").is_err());
  }
}
