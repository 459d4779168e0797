//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Version sets are stored as
//! compact JSON arrays. Enums are stored by their display names.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use defect_core::{
  defect::{Defect, Issue},
  dp::{IssueStatus, SeverityLevel, SystemVersion, Url},
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Version sets
// ─────────────────────────────────────────────────────────────

pub fn encode_versions(vs: &BTreeSet<SystemVersion>) -> Result<String> {
  Ok(serde_json::to_string(vs)?)
}

pub fn decode_versions(s: &str) -> Result<BTreeSet<SystemVersion>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types
// ────────────────────────────────────────────────────────────────

/// Column list shared by every SELECT, in [`RawDefect`] field order.
pub const DEFECT_COLUMNS: &str = "org, number, repo, title, status, kernel, \
  component, component_version, system_version, description, reference_url, \
  guidance_url, influence, severity_level, root_cause, affected_version, \
  fixed_version, unpublished_version, abi, created_at, updated_at";

/// A `defects` row as raw column strings.
#[derive(Debug)]
pub struct RawDefect {
  pub org:                 String,
  pub number:              String,
  pub repo:                String,
  pub title:               String,
  pub status:              String,
  pub kernel:              String,
  pub component:           String,
  pub component_version:   String,
  pub system_version:      Option<String>,
  pub description:         String,
  pub reference_url:       Option<String>,
  pub guidance_url:        Option<String>,
  pub influence:           String,
  pub severity_level:      Option<String>,
  pub root_cause:          String,
  pub affected_version:    String,
  pub fixed_version:       String,
  pub unpublished_version: String,
  pub abi:                 String,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawDefect {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      org:                 row.get(0)?,
      number:              row.get(1)?,
      repo:                row.get(2)?,
      title:               row.get(3)?,
      status:              row.get(4)?,
      kernel:              row.get(5)?,
      component:           row.get(6)?,
      component_version:   row.get(7)?,
      system_version:      row.get(8)?,
      description:         row.get(9)?,
      reference_url:       row.get(10)?,
      guidance_url:        row.get(11)?,
      influence:           row.get(12)?,
      severity_level:      row.get(13)?,
      root_cause:          row.get(14)?,
      affected_version:    row.get(15)?,
      fixed_version:       row.get(16)?,
      unpublished_version: row.get(17)?,
      abi:                 row.get(18)?,
      created_at:          row.get(19)?,
      updated_at:          row.get(20)?,
    })
  }

  pub fn from_defect(d: &Defect) -> Result<Self> {
    Ok(Self {
      org:                 d.issue.org.clone(),
      number:              d.issue.number.clone(),
      repo:                d.issue.repo.clone(),
      title:               d.issue.title.clone(),
      status:              d.issue.status.as_str().to_owned(),
      kernel:              d.kernel.clone(),
      component:           d.component.clone(),
      component_version:   d.component_version.clone(),
      system_version:      d.system_version.as_ref().map(|v| v.to_string()),
      description:         d.description.clone(),
      reference_url:       d.reference_url.as_ref().map(|u| u.to_string()),
      guidance_url:        d.guidance_url.as_ref().map(|u| u.to_string()),
      influence:           d.influence.clone(),
      severity_level:      d.severity_level.map(|s| s.as_str().to_owned()),
      root_cause:          d.root_cause.clone(),
      affected_version:    encode_versions(&d.affected_version)?,
      fixed_version:       encode_versions(&d.fixed_version)?,
      unpublished_version: encode_versions(&d.unpublished_version)?,
      abi:                 d.abi.clone(),
      created_at:          encode_dt(d.created_at),
      updated_at:          encode_dt(d.updated_at),
    })
  }

  pub fn into_defect(self) -> Result<Defect> {
    let status: IssueStatus = self.status.parse()?;
    Ok(Defect {
      issue: Issue {
        org: self.org,
        number: self.number,
        repo: self.repo,
        title: self.title,
        status,
      },
      kernel: self.kernel,
      component: self.component,
      component_version: self.component_version,
      system_version: self.system_version.map(SystemVersion::new).transpose()?,
      description: self.description,
      reference_url: self.reference_url.map(Url::new).transpose()?,
      guidance_url: self.guidance_url.map(Url::new).transpose()?,
      influence: self.influence,
      severity_level: self
        .severity_level
        .map(|s| s.parse::<SeverityLevel>())
        .transpose()?,
      root_cause: self.root_cause,
      affected_version: decode_versions(&self.affected_version)?,
      fixed_version: decode_versions(&self.fixed_version)?,
      unpublished_version: decode_versions(&self.unpublished_version)?,
      abi: self.abi,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
