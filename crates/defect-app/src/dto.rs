//! Wire form of collected defects.

use chrono::{DateTime, Utc};
use defect_core::{defect::Defect, dp::SystemVersion};
use serde::Serialize;

/// A defect awaiting a bulletin, as returned by `GET /v1/defect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectDefectsDto {
  pub org:                 String,
  pub repo:                String,
  pub number:              String,
  pub title:               String,
  pub status:              String,
  pub component:           String,
  pub component_version:   String,
  pub kernel:              String,
  pub system_version:      String,
  pub description:         String,
  pub influence:           String,
  pub severity_level:      String,
  pub root_cause:          String,
  pub affected_version:    Vec<String>,
  pub fixed_version:       Vec<String>,
  pub unpublished_version: Vec<String>,
  pub abi:                 String,
  pub created_at:          DateTime<Utc>,
}

fn names<'a>(versions: impl IntoIterator<Item = &'a SystemVersion>) -> Vec<String> {
  versions.into_iter().map(|v| v.as_str().to_owned()).collect()
}

impl From<&Defect> for CollectDefectsDto {
  fn from(d: &Defect) -> Self {
    Self {
      org:                 d.issue.org.clone(),
      repo:                d.issue.repo.clone(),
      number:              d.issue.number.clone(),
      title:               d.issue.title.clone(),
      status:              d.issue.status.as_str().to_owned(),
      component:           d.component.clone(),
      component_version:   d.component_version.clone(),
      kernel:              d.kernel.clone(),
      system_version:      d.system_version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
      description:         d.description.clone(),
      influence:           d.influence.clone(),
      severity_level:      d.severity_level.map(|s| s.to_string()).unwrap_or_default(),
      root_cause:          d.root_cause.clone(),
      affected_version:    names(&d.affected_version),
      fixed_version:       names(&d.fixed_version),
      unpublished_version: names(&d.unpublished_version),
      abi:                 d.abi.clone(),
      created_at:          d.created_at,
    }
  }
}
