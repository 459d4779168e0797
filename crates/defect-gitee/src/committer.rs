//! Repository → committers / assigner cache.
//!
//! Filled from the community SIG listing: one request for the SIG names, then
//! one per SIG for its maintainers and per-repository committers. Readers
//! never block on a refresh for longer than one SIG's merge.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
  time::Duration,
};

use chrono::Local;
use reqwest::Client;
use serde::Deserialize;

use crate::{Result, http::send_with_retry};

/// Pause between per-SIG requests; the endpoint answers 503 when hit faster.
const SIG_PAUSE: Duration = Duration::from_millis(200);

const CACHE_AT_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommitterConfig {
  /// Directory listing whose `dir` entries are the SIG names.
  pub sig_url:       String,
  /// Per-SIG committer endpoint; the SIG name is sent as `sig=`.
  pub committer_url: String,
}

impl Default for CommitterConfig {
  fn default() -> Self {
    Self {
      sig_url:       "https://gitee.com/api/v5/repos/openeuler/community/contents/sig"
        .to_owned(),
      committer_url: "https://www.openeuler.org/api-dsapi/query/sig/repo/committers"
        .to_owned(),
    }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentEntry {
  name: String,
  #[serde(rename = "type")]
  kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommitterDetail {
  pub repo:     String,
  pub gitee_id: Vec<String>,
}

/// What the per-SIG endpoint returns under `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommitterData {
  pub maintainers:       Vec<String>,
  #[serde(rename = "committerDetails")]
  pub committer_details: Vec<CommitterDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommitterResponse {
  data: CommitterData,
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Entries {
  committers_of_repo: HashMap<String, Vec<String>>,
  assigner_of_repo:   HashMap<String, String>,
  cache_at:           Option<String>,
}

/// Shared cache; hand it around in an `Arc`.
#[derive(Debug, Default)]
pub struct CommitterCache {
  entries: RwLock<Entries>,
}

impl CommitterCache {
  pub fn new() -> Self { Self::default() }

  /// Merge one SIG's answer. Each repository's committers are the SIG
  /// maintainers followed by its own committers; its assigner is its first
  /// committer, else the first maintainer.
  pub fn insert_sig(&self, data: &CommitterData) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

    for detail in &data.committer_details {
      let committers = data
        .maintainers
        .iter()
        .chain(&detail.gitee_id)
        .cloned()
        .collect();
      entries.committers_of_repo.insert(detail.repo.clone(), committers);

      match detail.gitee_id.first().or(data.maintainers.first()) {
        Some(assigner) => {
          entries.assigner_of_repo.insert(detail.repo.clone(), assigner.clone());
        }
        None => {
          entries.assigner_of_repo.remove(&detail.repo);
        }
      }
    }
  }

  /// Committers of `repo` (`org/name`); empty when unknown.
  pub fn list_committer(&self, repo: &str) -> Vec<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.committers_of_repo.get(repo).cloned().unwrap_or_default()
  }

  pub fn get_assigner(&self, repo: &str) -> Option<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.assigner_of_repo.get(repo).cloned()
  }

  /// Exposed for callers that restrict analysis comments to committers.
  pub fn is_committer(&self, repo: &str, user: &str) -> bool {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries
      .committers_of_repo
      .get(repo)
      .is_some_and(|c| c.iter().any(|u| u == user))
  }

  /// Date of the last completed refresh, `YYYYMMDD`.
  pub fn cache_at(&self) -> Option<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.cache_at.clone()
  }

  /// True when no refresh has completed today.
  pub fn needs_refresh(&self) -> bool {
    let today = Local::now().format(CACHE_AT_FORMAT).to_string();
    self.cache_at().as_deref() != Some(today.as_str())
  }

  fn stamp(&self) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.cache_at = Some(Local::now().format(CACHE_AT_FORMAT).to_string());
  }

  /// Re-fetch every SIG and merge the answers. Returns the number of SIGs
  /// merged. Failing to list the SIGs fails the refresh; a failing SIG is
  /// logged and skipped, keeping whatever was cached for its repositories.
  pub async fn refresh(&self, http: &Client, config: &CommitterConfig) -> Result<usize> {
    let listing = send_with_retry("GET sig listing", || http.get(&config.sig_url)).await?;
    let sigs: Vec<String> = listing
      .json::<Vec<ContentEntry>>()
      .await?
      .into_iter()
      .filter(|e| e.kind == "dir")
      .map(|e| e.name)
      .collect();

    let mut merged = 0;
    for sig in &sigs {
      tokio::time::sleep(SIG_PAUSE).await;

      match fetch_sig(http, config, sig).await {
        Ok(data) => {
          self.insert_sig(&data);
          merged += 1;
        }
        Err(e) => tracing::error!(sig, error = %e, "fetching sig committers failed"),
      }
    }

    self.stamp();
    tracing::info!(sigs = sigs.len(), merged, "committer cache refreshed");
    Ok(merged)
  }
}

async fn fetch_sig(http: &Client, config: &CommitterConfig, sig: &str) -> Result<CommitterData> {
  let query = [("community", "openeuler"), ("sig", sig)];
  let resp = send_with_retry("GET sig committers", || {
    http.get(&config.committer_url).query(&query)
  })
  .await?;
  let body: CommitterResponse = resp.json().await?;
  Ok(body.data)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kernel_sig() -> CommitterData {
    serde_json::from_str(
      r#"{
        "maintainers": ["m1", "m2"],
        "committerDetails": [
          {"repo": "src-openeuler/kernel", "gitee_id": ["c1", "c2"]},
          {"repo": "src-openeuler/kmod", "gitee_id": []}
        ]
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn maintainers_come_first() {
    let cache = CommitterCache::new();
    cache.insert_sig(&kernel_sig());

    assert_eq!(cache.list_committer("src-openeuler/kernel"), ["m1", "m2", "c1", "c2"]);
    assert_eq!(cache.list_committer("src-openeuler/kmod"), ["m1", "m2"]);
    assert!(cache.list_committer("src-openeuler/unknown").is_empty());
  }

  #[test]
  fn assigner_prefers_repo_committer() {
    let cache = CommitterCache::new();
    cache.insert_sig(&kernel_sig());

    assert_eq!(cache.get_assigner("src-openeuler/kernel").as_deref(), Some("c1"));
    assert_eq!(cache.get_assigner("src-openeuler/kmod").as_deref(), Some("m1"));
    assert_eq!(cache.get_assigner("src-openeuler/unknown"), None);
  }

  #[test]
  fn no_assigner_without_anyone() {
    let cache = CommitterCache::new();
    cache.insert_sig(&CommitterData {
      maintainers:       vec![],
      committer_details: vec![CommitterDetail {
        repo:     "src-openeuler/orphan".into(),
        gitee_id: vec![],
      }],
    });
    assert_eq!(cache.get_assigner("src-openeuler/orphan"), None);
    assert!(cache.list_committer("src-openeuler/orphan").is_empty());
  }

  #[test]
  fn is_committer_checks_membership() {
    let cache = CommitterCache::new();
    cache.insert_sig(&kernel_sig());

    assert!(cache.is_committer("src-openeuler/kernel", "c2"));
    assert!(cache.is_committer("src-openeuler/kernel", "m1"));
    assert!(!cache.is_committer("src-openeuler/kernel", "eve"));
    assert!(!cache.is_committer("src-openeuler/unknown", "m1"));
  }

  #[test]
  fn later_sig_overwrites_repo() {
    let cache = CommitterCache::new();
    cache.insert_sig(&kernel_sig());
    cache.insert_sig(&CommitterData {
      maintainers:       vec!["x".into()],
      committer_details: vec![CommitterDetail {
        repo:     "src-openeuler/kernel".into(),
        gitee_id: vec!["y".into()],
      }],
    });
    assert_eq!(cache.list_committer("src-openeuler/kernel"), ["x", "y"]);
    assert_eq!(cache.list_committer("src-openeuler/kmod"), ["m1", "m2"]);
  }

  #[test]
  fn fresh_cache_needs_refresh() {
    let cache = CommitterCache::new();
    assert!(cache.needs_refresh());
    cache.stamp();
    assert!(!cache.needs_refresh());
    assert_eq!(cache.cache_at().map(|d| d.len()), Some(8));
  }
}
