//! Product tree resolution from the repository's package index.
//!
//! Every `<repo_base>/<version>/update/<arch>/Packages/` directory is an
//! HTML autoindex. A component's RPMs are the `name-version-release.arch.rpm`
//! entries whose `name` equals the component and which were published after
//! the defect.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{LazyLock, Mutex, PoisonError},
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use defect_core::{
  dp::SystemVersion,
  product_tree::{ProductBranch, ProductTree, ProductTreeResolver, ResolverError},
};
use defect_gitee::http::send_with_retry;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::Result;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"href="([^"/]+\.rpm)""#).expect("static rpm href regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\d{2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2}").expect("static listing date regex")
});

const LISTING_DATE_FORMAT: &str = "%d-%b-%Y %H:%M";

#[derive(Debug, Clone, Deserialize)]
pub struct ProductTreeConfig {
  #[serde(default = "default_repo_base")]
  pub repo_base: String,
  #[serde(default = "default_arches")]
  pub arches:    Vec<String>,
}

impl Default for ProductTreeConfig {
  fn default() -> Self {
    Self { repo_base: default_repo_base(), arches: default_arches() }
  }
}

fn default_repo_base() -> String { "https://repo.openeuler.org".to_owned() }

fn default_arches() -> Vec<String> { vec!["aarch64".to_owned(), "x86_64".to_owned()] }

/// One `.rpm` entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RpmEntry {
  file:      String,
  published: Option<DateTime<Utc>>,
}

type ListingKey = (String, String);

pub struct HttpProductTree {
  client: Client,
  config: ProductTreeConfig,
  /// Listings per `(version, arch)`; `None` outside an init/clean bracket.
  cache:  Mutex<Option<HashMap<ListingKey, Vec<RpmEntry>>>>,
}

impl HttpProductTree {
  pub fn new(config: ProductTreeConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .map_err(defect_gitee::Error::from)?;
    Ok(Self { client, config, cache: Mutex::new(None) })
  }

  fn cached(&self, key: &ListingKey) -> Option<Vec<RpmEntry>> {
    let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
    cache.as_ref().and_then(|c| c.get(key).cloned())
  }

  fn remember(&self, key: ListingKey, entries: Vec<RpmEntry>) {
    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(cache) = cache.as_mut() {
      cache.insert(key, entries);
    }
  }

  async fn listing(&self, version: &str, arch: &str) -> Result<Vec<RpmEntry>> {
    let key = (version.to_owned(), arch.to_owned());
    if let Some(entries) = self.cached(&key) {
      return Ok(entries);
    }

    let url = format!(
      "{}/{version}/update/{arch}/Packages/",
      self.config.repo_base.trim_end_matches('/')
    );
    let resp = send_with_retry("GET package listing", || self.client.get(&url)).await?;
    let html = resp.text().await.map_err(defect_gitee::Error::from)?;
    let entries = parse_listing(&html);
    tracing::debug!(%url, rpms = entries.len(), "fetched package listing");

    self.remember(key, entries.clone());
    Ok(entries)
  }

  async fn rpms(
    &self,
    defect_time: DateTime<Utc>,
    component: &str,
    version: &str,
    arch: &str,
  ) -> Result<Vec<String>> {
    let entries = self.listing(version, arch).await?;
    Ok(
      entries
        .into_iter()
        .filter(|e| e.published.is_none_or(|p| p >= defect_time))
        .filter(|e| rpm_name(&e.file) == Some(component))
        .map(|e| e.file)
        .collect(),
    )
  }
}

#[async_trait]
impl ProductTreeResolver for HttpProductTree {
  fn init_cache(&self) {
    *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(HashMap::new());
  }

  fn clean_cache(&self) {
    *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
  }

  async fn get_tree(
    &self,
    defect_time: DateTime<Utc>,
    component: &str,
    versions: &BTreeSet<SystemVersion>,
  ) -> Result<ProductTree, ResolverError> {
    let mut branches = Vec::new();
    for version in versions {
      for arch in &self.config.arches {
        let rpms = self.rpms(defect_time, component, version.as_str(), arch).await?;
        if !rpms.is_empty() {
          branches.push(ProductBranch { version: version.clone(), arch: arch.clone(), rpms });
        }
      }
    }
    Ok(ProductTree { branches })
  }

  async fn parse_rpm(
    &self,
    defect_time: DateTime<Utc>,
    component: &str,
    version: &str,
  ) -> String {
    let mut found = Vec::new();
    for arch in &self.config.arches {
      match self.rpms(defect_time, component, version, arch).await {
        Ok(rpms) => found.extend(rpms),
        Err(e) => {
          tracing::warn!(%component, %version, %arch, error = %e, "package listing unavailable");
        }
      }
    }
    found.join("\n")
  }
}

/// Extract the `.rpm` entries of an autoindex page.
fn parse_listing(html: &str) -> Vec<RpmEntry> {
  html
    .lines()
    .filter_map(|line| {
      let caps = HREF_RE.captures(line)?;
      let whole = caps.get(0)?;
      let published = DATE_RE
        .find(&line[whole.end()..])
        .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), LISTING_DATE_FORMAT).ok())
        .map(|t| t.and_utc());
      Some(RpmEntry { file: caps[1].to_owned(), published })
    })
    .collect()
}

/// `kernel-devel-5.10.0-60.oe2203.x86_64.rpm` names package `kernel-devel`.
fn rpm_name(file: &str) -> Option<&str> {
  let stem = file.strip_suffix(".rpm")?;
  let (nvr, _arch) = stem.rsplit_once('.')?;
  let mut parts = nvr.rsplitn(3, '-');
  let _release = parts.next()?;
  let _version = parts.next()?;
  parts.next()
}
