//! Runtime configuration, deserialised from `config.toml` and `DEFECT_*`
//! environment variables.

use std::path::{Path, PathBuf};

use defect_app::{BackendConfig, ObsConfig, ProductTreeConfig};
use defect_gitee::CommitterConfig;
use defect_issue::IssueConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self { Self { host: default_host(), port: default_port() } }
}

fn default_host() -> String { "0.0.0.0".to_owned() }

fn default_port() -> u16 { 8888 }

fn default_store_path() -> PathBuf { PathBuf::from("defect.db") }

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server:       ServerConfig,
  #[serde(default = "default_store_path")]
  pub store_path:   PathBuf,
  pub issue:        IssueConfig,
  #[serde(default)]
  pub committer:    CommitterConfig,
  pub backend:      BackendConfig,
  pub obs:          ObsConfig,
  #[serde(default)]
  pub product_tree: ProductTreeConfig,
}

impl Config {
  /// Layer the optional file at `path` under `DEFECT_*` variables, e.g.
  /// `DEFECT_OBS__SECRET_KEY`.
  pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
    ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(
        ::config::Environment::with_prefix("DEFECT")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  /// Everything that makes this configuration unusable.
  pub fn problems(&self) -> Vec<String> {
    let mut problems = self.issue.problems();
    if self.obs.bucket.trim().is_empty() {
      problems.push("obs.bucket must not be empty".to_owned());
    }
    if self.backend.endpoint.trim().is_empty() {
      problems.push("backend.endpoint must not be empty".to_owned());
    }
    problems
  }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}
