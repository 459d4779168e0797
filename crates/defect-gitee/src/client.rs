//! The code-hosting client port and its Gitee REST implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  hook::{IssueHook, Note, UserHook},
  http::send_with_retry,
};

/// Comments per page when listing.
const PER_PAGE: usize = 100;

// ─── Request / response types ────────────────────────────────────────────────

/// A partial issue update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueUpdate {
  pub repo:     String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body:     Option<String>,
  /// Comma-separated label names; replaces the whole label set.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub labels:   Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assignee: Option<String>,
}

impl IssueUpdate {
  pub fn new(repo: impl Into<String>) -> Self {
    Self { repo: repo.into(), ..Self::default() }
  }

  pub fn body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  pub fn labels(mut self, labels: impl Into<String>) -> Self {
    self.labels = Some(labels.into());
    self
  }

  pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
    self.assignee = Some(assignee.into());
    self
  }
}

/// Planned start and deadline of an issue, `YYYY-MM-DDTHH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadline {
  pub plan_started_at: String,
  pub deadline:        String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequestNamespace {
  pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequestRepo {
  pub namespace: PullRequestNamespace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequestBase {
  /// Target branch name.
  #[serde(rename = "ref")]
  pub branch: String,
  pub repo:   PullRequestRepo,
}

/// A pull request linked to an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PullRequest {
  pub number: i64,
  pub state:  String,
  pub base:   PullRequestBase,
}

impl PullRequest {
  pub fn is_merged(&self) -> bool { self.state == "merged" }

  pub fn base_namespace(&self) -> &str { &self.base.repo.namespace.path }
}

// ─── Port ────────────────────────────────────────────────────────────────────

/// Operations the defect manager performs on the code-hosting platform.
#[async_trait]
pub trait HostingClient: Send + Sync {
  /// The account the bot acts as.
  async fn get_bot(&self) -> Result<UserHook>;

  async fn get_issue(&self, org: &str, repo: &str, number: &str) -> Result<IssueHook>;

  async fn update_issue(
    &self,
    owner: &str,
    number: &str,
    update: &IssueUpdate,
  ) -> Result<()>;

  async fn create_issue_comment(
    &self,
    org: &str,
    repo: &str,
    number: &str,
    body: &str,
  ) -> Result<()>;

  /// Every comment on the issue, oldest first.
  async fn list_issue_comments(
    &self,
    org: &str,
    repo: &str,
    number: &str,
  ) -> Result<Vec<Note>>;

  async fn reopen_issue(&self, owner: &str, repo: &str, number: &str) -> Result<()>;

  async fn close_issue(&self, owner: &str, repo: &str, number: &str) -> Result<()>;

  async fn list_issue_pull_requests(
    &self,
    org: &str,
    repo: &str,
    number: &str,
  ) -> Result<Vec<PullRequest>>;

  /// Set planned start and deadline through the enterprise API. `issue_id` is
  /// the platform-wide id, not the issue number.
  async fn update_issue_deadline(&self, issue_id: i64, deadline: &Deadline) -> Result<()>;
}

// ─── Gitee implementation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GiteeConfig {
  /// e.g. `https://gitee.com/api/v5`
  pub api_base:            String,
  /// e.g. `https://api.gitee.com`
  pub enterprise_api_base: String,
  pub robot_token:         String,
  pub enterprise_token:    String,
  pub enterprise_id:       String,
}

/// [`HostingClient`] over the Gitee v5 REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GiteeClient {
  client: Client,
  config: GiteeConfig,
}

#[derive(Serialize)]
struct StateChange<'a> {
  repo:  &'a str,
  state: &'a str,
}

#[derive(Serialize)]
struct NewComment<'a> {
  body: &'a str,
}

#[derive(Serialize)]
struct DeadlineBody<'a> {
  access_token:    &'a str,
  plan_started_at: &'a str,
  deadline:        &'a str,
}

impl GiteeClient {
  pub fn new(config: GiteeConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  pub fn http(&self) -> &Client { &self.client }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
  }

  fn token(&self) -> [(&'static str, &str); 1] {
    [("access_token", self.config.robot_token.as_str())]
  }

  async fn set_state(&self, owner: &str, repo: &str, number: &str, state: &str) -> Result<()> {
    let url = self.url(&format!("/repos/{owner}/issues/{number}"));
    let body = StateChange { repo, state };
    send_with_retry("PATCH issue state", || {
      self.client.patch(&url).query(&self.token()).json(&body)
    })
    .await?;
    Ok(())
  }
}

#[async_trait]
impl HostingClient for GiteeClient {
  async fn get_bot(&self) -> Result<UserHook> {
    let url = self.url("/user");
    let resp =
      send_with_retry("GET /user", || self.client.get(&url).query(&self.token())).await?;
    Ok(resp.json().await?)
  }

  async fn get_issue(&self, org: &str, repo: &str, number: &str) -> Result<IssueHook> {
    let url = self.url(&format!("/repos/{org}/{repo}/issues/{number}"));
    let resp =
      send_with_retry("GET issue", || self.client.get(&url).query(&self.token())).await?;
    Ok(resp.json().await?)
  }

  async fn update_issue(
    &self,
    owner: &str,
    number: &str,
    update: &IssueUpdate,
  ) -> Result<()> {
    let url = self.url(&format!("/repos/{owner}/issues/{number}"));
    send_with_retry("PATCH issue", || {
      self.client.patch(&url).query(&self.token()).json(update)
    })
    .await?;
    Ok(())
  }

  async fn create_issue_comment(
    &self,
    org: &str,
    repo: &str,
    number: &str,
    body: &str,
  ) -> Result<()> {
    let url = self.url(&format!("/repos/{org}/{repo}/issues/{number}/comments"));
    let comment = NewComment { body };
    send_with_retry("POST issue comment", || {
      self.client.post(&url).query(&self.token()).json(&comment)
    })
    .await?;
    Ok(())
  }

  async fn list_issue_comments(
    &self,
    org: &str,
    repo: &str,
    number: &str,
  ) -> Result<Vec<Note>> {
    let url = self.url(&format!("/repos/{org}/{repo}/issues/{number}/comments"));
    let mut notes = Vec::new();

    for page in 1.. {
      let query = [
        ("page", page.to_string()),
        ("per_page", PER_PAGE.to_string()),
        ("order", "asc".to_owned()),
      ];
      let resp = send_with_retry("GET issue comments", || {
        self.client.get(&url).query(&self.token()).query(&query)
      })
      .await?;

      let batch: Vec<Note> = resp.json().await?;
      let done = batch.len() < PER_PAGE;
      notes.extend(batch);
      if done {
        break;
      }
    }

    Ok(notes)
  }

  async fn reopen_issue(&self, owner: &str, repo: &str, number: &str) -> Result<()> {
    self.set_state(owner, repo, number, "open").await
  }

  async fn close_issue(&self, owner: &str, repo: &str, number: &str) -> Result<()> {
    self.set_state(owner, repo, number, "closed").await
  }

  async fn list_issue_pull_requests(
    &self,
    org: &str,
    repo: &str,
    number: &str,
  ) -> Result<Vec<PullRequest>> {
    let url = self.url(&format!("/repos/{org}/issues/{number}/pull_requests"));
    let resp = send_with_retry("GET issue pull requests", || {
      self.client.get(&url).query(&self.token()).query(&[("repo", repo)])
    })
    .await?;
    Ok(resp.json().await?)
  }

  async fn update_issue_deadline(&self, issue_id: i64, deadline: &Deadline) -> Result<()> {
    let url = format!(
      "{}/enterprises/{}/issues/{issue_id}",
      self.config.enterprise_api_base.trim_end_matches('/'),
      self.config.enterprise_id,
    );
    let body = DeadlineBody {
      access_token:    &self.config.enterprise_token,
      plan_started_at: &deadline.plan_started_at,
      deadline:        &deadline.deadline,
    };
    send_with_retry("PUT issue deadline", || self.client.put(&url).json(&body)).await?;
    Ok(())
  }
}
