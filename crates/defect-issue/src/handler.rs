//! Webhook-driven issue workflow.
//!
//! Issue events dispatch on the issue's workflow state: a todo issue is
//! checked and gets its templates, a finished or accepted one must carry a
//! complete analysis and merged fixes, and a cancelled or suspended one must
//! carry a `/reason`. Comment events run `/check-issue` or record an
//! analysis. Every action is safe to replay.

use std::{collections::BTreeSet, fmt, sync::Arc};

use defect_core::{
  defect::{Defect, Issue},
  dp::{IssueStatus, SystemVersion},
  store::{DefectStore, upsert},
};
use defect_gitee::{
  CommitterCache, HostingClient, IssueUpdate,
  hook::{IssueEvent, IssueHook, NoteEvent, ProjectHook, UserHook},
};
use defect_template::{
  AnalysisComment, IssueBody, Parser, issue_os,
  template::{
    self, ANALYSIS_MARKER, CMD_CHECK, CMD_REASON, FIXED_LABEL, INFLUENCE_MARKER,
    NOTICE_MARKER, UNAFFECTED_LABEL, UNFIXED_LABEL,
  },
};

use crate::{
  Error, Result,
  config::IssueConfig,
  cross_check::{CrossCheck, cross_check},
  deadline::deadline,
};

/// The issue an event is about.
struct Target<'a> {
  org:    &'a str,
  repo:   &'a str,
  number: &'a str,
}

impl<'a> Target<'a> {
  fn of(project: &'a ProjectHook, issue: &'a IssueHook) -> Self {
    Self {
      org:    &project.namespace,
      repo:   &project.name,
      number: &issue.number,
    }
  }

  /// `org/repo`, the committer cache key.
  fn path(&self) -> String { format!("{}/{}", self.org, self.repo) }

  fn issue(&self, hook: &IssueHook, status: IssueStatus) -> Issue {
    Issue {
      org: self.org.to_owned(),
      number: self.number.to_owned(),
      repo: self.repo.to_owned(),
      title: hook.title.clone(),
      status,
    }
  }
}

impl fmt::Display for Target<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}#{}", self.org, self.repo, self.number)
  }
}

/// Reacts to issue and comment webhooks for one bot account.
pub struct EventHandler<S> {
  bot_name:   String,
  config:     IssueConfig,
  parser:     Parser,
  client:     Arc<dyn HostingClient>,
  committers: Arc<CommitterCache>,
  store:      Arc<S>,
}

impl<S: DefectStore> EventHandler<S> {
  pub fn new(
    bot_name: impl Into<String>,
    config: IssueConfig,
    client: Arc<dyn HostingClient>,
    committers: Arc<CommitterCache>,
    store: Arc<S>,
  ) -> Self {
    let parser = Parser::new(config.maintain_version.iter().cloned());
    Self {
      bot_name: bot_name.into(),
      config,
      parser,
      client,
      committers,
      store,
    }
  }

  pub fn bot_name(&self) -> &str { &self.bot_name }

  // ─── Entry points ──────────────────────────────────────────────────────────

  pub async fn handle_issue_event(&self, e: &IssueEvent) -> Result<()> {
    if !self.is_relevant(&e.issue) {
      return Ok(());
    }
    let Ok(status) = e.issue.state_name.parse::<IssueStatus>() else {
      tracing::debug!(state = %e.issue.state_name, "unknown issue state; ignored");
      return Ok(());
    };
    let target = Target::of(&e.project, &e.issue);

    match status {
      IssueStatus::Todo if !e.is_assign() => self.on_open(&target, e, status).await,
      s if s.is_closed() => self.on_closed(&target, e, status).await,
      s if s.is_rejected() => self.on_rejected(&target, e).await,
      _ => Ok(()),
    }
  }

  pub async fn handle_note_event(&self, e: &NoteEvent) -> Result<()> {
    let Some(issue) = e.issue() else {
      return Ok(());
    };
    if e.comment.user.login == self.bot_name || !self.is_relevant(issue) {
      return Ok(());
    }
    let Ok(status) = issue.state_name.parse::<IssueStatus>() else {
      return Ok(());
    };
    if matches!(
      status,
      IssueStatus::Finished | IssueStatus::Cancelled | IssueStatus::Suspended
    ) {
      return Ok(());
    }

    let target = Target::of(&e.project, issue);
    let body = e.comment.body.trim();

    if body == CMD_CHECK {
      return self.check_issue(&target, issue, issue.assignee.as_ref()).await;
    }
    if body.contains(INFLUENCE_MARKER) {
      return self.on_analysis(&target, e, issue, status).await;
    }
    Ok(())
  }

  /// Match the issue's linked pull requests against `declared`.
  pub async fn check_related_prs(
    &self,
    org: &str,
    repo: &str,
    number: &str,
    declared: &[String],
  ) -> Result<CrossCheck> {
    let prs = self.client.list_issue_pull_requests(org, repo, number).await?;
    Ok(cross_check(
      &prs,
      declared,
      self.parser.maintain_version(),
      &self.config.source_namespace,
    ))
  }

  /// Issue type matches and the issue is not filed against a develop version.
  fn is_relevant(&self, issue: &IssueHook) -> bool {
    issue.type_name == self.config.issue_type
      && !issue_os(issue.body()).is_some_and(|os| self.config.is_develop(&os))
  }

  // ─── Workflows ─────────────────────────────────────────────────────────────

  async fn on_open(
    &self,
    target: &Target<'_>,
    e: &IssueEvent,
    status: IssueStatus,
  ) -> Result<()> {
    let mut defect = Defect::skeleton(target.issue(&e.issue, status));
    if let Some(stored) = self.store.has_defect(&defect.issue).await.map_err(Error::store)? {
      defect.affected_version = stored.affected_version;
      defect.fixed_version = stored.fixed_version;
    }
    upsert(&*self.store, defect).await.map_err(Error::store)?;

    let assignee = e.issue.assignee.as_ref().or(e.assignee.as_ref());
    self.check_issue(target, &e.issue, assignee).await
  }

  async fn check_issue(
    &self,
    target: &Target<'_>,
    issue: &IssueHook,
    assignee: Option<&UserHook>,
  ) -> Result<()> {
    if assignee.is_none() {
      self.assign(target).await;
    }

    let body = issue.body();
    if !body.contains(ANALYSIS_MARKER) {
      let body = template::analysis_feedback(body, self.parser.maintain_version());
      self.update(target, IssueUpdate::new(target.repo).body(body)).await?;
    }

    let comments =
      self.client.list_issue_comments(target.org, target.repo, target.number).await?;
    if !comments.iter().any(|c| c.body.contains(NOTICE_MARKER)) {
      let path = target.path();
      let committers = self.committers.list_committer(&path);
      let first = template::first_comment(&path, self.parser.maintain_version(), &committers)?;
      self.comment(target, &first).await?;
    }

    self.relabel(target, issue, Some(UNFIXED_LABEL)).await?;

    match issue.created_at {
      Some(created_at) => {
        let due = deadline(created_at, self.config.policy_days(target.repo));
        self.client.update_issue_deadline(issue.id, &due).await?;
      }
      None => tracing::warn!(issue = %target, "issue has no creation time; deadline not set"),
    }
    Ok(())
  }

  async fn on_analysis(
    &self,
    target: &Target<'_>,
    e: &NoteEvent,
    issue: &IssueHook,
    status: IssueStatus,
  ) -> Result<()> {
    let commenter = e.comment.user.mention();
    let body = self.parse_body(target, commenter, issue.body());

    let analysis = match self.parser.parse_comment(Some(commenter), &e.comment.body) {
      Ok(analysis) => analysis,
      Err(errors) => return self.comment(target, &errors.to_string()).await,
    };

    // Fixed versions come from the pull-request check alone.
    let owner = target.issue(issue, status);
    let fixed = self
      .store
      .has_defect(&owner)
      .await
      .map_err(Error::store)?
      .map(|d| d.fixed_version)
      .unwrap_or_default();
    let defect = build_defect(owner, body.as_ref(), &analysis, fixed)?;
    upsert(&*self.store, defect).await.map_err(Error::store)?;

    match template::analysis_echo(issue.body(), &analysis) {
      Some(echo) => self.update(target, IssueUpdate::new(target.repo).body(echo)).await?,
      None => tracing::warn!(issue = %target, "no analysis section in body; echo skipped"),
    }

    let addressee = issue.assignee.as_ref().map_or(commenter, UserHook::mention);
    self.comment(target, &template::confirmation_table(addressee, &analysis)).await
  }

  async fn on_closed(
    &self,
    target: &Target<'_>,
    e: &IssueEvent,
    status: IssueStatus,
  ) -> Result<()> {
    let sender = e.sender.mention();
    let body = self.parse_body(target, sender, e.issue.body());

    let comments =
      self.client.list_issue_comments(target.org, target.repo, target.number).await?;
    let latest = comments
      .iter()
      .rev()
      .find(|c| c.user.login != self.bot_name && c.body.contains(INFLUENCE_MARKER));
    let Some(latest) = latest else {
      self.reopen(target).await?;
      return self.comment(target, &template::missing_analysis(sender)).await;
    };

    let analysis = match self.parser.parse_comment(Some(sender), &latest.body) {
      Ok(analysis) => analysis,
      Err(errors) => {
        self.reopen(target).await?;
        return self.comment(target, &errors.to_comment()).await;
      }
    };

    if analysis.affected_version().is_empty() {
      return self.relabel(target, &e.issue, Some(UNAFFECTED_LABEL)).await;
    }

    let check = self
      .check_related_prs(target.org, target.repo, target.number, analysis.affected_version())
      .await?;
    if !check.can_close() {
      self.reopen(target).await?;
      let text = template::reopen_comment(sender, target.number, &check.not_merged);
      self.comment(target, &text).await?;
    }

    let fixed = versions(&check.merged)?;
    let defect = build_defect(target.issue(&e.issue, status), body.as_ref(), &analysis, fixed)?;
    upsert(&*self.store, defect).await.map_err(Error::store)?;

    if check.can_close() {
      self.relabel(target, &e.issue, Some(FIXED_LABEL)).await?;
    }
    Ok(())
  }

  async fn on_rejected(&self, target: &Target<'_>, e: &IssueEvent) -> Result<()> {
    let state = e.issue.state_name.as_str();
    let sender = e.sender.mention();

    let comments =
      self.client.list_issue_comments(target.org, target.repo, target.number).await?;
    let reason = comments.iter().rev().find(|c| {
      c.user.login != self.bot_name && c.body.trim_start().starts_with(CMD_REASON)
    });

    match reason {
      Some(c) => {
        self.relabel(target, &e.issue, None).await?;
        let reason = c.body.replace(CMD_REASON, "");
        self.comment(target, &template::reject_table(state, sender, reason.trim())).await?;
        self.comment(target, &template::reject_reminder(sender, state)).await
      }
      None => {
        self.reopen(target).await?;
        self.comment(target, &template::suspend_tip(sender)).await
      }
    }
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  /// Set the repository's assigner. Failure leaves the issue unassigned.
  async fn assign(&self, target: &Target<'_>) {
    let Some(assigner) = self.committers.get_assigner(&target.path()) else {
      tracing::warn!(issue = %target, "no assigner known for repository");
      return;
    };
    if let Err(e) = self.update(target, IssueUpdate::new(target.repo).assignee(assigner)).await {
      tracing::error!(issue = %target, error = %e, "setting assignee failed");
    }
  }

  fn parse_body(&self, target: &Target<'_>, mention: &str, body: &str) -> Option<IssueBody> {
    self
      .parser
      .parse_issue(Some(mention), body)
      .inspect_err(|e| tracing::warn!(issue = %target, error = %e, "issue body does not parse"))
      .ok()
  }

  async fn update(&self, target: &Target<'_>, update: IssueUpdate) -> Result<()> {
    self.client.update_issue(target.org, target.number, &update).await?;
    Ok(())
  }

  async fn comment(&self, target: &Target<'_>, body: &str) -> Result<()> {
    self
      .client
      .create_issue_comment(target.org, target.repo, target.number, body)
      .await?;
    Ok(())
  }

  async fn reopen(&self, target: &Target<'_>) -> Result<()> {
    self.client.reopen_issue(target.org, target.repo, target.number).await?;
    tracing::info!(issue = %target, "reopened issue");
    Ok(())
  }

  async fn relabel(
    &self,
    target: &Target<'_>,
    issue: &IssueHook,
    add: Option<&str>,
  ) -> Result<()> {
    let labels = template::relabel(&issue.label_names(), add);
    self.update(target, IssueUpdate::new(target.repo).labels(labels)).await
  }
}

fn versions<'a>(names: impl IntoIterator<Item = &'a String>) -> Result<BTreeSet<SystemVersion>> {
  names
    .into_iter()
    .map(|v| SystemVersion::new(v.as_str()).map_err(Error::from))
    .collect()
}

/// The defect described by an analysed issue. The component is the
/// repository name, which is also the package name.
fn build_defect(
  issue: Issue,
  body: Option<&IssueBody>,
  analysis: &AnalysisComment,
  fixed_version: BTreeSet<SystemVersion>,
) -> Result<Defect> {
  let mut defect = Defect::skeleton(issue);

  if let Some(body) = body {
    defect.kernel = body.kernel.clone();
    defect.component_version = body.component_version.clone();
    defect.system_version = SystemVersion::new(body.os.as_str()).ok();
    defect.description = body.description.clone();
    defect.reference_url = body.reference_url.clone();
  }

  defect.influence = analysis.influence.clone();
  defect.severity_level = Some(analysis.severity_level);
  defect.root_cause = analysis.root_cause.clone();
  defect.affected_version = versions(analysis.affected_version())?;
  defect.fixed_version = fixed_version;
  defect.abi = analysis.abi_summary();

  Ok(defect)
}
