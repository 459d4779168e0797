//! Workflow tests against a recording hosting client and an in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use defect_core::{
  defect::{Defect, Issue},
  dp::{IssueStatus, SeverityLevel, SystemVersion},
  store::DefectStore,
};
use defect_gitee::{
  CommitterCache, Deadline, HostingClient, IssueUpdate,
  client::{PullRequest, PullRequestBase, PullRequestNamespace, PullRequestRepo},
  committer::{CommitterData, CommitterDetail},
  hook::{IssueEvent, IssueHook, LabelHook, Note, NoteEvent, ProjectHook, UserHook},
};
use defect_store_sqlite::SqliteStore;
use defect_template::template::analysis_feedback;

use crate::{EventHandler, config::fixtures::{MAINTAINED, config}};

const BOT: &str = "defect-bot";

// ─── Fake hosting client ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
  Update(IssueUpdate),
  Comment(String),
  Reopen,
  Deadline(i64, Deadline),
}

#[derive(Default)]
struct FakeHosting {
  comments: Mutex<Vec<Note>>,
  prs:      Mutex<Vec<PullRequest>>,
  calls:    Mutex<Vec<Call>>,
}

impl FakeHosting {
  fn with_comments(notes: Vec<Note>) -> Self {
    Self { comments: Mutex::new(notes), ..Self::default() }
  }

  fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

  fn posted(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Comment(body) => Some(body),
        _ => None,
      })
      .collect()
  }

  fn updates(&self) -> Vec<IssueUpdate> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Update(u) => Some(u),
        _ => None,
      })
      .collect()
  }

  fn labels(&self) -> Vec<String> {
    self.updates().into_iter().filter_map(|u| u.labels).collect()
  }

  fn reopened(&self) -> bool { self.calls().contains(&Call::Reopen) }

  fn record(&self, call: Call) { self.calls.lock().unwrap().push(call); }
}

#[async_trait]
impl HostingClient for FakeHosting {
  async fn get_bot(&self) -> defect_gitee::Result<UserHook> { Ok(user(BOT)) }

  async fn get_issue(&self, _: &str, _: &str, _: &str) -> defect_gitee::Result<IssueHook> {
    Ok(IssueHook::default())
  }

  async fn update_issue(
    &self,
    _: &str,
    _: &str,
    update: &IssueUpdate,
  ) -> defect_gitee::Result<()> {
    self.record(Call::Update(update.clone()));
    Ok(())
  }

  async fn create_issue_comment(
    &self,
    _: &str,
    _: &str,
    _: &str,
    body: &str,
  ) -> defect_gitee::Result<()> {
    self.record(Call::Comment(body.to_owned()));
    self.comments.lock().unwrap().push(note(BOT, body));
    Ok(())
  }

  async fn list_issue_comments(
    &self,
    _: &str,
    _: &str,
    _: &str,
  ) -> defect_gitee::Result<Vec<Note>> {
    Ok(self.comments.lock().unwrap().clone())
  }

  async fn reopen_issue(&self, _: &str, _: &str, _: &str) -> defect_gitee::Result<()> {
    self.record(Call::Reopen);
    Ok(())
  }

  async fn close_issue(&self, _: &str, _: &str, _: &str) -> defect_gitee::Result<()> {
    Ok(())
  }

  async fn list_issue_pull_requests(
    &self,
    _: &str,
    _: &str,
    _: &str,
  ) -> defect_gitee::Result<Vec<PullRequest>> {
    Ok(self.prs.lock().unwrap().clone())
  }

  async fn update_issue_deadline(
    &self,
    issue_id: i64,
    deadline: &Deadline,
  ) -> defect_gitee::Result<()> {
    self.record(Call::Deadline(issue_id, deadline.clone()));
    Ok(())
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn user(login: &str) -> UserHook {
  UserHook { login: login.into(), name: login.into(), user_name: login.into() }
}

fn note(author: &str, body: &str) -> Note { Note { id: 1, body: body.into(), user: user(author) } }

fn body(os: &str) -> String {
  format!(
    "**【缺陷描述】（必填）：请补充详细的缺陷问题现象描述**\n\
     系统启动时 内核崩溃\n\
     **一、缺陷信息**\n\
     **【缺陷所属的os版本】（必填，如openEuler-22.03-LTS）**\n\
     {os}\n\
     **【内核版本】（必填，如kernel-4.19）**\n\
     kernel-5.10.0-60.18.0\n\
     **【缺陷所属软件及版本号】（必填，如kernel-4.19）**\n\
     kernel-5.10.0\n\
     **【环境信息】**\n\
     x86_64\n\
     **【问题复现步骤】（必填）：请描述具体的操作步骤**\n\
     1. reboot\n\
     **【实际结果】**\n\
     panic\n"
  )
}

fn analysed_body() -> String { analysis_feedback(&body("openEuler-22.03-LTS"), &maintained()) }

fn maintained() -> Vec<String> { MAINTAINED.iter().map(|v| v.to_string()).collect() }

fn analysis(table: &str, severity: &str) -> String {
  format!(
    "影响性分析说明:\n调度器空指针导致系统崩溃\n\
     缺陷严重等级:(Critical/High/Moderate/Low)\n{severity}\n\
     缺陷根因说明:\n锁顺序错误\n\
     受影响版本排查(受影响/不受影响):\n{table}\n\
     abi变化(是/否):\n1. openEuler-22.03-LTS: 否\n2. openEuler-20.03-LTS-SP3: 否\n"
  )
}

const AFFECTED: &str = "1. openEuler-22.03-LTS: 受影响\n2. openEuler-20.03-LTS-SP3: 不受影响";
const UNAFFECTED: &str = "1. openEuler-22.03-LTS: 不受影响\n2. openEuler-20.03-LTS-SP3: 不受影响";

fn issue_hook(status: IssueStatus, body: &str) -> IssueHook {
  IssueHook {
    id:         9001,
    number:     "I1".into(),
    title:      "panic on boot".into(),
    body:       Some(body.into()),
    state:      String::new(),
    state_name: status.as_str().into(),
    type_name:  "缺陷".into(),
    labels:     vec![
      LabelHook { name: "sig/kernel".into() },
      LabelHook { name: "DEFECT/UNFIXED".into() },
    ],
    created_at: Some(DateTime::parse_from_rfc3339("2024-03-01T10:00:00+08:00").unwrap()),
    user:       Some(user("reporter")),
    assignee:   None,
  }
}

fn project() -> ProjectHook {
  ProjectHook {
    namespace:           "src-openeuler".into(),
    name:                "kernel".into(),
    path:                "kernel".into(),
    path_with_namespace: "src-openeuler/kernel".into(),
  }
}

fn issue_event(issue: IssueHook, sender: &str) -> IssueEvent {
  IssueEvent {
    action: Some("state_change".into()),
    issue,
    project: project(),
    sender: user(sender),
    assignee: None,
  }
}

fn note_event(issue: IssueHook, author: &str, body: &str) -> NoteEvent {
  NoteEvent {
    action:        Some("comment".into()),
    comment:       note(author, body),
    issue:         Some(issue),
    project:       project(),
    noteable_type: "Issue".into(),
    sender:        user(author),
  }
}

fn merged_pr(branch: &str) -> PullRequest {
  PullRequest {
    number: 3,
    state:  "merged".into(),
    base:   PullRequestBase {
      branch: branch.into(),
      repo:   PullRequestRepo {
        namespace: PullRequestNamespace { path: "src-openeuler".into() },
      },
    },
  }
}

fn owner() -> Issue {
  Issue {
    org:    "src-openeuler".into(),
    number: "I1".into(),
    repo:   "kernel".into(),
    title:  "panic on boot".into(),
    status: IssueStatus::Todo,
  }
}

fn versions(vs: &[&str]) -> std::collections::BTreeSet<SystemVersion> {
  vs.iter().map(|v| SystemVersion::new(*v).unwrap()).collect()
}

struct Harness {
  handler: EventHandler<SqliteStore>,
  hosting: Arc<FakeHosting>,
  store:   Arc<SqliteStore>,
}

async fn harness(hosting: FakeHosting) -> Harness {
  let hosting = Arc::new(hosting);
  let store = Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));

  let committers = CommitterCache::new();
  committers.insert_sig(&CommitterData {
    maintainers:       vec!["m1".into()],
    committer_details: vec![CommitterDetail {
      repo:     "src-openeuler/kernel".into(),
      gitee_id: vec!["c1".into()],
    }],
  });

  let handler = EventHandler::new(
    BOT,
    config(),
    hosting.clone(),
    Arc::new(committers),
    store.clone(),
  );
  Harness { handler, hosting, store }
}

impl Harness {
  async fn stored(&self) -> Option<Defect> { self.store.has_defect(&owner()).await.unwrap() }
}

// ─── Guards ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn other_issue_types_are_ignored() {
  let h = harness(FakeHosting::default()).await;
  let mut issue = issue_hook(IssueStatus::Todo, &body("openEuler-22.03-LTS"));
  issue.type_name = "需求".into();

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();
  assert!(h.hosting.calls().is_empty());
  assert!(h.stored().await.is_none());
}

#[tokio::test]
async fn develop_version_issues_are_ignored() {
  let h = harness(FakeHosting::default()).await;
  let issue = issue_hook(IssueStatus::Todo, &body("openEuler-24.09"));

  h.handler.handle_issue_event(&issue_event(issue.clone(), "alice")).await.unwrap();
  h.handler.handle_note_event(&note_event(issue, "alice", "/check-issue")).await.unwrap();
  assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn assign_events_are_ignored() {
  let h = harness(FakeHosting::default()).await;
  let mut e = issue_event(issue_hook(IssueStatus::Todo, &body("openEuler-22.03-LTS")), "alice");
  e.action = Some("assign".into());

  h.handler.handle_issue_event(&e).await.unwrap();
  assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn bot_and_closed_issue_comments_are_ignored() {
  let h = harness(FakeHosting::default()).await;
  let todo = issue_hook(IssueStatus::Todo, &analysed_body());
  let finished = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_note_event(&note_event(todo, BOT, "/check-issue")).await.unwrap();
  h.handler
    .handle_note_event(&note_event(finished, "alice", &analysis(AFFECTED, "High")))
    .await
    .unwrap();
  assert!(h.hosting.calls().is_empty());
}

// ─── Check-issue ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_issue_is_checked_and_recorded() {
  let h = harness(FakeHosting::default()).await;
  let issue = issue_hook(IssueStatus::Todo, &body("openEuler-22.03-LTS"));

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  let updates = h.hosting.updates();
  assert_eq!(updates[0].assignee.as_deref(), Some("c1"));
  assert!(updates[1].body.as_deref().is_some_and(|b| b.contains("二、缺陷分析结构反馈")));
  assert_eq!(h.hosting.labels(), ["sig/kernel,DEFECT/UNFIXED"]);

  let posted = h.hosting.posted();
  assert_eq!(posted.len(), 1);
  assert!(posted[0].contains("@m1 , @c1"));
  assert!(posted[0].contains("issue处理注意事项"));

  assert!(h.hosting.calls().contains(&Call::Deadline(
    9001,
    Deadline {
      plan_started_at: "2024-03-01T10:00:00".into(),
      deadline:        "2024-03-15T10:00:00".into(),
    },
  )));

  let stored = h.stored().await.unwrap();
  assert_eq!(stored.issue.status, IssueStatus::Todo);
  assert_eq!(stored.component, "kernel");
}

#[tokio::test]
async fn repeated_check_issue_posts_notice_once() {
  let h = harness(FakeHosting::default()).await;
  let mut issue = issue_hook(IssueStatus::Todo, &analysed_body());
  issue.assignee = Some(user("c1"));

  for _ in 0..2 {
    h.handler
      .handle_note_event(&note_event(issue.clone(), "alice", " /check-issue\n"))
      .await
      .unwrap();
  }

  assert_eq!(h.hosting.posted().len(), 1);
  // Assigned and already templated: only labels change.
  assert!(h.hosting.updates().iter().all(|u| u.body.is_none() && u.assignee.is_none()));
  assert_eq!(h.hosting.labels().len(), 2);
}

#[tokio::test]
async fn reopened_issue_keeps_stored_versions() {
  let h = harness(FakeHosting::default()).await;
  let mut stored = Defect::skeleton(owner());
  stored.affected_version = versions(&["openEuler-22.03-LTS"]);
  stored.fixed_version = versions(&["openEuler-22.03-LTS"]);
  stored.influence = "old analysis".into();
  h.store.add_defect(&stored).await.unwrap();

  let issue = issue_hook(IssueStatus::Todo, &analysed_body());
  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  let after = h.stored().await.unwrap();
  assert_eq!(after.affected_version, stored.affected_version);
  assert_eq!(after.fixed_version, stored.fixed_version);
  assert!(after.influence.is_empty());
  assert_eq!(after.created_at, stored.created_at);
}

// ─── Analysis comment ────────────────────────────────────────────────────────

#[tokio::test]
async fn analysis_comment_is_recorded_echoed_and_confirmed() {
  let h = harness(FakeHosting::default()).await;
  let issue = issue_hook(IssueStatus::Todo, &analysed_body());

  h.handler
    .handle_note_event(&note_event(issue, "alice", &analysis(AFFECTED, "High")))
    .await
    .unwrap();

  let stored = h.stored().await.unwrap();
  assert_eq!(stored.affected_version, versions(&["openEuler-22.03-LTS"]));
  assert!(stored.fixed_version.is_empty());
  assert_eq!(stored.severity_level, Some(SeverityLevel::High));
  assert_eq!(stored.root_cause, "锁顺序错误");
  assert_eq!(stored.system_version, Some(SystemVersion::new("openEuler-22.03-LTS").unwrap()));
  assert_eq!(stored.component_version, "5.10.0");

  let echo = h.hosting.updates()[0].body.clone().unwrap();
  assert!(echo.contains("openEuler-22.03-LTS:受影响"));
  assert_eq!(echo.matches("二、缺陷分析结构反馈").count(), 1);

  let posted = h.hosting.posted();
  assert_eq!(posted.len(), 1);
  assert!(posted[0].contains("@alice 经过defect-manager解析"));
}

#[tokio::test]
async fn confirmation_addresses_the_assignee() {
  let h = harness(FakeHosting::default()).await;
  let mut issue = issue_hook(IssueStatus::Repairing, &analysed_body());
  issue.assignee = Some(user("c1"));

  h.handler
    .handle_note_event(&note_event(issue, "alice", &analysis(AFFECTED, "Low")))
    .await
    .unwrap();

  assert!(h.hosting.posted()[0].contains("@c1 经过defect-manager解析"));
}

#[tokio::test]
async fn analysis_comment_keeps_fixed_versions() {
  let h = harness(FakeHosting::default()).await;
  let mut stored = Defect::skeleton(owner());
  stored.fixed_version = versions(&["openEuler-20.03-LTS-SP3"]);
  h.store.add_defect(&stored).await.unwrap();

  let issue = issue_hook(IssueStatus::Todo, &analysed_body());
  h.handler
    .handle_note_event(&note_event(issue, "alice", &analysis(AFFECTED, "High")))
    .await
    .unwrap();

  assert_eq!(h.stored().await.unwrap().fixed_version, stored.fixed_version);
}

#[tokio::test]
async fn incomplete_analysis_is_answered_not_saved() {
  let h = harness(FakeHosting::default()).await;
  let issue = issue_hook(IssueStatus::Todo, &analysed_body());

  h.handler
    .handle_note_event(&note_event(issue, "alice", &analysis("1. openEuler-22.03-LTS: 受影响", "High")))
    .await
    .unwrap();

  let posted = h.hosting.posted();
  assert_eq!(posted.len(), 1);
  assert!(posted[0].starts_with("@alice 请确认分支: openEuler-20.03-LTS-SP3"));
  assert!(h.hosting.updates().is_empty());
  assert!(h.stored().await.is_none());
}

// ─── Close workflow ──────────────────────────────────────────────────────────

#[tokio::test]
async fn closing_without_analysis_reopens() {
  let h = harness(FakeHosting::with_comments(vec![note(BOT, &analysis(AFFECTED, "High"))])).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(h.hosting.reopened());
  assert_eq!(h.hosting.posted(), ["@alice 未对受影响版本排查/abi变化进行分析，重新打开issue"]);
  assert!(h.stored().await.is_none());
}

#[tokio::test]
async fn closing_with_bad_analysis_reopens_with_errors() {
  let comments = vec![note("bob", &analysis(AFFECTED, "Severe"))];
  let h = harness(FakeHosting::with_comments(comments)).await;
  let issue = issue_hook(IssueStatus::Accepted, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(h.hosting.reopened());
  assert_eq!(h.hosting.posted(), ["@alice 缺陷严重等级=> 没有按正确格式填写"]);
}

#[tokio::test]
async fn closing_unaffected_issue_labels_it() {
  let comments = vec![note("bob", &analysis(UNAFFECTED, "Low"))];
  let h = harness(FakeHosting::with_comments(comments)).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(!h.hosting.reopened());
  assert_eq!(h.hosting.labels(), ["sig/kernel,DEFECT/UNAFFECTED"]);
  assert!(h.stored().await.is_none());
}

#[tokio::test]
async fn closing_with_merged_fix_marks_fixed() {
  let comments = vec![
    note("bob", &analysis(UNAFFECTED, "Low")),
    note("bob", &analysis(AFFECTED, "High")),
  ];
  let hosting = FakeHosting::with_comments(comments);
  hosting.prs.lock().unwrap().push(merged_pr("openEuler-22.03-LTS"));
  let h = harness(hosting).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(!h.hosting.reopened());
  assert_eq!(h.hosting.labels(), ["sig/kernel,DEFECT/FIXED"]);

  let stored = h.stored().await.unwrap();
  assert_eq!(stored.issue.status, IssueStatus::Finished);
  assert_eq!(stored.fixed_version, versions(&["openEuler-22.03-LTS"]));
  assert_eq!(stored.affected_version, versions(&["openEuler-22.03-LTS"]));
}

#[tokio::test]
async fn closing_is_idempotent() {
  let hosting = FakeHosting::with_comments(vec![note("bob", &analysis(AFFECTED, "High"))]);
  hosting.prs.lock().unwrap().push(merged_pr("openEuler-22.03-LTS"));
  let h = harness(hosting).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue.clone(), "alice")).await.unwrap();
  let first = h.stored().await.unwrap();
  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();
  let second = h.stored().await.unwrap();

  assert_eq!(first.fixed_version, second.fixed_version);
  assert_eq!(first.created_at, second.created_at);
  assert_eq!(h.hosting.labels(), ["sig/kernel,DEFECT/FIXED", "sig/kernel,DEFECT/FIXED"]);
}

#[tokio::test]
async fn closing_with_open_and_merged_prs_on_one_branch_marks_fixed() {
  let hosting = FakeHosting::with_comments(vec![note("bob", &analysis(AFFECTED, "High"))]);
  hosting.prs.lock().unwrap().extend([
    PullRequest { state: "open".into(), ..merged_pr("openEuler-22.03-LTS") },
    merged_pr("openEuler-22.03-LTS"),
  ]);
  let h = harness(hosting).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(!h.hosting.reopened());
  assert_eq!(h.hosting.labels(), ["sig/kernel,DEFECT/FIXED"]);
  let stored = h.stored().await.unwrap();
  assert_eq!(stored.fixed_version, versions(&["openEuler-22.03-LTS"]));
}

#[tokio::test]
async fn closing_without_merged_fix_reopens_but_records() {
  let hosting = FakeHosting::with_comments(vec![note("bob", &analysis(AFFECTED, "High"))]);
  hosting.prs.lock().unwrap().push(PullRequest {
    state: "open".into(),
    ..merged_pr("openEuler-22.03-LTS")
  });
  let h = harness(hosting).await;
  let issue = issue_hook(IssueStatus::Finished, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "alice")).await.unwrap();

  assert!(h.hosting.reopened());
  let posted = h.hosting.posted();
  assert!(posted[0].contains("受影响分支: openEuler-22.03-LTS"));
  assert!(posted[0].contains("#I1"));
  assert!(h.hosting.labels().is_empty());

  let stored = h.stored().await.unwrap();
  assert!(stored.fixed_version.is_empty());
  assert_eq!(stored.affected_version, versions(&["openEuler-22.03-LTS"]));
}

// ─── Reject workflow ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rejecting_with_reason_records_it() {
  let comments = vec![
    note("bob", "/reason duplicate of I0"),
    note(BOT, "/reason echoed by the bot"),
  ];
  let h = harness(FakeHosting::with_comments(comments)).await;
  let issue = issue_hook(IssueStatus::Cancelled, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "carol")).await.unwrap();

  assert!(!h.hosting.reopened());
  assert_eq!(h.hosting.labels(), ["sig/kernel"]);
  let posted = h.hosting.posted();
  assert_eq!(posted.len(), 2);
  assert!(posted[0].contains("|已取消|carol|duplicate of I0|"));
  assert!(posted[1].contains("@carol 当前issue状态为: 已取消"));
}

#[tokio::test]
async fn rejecting_without_reason_reopens() {
  let h = harness(FakeHosting::with_comments(vec![note("bob", "why /reason?")])).await;
  let issue = issue_hook(IssueStatus::Suspended, &analysed_body());

  h.handler.handle_issue_event(&issue_event(issue, "carol")).await.unwrap();

  assert!(h.hosting.reopened());
  let posted = h.hosting.posted();
  assert_eq!(posted.len(), 1);
  assert!(posted[0].contains("@carol"));
  assert!(posted[0].contains("/reason xxxxxx"));
}
