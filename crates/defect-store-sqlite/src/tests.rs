//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use defect_core::{
  defect::{Defect, Issue},
  dp::{IssueStatus, SeverityLevel, SystemVersion, Url},
  store::{DefectQuery, DefectStore, upsert},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn versions(vs: &[&str]) -> BTreeSet<SystemVersion> {
  vs.iter().map(|v| SystemVersion::new(*v).unwrap()).collect()
}

fn issue(number: &str, status: IssueStatus) -> Issue {
  Issue {
    org:    "src-openeuler".into(),
    number: number.into(),
    repo:   "kernel".into(),
    title:  "oops in scheduler".into(),
    status,
  }
}

fn analysed(number: &str) -> Defect {
  let mut d = Defect::skeleton(issue(number, IssueStatus::Finished));
  d.kernel = "5.10.0-60.18.0".into();
  d.component_version = "5.10.0".into();
  d.system_version = Some(SystemVersion::new("openEuler-22.03-LTS").unwrap());
  d.description = "  leading and trailing space survive  ".into();
  d.reference_url = Some(Url::new("https://gitee.com/openeuler/kernel/pulls/1").unwrap());
  d.influence = "crash".into();
  d.severity_level = Some(SeverityLevel::High);
  d.root_cause = "race".into();
  d.affected_version = versions(&["openEuler-22.03-LTS", "openEuler-20.03-LTS-SP3"]);
  d.fixed_version = versions(&["openEuler-22.03-LTS"]);
  d.unpublished_version = d.fixed_version.clone();
  d.abi = "openEuler-22.03-LTS".into();
  d
}

// ─── Add / has ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_has_defect() {
  let s = store().await;
  let d = analysed("I6A1");
  s.add_defect(&d).await.unwrap();

  let fetched = s.has_defect(&d.issue).await.unwrap().expect("stored");
  assert_eq!(fetched.issue, d.issue);
  assert_eq!(fetched.description, d.description);
  assert_eq!(fetched.severity_level, Some(SeverityLevel::High));
  assert_eq!(fetched.affected_version, d.affected_version);
  assert_eq!(fetched.fixed_version, d.fixed_version);
  assert_eq!(fetched.unpublished_version, d.unpublished_version);
  assert_eq!(fetched.reference_url, d.reference_url);
  assert!(fetched.guidance_url.is_none());
  assert_eq!(fetched.created_at, d.created_at);
}

#[tokio::test]
async fn has_defect_missing_returns_none() {
  let s = store().await;
  let found = s
    .has_defect(&issue("I404", IssueStatus::Todo))
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn has_defect_ignores_status_and_title() {
  let s = store().await;
  s.add_defect(&analysed("I1")).await.unwrap();

  let mut other = issue("I1", IssueStatus::Todo);
  other.title = "renamed".into();
  assert!(s.has_defect(&other).await.unwrap().is_some());
}

#[tokio::test]
async fn add_twice_is_rejected() {
  let s = store().await;
  let d = analysed("I1");
  s.add_defect(&d).await.unwrap();

  let err = s.add_defect(&d).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyExists { ref number, .. } if number == "I1"));
}

// ─── Save ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_overwrites_existing() {
  let s = store().await;
  let mut d = analysed("I1");
  s.add_defect(&d).await.unwrap();

  d.issue.status = IssueStatus::Accepted;
  d.unpublished_version.clear();
  s.save_defect(&d).await.unwrap();

  let fetched = s.has_defect(&d.issue).await.unwrap().unwrap();
  assert_eq!(fetched.issue.status, IssueStatus::Accepted);
  assert!(fetched.unpublished_version.is_empty());
}

#[tokio::test]
async fn save_missing_is_not_found() {
  let s = store().await;
  let err = s.save_defect(&analysed("I1")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

// ─── Find ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_by_numbers_and_status() {
  let s = store().await;
  let mut todo = Defect::skeleton(issue("I2", IssueStatus::Todo));
  todo.created_at = Utc::now() + Duration::seconds(5);
  s.add_defect(&analysed("I1")).await.unwrap();
  s.add_defect(&todo).await.unwrap();
  s.add_defect(&analysed("I3")).await.unwrap();

  let all = s.find_defects(&DefectQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);

  let picked = s
    .find_defects(&DefectQuery::numbers(["I1".to_string(), "I2".to_string()]))
    .await
    .unwrap();
  let numbers: Vec<&str> = picked.iter().map(|d| d.issue.number.as_str()).collect();
  assert_eq!(numbers, vec!["I1", "I2"]);

  let finished = s
    .find_defects(&DefectQuery {
      status: Some(IssueStatus::Finished),
      ..DefectQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(finished.len(), 2);
  assert!(finished.iter().all(|d| d.issue.status == IssueStatus::Finished));
}

#[tokio::test]
async fn find_with_org_filter() {
  let s = store().await;
  s.add_defect(&analysed("I1")).await.unwrap();

  let none = s
    .find_defects(&DefectQuery {
      org: Some("openeuler".into()),
      ..DefectQuery::default()
    })
    .await
    .unwrap();
  assert!(none.is_empty());
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_updates() {
  let s = store().await;
  let first = upsert(&s, Defect::skeleton(issue("I1", IssueStatus::Todo)))
    .await
    .unwrap();

  let mut next = analysed("I1");
  next.created_at = first.created_at + Duration::days(3);
  let saved = upsert(&s, next).await.unwrap();
  assert_eq!(saved.created_at, first.created_at);

  let all = s.find_defects(&DefectQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].issue.status, IssueStatus::Finished);
}

#[tokio::test]
async fn upsert_keeps_component_and_system_version_once_set() {
  let s = store().await;
  upsert(&s, analysed("I1")).await.unwrap();

  let mut later = analysed("I1");
  later.component = "renamed".into();
  later.system_version = Some(SystemVersion::new("openEuler-24.03-LTS").unwrap());
  later.influence = "data loss".into();
  let saved = upsert(&s, later).await.unwrap();

  assert_eq!(saved.component, "kernel");
  assert_eq!(saved.system_version.unwrap().as_str(), "openEuler-22.03-LTS");
  assert_eq!(saved.influence, "data loss");
}
