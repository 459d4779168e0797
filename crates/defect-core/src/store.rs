//! The `DefectStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `defect-store-sqlite`).
//! Higher layers (`defect-issue`, `defect-app`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::Utc;

use crate::{
  defect::{Defect, Issue},
  dp::IssueStatus,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`DefectStore::find_defects`]. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct DefectQuery {
  pub org:     Option<String>,
  /// Issue numbers; an empty list places no restriction.
  pub numbers: Vec<String>,
  pub status:  Option<IssueStatus>,
}

impl DefectQuery {
  pub fn numbers(numbers: impl IntoIterator<Item = String>) -> Self {
    Self { numbers: numbers.into_iter().collect(), ..Self::default() }
  }

  pub fn matches(&self, defect: &Defect) -> bool {
    self.org.as_ref().is_none_or(|org| *org == defect.issue.org)
      && (self.numbers.is_empty() || self.numbers.contains(&defect.issue.number))
      && self.status.is_none_or(|s| s == defect.issue.status)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a defect store backend.
///
/// Exactly one defect exists per `(org, number)`. `add_defect` inserts a new
/// record; `save_defect` overwrites an existing one.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DefectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the defect owned by `issue`. Returns `None` if absent.
  fn has_defect<'a>(
    &'a self,
    issue: &'a Issue,
  ) -> impl Future<Output = Result<Option<Defect>, Self::Error>> + Send + 'a;

  fn add_defect<'a>(
    &'a self,
    defect: &'a Defect,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn save_defect<'a>(
    &'a self,
    defect: &'a Defect,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn find_defects<'a>(
    &'a self,
    query: &'a DefectQuery,
  ) -> impl Future<Output = Result<Vec<Defect>, Self::Error>> + Send + 'a;
}

/// Insert `defect`, or overwrite the stored record for the same issue.
///
/// An existing record keeps its `created_at`, and its `component` and
/// `system_version` once they are set. Returns the record as persisted.
pub async fn upsert<S: DefectStore>(
  store: &S,
  mut defect: Defect,
) -> Result<Defect, S::Error> {
  defect.updated_at = Utc::now();

  match store.has_defect(&defect.issue).await? {
    Some(existing) => {
      defect.created_at = existing.created_at;
      if !existing.component.is_empty() {
        defect.component = existing.component;
      }
      if existing.system_version.is_some() {
        defect.system_version = existing.system_version;
      }
      store.save_defect(&defect).await?;
    }
    None => store.add_defect(&defect).await?,
  }

  Ok(defect)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{defect::Issue, dp::SystemVersion};

  fn defect(org: &str, number: &str, status: IssueStatus) -> Defect {
    Defect::skeleton(Issue {
      org:    org.into(),
      number: number.into(),
      repo:   "foo".into(),
      title:  String::new(),
      status,
    })
  }

  #[test]
  fn empty_query_matches_everything() {
    let q = DefectQuery::default();
    assert!(q.matches(&defect("a", "I1", IssueStatus::Todo)));
  }

  #[test]
  fn query_filters_on_every_field() {
    let q = DefectQuery {
      org:     Some("src-openeuler".into()),
      numbers: vec!["I1".into(), "I2".into()],
      status:  Some(IssueStatus::Finished),
    };
    assert!(q.matches(&defect("src-openeuler", "I2", IssueStatus::Finished)));
    assert!(!q.matches(&defect("openeuler", "I2", IssueStatus::Finished)));
    assert!(!q.matches(&defect("src-openeuler", "I3", IssueStatus::Finished)));
    assert!(!q.matches(&defect("src-openeuler", "I1", IssueStatus::Todo)));
  }

  #[test]
  fn numbers_constructor_leaves_other_filters_open() {
    let q = DefectQuery::numbers(["I9".to_string()]);
    assert!(q.org.is_none());
    assert!(q.status.is_none());
    let mut d = defect("x", "I9", IssueStatus::Accepted);
    d.system_version = Some(SystemVersion::new("openEuler-22.03-LTS").unwrap());
    assert!(q.matches(&d));
  }
}
