//! [`SqliteStore`], the SQLite implementation of [`DefectStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use defect_core::{
  defect::{Defect, Issue},
  store::{DefectQuery, DefectStore},
};

use crate::{
  encode::{DEFECT_COLUMNS, RawDefect},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A defect store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DefectStore impl ────────────────────────────────────────────────────────

impl DefectStore for SqliteStore {
  type Error = Error;

  async fn has_defect(&self, issue: &Issue) -> Result<Option<Defect>> {
    let org    = issue.org.clone();
    let number = issue.number.clone();

    let raw: Option<RawDefect> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {DEFECT_COLUMNS} FROM defects WHERE org = ?1 AND number = ?2"
            ),
            rusqlite::params![org, number],
            RawDefect::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDefect::into_defect).transpose()
  }

  async fn add_defect(&self, defect: &Defect) -> Result<()> {
    let raw = RawDefect::from_defect(defect)?;
    let (org, number) = (raw.org.clone(), raw.number.clone());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO defects (
             org, number, repo, title, status, kernel, component,
             component_version, system_version, description, reference_url,
             guidance_url, influence, severity_level, root_cause,
             affected_version, fixed_version, unpublished_version, abi,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
          rusqlite::params![
            raw.org,
            raw.number,
            raw.repo,
            raw.title,
            raw.status,
            raw.kernel,
            raw.component,
            raw.component_version,
            raw.system_version,
            raw.description,
            raw.reference_url,
            raw.guidance_url,
            raw.influence,
            raw.severity_level,
            raw.root_cause,
            raw.affected_version,
            raw.fixed_version,
            raw.unpublished_version,
            raw.abi,
            raw.created_at,
            raw.updated_at,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::AlreadyExists { org, number });
    }
    Ok(())
  }

  async fn save_defect(&self, defect: &Defect) -> Result<()> {
    let raw = RawDefect::from_defect(defect)?;
    let (org, number) = (raw.org.clone(), raw.number.clone());

    let updated = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE defects SET
             repo = ?3, title = ?4, status = ?5, kernel = ?6, component = ?7,
             component_version = ?8, system_version = ?9, description = ?10,
             reference_url = ?11, guidance_url = ?12, influence = ?13,
             severity_level = ?14, root_cause = ?15, affected_version = ?16,
             fixed_version = ?17, unpublished_version = ?18, abi = ?19,
             created_at = ?20, updated_at = ?21
           WHERE org = ?1 AND number = ?2",
          rusqlite::params![
            raw.org,
            raw.number,
            raw.repo,
            raw.title,
            raw.status,
            raw.kernel,
            raw.component,
            raw.component_version,
            raw.system_version,
            raw.description,
            raw.reference_url,
            raw.guidance_url,
            raw.influence,
            raw.severity_level,
            raw.root_cause,
            raw.affected_version,
            raw.fixed_version,
            raw.unpublished_version,
            raw.abi,
            raw.created_at,
            raw.updated_at,
          ],
        )?;
        Ok(n)
      })
      .await?;

    if updated == 0 {
      return Err(Error::NotFound { org, number });
    }
    Ok(())
  }

  async fn find_defects(&self, query: &DefectQuery) -> Result<Vec<Defect>> {
    let mut sql = format!("SELECT {DEFECT_COLUMNS} FROM defects WHERE 1=1");
    let mut args: Vec<String> = Vec::new();

    if let Some(org) = &query.org {
      args.push(org.clone());
      sql.push_str(&format!(" AND org = ?{}", args.len()));
    }
    if !query.numbers.is_empty() {
      let start = args.len() + 1;
      let placeholders: Vec<String> = (start..start + query.numbers.len())
        .map(|i| format!("?{i}"))
        .collect();
      args.extend(query.numbers.iter().cloned());
      sql.push_str(&format!(" AND number IN ({})", placeholders.join(", ")));
    }
    if let Some(status) = query.status {
      args.push(status.as_str().to_owned());
      sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY created_at, org, number");

    let raws: Vec<RawDefect> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawDefect::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDefect::into_defect).collect()
  }
}
