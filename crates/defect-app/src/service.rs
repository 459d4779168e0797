//! The defect service: persistence entry points for the issue workflows, the
//! collect-unpublished stage, and bulletin generation.

use std::{collections::HashMap, sync::Arc};

use chrono::{Datelike, Utc};
use defect_core::{
  backend::CveBackend,
  bulletin::{Bulletin, BulletinFormatter, BulletinSequence, group_by_component},
  defect::{Defect, Issue},
  obs::{ObjectStore, UPLOADED_INDEX},
  product_tree::ProductTreeResolver,
  store::{self, DefectQuery, DefectStore},
};
use tokio::sync::Mutex;

use crate::{Error, Result, dto::CollectDefectsDto};

/// A bulletin draft that was not uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
  /// Empty when no identifier could be allocated.
  pub identification: String,
  pub component:      String,
}

/// Outcome of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
  /// File names of the uploaded bulletins, in upload order.
  pub uploaded: Vec<String>,
  pub skipped:  Vec<Skipped>,
}

impl GenerateReport {
  fn skip(&mut self, bulletin: &Bulletin) {
    self.skipped.push(Skipped {
      identification: bulletin.identification.clone(),
      component:      bulletin.component.clone(),
    });
  }
}

pub struct DefectService<S> {
  store:        Arc<S>,
  backend:      Arc<dyn CveBackend>,
  product_tree: Arc<dyn ProductTreeResolver>,
  formatter:    Arc<dyn BulletinFormatter>,
  obs:          Arc<dyn ObjectStore>,
  /// Held for the length of a collect or generate run; the product-tree
  /// cache is not shared between runs.
  run_lock:     Mutex<()>,
}

impl<S: DefectStore> DefectService<S> {
  pub fn new(
    store: Arc<S>,
    backend: Arc<dyn CveBackend>,
    product_tree: Arc<dyn ProductTreeResolver>,
    formatter: Arc<dyn BulletinFormatter>,
    obs: Arc<dyn ObjectStore>,
  ) -> Self {
    Self { store, backend, product_tree, formatter, obs, run_lock: Mutex::new(()) }
  }

  pub async fn is_defect_exist(&self, issue: &Issue) -> Result<Option<Defect>> {
    self.store.has_defect(issue).await.map_err(Error::store)
  }

  /// Insert or overwrite the defect of `defect.issue`.
  pub async fn save_defect(&self, defect: Defect) -> Result<Defect> {
    store::upsert(self.store.as_ref(), defect).await.map_err(Error::store)
  }

  // ─── Collect ─────────────────────────────────────────────────────────────

  /// Defects fixed on `version` that still need a bulletin.
  ///
  /// Every examined defect has its `unpublished_version` rewritten, since
  /// bulletin generation reads it back from the store.
  pub async fn collect_defects(&self, version: &str) -> Result<Vec<CollectDefectsDto>> {
    let _run = self.run_lock.lock().await;

    let defects = self
      .store
      .find_defects(&DefectQuery::default())
      .await
      .map_err(Error::store)?;
    let fixed: Vec<Defect> = defects.into_iter().filter(|d| d.is_fixed_on(version)).collect();
    tracing::info!(%version, fixed = fixed.len(), "collecting unpublished defects");
    if fixed.is_empty() {
      return Ok(Vec::new());
    }

    self.product_tree.init_cache();
    let collected = self.collect_fixed(fixed, version).await;
    self.product_tree.clean_cache();
    collected
  }

  async fn collect_fixed(
    &self,
    fixed: Vec<Defect>,
    version: &str,
  ) -> Result<Vec<CollectDefectsDto>> {
    let mut shipped = Vec::with_capacity(fixed.len());
    for defect in fixed {
      let rpms = self
        .product_tree
        .parse_rpm(defect.updated_at, &defect.component, version)
        .await;
      if rpms.is_empty() {
        tracing::debug!(number = %defect.issue.number, %version, "no rpm, dropped");
        continue;
      }
      shipped.push(defect);
    }

    let published: HashMap<String, Vec<String>> = self
      .backend
      .published_defects()
      .await
      .map_err(Error::Backend)?
      .into_iter()
      .map(|p| (p.issue_num, p.versions))
      .collect();

    let mut dtos = Vec::new();
    for loaded in shipped {
      // Webhooks may have rewritten the row during the rpm lookups.
      let mut defect = self
        .store
        .has_defect(&loaded.issue)
        .await
        .map_err(Error::store)?
        .unwrap_or(loaded);
      let versions = published
        .get(&defect.issue.number)
        .map(Vec::as_slice)
        .unwrap_or_default();
      defect.mark_published(versions);
      self.store.save_defect(&defect).await.map_err(Error::store)?;

      if !defect.unpublished_version.is_empty() {
        dtos.push(CollectDefectsDto::from(&defect));
      }
    }
    Ok(dtos)
  }

  // ─── Generate ────────────────────────────────────────────────────────────

  pub async fn generate_bulletins(&self, numbers: Vec<String>) -> Result<GenerateReport> {
    self.generate_bulletins_at(numbers, Utc::now().year()).await
  }

  /// Generate and upload one bulletin per component for `numbers`, numbered
  /// within `year`.
  ///
  /// A draft that fails at any step is skipped and logged; the run goes on.
  /// The index of uploaded files is written last, and only when something
  /// was uploaded.
  pub async fn generate_bulletins_at(
    &self,
    numbers: Vec<String>,
    year: i32,
  ) -> Result<GenerateReport> {
    let _run = self.run_lock.lock().await;

    let defects = self
      .store
      .find_defects(&DefectQuery::numbers(numbers))
      .await
      .map_err(Error::store)?;
    let latest = self.backend.max_bulletin_id().await.map_err(Error::Backend)?;
    let mut sequence = BulletinSequence::resume(&latest, year)?;

    self.product_tree.init_cache();
    let report = self.generate(group_by_component(defects), &mut sequence).await;
    self.product_tree.clean_cache();

    if !report.uploaded.is_empty() {
      let index = report
        .uploaded
        .iter()
        .map(|file| format!("{}/{file}", sequence.year()))
        .collect::<Vec<_>>()
        .join("\n");
      self
        .obs
        .upload(UPLOADED_INDEX, index.into_bytes())
        .await
        .map_err(Error::Upload)?;
    }

    tracing::info!(
      uploaded = report.uploaded.len(),
      skipped = report.skipped.len(),
      "bulletin generation finished"
    );
    Ok(report)
  }

  async fn generate(
    &self,
    drafts: Vec<Bulletin>,
    sequence: &mut BulletinSequence,
  ) -> GenerateReport {
    let mut report = GenerateReport::default();
    let mut drafts = drafts.into_iter();

    while let Some(mut bulletin) = drafts.next() {
      bulletin.identification = match sequence.next_id() {
        Ok(id) => id,
        Err(e) => {
          tracing::error!(component = %bulletin.component, error = %e, "no bulletin id left");
          report.skip(&bulletin);
          for rest in drafts.by_ref() {
            report.skip(&rest);
          }
          break;
        }
      };

      let Some(first) = bulletin.defects.first() else {
        continue;
      };
      match self
        .product_tree
        .get_tree(first.created_at, &bulletin.component, &bulletin.unpublished_version)
        .await
      {
        Ok(tree) => bulletin.product_tree = tree,
        Err(e) => {
          tracing::error!(
            id = %bulletin.identification,
            component = %bulletin.component,
            error = %e,
            "product tree unavailable, bulletin skipped"
          );
          report.skip(&bulletin);
          continue;
        }
      }

      let xml = match self.formatter.format(&bulletin) {
        Ok(xml) => xml,
        Err(e) => {
          tracing::error!(
            id = %bulletin.identification,
            component = %bulletin.component,
            error = %e,
            "bulletin could not be rendered, skipped"
          );
          report.skip(&bulletin);
          continue;
        }
      };

      let file_name = bulletin.file_name();
      if let Err(e) = self.obs.upload(&file_name, xml).await {
        tracing::error!(
          id = %bulletin.identification,
          component = %bulletin.component,
          error = %e,
          "bulletin upload failed, skipped"
        );
        report.skip(&bulletin);
        continue;
      }

      tracing::info!(
        id = %bulletin.identification,
        component = %bulletin.component,
        "bulletin uploaded"
      );
      report.uploaded.push(file_name);
    }

    report
  }
}
