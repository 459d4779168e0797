//! Bulletin drafts and identifier allocation.
//!
//! A bulletin groups the defects of one component and covers the union of
//! their unpublished versions. Identifiers look like `openEuler-BA-2024-1000`
//! and are numbered per calendar year.

use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  defect::Defect,
  dp::SystemVersion,
  product_tree::ProductTree,
};

/// First sequence number assigned in a fresh year.
pub const FIRST_SEQUENCE: u32 = 1000;

/// Largest sequence number the identifier format can carry.
pub const MAX_SEQUENCE: u32 = 99_999;

static BULLETIN_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"openEuler-BA-(\d{4})-(\d{4,5})").expect("static bulletin id regex")
});

/// A security bulletin for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bulletin {
  /// Empty until a sequence number is allocated.
  pub identification:      String,
  pub component:           String,
  pub unpublished_version: BTreeSet<SystemVersion>,
  /// Contained defects, in fetch order.
  pub defects:             Vec<Defect>,
  pub product_tree:        ProductTree,
}

impl Bulletin {
  pub fn file_name(&self) -> String { format!("{}.xml", self.identification) }
}

pub type FormatError = Box<dyn std::error::Error + Send + Sync>;

/// Renders a bulletin into the document that gets uploaded.
pub trait BulletinFormatter: Send + Sync {
  fn format(&self, bulletin: &Bulletin) -> Result<Vec<u8>, FormatError>;
}

/// Group defects by component into bulletin drafts.
///
/// Drafts appear in order of each component's first defect. Defects without
/// unpublished versions have nothing to announce and are left out.
pub fn group_by_component(defects: Vec<Defect>) -> Vec<Bulletin> {
  let mut drafts: Vec<Bulletin> = Vec::new();

  for defect in defects {
    if defect.unpublished_version.is_empty() {
      tracing::debug!(
        number = %defect.issue.number,
        "defect has no unpublished version, not grouped"
      );
      continue;
    }

    match drafts.iter_mut().find(|b| b.component == defect.component) {
      Some(draft) => {
        draft
          .unpublished_version
          .extend(defect.unpublished_version.iter().cloned());
        draft.defects.push(defect);
      }
      None => drafts.push(Bulletin {
        identification:      String::new(),
        component:           defect.component.clone(),
        unpublished_version: defect.unpublished_version.clone(),
        defects:             vec![defect],
        product_tree:        ProductTree::default(),
      }),
    }
  }

  drafts
}

// ─── Identifier allocation ───────────────────────────────────────────────────

/// Monotonic allocator of bulletin identifiers within one generation run.
#[derive(Debug, Clone)]
pub struct BulletinSequence {
  year: i32,
  last: u32,
}

impl BulletinSequence {
  /// Resume from the latest identifier the CVE backend reports.
  ///
  /// An empty identifier, or one from another year, starts the year over so
  /// that the first allocated number is [`FIRST_SEQUENCE`].
  pub fn resume(latest: &str, year: i32) -> Result<Self> {
    let fresh = Self { year, last: FIRST_SEQUENCE - 1 };
    if latest.trim().is_empty() {
      return Ok(fresh);
    }

    let caps = BULLETIN_ID_RE
      .captures(latest)
      .ok_or_else(|| Error::InvalidBulletinId(latest.to_owned()))?;

    let stored_year: i32 = caps[1]
      .parse()
      .map_err(|_| Error::InvalidBulletinId(latest.to_owned()))?;
    if stored_year != year {
      return Ok(fresh);
    }

    let last: u32 = caps[2]
      .parse()
      .map_err(|_| Error::InvalidBulletinId(latest.to_owned()))?;
    Ok(Self { year, last })
  }

  /// Allocate the next identifier.
  pub fn next_id(&mut self) -> Result<String> {
    if self.last >= MAX_SEQUENCE {
      return Err(Error::SequenceExhausted(self.year));
    }
    self.last += 1;
    Ok(format!("openEuler-BA-{}-{}", self.year, self.last))
  }

  pub fn year(&self) -> i32 { self.year }
}
