//! CVRF bulletin documents.
//!
//! One document per [`Bulletin`]: tracking data keyed by the bulletin
//! identification, document notes summarising the component, the product
//! tree split by version and architecture, and one `Vulnerability` per
//! defect.

use chrono::{NaiveDate, Utc};
use defect_core::{
  bulletin::{Bulletin, BulletinFormatter, FormatError},
  defect::Defect,
  dp::SeverityLevel,
};
use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{Error, Result};

const NS_CVRF: &str = "http://www.icasi.org/CVRF/schema/cvrf/1.1";
const NS_PROD: &str = "http://www.icasi.org/CVRF/schema/prod/1.1";
const NS_VULN: &str = "http://www.icasi.org/CVRF/schema/vuln/1.1";

const CONTACT: &str = "openeuler-security@openeuler.org";
const AUTHORITY: &str = "openEuler bug response team";
const ENGINE: &str = "openEuler BA Tool V1.0";
const BULLETIN_URL: &str = "https://www.openeuler.org/en/security/bug-bulletin/detail/?id=";

/// Renders bulletins as CVRF 1.1 XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct CvrfFormatter;

impl BulletinFormatter for CvrfFormatter {
  fn format(&self, bulletin: &Bulletin) -> Result<Vec<u8>, FormatError> {
    Ok(self.format_at(bulletin, Utc::now().date_naive())?)
  }
}

impl CvrfFormatter {
  /// Render `bulletin` as released on `date`.
  pub fn format_at(&self, bulletin: &Bulletin, date: NaiveDate) -> Result<Vec<u8>> {
    let date = date.format("%Y-%m-%d").to_string();
    let mut doc = Doc::new();

    doc.decl()?;
    doc.start_with("cvrfdoc", &[("xmlns", NS_CVRF), ("xmlns:cvrf", NS_CVRF)])?;

    doc.text_with(
      "DocumentTitle",
      &[("xml:lang", "en")],
      &format!("An update for {} is now available for {}", bulletin.component, versions(bulletin)),
    )?;
    doc.text("DocumentType", "Bug Advisory")?;

    doc.start_with("DocumentPublisher", &[("Type", "Vendor")])?;
    doc.text("ContactDetails", CONTACT)?;
    doc.text("IssuingAuthority", AUTHORITY)?;
    doc.end("DocumentPublisher")?;

    tracking(&mut doc, bulletin, &date)?;
    notes(&mut doc, bulletin)?;
    references(&mut doc, bulletin)?;
    product_tree(&mut doc, bulletin)?;
    for (ordinal, defect) in bulletin.defects.iter().enumerate() {
      vulnerability(&mut doc, bulletin, defect, ordinal + 1, &date)?;
    }

    doc.end("cvrfdoc")?;
    Ok(doc.finish())
  }
}

// ─── Sections ────────────────────────────────────────────────────────────────

fn tracking(doc: &mut Doc, bulletin: &Bulletin, date: &str) -> Result<()> {
  doc.start("DocumentTracking")?;
  doc.start("Identification")?;
  doc.text("ID", &bulletin.identification)?;
  doc.end("Identification")?;
  doc.text("Status", "Final")?;
  doc.text("Version", "1.0")?;

  doc.start("RevisionHistory")?;
  doc.start("Revision")?;
  doc.text("Number", "1.0")?;
  doc.text("Date", date)?;
  doc.text("Description", "Initial")?;
  doc.end("Revision")?;
  doc.end("RevisionHistory")?;

  doc.text("InitialReleaseDate", date)?;
  doc.text("CurrentReleaseDate", date)?;
  doc.start("Generator")?;
  doc.text("Engine", ENGINE)?;
  doc.text("Date", date)?;
  doc.end("Generator")?;
  doc.end("DocumentTracking")
}

fn notes(doc: &mut Doc, bulletin: &Bulletin) -> Result<()> {
  let component = &bulletin.component;
  let description = bulletin
    .defects
    .iter()
    .map(|d| d.description.trim())
    .filter(|d| !d.is_empty())
    .collect::<Vec<_>>()
    .join("\n");
  let influence = bulletin
    .defects
    .iter()
    .map(|d| d.influence.trim())
    .filter(|d| !d.is_empty())
    .collect::<Vec<_>>()
    .join("\n");

  let entries = [
    ("Synopsis", format!("{component} bugfix update")),
    (
      "Summary",
      format!("An update for {component} is now available for {}", versions(bulletin)),
    ),
    ("Description", description),
    ("Topic", influence),
    ("Severity", severity(bulletin).to_owned()),
    ("Affected Component", component.clone()),
  ];

  doc.start("DocumentNotes")?;
  for (ordinal, (title, body)) in entries.iter().enumerate() {
    let ordinal = (ordinal + 1).to_string();
    doc.text_with(
      "Note",
      &[
        ("Title", *title),
        ("Type", "General"),
        ("Ordinal", ordinal.as_str()),
        ("xml:lang", "en"),
      ],
      body,
    )?;
  }
  doc.end("DocumentNotes")
}

fn references(doc: &mut Doc, bulletin: &Bulletin) -> Result<()> {
  doc.start("DocumentReferences")?;

  doc.start_with("Reference", &[("Type", "Self")])?;
  doc.text("URL", &format!("{BULLETIN_URL}{}", bulletin.identification))?;
  doc.end("Reference")?;

  doc.start_with("Reference", &[("Type", "openEuler Bug")])?;
  for defect in &bulletin.defects {
    doc.text("URL", &issue_url(defect))?;
  }
  doc.end("Reference")?;

  doc.end("DocumentReferences")
}

fn product_tree(doc: &mut Doc, bulletin: &Bulletin) -> Result<()> {
  doc.start_with("ProductTree", &[("xmlns", NS_PROD)])?;

  doc.start_with("Branch", &[("Type", "Product Name"), ("Name", "openEuler")])?;
  for version in &bulletin.unpublished_version {
    doc.text_with(
      "FullProductName",
      &[("ProductID", version.as_str()), ("CPE", cpe(version.as_str()).as_str())],
      version.as_str(),
    )?;
  }
  doc.end("Branch")?;

  for branch in &bulletin.product_tree.branches {
    if branch.rpms.is_empty() {
      continue;
    }
    let cpe = cpe(branch.version.as_str());
    doc.start_with("Branch", &[("Type", "Package Arch"), ("Name", branch.arch.as_str())])?;
    for rpm in &branch.rpms {
      let id = rpm.strip_suffix(".rpm").unwrap_or(rpm);
      doc.text_with("FullProductName", &[("ProductID", id), ("CPE", cpe.as_str())], rpm)?;
    }
    doc.end("Branch")?;
  }

  doc.end("ProductTree")
}

fn vulnerability(
  doc: &mut Doc,
  bulletin: &Bulletin,
  defect: &Defect,
  ordinal: usize,
  date: &str,
) -> Result<()> {
  let ordinal = ordinal.to_string();
  doc.start_with("Vulnerability", &[("Ordinal", ordinal.as_str()), ("xmlns", NS_VULN)])?;

  doc.start("Notes")?;
  doc.text_with(
    "Note",
    &[
      ("Title", "Vulnerability Description"),
      ("Type", "General"),
      ("Ordinal", "1"),
      ("xml:lang", "en"),
    ],
    defect.description.trim(),
  )?;
  if !defect.root_cause.trim().is_empty() {
    doc.text_with(
      "Note",
      &[("Title", "Root Cause"), ("Type", "General"), ("Ordinal", "2"), ("xml:lang", "en")],
      defect.root_cause.trim(),
    )?;
  }
  doc.end("Notes")?;

  doc.text("ReleaseDate", date)?;
  doc.text("ID", &defect.issue.number)?;

  doc.start("Threats")?;
  doc.start_with("Threat", &[("Type", "Impact")])?;
  doc.text("Description", defect.severity_level.map_or("", SeverityLevel::as_str))?;
  doc.end("Threat")?;
  doc.end("Threats")?;

  // Only the versions this bulletin announces count as fixed here.
  doc.start("ProductStatuses")?;
  doc.start_with("Status", &[("Type", "Fixed")])?;
  for version in defect
    .unpublished_version
    .iter()
    .filter(|v| bulletin.unpublished_version.contains(*v))
  {
    doc.text("ProductID", version.as_str())?;
  }
  doc.end("Status")?;
  doc.end("ProductStatuses")?;

  doc.start("Remediations")?;
  doc.start_with("Remediation", &[("Type", "Vendor Fix")])?;
  doc.text("Description", &format!("{} bugfix update", bulletin.component))?;
  doc.text("DATE", date)?;
  doc.text("URL", &format!("{BULLETIN_URL}{}", bulletin.identification))?;
  doc.end("Remediation")?;
  doc.end("Remediations")?;

  doc.end("Vulnerability")
}

fn versions(bulletin: &Bulletin) -> String {
  bulletin
    .unpublished_version
    .iter()
    .map(|v| v.as_str())
    .collect::<Vec<_>>()
    .join(",")
}

/// The most severe level among the bulletin's defects.
fn severity(bulletin: &Bulletin) -> &'static str {
  bulletin
    .defects
    .iter()
    .filter_map(|d| d.severity_level)
    .max()
    .map_or("", SeverityLevel::as_str)
}

fn issue_url(defect: &Defect) -> String {
  format!(
    "https://gitee.com/{}/{}/issues/{}",
    defect.issue.org, defect.issue.repo, defect.issue.number
  )
}

/// `openEuler-22.03-LTS` becomes `cpe:/a:openEuler:openEuler:22.03-LTS`.
fn cpe(version: &str) -> String {
  let release = version.strip_prefix("openEuler-").unwrap_or(version);
  format!("cpe:/a:openEuler:openEuler:{release}")
}

// ─── Writer helpers ──────────────────────────────────────────────────────────

struct Doc {
  writer: Writer<Vec<u8>>,
}

impl Doc {
  fn new() -> Self { Self { writer: Writer::new_with_indent(Vec::new(), b' ', 2) } }

  fn event(&mut self, event: Event<'_>) -> Result<()> {
    self
      .writer
      .write_event(event)
      .map_err(|e| Error::Xml(e.to_string()))
  }

  fn decl(&mut self) -> Result<()> {
    self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
  }

  fn start(&mut self, tag: &str) -> Result<()> { self.start_with(tag, &[]) }

  fn start_with(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(tag);
    for attr in attrs {
      el.push_attribute(*attr);
    }
    self.event(Event::Start(el))
  }

  fn end(&mut self, tag: &str) -> Result<()> { self.event(Event::End(BytesEnd::new(tag))) }

  fn text(&mut self, tag: &str, text: &str) -> Result<()> { self.text_with(tag, &[], text) }

  fn text_with(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
    self.start_with(tag, attrs)?;
    self.event(Event::Text(BytesText::new(text)))?;
    self.end(tag)
  }

  fn finish(self) -> Vec<u8> { self.writer.into_inner() }
}
