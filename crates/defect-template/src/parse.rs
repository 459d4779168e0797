//! Regex-driven extraction of issue bodies and analysis comments.
//!
//! Every field is matched by a regex with two groups, `(label)(payload)`.
//! The label wording is part of the issue template reporters fill in, so the
//! patterns below must keep it character for character.

use std::{collections::HashMap, sync::LazyLock};

use defect_core::dp::{SeverityLevel, Url};
use regex::Regex;

use crate::error::ParseErrors;

// ─── Fields ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
  Description,
  Os,
  Kernel,
  Components,
  ReproductionSteps,
  ReferenceUrl,
  Influence,
  SeverityLevel,
  RootCause,
  AffectedVersion,
  Abi,
}

impl Field {
  fn name(self) -> &'static str {
    match self {
      Self::Description => "缺陷描述",
      Self::Os => "缺陷所属的os版本",
      Self::Kernel => "内核版本",
      Self::Components => "缺陷所属软件及版本号",
      Self::ReproductionSteps => "问题复现步骤",
      Self::ReferenceUrl => "详情及分析指导参考链接",
      Self::Influence => "影响性分析说明",
      Self::SeverityLevel => "缺陷严重等级",
      Self::RootCause => "缺陷根因说明",
      Self::AffectedVersion => "受影响版本排查",
      Self::Abi => "abi变化",
    }
  }

  /// Free prose keeps its layout; everything else is compacted.
  fn keeps_whitespace(self) -> bool {
    matches!(self, Self::Description | Self::Influence)
  }

  fn format_error(self) -> String { format!("{}=> 没有按正确格式填写", self.name()) }

  fn empty_error(self) -> String { format!("{}=> 不允许为空", self.name()) }
}

type Items = Vec<(Field, Regex)>;

fn compile(items: &[(Field, &str)]) -> Items {
  items
    .iter()
    .map(|(field, pattern)| (*field, Regex::new(pattern).expect("static item regex")))
    .collect()
}

/// Issue body written with bold `**【…】**` section markers.
static BOLD_ISSUE_ITEMS: LazyLock<Items> = LazyLock::new(|| {
  compile(&[
    (
      Field::Description,
      r"(缺陷描述)[】][(（]必填[)）][:：]请补充详细的缺陷问题现象描述\*\*([\s\S]*?)\*\*一、缺陷信息",
    ),
    (
      Field::Os,
      r"(缺陷所属的os版本)[】][(（]必填，如openEuler-22.03-LTS[)）]\*\*([\s\S]*?)\*\*【内核版本",
    ),
    (
      Field::Kernel,
      r"(内核版本)[】][(（]必填，如kernel-4.19[)）]\*\*([\s\S]*?)\*\*【缺陷所属软件及版本号",
    ),
    (
      Field::Components,
      r"(缺陷所属软件及版本号)[】][(（]必填，如kernel-4.19[)）]\*\*([\s\S]*?)\*\*【环境信息",
    ),
    (
      Field::ReproductionSteps,
      r"(问题复现步骤)[】][(（]必填[)）][:：]请描述具体的操作步骤\*\*([\s\S]*?)\*\*【实际结果",
    ),
  ])
});

/// Issue body written with `### 【…】` headings.
static TITLED_ISSUE_ITEMS: LazyLock<Items> = LazyLock::new(|| {
  compile(&[
    (
      Field::Description,
      r"(缺陷描述)[】][(（]必填[)）][:：]请补充详细的缺陷问题现象描述([\s\S]*?)\*\*一、缺陷信息",
    ),
    (
      Field::Os,
      r"(缺陷所属的os版本)[】][(（]必填，如openEuler-22.03-LTS[)）]([\s\S]*?)### 【内核版本",
    ),
    (
      Field::Kernel,
      r"(内核版本)[】][(（]必填，如kernel-4.19[)）]([\s\S]*?)### 【缺陷所属软件及版本号",
    ),
    (
      Field::Components,
      r"(缺陷所属软件及版本号)[】][(（]必填，如kernel-4.19[)）]([\s\S]*?)\*\*【环境信息",
    ),
    (
      Field::ReproductionSteps,
      r"(问题复现步骤)[】][(（]必填[)）][:：]请描述具体的操作步骤([\s\S]*?)\*\*【实际结果",
    ),
  ])
});

static COMMENT_ITEMS: LazyLock<Items> = LazyLock::new(|| {
  compile(&[
    (Field::Influence, r"(影响性分析说明)[:：]([\s\S]*?)缺陷严重等级"),
    (
      Field::SeverityLevel,
      r"(缺陷严重等级)[:：]\(Critical/High/Moderate/Low\)([\s\S]*?)(?:缺陷根因说明|受影响版本排查)",
    ),
    (
      Field::AffectedVersion,
      r"(受影响版本排查)\(受影响/不受影响\)[:：]([\s\S]*?)abi变化",
    ),
    (Field::Abi, r"(abi变化)\(是/否\)[:：]([\s\S]*?)$"),
  ])
});

static ROOT_CAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(缺陷根因说明)[:：]([\s\S]*?)受影响版本排查").expect("static root cause regex")
});

static REFERENCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(详情及分析指导参考链接)】(?:\*\*)?([\s\S]*?)(?:\*\*|###|$)")
    .expect("static reference url regex")
});

static VERSION_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(openEuler[^:：\n]*?)[:：]\s*(不受影响|受影响|是|否)")
    .expect("static version row regex")
});

/// Remove every space, tab, CR and LF.
pub fn strip_whitespace(s: &str) -> String {
  s.chars().filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n')).collect()
}

/// The OS version named in an issue body, whitespace removed.
///
/// Used to recognise issues filed against develop versions before any
/// validation runs.
pub fn issue_os(body: &str) -> Option<String> {
  [&*BOLD_ISSUE_ITEMS, &*TITLED_ISSUE_ITEMS]
    .into_iter()
    .filter_map(|items| items.iter().find(|(field, _)| *field == Field::Os))
    .find_map(|(_, re)| re.captures(body).and_then(|c| c.get(2)))
    .map(|m| strip_whitespace(m.as_str()))
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Fields lifted from an issue body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueBody {
  pub description:       String,
  pub os:                String,
  pub kernel:            String,
  pub component:         String,
  pub component_version: String,
  pub reference_url:     Option<Url>,
}

/// A per-version verdict table (affectedness or ABI change).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTable {
  /// Every matched row as written, e.g. `openEuler-22.03-LTS:受影响`.
  pub rows:   Vec<String>,
  /// Versions whose verdict is `受影响` or `是`.
  pub marked: Vec<String>,
}

/// Fields lifted from an analysis comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisComment {
  pub influence:      String,
  pub severity_level: SeverityLevel,
  /// Empty when the comment carries no root cause.
  pub root_cause:     String,
  pub affected:       VersionTable,
  pub abi:            VersionTable,
}

impl AnalysisComment {
  pub fn affected_version(&self) -> &[String] { &self.affected.marked }

  /// Versions declaring an ABI change, comma-joined.
  pub fn abi_summary(&self) -> String { self.abi.marked.join(",") }
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Parses issue bodies and analysis comments against a maintained-version
/// list. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct Parser {
  maintain_version: Vec<String>,
}

impl Parser {
  pub fn new<I, S>(maintain_version: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      maintain_version: maintain_version.into_iter().map(Into::into).collect(),
    }
  }

  pub fn maintain_version(&self) -> &[String] { &self.maintain_version }

  pub fn is_maintained(&self, version: &str) -> bool {
    self.maintain_version.iter().any(|v| v == version)
  }

  /// Parse an issue body. `mention` is the user errors are addressed to.
  pub fn parse_issue(
    &self,
    mention: Option<&str>,
    body: &str,
  ) -> Result<IssueBody, ParseErrors> {
    let items = if body.contains("###") {
      &*TITLED_ISSUE_ITEMS
    } else {
      &*BOLD_ISSUE_ITEMS
    };

    let mut errors = ParseErrors::new(mention);
    let mut found = self.extract(items, body, &mut errors);

    let reference_url = match payload(&REFERENCE_URL_RE, body).map(strip_whitespace) {
      Some(url) if !url.is_empty() => match Url::new(url) {
        Ok(url) => Some(url),
        Err(_) => {
          errors.push(Field::ReferenceUrl.format_error());
          None
        }
      },
      _ => None,
    };

    errors.check()?;

    let (component, component_version) =
      split_component(&found.remove(&Field::Components).unwrap_or_default());

    Ok(IssueBody {
      description: found.remove(&Field::Description).unwrap_or_default(),
      os: found.remove(&Field::Os).unwrap_or_default(),
      kernel: found.remove(&Field::Kernel).unwrap_or_default(),
      component,
      component_version,
      reference_url,
    })
  }

  /// Parse an analysis comment.
  ///
  /// Field errors are collected first; the version tables are only examined
  /// once every field is present, and stop at their first problem.
  pub fn parse_comment(
    &self,
    mention: Option<&str>,
    body: &str,
  ) -> Result<AnalysisComment, ParseErrors> {
    let mut errors = ParseErrors::new(mention);
    let mut found = self.extract(&COMMENT_ITEMS, body, &mut errors);
    errors.check()?;

    let severity_level = found
      .get(&Field::SeverityLevel)
      .and_then(|s| s.parse::<SeverityLevel>().ok())
      .ok_or_else(|| ParseErrors::single(mention, Field::SeverityLevel.format_error()))?;

    let root_cause = payload(&ROOT_CAUSE_RE, body)
      .map(|s| s.trim().to_owned())
      .unwrap_or_default();

    let affected = self.parse_table(
      Field::AffectedVersion,
      &found.remove(&Field::AffectedVersion).unwrap_or_default(),
      mention,
    )?;
    let abi = self.parse_table(
      Field::Abi,
      &found.remove(&Field::Abi).unwrap_or_default(),
      mention,
    )?;

    Ok(AnalysisComment {
      influence: found.remove(&Field::Influence).unwrap_or_default(),
      severity_level,
      root_cause,
      affected,
      abi,
    })
  }

  fn extract(
    &self,
    items: &[(Field, Regex)],
    body: &str,
    errors: &mut ParseErrors,
  ) -> HashMap<Field, String> {
    let mut found = HashMap::new();

    for (field, re) in items {
      let Some(raw) = payload(re, body) else {
        errors.push(field.format_error());
        continue;
      };

      let compact = strip_whitespace(raw);
      if compact.is_empty() {
        errors.push(field.empty_error());
        continue;
      }

      let value = if field.keeps_whitespace() { raw.to_owned() } else { compact };
      if !self.is_valid(*field, &value) {
        errors.push(field.format_error());
      }
      found.insert(*field, value);
    }

    found
  }

  fn is_valid(&self, field: Field, value: &str) -> bool {
    match field {
      Field::SeverityLevel => value.parse::<SeverityLevel>().is_ok(),
      Field::Os => self.is_maintained(value),
      Field::Components => value.split('-').count() >= 2,
      _ => true,
    }
  }

  fn parse_table(
    &self,
    field: Field,
    text: &str,
    mention: Option<&str>,
  ) -> Result<VersionTable, ParseErrors> {
    let mut table = VersionTable::default();
    let mut declared: Vec<String> = Vec::new();

    for caps in VERSION_ROW_RE.captures_iter(text) {
      let version = row_version(&caps[1]);
      let verdict = &caps[2];

      table.rows.push(caps[0].to_owned());
      if matches!(verdict, "受影响" | "是") {
        table.marked.push(version.clone());
      }
      declared.push(version);
    }

    if table.rows.is_empty() {
      return Err(ParseErrors::single(mention, "请对受影响版本排查/abi变化进行分析"));
    }

    let missing: Vec<&str> = self
      .maintain_version
      .iter()
      .filter(|v| !declared.contains(v))
      .map(String::as_str)
      .collect();
    if !missing.is_empty() {
      return Err(ParseErrors::single(
        mention,
        format!(
          "请确认分支: {}.\n**请确认{}是否填写完整，否则将无法关闭当前issue.**",
          missing.join(","),
          field.name(),
        ),
      ));
    }

    Ok(table)
  }
}

fn payload<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
  re.captures(text).and_then(|c| c.get(2)).map(|m| m.as_str())
}

/// Version key of a table row. A key that swallowed a previous verdict keeps
/// only what follows it.
fn row_version(key: &str) -> String {
  let key = key.trim();
  match key.rfind("受影响") {
    Some(i) => key[i + "受影响".len()..].to_owned(),
    None => key.to_owned(),
  }
}

/// `foo-bar-1.2` → (`foo-bar`, `1.2`).
fn split_component(s: &str) -> (String, String) {
  match s.rsplit_once('-') {
    Some((name, version)) => (name.to_owned(), version.to_owned()),
    None => (s.to_owned(), String::new()),
  }
}
