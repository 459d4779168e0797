//! Error types for the template parser.

use std::fmt;

use thiserror::Error;

/// Field errors collected from one parse, addressed to one user.
///
/// Rendered as a single string: messages joined by `". "`, the first one
/// prefixed with `@<mention>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseErrors {
  mention:  Option<String>,
  messages: Vec<String>,
}

impl ParseErrors {
  pub fn new(mention: Option<&str>) -> Self {
    Self {
      mention:  mention.filter(|m| !m.is_empty()).map(str::to_owned),
      messages: Vec::new(),
    }
  }

  pub fn single(mention: Option<&str>, message: impl Into<String>) -> Self {
    let mut errors = Self::new(mention);
    errors.push(message);
    errors
  }

  pub fn push(&mut self, message: impl Into<String>) {
    self.messages.push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.messages.is_empty() }

  pub fn mention(&self) -> Option<&str> { self.mention.as_deref() }

  pub fn messages(&self) -> &[String] { &self.messages }

  /// `Ok(())` when nothing was collected.
  pub fn check(self) -> Result<(), Self> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }

  /// The form posted back to the issue: one paragraph per message.
  pub fn to_comment(&self) -> String { self.render("\n\n") }

  fn render(&self, separator: &str) -> String {
    let mut out = String::new();
    for (i, message) in self.messages.iter().enumerate() {
      if i == 0 {
        if let Some(mention) = &self.mention {
          out.push('@');
          out.push_str(mention);
          out.push(' ');
        }
      } else {
        out.push_str(separator);
      }
      out.push_str(message);
    }
    out
  }
}

impl fmt::Display for ParseErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.render(". "))
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Parse(#[from] ParseErrors),

  #[error("no committer is registered for {0}")]
  NoCommitters(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
