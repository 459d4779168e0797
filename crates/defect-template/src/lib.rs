//! Issue-template parsing and the text the defect bot writes back.
//!
//! Pure synchronous code: no HTTP, no storage. [`Parser`] turns an issue body
//! or an analysis comment into typed fields, or into [`ParseErrors`] worded
//! for the user who has to fix them. The [`template`] module renders every
//! body section, comment and label list the bot posts.
//!
//! ```no_run
//! use defect_template::Parser;
//!
//! let parser = Parser::new(["openEuler-22.03-LTS"]);
//! match parser.parse_comment(Some("alice"), "影响性分析说明: …") {
//!   Ok(analysis) => println!("affected: {:?}", analysis.affected_version()),
//!   Err(errors) => println!("{errors}"),
//! }
//! ```

pub mod error;
mod parse;
pub mod template;

pub use error::{Error, ParseErrors, Result};
pub use parse::{
  AnalysisComment, IssueBody, Parser, VersionTable, issue_os, strip_whitespace,
};
