//! The defect bot's issue workflow.
//!
//! [`EventHandler`] consumes decoded webhooks and drives the hosting client,
//! the committer cache and the defect store. [`cross_check`] and
//! [`deadline`] are the pure pieces it relies on.

pub mod config;
pub mod cross_check;
pub mod deadline;
pub mod error;
pub mod handler;

pub use config::{IssueConfig, PkgPolicy};
pub use cross_check::{CrossCheck, cross_check};
pub use error::{Error, Result};
pub use handler::EventHandler;

#[cfg(test)]
mod tests;
