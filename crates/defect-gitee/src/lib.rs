//! Gitee plumbing for the defect manager.
//!
//! - [`hook`]: webhook payloads as delivered by the platform.
//! - [`client`]: the [`HostingClient`] port and its REST implementation.
//! - [`committer`]: the repository → committers/assigner cache.
//! - [`http`]: retrying request helper shared by every outbound call.

pub mod client;
pub mod committer;
pub mod error;
pub mod hook;
pub mod http;

pub use client::{Deadline, GiteeClient, GiteeConfig, HostingClient, IssueUpdate};
pub use committer::{CommitterCache, CommitterConfig};
pub use error::{Error, Result};
