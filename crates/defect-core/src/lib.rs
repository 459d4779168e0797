//! Core types and trait definitions for the defect manager.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the value objects, the `Defect` model, bulletin drafts, and the ports the
//! outer crates implement (storage, CVE backend, product tree, object store).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod backend;
pub mod bulletin;
pub mod defect;
pub mod dp;
pub mod error;
pub mod obs;
pub mod product_tree;
pub mod store;

pub use error::{Error, Result};
