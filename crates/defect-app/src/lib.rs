//! Defect persistence and bulletin publication.
//!
//! [`DefectService`] is the application layer the HTTP surface calls into.
//! The remaining modules are the production adapters for the ports declared
//! in `defect-core`: the CVE backend over HTTP, S3-compatible object storage,
//! the package-index product tree and the CVRF formatter.

pub mod backend;
pub mod dto;
pub mod error;
pub mod obs;
pub mod product_tree;
pub mod service;
pub mod xml;

pub use backend::{BackendConfig, HttpCveBackend};
pub use dto::CollectDefectsDto;
pub use error::{Error, Result};
pub use obs::{ObsConfig, S3ObjectStore};
pub use product_tree::{HttpProductTree, ProductTreeConfig};
pub use service::{DefectService, GenerateReport, Skipped};
pub use xml::CvrfFormatter;
