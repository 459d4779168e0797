//! Object storage for generated bulletins.

use async_trait::async_trait;

/// Name of the index file listing every uploaded bulletin of a run.
pub const UPLOADED_INDEX: &str = "update_defect.txt";

pub type UploadError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Store `data` under `file_name`; see [`object_key`] for placement.
  async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<(), UploadError>;
}

/// Object key for `file_name`: the index sits at the directory root, every
/// other file under the year.
pub fn object_key(directory: &str, file_name: &str, year: i32) -> String {
  let directory = directory.trim_end_matches('/');
  if file_name == UPLOADED_INDEX {
    format!("{directory}/{file_name}")
  } else {
    format!("{directory}/{year}/{file_name}")
  }
}
