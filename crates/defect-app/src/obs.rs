//! S3-compatible object store for bulletins.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use chrono::{Datelike, Utc};
use defect_core::obs::{ObjectStore, UploadError, object_key};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
  pub access_key: String,
  pub secret_key: String,
  pub endpoint:   String,
  pub bucket:     String,
  /// Key prefix every upload is placed under.
  pub directory:  String,
  #[serde(default = "default_region")]
  pub region:     String,
}

fn default_region() -> String { "cn-north-4".to_owned() }

pub struct S3ObjectStore {
  client:    Client,
  bucket:    String,
  directory: String,
}

impl S3ObjectStore {
  pub async fn new(config: &ObsConfig) -> Self {
    let credentials = Credentials::new(
      &config.access_key,
      &config.secret_key,
      None,
      None,
      "defect-manager",
    );
    let shared = aws_config::defaults(BehaviorVersion::latest())
      .region(Region::new(config.region.clone()))
      .endpoint_url(&config.endpoint)
      .credentials_provider(credentials)
      .load()
      .await;
    let s3 = aws_sdk_s3::config::Builder::from(&shared)
      .force_path_style(true)
      .build();

    Self {
      client:    Client::from_conf(s3),
      bucket:    config.bucket.clone(),
      directory: config.directory.clone(),
    }
  }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
  async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<(), UploadError> {
    let key = object_key(&self.directory, file_name, Utc::now().year());
    self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(&key)
      .body(ByteStream::from(data))
      .send()
      .await
      .map_err(|e| DisplayErrorContext(e).to_string())?;
    tracing::info!(bucket = %self.bucket, %key, "uploaded");
    Ok(())
  }
}
