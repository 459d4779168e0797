//! HTTP client of the CVE security-notice backend.

use std::time::Duration;

use async_trait::async_trait;
use defect_core::backend::{BackendError, CveBackend, PublishedDefect};
use defect_gitee::http::send_with_retry;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL up to and including the notice server prefix.
  pub endpoint: String,
}

/// `{code, result, msg}`; a non-zero code is a failure described by `msg`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
  #[serde(default)]
  code:   i64,
  result: Option<T>,
  #[serde(default)]
  msg:    String,
}

impl<T: Default> Envelope<T> {
  fn into_result(self) -> Result<T> {
    if self.code != 0 {
      return Err(Error::BackendStatus { code: self.code, msg: self.msg });
    }
    Ok(self.result.unwrap_or_default())
  }
}

pub struct HttpCveBackend {
  client:   Client,
  endpoint: String,
}

impl HttpCveBackend {
  pub fn new(config: &BackendConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(defect_gitee::Error::from)?;
    Ok(Self {
      client,
      endpoint: config.endpoint.trim_end_matches('/').to_owned(),
    })
  }

  async fn get<T: DeserializeOwned + Default>(
    &self,
    what: &str,
    path: &str,
    query: &[(&str, &str)],
  ) -> Result<T> {
    let url = format!("{}{path}", self.endpoint);
    let resp = send_with_retry(what, || self.client.get(&url).query(query)).await?;
    let body = resp.text().await.map_err(defect_gitee::Error::from)?;
    decode(&body)
  }
}

fn decode<T: DeserializeOwned + Default>(body: &str) -> Result<T> {
  let envelope: Envelope<T> =
    serde_json::from_str(body).map_err(|e| Error::Backend(Box::new(e)))?;
  envelope.into_result()
}

#[async_trait]
impl CveBackend for HttpCveBackend {
  async fn max_bulletin_id(&self) -> Result<String, BackendError> {
    let id = self
      .get::<String>(
        "GET max notice id",
        "/securitynotice/getMaxNoticeId",
        &[("notice_type", "bug")],
      )
      .await?;
    Ok(id)
  }

  async fn published_defects(&self) -> Result<Vec<PublishedDefect>, BackendError> {
    let published = self
      .get::<Vec<PublishedDefect>>("GET published bugs", "/securitynotice/getPublishedBugs", &[])
      .await?;
    Ok(published)
  }
}
