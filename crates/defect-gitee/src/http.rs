//! Retrying request helper.
//!
//! Transport failures and `5xx` answers are retried; anything else is final.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};

use crate::{Error, Result};

/// Attempts per request, first one included.
pub const ATTEMPTS: u32 = 3;

const PAUSE: Duration = Duration::from_millis(500);

/// Send the request produced by `build`, retrying up to [`ATTEMPTS`] times.
///
/// `what` names the call in logs and errors, e.g. `"GET /user"`. A non-2xx
/// answer that is not retried becomes [`Error::Status`].
pub async fn send_with_retry<F>(what: &str, build: F) -> Result<Response>
where
  F: Fn() -> RequestBuilder,
{
  let mut attempt = 1;
  loop {
    match build().send().await {
      Ok(resp) if resp.status().is_success() => return Ok(resp),
      Ok(resp) if resp.status().is_server_error() && attempt < ATTEMPTS => {
        tracing::warn!(what, status = %resp.status(), attempt, "retrying");
      }
      Ok(resp) => {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status { what: what.to_owned(), status, body });
      }
      Err(e) if attempt < ATTEMPTS => {
        tracing::warn!(what, error = %e, attempt, "retrying");
      }
      Err(e) => return Err(e.into()),
    }

    tokio::time::sleep(PAUSE * attempt).await;
    attempt += 1;
  }
}
