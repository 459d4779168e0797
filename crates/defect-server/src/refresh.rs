//! Daily refresh of the committer cache.

use std::{sync::Arc, time::Duration};

use defect_gitee::{CommitterCache, CommitterConfig};
use reqwest::Client;
use tokio::task::JoinHandle;

/// How often the cache date is compared with today's.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Refresh `cache` now if it is stale, then re-check every
/// [`CHECK_INTERVAL`]. A failed refresh leaves the date unchanged, so the
/// next check retries.
pub fn spawn_committer_refresh(
  cache: Arc<CommitterCache>,
  http: Client,
  config: CommitterConfig,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(CHECK_INTERVAL);
    loop {
      ticker.tick().await;
      if !cache.needs_refresh() {
        continue;
      }
      if let Err(e) = cache.refresh(&http, &config).await {
        tracing::error!(error = %e, "committer cache refresh failed");
      }
    }
  })
}
