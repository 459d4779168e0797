//! HTTP surface of the defect manager.
//!
//! - `GET /v1/defect?version=..`: defects fixed on a version that still
//!   need a bulletin.
//! - `POST /v1/defect/bulletin`: generate bulletins in the background.
//! - `POST /webhook`: Gitee issue and comment hooks.

pub mod config;
pub mod error;
pub mod refresh;

pub use config::Config;
pub use error::ApiError;

use std::{future::Future, sync::Arc};

use axum::{
  Json, Router,
  body::Bytes,
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
  routing::{get, post},
};
use defect_app::{CollectDefectsDto, DefectService};
use defect_core::store::DefectStore;
use defect_gitee::hook::{ISSUE_HOOK, IssueEvent, NOTE_HOOK, NoteEvent};
use defect_issue::EventHandler;
use serde::{Deserialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;

/// Header carrying the webhook kind.
pub const EVENT_HEADER: &str = "X-Gitee-Event";

/// Answer to an accepted bulletin request.
pub const PROCESSING: &str = "Processing: Data is being prepared, please wait patiently\n";

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub service: Arc<DefectService<S>>,
  pub handler: Arc<EventHandler<S>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), handler: self.handler.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router<S>(state: AppState<S>) -> Router
where
  S: DefectStore + 'static,
{
  Router::new()
    .route("/v1/defect",          get(collect::<S>))
    .route("/v1/defect/bulletin", post(generate_bulletin::<S>))
    .route("/webhook",            post(webhook::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CollectQuery {
  version: Option<String>,
}

async fn collect<S: DefectStore + 'static>(
  State(state): State<AppState<S>>,
  Query(query): Query<CollectQuery>,
) -> Result<Json<Vec<CollectDefectsDto>>, ApiError> {
  let version = query
    .version
    .filter(|v| !v.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest("version is required".into()))?;
  Ok(Json(state.service.collect_defects(version.trim()).await?))
}

#[derive(Debug, Deserialize)]
struct BulletinRequest {
  #[serde(rename = "IssueNumber")]
  issue_number: Vec<String>,
}

async fn generate_bulletin<S: DefectStore + 'static>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
  let req: BulletinRequest = decode(&body)?;
  tracing::info!(numbers = ?req.issue_number, "bulletin generation requested");

  let service = state.service.clone();
  spawn_detached("bulletin generation", async move {
    match service.generate_bulletins(req.issue_number).await {
      Ok(report) => tracing::info!(
        uploaded = ?report.uploaded,
        skipped = report.skipped.len(),
        "bulletin generation done"
      ),
      Err(e) => tracing::error!(error = %e, "bulletin generation failed"),
    }
  });

  Ok((StatusCode::CREATED, PROCESSING))
}

/// Each delivery runs in its own task. A failure answers `500` so the
/// platform redelivers; a panic is logged and the delivery dropped.
async fn webhook<S: DefectStore + 'static>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<StatusCode, ApiError> {
  let kind = headers
    .get(EVENT_HEADER)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default();
  let handler = state.handler.clone();

  let task = match kind {
    ISSUE_HOOK => {
      let event: IssueEvent = decode(&body)?;
      tokio::spawn(async move { handler.handle_issue_event(&event).await })
    }
    NOTE_HOOK => {
      let event: NoteEvent = decode(&body)?;
      tokio::spawn(async move { handler.handle_note_event(&event).await })
    }
    other => {
      tracing::debug!(event = other, "webhook ignored");
      return Ok(StatusCode::OK);
    }
  };

  match task.await {
    Ok(Ok(())) => Ok(StatusCode::OK),
    Ok(Err(e)) => {
      tracing::error!(event = kind, error = %e, "webhook handling failed");
      Err(e.into())
    }
    Err(e) => {
      tracing::error!(event = kind, panicked = e.is_panic(), error = %e, "webhook task died");
      Ok(StatusCode::OK)
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Run `fut` in the background; a panic inside it is logged, not propagated.
fn spawn_detached<F>(what: &'static str, fut: F)
where
  F: Future<Output = ()> + Send + 'static,
{
  let task = tokio::spawn(fut);
  tokio::spawn(async move {
    if let Err(e) = task.await {
      tracing::error!(task = what, panicked = e.is_panic(), error = %e, "background task died");
    }
  });
}
