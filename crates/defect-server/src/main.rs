//! defect-manager server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! defect store, wires the Gitee client, the CVE backend, the product tree
//! resolver and the object store, and serves the HTTP API.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use defect_app::{CvrfFormatter, DefectService, HttpCveBackend, HttpProductTree, S3ObjectStore};
use defect_gitee::{CommitterCache, GiteeClient, HostingClient};
use defect_issue::EventHandler;
use defect_server::{AppState, Config, refresh::spawn_committer_refresh};
use defect_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "openEuler defect manager")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = Config::load(&cli.config).context("failed to read configuration")?;
  let problems = config.problems();
  if !problems.is_empty() {
    anyhow::bail!("invalid configuration: {}", problems.join("; "));
  }

  let store_path = config.store_path();
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Hosting platform and the committer cache behind the first comment.
  let gitee = GiteeClient::new(config.issue.gitee()).context("failed to build gitee client")?;
  let bot = gitee.get_bot().await.context("failed to look up the bot account")?;
  tracing::info!(bot = %bot.login, "acting as bot");

  let committers = Arc::new(CommitterCache::new());
  spawn_committer_refresh(committers.clone(), gitee.http().clone(), config.committer.clone());

  let handler = EventHandler::new(
    bot.login,
    config.issue.clone(),
    Arc::new(gitee),
    committers,
    store.clone(),
  );

  // Bulletin pipeline.
  let backend = HttpCveBackend::new(&config.backend).context("failed to build backend client")?;
  let product_tree = HttpProductTree::new(config.product_tree.clone())
    .context("failed to build product tree resolver")?;
  let obs = S3ObjectStore::new(&config.obs).await;
  let service = DefectService::new(
    store,
    Arc::new(backend),
    Arc::new(product_tree),
    Arc::new(CvrfFormatter),
    Arc::new(obs),
  );

  let state = AppState { service: Arc::new(service), handler: Arc::new(handler) };
  let app = defect_server::router(state);
  let address = format!("{}:{}", config.server.host, config.server.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
