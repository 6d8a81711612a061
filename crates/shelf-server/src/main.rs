//! shelf-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, grants the configured bootstrap admins, starts the rate-limit
//! sweeper and the trending-decay scheduler, and serves the JSON API.
//!
//! # Issuing a token
//!
//! ```text
//! cargo run -p shelf-server -- --issue-token
//! ```
//!
//! prints a fresh bearer token and the `token_sha256` to put in `credentials`.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use shelf_server::{AppState, ServerConfig, auth};
use shelf_store_sqlite::SqliteStore;
use shelf_trust::jobs::shutdown_channel;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shelf trust-and-admission server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a new bearer token and its SHA-256 digest, then exit.
  #[arg(long)]
  issue_token: bool,
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

  if cli.issue_token {
    let (token, digest) = auth::issue_token();
    println!("token:        {token}");
    println!("token_sha256: {digest}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(shelf_server::config::environment())
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let decay_params = server_cfg.decay.params();
  if server_cfg.decay.enabled {
    decay_params.validate().context("invalid [decay] configuration")?;
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = AppState::new(Arc::new(store), server_cfg.clone());
  let granted = state
    .pipeline
    .claims
    .bootstrap(&server_cfg.bootstrap_admins)
    .await
    .context("failed to bootstrap admin claims")?;
  tracing::info!(
    granted,
    ip_rules = state.pipeline.ip_guard.rule_count(),
    credentials = server_cfg.credentials.len(),
    "trust pipeline ready"
  );

  // Background jobs.
  let (trigger, shutdown) = shutdown_channel();
  let mut tasks = vec![state.pipeline.limiter.spawn_sweeper(
    Duration::from_secs(server_cfg.sweep_interval_secs.max(1)),
    shutdown.clone(),
  )];
  if server_cfg.decay.enabled {
    let decay = state.pipeline.decay.clone();
    let every = Duration::from_secs(server_cfg.decay.interval_secs.max(1));
    let shutdown = shutdown.clone();
    tasks.push(tokio::spawn(async move {
      decay.run_scheduled(decay_params, every, shutdown).await
    }));
  }

  let app = shelf_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let mut server_shutdown = shutdown;
  tokio::spawn(trigger.trigger_on(tokio::signal::ctrl_c()));

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(async move { server_shutdown.wait().await })
    .await
    .context("server error")?;

  // Let an in-flight decay batch finish before exiting.
  for task in tasks {
    if let Err(e) = task.await {
      tracing::error!(error = %e, "background task panicked");
    }
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
