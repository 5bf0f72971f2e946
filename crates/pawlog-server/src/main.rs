//! pawlog-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `PAWLOG_*` environment variables, opens an in-process SQLite store,
//! optionally imports a JSONL seed file, and serves the JSON API over HTTP.
//!
//! # Token hash generation
//!
//! To generate the argon2 PHC string for a `[[tokens]]` entry:
//!
//! ```
//! cargo run -p pawlog-server -- --hash-token
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use pawlog_api::ApiState;
use pawlog_server::{ServerConfig, generation::HttpGenerator, identity, identity::TokenVerifier};
use pawlog_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pawlog API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a token entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a token and exit.
  if cli.hash_token {
    let token = read_stdin_line("Token: ")?;
    let hash = identity::hash_token(&token).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PAWLOG")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(seed) = &server_cfg.seed_path {
    let seed = expand_tilde(seed);
    let count = store
      .import_jsonl_file(&seed)
      .await
      .with_context(|| format!("failed to import seed file {seed:?}"))?;
    tracing::info!(count, path = ?seed, "seeded store");
  }

  let verifier =
    TokenVerifier::new(server_cfg.tokens.clone()).context("invalid `tokens` configuration")?;
  if verifier.is_empty() {
    tracing::warn!("no tokens configured; every chat request will be rejected");
  }
  let generator = HttpGenerator::new(server_cfg.generation.clone())
    .context("failed to build generation client")?;

  let state = Arc::new(ApiState::new(
    Arc::new(store),
    verifier,
    generator,
    server_cfg.context,
  ));

  let app = pawlog_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read one line from stdin after printing `prompt`.
fn read_stdin_line(prompt: &str) -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("{prompt}");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
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
