//! askdb server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `ASKDB_*` environment variables, opens the history store and the target
//! database, and serves the HTTP API.
//!
//! ```sh
//! ASKDB_JWT_SECRET=change-me askdb-server --config config.toml
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use askdb_openai::OpenAiClient;
use askdb_resolver::{DEFAULT_SYSTEM_PROMPT, SCHEMA_PLACEHOLDER};
use askdb_server::{AppState, ServerConfig};
use askdb_store_sqlite::{SqliteDatabase, SqliteStore};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "askdb HTTP server")]
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("ASKDB")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cors_origins"),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.jwt_secret.is_empty() {
    anyhow::bail!("jwt_secret is not set (config file or ASKDB_JWT_SECRET)");
  }

  let system_prompt = load_prompt(server_cfg.prompt_path.as_deref())?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let target_path = expand_tilde(&server_cfg.target_path);
  let database = SqliteDatabase::open(
    &target_path,
    server_cfg.target_read_only,
    server_cfg.query_limits(),
  )
  .await
  .with_context(|| format!("failed to open target database at {target_path:?}"))?;
  tracing::info!(
    path = ?target_path,
    read_only = server_cfg.target_read_only,
    "target database opened"
  );

  let model = OpenAiClient::new(server_cfg.llm());
  let resolver_cfg = server_cfg.resolver(system_prompt);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  let state = AppState::new(
    Arc::new(store),
    Arc::new(database),
    Arc::new(model),
    resolver_cfg,
    server_cfg,
  );
  let app = askdb_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// The configured prompt template, or the built-in one.
fn load_prompt(path: Option<&Path>) -> anyhow::Result<String> {
  let Some(path) = path else {
    return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
  };
  let path = expand_tilde(path);
  let template = std::fs::read_to_string(&path)
    .with_context(|| format!("failed to read prompt template {path:?}"))?;
  if !template.contains(SCHEMA_PLACEHOLDER) {
    tracing::warn!(
      path = ?path,
      "prompt template has no {SCHEMA_PLACEHOLDER} placeholder; schema only reaches the model via the tool"
    );
  }
  Ok(template)
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
