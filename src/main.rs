use anyhow::{Context, Result};
use clap::Arg;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use cms_tokens::config::{load_schemas, load_site_config, EngineSettings};
use cms_tokens::domain::SystemClock;
use cms_tokens::{create_router, AppState};

const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cms_tokens=debug".into()),
        )
        .init();

    let matches = clap::Command::new("cms-tokens")
        .about("Token resolution and modifier pipeline service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("Path to a YAML file with engine settings"),
        )
        .arg(
            Arg::new("schemas")
                .short('s')
                .long("schemas")
                .value_name("SCHEMAS")
                .help("Path to a YAML file containing collection schemas"),
        )
        .arg(
            Arg::new("site")
                .long("site")
                .value_name("SITE")
                .help("Path to a YAML file with public site settings"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("Address to listen on")
                .default_value(DEFAULT_BIND),
        )
        .get_matches();

    let settings = match matches.get_one::<String>("config") {
        Some(path) => EngineSettings::load(Path::new(path))?,
        None => EngineSettings::default(),
    };
    let schemas = match matches.get_one::<String>("schemas") {
        Some(path) => load_schemas(Path::new(path))?,
        None => Vec::new(),
    };
    let site_config = match matches.get_one::<String>("site") {
        Some(path) => load_site_config(Path::new(path))?,
        None => Default::default(),
    };
    let bind = matches
        .get_one::<String>("bind")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_BIND);

    tracing::info!(
        collections = schemas.len(),
        max_depth = settings.max_depth,
        "Loaded configuration"
    );

    let state = Arc::new(AppState::from_config(&settings, schemas, site_config, Arc::new(SystemClock)));
    let app = create_router(state);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Could not bind {}", bind))?;
    tracing::info!("Listening on {}", bind);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
