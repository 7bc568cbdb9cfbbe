//! locator-gateway — HTTP gateway for the locator app.
//!
//! Startup: merge config (defaults → YAML file → explicit CLI flags) →
//! validate → build the mesh/upload/alert/geocoder clients → serve the
//! router. All business logic lives downstream; this process only
//! translates HTTP calls into mesh dispatches.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches, Parser};

use locator_gateway::alerts::SlackAlerts;
use locator_gateway::api::{self, AppState};
use locator_gateway::config::Config;
use locator_gateway::fileserve::FileServe;
use locator_gateway::geocode::Geocoder;
use locator_gateway::mesh::HttpMesh;

#[derive(Parser)]
#[command(name = "locator-gateway", version, about = "HTTP gateway for the locator app")]
struct Cli {
    /// Path to YAML config file (default: ./gateway.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listen port
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Mesh dispatch endpoint (patterns are POSTed here as JSON)
    #[arg(long, default_value = "http://127.0.0.1:9000/act")]
    mesh_url: String,

    /// Upload service base URL
    #[arg(long, default_value = "http://127.0.0.1:3453")]
    fileserve_url: String,

    /// Secret for the session cookie MAC (at least 32 bytes)
    #[arg(long)]
    cookie_secret: Option<String>,

    /// Team chat webhook for informational posts
    #[arg(long)]
    slack_webhook_url: Option<String>,

    /// Team chat webhook for error posts
    #[arg(long)]
    slack_error_webhook_url: Option<String>,

    /// Place lookup service base URL
    #[arg(long)]
    geocoder_url: Option<String>,

    /// Place lookup service API key
    #[arg(long)]
    geocoder_key: Option<String>,

    /// Deadline for a single outbound call, in seconds
    #[arg(long)]
    mesh_timeout_secs: Option<u64>,

    /// Mount the development routes (never in production)
    #[arg(long)]
    dev_routes: bool,

    /// Generate a default gateway.yaml and exit
    #[arg(long)]
    init_config: bool,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("./gateway.yaml")
}

/// Build the final Config by merging: defaults -> YAML file -> CLI overrides.
fn build_config(cli: &Cli, matches: &clap::ArgMatches) -> anyhow::Result<Config> {
    use clap::parser::ValueSource;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = match Config::load_from_file(&config_path)? {
        Some(file_config) => {
            tracing::info!(path = %config_path.display(), "loaded config file");
            file_config
        }
        None => {
            tracing::debug!(path = %config_path.display(), "no config file found, using defaults");
            Config::default()
        }
    };

    // Only apply CLI values the user explicitly passed.
    if matches.value_source("port") == Some(ValueSource::CommandLine) {
        config.port = cli.port;
    }
    if matches.value_source("mesh_url") == Some(ValueSource::CommandLine) {
        config.mesh_url = cli.mesh_url.clone();
    }
    if matches.value_source("fileserve_url") == Some(ValueSource::CommandLine) {
        config.fileserve_url = cli.fileserve_url.clone();
    }
    if let Some(secret) = &cli.cookie_secret {
        config.cookie_secret = secret.clone();
    }
    if let Some(url) = &cli.slack_webhook_url {
        config.slack_webhook_url = Some(url.clone());
    }
    if let Some(url) = &cli.slack_error_webhook_url {
        config.slack_error_webhook_url = Some(url.clone());
    }
    if let Some(url) = &cli.geocoder_url {
        config.geocoder_url = Some(url.clone());
    }
    if let Some(key) = &cli.geocoder_key {
        config.geocoder_key = Some(key.clone());
    }
    if let Some(secs) = cli.mesh_timeout_secs {
        config.mesh_timeout_secs = secs;
    }
    if cli.dev_routes {
        config.dev_routes = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "locator_gateway=info".into()),
        )
        .init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    if cli.init_config {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        Config::write_default_config(&path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = build_config(&cli, &matches)?;
    config.validate()?;

    let timeout = config.mesh_timeout_secs;
    let state = AppState {
        mesh: Arc::new(HttpMesh::new(config.mesh_url.clone(), timeout)),
        alerts: Arc::new(SlackAlerts::new(
            config.slack_webhook_url.clone(),
            config.slack_error_webhook_url.clone(),
            timeout,
        )),
        geocoder: Arc::new(Geocoder::new(
            config.geocoder_url.clone(),
            config.geocoder_key.clone(),
            timeout,
        )),
        fileserve: Arc::new(FileServe::new(config.fileserve_url.clone(), timeout)),
        config: Arc::new(config.clone()),
    };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, mesh = %config.mesh_url, "locator-gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
