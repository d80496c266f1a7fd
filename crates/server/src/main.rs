use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crosstag_core::{
    create_torrent_client, load_config, scan_directory, scan_file, validate_config, Config,
    GazelleClient, Injector, Tracker, TrackerLookups,
};
use crosstag_server::{api::create_router, state::AppState};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Regenerate torrents from one reciprocal tracker for the other.
#[derive(Debug, Parser)]
#[command(name = "crosstag", version, about)]
#[command(group = clap::ArgGroup::new("mode").required(true))]
struct Args {
    /// Configuration file (default: $CROSSTAG_CONFIG or ./config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Regenerate a single torrent file
    #[arg(short = 'i', long, value_name = "FILE", group = "mode")]
    input_file: Option<PathBuf>,

    /// Regenerate every torrent in a directory (default: paths.input_directory)
    #[arg(short = 'd', long, value_name = "DIR", group = "mode")]
    input_directory: Option<Option<PathBuf>>,

    /// Serve the webhook API
    #[arg(short = 's', long, group = "mode")]
    server: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("CROSSTAG_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    info!(path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    validate_config(&config).context("Configuration validation failed")?;

    let lookups = connect_trackers(&config).await?;
    let injector = connect_injector(&config).await?;
    let output_dir = config.paths.output_directory.clone();

    if let Some(path) = &args.input_file {
        return regenerate_file(path, &output_dir, &lookups, injector.as_ref()).await;
    }

    if let Some(dir) = args.input_directory {
        let dir = input_directory(dir, &config)?;
        let report = scan_directory(&dir, &output_dir, &lookups, injector.as_ref())
            .await
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        print!("{}", report);
        return Ok(());
    }

    let input_dir = input_directory(None, &config)?;
    serve(config, lookups, injector, input_dir).await
}

/// Connects both tracker APIs, resolving each account's announce URL.
async fn connect_trackers(config: &Config) -> Result<TrackerLookups> {
    let (red, ops) = tokio::try_join!(
        GazelleClient::connect(Tracker::Red, config.tracker(Tracker::Red)),
        GazelleClient::connect(Tracker::Ops, config.tracker(Tracker::Ops)),
    )
    .context("Failed to connect to tracker APIs")?;

    Ok(TrackerLookups::new(Arc::new(red), Arc::new(ops)))
}

async fn connect_injector(config: &Config) -> Result<Option<Injector>> {
    let Some(injection) = &config.injection else {
        info!("No torrent client configured, injection disabled");
        return Ok(None);
    };

    let client = create_torrent_client(injection).context("Failed to create torrent client")?;
    client
        .setup()
        .await
        .with_context(|| format!("Failed to connect to {}", client.name()))?;
    info!(client = client.name(), label = %injection.label, "Torrent client ready");

    Ok(Some(Injector::from_config(client, injection)))
}

fn input_directory(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match explicit.or_else(|| config.paths.input_directory.clone()) {
        Some(dir) => Ok(dir),
        None => bail!("No input directory given and paths.input_directory is not configured"),
    }
}

async fn regenerate_file(
    path: &Path,
    output_dir: &Path,
    lookups: &TrackerLookups,
    injector: Option<&Injector>,
) -> Result<()> {
    let generated = scan_file(path, output_dir, lookups, injector)
        .await
        .with_context(|| format!("Failed to regenerate {}", path.display()))?;

    if generated.already_existed {
        println!(
            "Torrent already exists in output directory at {}",
            generated.path.display()
        );
    } else {
        println!(
            "Found on {}; wrote {}",
            generated.tracker,
            generated.path.display()
        );
    }
    Ok(())
}

async fn serve(
    config: Config,
    lookups: TrackerLookups,
    injector: Option<Injector>,
    input_dir: PathBuf,
) -> Result<()> {
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, lookups, injector, input_dir));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
