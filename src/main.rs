//! # Startup Intelligence Server Main Driver
//!
//! ## Purpose
//! Main entry point for the intelligence server. Loads configuration,
//! opens the cache store, wires the provider client, and starts the web
//! server.
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the cache store and build the cache orchestrators
//! 4. Connect the search provider client
//! 5. Start the web API server
//! 6. Handle shutdown signals gracefully

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use startup_intel::{
    api::ApiServer,
    cache::{open_store, CompetitorCache, NewsCache},
    config::Config,
    errors::{IntelError, Result},
    extraction::Extractor,
    provider::PerplexityClient,
    scheduler::RefreshScheduler,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("startup-intel-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cached competitor intelligence and market news service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("cleanup")
                .long("cleanup")
                .help("Delete expired cache rows and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = Config::from_file(config_path)?;

    // Override port if specified
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let config = Arc::new(config);

    init_logging(&config)?;

    info!("Starting Startup Intelligence Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path);

    // Initialize application components
    let app_state = initialize_components(config.clone())?;

    // One-shot maintenance mode
    if matches.get_flag("cleanup") {
        return run_cleanup(&app_state);
    }

    // Start the API server
    let server = ApiServer::new(app_state.clone());

    info!(
        "Startup Intelligence Server started on {}:{}",
        config.server.host, config.server.port
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
            warn!("Server stopped unexpectedly");
        }
    }

    app_state.store.health_check().ok();
    info!("Startup Intelligence Server shut down successfully");

    Ok(())
}

/// Initialize logging and tracing. Log level falls back to the
/// `STARTUP_INTEL_LOG` environment variable when set.
fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("STARTUP_INTEL_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .map_err(|_| IntelError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .json()
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_filter(filter),
            )
            .init();
    }

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Initialize all application components
fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing application components...");

    info!("Opening cache store at {:?}...", config.cache.db_path);
    let store = open_store(&config.cache.db_path)?;
    store.health_check()?;

    let news_cache = Arc::new(NewsCache::new(&store)?);
    let competitor_cache = Arc::new(CompetitorCache::new(&store)?);
    let scheduler = Arc::new(RefreshScheduler::new(
        competitor_cache.clone(),
        config.scheduler.clone(),
    ));

    info!("Connecting search provider client...");
    let provider: Arc<dyn startup_intel::provider::SearchProvider> =
        Arc::new(PerplexityClient::new(config.provider.clone())?);

    let extractor = Arc::new(Extractor::new()?);

    info!("All components initialized successfully");
    Ok(AppState {
        config,
        store,
        news_cache,
        competitor_cache,
        scheduler,
        provider,
        extractor,
    })
}

/// Delete expired rows from both caches and report the counts
fn run_cleanup(app_state: &AppState) -> Result<()> {
    let (articles, news_entries) = app_state.news_cache.cleanup_expired()?;
    let (profiles, competitor_entries) = app_state.competitor_cache.cleanup_expired()?;
    info!(
        articles,
        news_entries, profiles, competitor_entries, "cache cleanup complete"
    );
    Ok(())
}
