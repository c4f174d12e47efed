use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notifyhub_server::config;
use notifyhub_server::events::Broadcaster;
use notifyhub_server::notifications::NotificationStore;
use notifyhub_server::server::{run_server, ServerState};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Address to bind on.
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 9080)]
    pub port: u16,

    /// Seconds of feed-session idle time between heartbeat events.
    #[clap(long, default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Maximum number of notifications retained in the store.
    #[clap(long, default_value_t = 1000)]
    pub max_notifications: usize,

    /// Keep every notification instead of evicting the oldest.
    #[clap(long)]
    pub unbounded: bool,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            host: args.host.clone(),
            port: args.port,
            heartbeat_interval_secs: args.heartbeat_interval_secs,
            max_notifications: args.max_notifications,
            unbounded: args.unbounded,
            frontend_dir_path: args.frontend_dir_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  host: {}", app_config.host);
    info!("  port: {}", app_config.port);
    info!(
        "  max_notifications: {}",
        app_config
            .max_notifications
            .map(|max| max.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    info!(
        "  heartbeat_interval_secs: {}",
        app_config.heartbeat_interval_secs
    );

    let broadcaster = Arc::new(Broadcaster::new());
    let store = Arc::new(NotificationStore::new(
        app_config.max_notifications,
        broadcaster.clone(),
    ));
    let state = ServerState {
        store,
        broadcaster: broadcaster.clone(),
        heartbeat_interval_secs: app_config.heartbeat_interval_secs,
    };

    let shutdown_token = CancellationToken::new();

    info!("Ready to serve at port {}!", app_config.port);

    let result = tokio::select! {
        result = run_server(state, &app_config, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            Ok(())
        }
    };

    // Push the terminal event to every connected feed session before exit.
    broadcaster.shutdown();
    result
}
