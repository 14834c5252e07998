mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use accounts::api::rest::{router, ApiState};
use accounts::domain::processor::AccountProcessor;
use accounts::infra::audit::LogAuditSink;
use accounts::infra::peers::RestPeerClient;
use accounts::infra::storage::migrations::Migrator;
use accounts::infra::storage::SeaOrmAccountRepository;
use accounts::infra::{federation, objectstore};
use accounts::tasks::DeletionSweeper;
use registry_auth::{ScopeAuthorizer, StaticAuthDriver};

use config::{AppConfig, AuthConfig};

/// Multi-tenant container image registry.
#[derive(Parser)]
#[command(name = "registry-server")]
#[command(about = "Multi-tenant container image registry - account management core")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(path) = &cli.config {
        if !path.is_file() {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        let host = config
            .server
            .listen
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host)
            .to_owned();
        config.server.listen = format!("{host}:{port}");
    }

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => {
            println!("configuration is valid");
            Ok(())
        }
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("registry server starting");

    let db = sea_orm::Database::connect(config.database.dsn.as_str())
        .await
        .context("failed to connect to the database")?;
    Migrator::up(&db, None)
        .await
        .context("failed to run database migrations")?;

    let repo = Arc::new(SeaOrmAccountRepository::new(db));
    let federation_driver = federation::driver_from_config(&config.federation);
    let storage_driver = objectstore::driver_from_config(&config.storage);
    let AuthConfig::Static { users } = config.auth.clone();
    let auth_driver = Arc::new(StaticAuthDriver::new(users));

    let authorizer = ScopeAuthorizer::new(
        auth_driver,
        config.server.auth_realm(),
        config.server.public_hostname.clone(),
    );
    let processor = AccountProcessor::new(
        Arc::clone(&repo),
        Arc::clone(&federation_driver),
        Arc::clone(&storage_driver),
        Arc::new(RestPeerClient::new(None)),
        Arc::new(LogAuditSink),
        config.accounts.deletion.clone(),
        config.server.public_hostname.clone(),
    );

    // Root cancellation token; OS signals funnel into it.
    let cancel = CancellationToken::new();
    let cancel_for_signals = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown signal received");
        cancel_for_signals.cancel();
    });

    let sweeper = DeletionSweeper::new(
        Arc::clone(&repo),
        federation_driver,
        storage_driver,
        config.accounts.deletion.clone(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(cancel.clone()));

    let state = Arc::new(ApiState {
        processor,
        authorizer,
    });
    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    tracing::info!(listen = %config.server.listen, "serving HTTP");

    let shutdown = cancel.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    let _ = sweeper_handle.await;
    tracing::info!("registry server stopped");
    Ok(())
}
