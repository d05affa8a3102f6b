use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use remedy_core::IssueReport;
use remedy_engine::{PolicyCatalog, RemediationOrchestrator};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remedy_server::api::{AppState, router};
use remedy_server::config::{MaintenanceConfig, RemedyConfig};
use remedy_server::providers::{build_orchestrator, load_configured_policy};
use remedy_server::{ingest, telemetry};

/// Automated remediation decision engine.
#[derive(Parser, Debug)]
#[command(name = "remedy-server", about = "HTTP server for the Remedy remediation engine")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "remedy.toml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (the default).
    Serve,
    /// Validate the configuration and policy, then exit.
    Check,
    /// Handle each issue in a JSON-lines file and print the reports.
    Replay {
        /// File with one issue report per line.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = RemedyConfig::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry);
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Check => check(&config),
        Commands::Replay { file } => replay(&config, &file).await,
    }
}

async fn serve(config: RemedyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let (queue, dispatcher) = ingest::spawn(Arc::clone(&orchestrator), &config.ingest);

    let stop_maintenance = CancellationToken::new();
    let maintenance = spawn_maintenance(
        Arc::clone(&orchestrator),
        &config.maintenance,
        stop_maintenance.clone(),
    );

    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        ingest: queue,
        policy_path: config.policy.path.clone(),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "remedy-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stop_maintenance.cancel();
    if let Some(handle) = maintenance
        && let Err(e) = handle.await
    {
        warn!(error = %e, "maintenance task failed");
    }

    // Issues still waiting on approval keep the dispatcher busy until they
    // reach a decision or deadline.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for in-flight remediations..."
    );
    if tokio::time::timeout(shutdown_timeout, dispatcher.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, some remediations did not finish"
        );
    }

    info!("remedy-server shut down");
    Ok(())
}

fn spawn_maintenance(
    orchestrator: Arc<RemediationOrchestrator>,
    config: &MaintenanceConfig,
    stop: CancellationToken,
) -> Option<JoinHandle<()>> {
    if config.sweep_interval_seconds == 0 {
        info!("maintenance sweep disabled");
        return None;
    }
    let interval = Duration::from_secs(config.sweep_interval_seconds);
    let retention = Duration::from_secs(config.retention_seconds);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let report = orchestrator.sweep(retention);
                    debug!(?report, "maintenance sweep");
                }
            }
        }
    }))
}

fn check(config: &RemedyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let policy = load_configured_policy(config)?;
    let catalog = PolicyCatalog::from_config(&policy)?;
    for action in catalog.actions() {
        let target = if config.executors.actions.contains_key(&action.name) {
            "dedicated"
        } else {
            "default"
        };
        println!(
            "action {} severity={} enabled={} approval={} executor={target}",
            action.name, action.severity, action.enabled, action.requires_approval
        );
    }
    for channel in catalog.channels() {
        println!(
            "channel {} kind={:?} enabled={}",
            channel.name, channel.kind, channel.enabled
        );
    }
    println!(
        "ok: {} action(s), {} channel(s)",
        catalog.actions().len(),
        catalog.channels().len()
    );
    Ok(())
}

async fn replay(config: &RemedyConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = build_orchestrator(config).await?;
    let contents = tokio::fs::read_to_string(file).await?;
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let report: IssueReport = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {e}", file.display(), index + 1))?;
        let issue = report
            .into_issue()
            .map_err(|e| format!("{}:{}: {e}", file.display(), index + 1))?;
        let outcome = orchestrator.handle_issue(issue).await?;
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
