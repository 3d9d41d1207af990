//! FUNDBRIDGE: cross-venue funding-rate arbitrage monitor
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires venues, strategy and execution backends together, and runs the
//! monitor loop until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use fundbridge::config;
use fundbridge::dashboard::{self, DashboardState};
use fundbridge::engine::bridge::RemoteExecutionBridge;
use fundbridge::engine::local::PaperExecutor;
use fundbridge::engine::monitor::{shutdown_channel, MonitorLoop};
use fundbridge::engine::router::ExecutionRouter;
use fundbridge::engine::snapshot::VenueSnapshotSource;
use fundbridge::notify::TelegramNotifier;
use fundbridge::strategy::{OpportunityAnalyzer, StrategyValidator};
use fundbridge::venues;

const BANNER: &str = r#"
 ___ _   _ _  _ ___  ___ ___ ___ ___  ___ ___
| __| | | | \| |   \| _ ) _ \_ _|   \/ __| __|
| _|| |_| | .` | |) | _ \   /| || |) | (_ | _|
|_|  \___/|_|\_|___/|___/_|_\___|___/ \___|___|

  Funding-rate arbitrage monitor
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("FUNDBRIDGE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        symbols = ?cfg.venues.symbols,
        venues = ?cfg.venues.enabled(),
        notional = %cfg.analyzer.notional,
        engine = %cfg.bridge.endpoint,
        "FUNDBRIDGE starting up"
    );

    // -- Initialise components -------------------------------------------

    let connectors = venues::from_config(&cfg.venues)?;
    if connectors.is_empty() {
        warn!("No venues enabled; every cycle will fail to fetch");
    }
    let source = Arc::new(VenueSnapshotSource::new(
        connectors,
        cfg.venues.symbols.clone(),
    ));
    let live = source.connect_all().await;
    info!(live, "Venues connected");

    let remote = RemoteExecutionBridge::spawn(&cfg.bridge, cfg.analyzer.notional);
    if !remote.ensure_connected().await {
        // Not fatal: the bridge reconnects on the next remote dispatch.
        warn!(endpoint = %cfg.bridge.endpoint, "Remote engine not reachable at startup");
    }
    let local = Arc::new(PaperExecutor::new(&cfg.local));
    let router = ExecutionRouter::new(Arc::new(remote.clone()), local);

    let mut monitor = MonitorLoop::new(
        &cfg.monitor,
        source.clone(),
        OpportunityAnalyzer::new(cfg.analyzer.clone()),
        StrategyValidator::new(cfg.validator.clone()),
        router,
    );

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new());
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port)
            .await
            .context("Dashboard failed to start")?;
        monitor = monitor.with_dashboard(state);
    }

    if let Some(notifier) = TelegramNotifier::from_config(&cfg.notifier)? {
        if let Err(e) = notifier.check().await {
            warn!(error = %e, "Telegram check failed; alerts stay on");
        }
        monitor = monitor.with_notifier(Arc::new(notifier));
        info!("Telegram alerts enabled");
    }

    // -- Main loop -------------------------------------------------------

    let (trigger, token) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C; shutting down"),
        }
        trigger.trigger();
    });

    info!(
        interval_secs = cfg.monitor.interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );
    monitor.run(token).await;

    // -- Teardown --------------------------------------------------------

    remote.close().await;
    source.close_all().await;

    let stats = monitor.stats().snapshot();
    info!(
        cycles = stats.cycles_completed,
        failed_cycles = stats.cycles_failed,
        local = stats.local_executions,
        remote = stats.remote_executions,
        ratio = format!("{:.2}", stats.ratio),
        success_rate = format!("{:.1}%", stats.success_rate * rust_decimal_macros::dec!(100)),
        profit = format!("${:.2}", stats.total_profit),
        avg = format!("${:.2}", stats.avg_profit_per_execution),
        "FUNDBRIDGE shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fundbridge=info"));

    let json_logging = std::env::var("FUNDBRIDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
