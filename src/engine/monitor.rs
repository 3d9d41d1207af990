//! Monitor loop: drives fetch → analyze → validate → dispatch on a timer.
//!
//! One task owns the loop together with its strategy history and stats.
//! Candidates are dispatched one at a time, so stats for one strategy are
//! applied before the next is sent. A failed cycle is logged and followed by
//! the backoff interval instead of the normal one.
//!
//! Shutdown goes through a [`ShutdownToken`]: the cycle in flight runs to
//! completion, the sleep is cut short, and no further cycle starts.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::router::ExecutionRouter;
use super::snapshot::FundingSnapshotSource;
use super::stats::{CycleReport, StatsAggregator};
use crate::config::MonitorConfig;
use crate::dashboard::AppState;
use crate::notify::TelegramNotifier;
use crate::strategy::{OpportunityAnalyzer, StrategyHistory, StrategyValidator};
use crate::types::{ArbError, ExecutionClass};

// ---------------------------------------------------------------------------
// Shutdown signalling
// ---------------------------------------------------------------------------

/// Create a linked shutdown trigger and token.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownToken { rx })
}

/// Sending half; `trigger` is idempotent.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered. Never resolves if the trigger
    /// is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Running => write!(f, "RUNNING"),
            LoopState::Stopped => write!(f, "STOPPED"),
        }
    }
}

pub struct MonitorLoop {
    source: Arc<dyn FundingSnapshotSource>,
    analyzer: OpportunityAnalyzer,
    validator: StrategyValidator,
    router: ExecutionRouter,
    history: StrategyHistory,
    stats: StatsAggregator,
    interval: Duration,
    backoff: Duration,
    dashboard: Option<AppState>,
    notifier: Option<Arc<TelegramNotifier>>,
    state: LoopState,
    cycle_count: u64,
}

impl MonitorLoop {
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn FundingSnapshotSource>,
        analyzer: OpportunityAnalyzer,
        validator: StrategyValidator,
        router: ExecutionRouter,
    ) -> Self {
        Self {
            source,
            analyzer,
            validator,
            router,
            history: StrategyHistory::with_limit(config.history_limit),
            stats: StatsAggregator::new(),
            interval: Duration::from_secs(config.interval_secs),
            backoff: Duration::from_secs(config.backoff_secs),
            dashboard: None,
            notifier: None,
            state: LoopState::Running,
            cycle_count: 0,
        }
    }

    /// Override the sleep intervals.
    pub fn with_intervals(mut self, interval: Duration, backoff: Duration) -> Self {
        self.interval = interval;
        self.backoff = backoff;
        self
    }

    /// Publish stats, dispatches and cycle reports to a dashboard.
    pub fn with_dashboard(mut self, dashboard: AppState) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// Send alerts for dispatches and failed cycles.
    pub fn with_notifier(mut self, notifier: Arc<TelegramNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn history(&self) -> &StrategyHistory {
        &self.history
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Run until `shutdown` fires. Stopped is terminal: calling this again
    /// returns at once.
    pub async fn run(&mut self, shutdown: ShutdownToken) {
        if self.state == LoopState::Stopped {
            return;
        }
        info!(
            interval_secs = self.interval.as_secs_f64(),
            backoff_secs = self.backoff.as_secs_f64(),
            "Monitor loop started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_guarded_cycle().await;
            let wait = if report.is_ok() {
                self.interval
            } else {
                warn!(
                    backoff_secs = self.backoff.as_secs_f64(),
                    "Cycle failed, backing off"
                );
                self.backoff
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.state = LoopState::Stopped;
        info!(cycles = self.cycle_count, "Monitor loop stopped");
    }

    /// One cycle with panic isolation, stats and publishing.
    async fn run_guarded_cycle(&mut self) -> CycleReport {
        let outcome = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
        let report = match outcome {
            Ok(report) => report,
            Err(_) => {
                error!(cycle = self.cycle_count, "Cycle panicked");
                CycleReport::failed(self.cycle_count, "cycle panicked")
            }
        };

        self.stats.record_cycle(report.is_ok());
        log_cycle_report(&report);

        if let Some(dashboard) = &self.dashboard {
            dashboard.publish_stats(self.stats.snapshot()).await;
            dashboard.push_cycle(&report).await;
        }
        if let (Some(notifier), Some(err)) = (&self.notifier, &report.error) {
            notifier
                .notify_error(&format!("Cycle {} failed", report.cycle_number), err)
                .await;
        }
        report
    }

    /// Execute a single fetch → analyze → validate → dispatch pass.
    ///
    /// Errors do not escape; they end up in the report's `error`.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let mut report = CycleReport::new(self.cycle_count);
        debug!(cycle = self.cycle_count, "Starting cycle");

        if let Err(e) = self.process(&mut report).await {
            error!(cycle = self.cycle_count, error = %e, "Cycle aborted");
            report.error = Some(e.to_string());
        }
        report
    }

    async fn process(&mut self, report: &mut CycleReport) -> Result<(), ArbError> {
        let snapshot = self.source.fetch().await?;
        report.symbols_scanned = snapshot.len();

        let candidates = self.analyzer.analyze(&snapshot);
        report.candidates = candidates.len();

        for candidate in candidates {
            if let Err(reason) = self.validator.validate(&candidate, &self.history) {
                debug!(id = candidate.id(), reason = %reason, "Skipping candidate");
                report.rejected += 1;
                continue;
            }

            info!(strategy = %candidate, "Dispatching");
            let result = self.router.dispatch(&candidate, &mut self.stats).await;

            match candidate.execution_class() {
                ExecutionClass::Remote => report.dispatched_remote += 1,
                ExecutionClass::Local => report.dispatched_local += 1,
            }
            if result.is_success() {
                report.cycle_profit += result.profit;
            } else {
                report.failed += 1;
            }

            if let Some(dashboard) = &self.dashboard {
                dashboard.push_dispatch(&candidate, &result).await;
            }
            if let Some(notifier) = &self.notifier {
                notifier.notify_opportunity(&candidate).await;
                notifier.notify_execution(&candidate, &result).await;
            }
            self.history.record(candidate);
        }
        Ok(())
    }
}

fn log_cycle_report(report: &CycleReport) {
    if !report.is_ok() {
        return;
    }
    info!(
        cycle = report.cycle_number,
        symbols = report.symbols_scanned,
        candidates = report.candidates,
        rejected = report.rejected,
        dispatched = report.dispatched(),
        local = report.dispatched_local,
        remote = report.dispatched_remote,
        failed = report.failed,
        profit = format!("${:.2}", report.cycle_profit),
        "Cycle complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
