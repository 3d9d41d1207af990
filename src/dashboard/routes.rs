//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::stats::{CycleReport, StatsSnapshot};
use crate::types::{ArbitrageStrategy, ExecutionResult};

/// Entries kept for `/api/history` and `/api/cycles`.
pub const RECENT_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Copy of monitor state published for readers. The monitor is the only
/// writer.
pub struct DashboardState {
    pub stats: RwLock<StatsSnapshot>,
    pub dispatches: RwLock<VecDeque<DispatchRecord>>,
    pub cycles: RwLock<VecDeque<CycleReport>>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(StatsSnapshot::default()),
            dispatches: RwLock::new(VecDeque::new()),
            cycles: RwLock::new(VecDeque::new()),
            started_at: Utc::now(),
        }
    }

    pub async fn publish_stats(&self, snapshot: StatsSnapshot) {
        *self.stats.write().await = snapshot;
    }

    pub async fn push_dispatch(&self, strategy: &ArbitrageStrategy, result: &ExecutionResult) {
        push_bounded(
            &mut *self.dispatches.write().await,
            DispatchRecord {
                strategy: strategy.clone(),
                result: result.clone(),
            },
        );
    }

    pub async fn push_cycle(&self, report: &CycleReport) {
        push_bounded(&mut *self.cycles.write().await, report.clone());
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T) {
    if buf.len() >= RECENT_LIMIT {
        buf.pop_front();
    }
    buf.push_back(item);
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A dispatched strategy and what came back.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub strategy: ArbitrageStrategy,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.stats.read().await.clone();
    Json(StatsResponse {
        stats,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/history (newest first)
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<DispatchRecord>> {
    let log = state.dispatches.read().await;
    Json(log.iter().rev().cloned().collect())
}

/// GET /api/cycles (newest first)
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleReport>> {
    let log = state.cycles.read().await;
    Json(log.iter().rev().cloned().collect())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
