//! Core engine: the fetch → analyze → validate → route → account loop.

pub mod bridge;
pub mod local;
pub mod monitor;
pub mod router;
pub mod snapshot;
pub mod stats;

use async_trait::async_trait;

use crate::types::{ArbitrageStrategy, ExecutionResult};

/// A backend that can carry out a strategy.
///
/// Implementations never fail past this boundary: every problem is
/// reported as an `ExecutionResult` with `Error` status.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, strategy: &ArbitrageStrategy) -> ExecutionResult;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
