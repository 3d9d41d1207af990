//! Execution router. Sends each accepted strategy to the backend its
//! execution class names and folds the result into the stats.

use std::sync::Arc;
use tracing::{info, warn};

use super::stats::StatsAggregator;
use super::ExecutionEngine;
use crate::types::{ArbitrageStrategy, ExecutionClass, ExecutionResult};

pub struct ExecutionRouter {
    remote: Arc<dyn ExecutionEngine>,
    local: Arc<dyn ExecutionEngine>,
}

impl ExecutionRouter {
    pub fn new(remote: Arc<dyn ExecutionEngine>, local: Arc<dyn ExecutionEngine>) -> Self {
        Self { remote, local }
    }

    fn engine_for(&self, class: ExecutionClass) -> &dyn ExecutionEngine {
        match class {
            ExecutionClass::Remote => self.remote.as_ref(),
            ExecutionClass::Local => self.local.as_ref(),
        }
    }

    /// Execute one strategy. Stats are updated before this returns.
    pub async fn dispatch(
        &self,
        strategy: &ArbitrageStrategy,
        stats: &mut StatsAggregator,
    ) -> ExecutionResult {
        let class = strategy.execution_class();
        let engine = self.engine_for(class);

        let result = engine.execute(strategy).await;
        stats.record(class, &result);

        if result.is_success() {
            info!(
                id = strategy.id(),
                engine = engine.name(),
                profit = format!("${:.2}", result.profit),
                "Strategy executed"
            );
        } else {
            warn!(
                id = strategy.id(),
                engine = engine.name(),
                error = result.message.as_deref().unwrap_or("unknown"),
                "Strategy execution failed"
            );
        }
        result
    }
}
