//! Local execution engine.
//!
//! Paper executor for strategies below the remote threshold. No orders are
//! placed; the booked profit is the estimate scaled by a realization factor.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use super::ExecutionEngine;
use crate::config::LocalConfig;
use crate::types::{ArbitrageStrategy, ExecutionResult};

pub struct PaperExecutor {
    realization_factor: Decimal,
}

impl PaperExecutor {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            realization_factor: config.realization_factor,
        }
    }
}

#[async_trait]
impl ExecutionEngine for PaperExecutor {
    async fn execute(&self, strategy: &ArbitrageStrategy) -> ExecutionResult {
        let profit = strategy.estimated_profit() * self.realization_factor;

        info!(
            id = strategy.id(),
            symbol = strategy.symbol(),
            long = strategy.secondary_venue(),
            short = strategy.primary_venue(),
            estimated = format!("${:.2}", strategy.estimated_profit()),
            booked = format!("${:.2}", profit),
            "[PAPER] Local execution"
        );

        ExecutionResult::success(
            profit,
            Some(format!(
                "paper: long {} / short {}",
                strategy.secondary_venue(),
                strategy.primary_venue()
            )),
        )
    }

    fn name(&self) -> &str {
        "local"
    }
}
