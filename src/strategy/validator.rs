//! Strategy validation.
//!
//! Two sequential gates: a minimum expected profit, then a success-rate
//! check against similar strategies already dispatched for the same symbol.

use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use super::history::StrategyHistory;
use crate::config::ValidatorConfig;
use crate::types::ArbitrageStrategy;

/// Why a candidate was filtered out. Not an error; callers drop the
/// candidate and move on.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    BelowMinProfit {
        estimated: Decimal,
        minimum: Decimal,
    },
    LowSuccessRate {
        rate: Decimal,
        minimum: Decimal,
        similar: usize,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BelowMinProfit { estimated, minimum } => {
                write!(f, "estimated profit ${estimated:.2} below minimum ${minimum:.2}")
            }
            Rejection::LowSuccessRate {
                rate,
                minimum,
                similar,
            } => write!(
                f,
                "success rate {rate:.2} across {similar} similar strategies below {minimum:.2}"
            ),
        }
    }
}

pub struct StrategyValidator {
    config: ValidatorConfig,
}

impl StrategyValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// `Ok(())` when the candidate may be dispatched.
    pub fn validate(
        &self,
        candidate: &ArbitrageStrategy,
        history: &StrategyHistory,
    ) -> Result<(), Rejection> {
        if candidate.estimated_profit() < self.config.min_profit {
            let rejection = Rejection::BelowMinProfit {
                estimated: candidate.estimated_profit(),
                minimum: self.config.min_profit,
            };
            debug!(id = candidate.id(), reason = %rejection, "Candidate rejected");
            return Err(rejection);
        }

        let floor = candidate.rate_diff() * self.config.similarity_ratio;
        let (similar, profitable) = history
            .for_symbol(candidate.symbol())
            .filter(|prior| prior.rate_diff() >= floor)
            .fold((0usize, 0usize), |(n, wins), prior| {
                let win = prior.estimated_profit() > Decimal::ZERO;
                (n + 1, wins + usize::from(win))
            });

        if similar > 0 {
            let rate = Decimal::from(profitable) / Decimal::from(similar);
            if rate < self.config.min_success_rate {
                let rejection = Rejection::LowSuccessRate {
                    rate,
                    minimum: self.config.min_success_rate,
                    similar,
                };
                debug!(id = candidate.id(), reason = %rejection, "Candidate rejected");
                return Err(rejection);
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
