//! In-memory strategy history.
//!
//! Append-only record of dispatched strategies, consulted by the validator
//! for its success-rate check. Not persisted across restarts.

use std::collections::VecDeque;

use crate::types::ArbitrageStrategy;

/// Strategies dispatched during this run, oldest first.
#[derive(Debug, Clone, Default)]
pub struct StrategyHistory {
    entries: VecDeque<ArbitrageStrategy>,
    /// Maximum retained entries; `None` keeps everything.
    limit: Option<usize>,
}

impl StrategyHistory {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keep at most `limit` entries, evicting the oldest. A limit of zero
    /// means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: (limit > 0).then_some(limit),
        }
    }

    pub fn record(&mut self, strategy: ArbitrageStrategy) {
        if let Some(limit) = self.limit {
            while self.entries.len() >= limit {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(strategy);
    }

    /// Prior strategies for `symbol`, oldest first.
    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a ArbitrageStrategy> {
        self.entries.iter().filter(move |s| s.symbol() == symbol)
    }

    /// The most recent `n` entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<ArbitrageStrategy> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VenueRate;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn strat(symbol: &str, high: rust_decimal::Decimal) -> ArbitrageStrategy {
        ArbitrageStrategy::new(
            symbol,
            &VenueRate::new("okx", high),
            &VenueRate::new("binance", dec!(0)),
            dec!(10000),
            dec!(0.005),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let mut h = StrategyHistory::with_limit(2);
        h.record(strat("BTC", dec!(0.002)));
        h.record(strat("ETH", dec!(0.003)));
        h.record(strat("SOL", dec!(0.004)));

        assert_eq!(h.len(), 2);
        assert_eq!(h.for_symbol("BTC").count(), 0);
        let recent = h.recent(5);
        assert_eq!(recent[0].symbol(), "SOL");
        assert_eq!(recent[1].symbol(), "ETH");
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let mut h = StrategyHistory::with_limit(0);
        for _ in 0..50 {
            h.record(strat("BTC", dec!(0.002)));
        }
        assert_eq!(h.len(), 50);
        assert_eq!(h.for_symbol("BTC").count(), 50);
        assert!(StrategyHistory::unbounded().is_empty());
    }
}
