//! Opportunity analysis.
//!
//! Turns a funding snapshot into candidate strategies by pairing, per
//! symbol, the venue paying the highest funding rate with the venue
//! paying the lowest.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::types::{ArbitrageStrategy, FundingSnapshot, VenueRate};

/// Scores cross-venue funding differentials.
///
/// Stateless: the same snapshot and discovery time always produce the
/// same candidates.
pub struct OpportunityAnalyzer {
    config: AnalyzerConfig,
}

impl OpportunityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyze a snapshot, stamping candidates with the current time.
    pub fn analyze(&self, snapshot: &FundingSnapshot) -> Vec<ArbitrageStrategy> {
        self.analyze_at(snapshot, Utc::now())
    }

    /// Analyze a snapshot with an explicit discovery time.
    ///
    /// Candidates come back ordered by symbol.
    pub fn analyze_at(
        &self,
        snapshot: &FundingSnapshot,
        discovered_at: DateTime<Utc>,
    ) -> Vec<ArbitrageStrategy> {
        let mut candidates = Vec::new();

        for (symbol, venues) in snapshot.iter() {
            let Some((low, high)) = extremes(venues) else {
                continue;
            };

            let rate_diff = high.rate - low.rate;
            if rate_diff <= self.config.min_rate_diff {
                continue;
            }

            match ArbitrageStrategy::new(
                symbol,
                high,
                low,
                self.config.notional,
                self.config.remote_rate_diff,
                discovered_at,
            ) {
                Ok(strategy) => {
                    debug!(
                        symbol,
                        primary = %high.venue,
                        secondary = %low.venue,
                        diff = %format!("{:.4}%", (rate_diff * dec!(100)).to_f64().unwrap_or(0.0)),
                        class = %strategy.execution_class(),
                        priority = strategy.priority(),
                        "Opportunity found"
                    );
                    candidates.push(strategy);
                }
                Err(e) => warn!(symbol, error = %e, "Discarding malformed opportunity"),
            }
        }

        candidates
    }
}

/// Lowest and highest rate among a symbol's venues, first-seen wins ties.
/// `None` when fewer than two venues reported.
fn extremes(venues: &[VenueRate]) -> Option<(&VenueRate, &VenueRate)> {
    if venues.len() < 2 {
        return None;
    }

    let mut low = &venues[0];
    let mut high = &venues[0];
    for venue in &venues[1..] {
        if venue.rate < low.rate {
            low = venue;
        }
        if venue.rate > high.rate {
            high = venue;
        }
    }
    Some((low, high))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionClass;

    fn analyzer() -> OpportunityAnalyzer {
        OpportunityAnalyzer::new(AnalyzerConfig::default())
    }

    fn two_venue(a: Decimal, b: Decimal) -> FundingSnapshot {
        FundingSnapshot::new()
            .with_rate("BTC", "A", a)
            .with_rate("BTC", "B", b)
    }

    #[test]
    fn test_small_diff_not_emitted() {
        let out = analyzer().analyze(&two_venue(dec!(0.0001), dec!(0.0002)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_diff_equal_to_threshold_not_emitted() {
        let out = analyzer().analyze(&two_venue(dec!(0.0001), dec!(0.0011)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_local_candidate() {
        let out = analyzer().analyze(&two_venue(dec!(0.0001), dec!(0.0012)));
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.rate_diff(), dec!(0.0011));
        assert_eq!(s.execution_class(), ExecutionClass::Local);
        assert_eq!(s.priority(), 1);
        assert_eq!(s.primary_venue(), "B");
        assert_eq!(s.secondary_venue(), "A");
        assert_eq!(s.estimated_profit(), dec!(11));
    }

    #[test]
    fn test_remote_candidate() {
        let out = analyzer().analyze(&two_venue(dec!(0.0001), dec!(0.0061)));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rate_diff(), dec!(0.006));
        assert_eq!(out[0].execution_class(), ExecutionClass::Remote);
        assert_eq!(out[0].priority(), 6);
    }

    #[test]
    fn test_priority_clamps_to_ten() {
        let out = analyzer().analyze(&two_venue(dec!(0.0), dec!(0.02)));
        assert_eq!(out[0].priority(), 10);
        let out = analyzer().analyze(&two_venue(dec!(-0.5), dec!(0.5)));
        assert_eq!(out[0].priority(), 10);
    }

    #[test]
    fn test_single_venue_skipped() {
        let snap = FundingSnapshot::new()
            .with_rate("SOL", "binance", dec!(0.01))
            .with_rate("BTC", "A", dec!(0.0001))
            .with_rate("BTC", "B", dec!(0.0035));
        let out = analyzer().analyze(&snap);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol(), "BTC");
    }

    #[test]
    fn test_picks_extremes_across_many_venues() {
        let snap = FundingSnapshot::new()
            .with_rate("ETH", "binance", dec!(0.0002))
            .with_rate("ETH", "bybit", dec!(-0.0010))
            .with_rate("ETH", "okx", dec!(0.0040))
            .with_rate("ETH", "gate", dec!(0.0010));
        let out = analyzer().analyze(&snap);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_venue(), "okx");
        assert_eq!(out[0].secondary_venue(), "bybit");
        assert_eq!(out[0].rate_diff(), dec!(0.0050));
        assert_eq!(out[0].execution_class(), ExecutionClass::Local);
    }

    #[test]
    fn test_ties_broken_by_first_seen() {
        let snap = FundingSnapshot::new()
            .with_rate("ETH", "x", dec!(0.0001))
            .with_rate("ETH", "y", dec!(0.0030))
            .with_rate("ETH", "z", dec!(0.0001))
            .with_rate("ETH", "w", dec!(0.0030));
        let out = analyzer().analyze(&snap);
        assert_eq!(out[0].primary_venue(), "y");
        assert_eq!(out[0].secondary_venue(), "x");
    }

    #[test]
    fn test_idempotent() {
        let snap = FundingSnapshot::new()
            .with_rate("BTC", "X", dec!(0.0001))
            .with_rate("BTC", "Y", dec!(0.0035))
            .with_rate("ETH", "X", dec!(0.0002))
            .with_rate("ETH", "Z", dec!(0.0090));
        let at = Utc::now();
        let a = analyzer();
        assert_eq!(a.analyze_at(&snap, at), a.analyze_at(&snap, at));
        assert_eq!(a.analyze_at(&snap, at).len(), 2);
    }

    #[test]
    fn test_uses_configured_notional() {
        let a = OpportunityAnalyzer::new(AnalyzerConfig {
            notional: dec!(2500),
            ..AnalyzerConfig::default()
        });
        let out = a.analyze(&two_venue(dec!(0.0001), dec!(0.0041)));
        assert_eq!(out[0].estimated_profit(), dec!(10));
    }
}
