//! Funding snapshot sources.
//!
//! The monitor pulls one snapshot per cycle. `VenueSnapshotSource` builds
//! it by querying every configured instrument on every enabled venue
//! concurrently.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::types::{ArbError, FundingSnapshot};
use crate::venues::VenueConnector;

/// Supplier of per-cycle funding snapshots. No retries happen here; the
/// monitor's backoff is the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundingSnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<FundingSnapshot, ArbError>;
}

/// Snapshot source backed by live venue connectors.
pub struct VenueSnapshotSource {
    connectors: Vec<Box<dyn VenueConnector>>,
    symbols: Vec<String>,
}

impl VenueSnapshotSource {
    pub fn new(connectors: Vec<Box<dyn VenueConnector>>, symbols: Vec<String>) -> Self {
        Self {
            connectors,
            symbols,
        }
    }

    /// Connect every venue that is not connected yet. Returns how many
    /// are live afterwards.
    pub async fn connect_all(&self) -> usize {
        let pending: Vec<_> = self
            .connectors
            .iter()
            .filter(|c| !c.is_connected())
            .map(|c| async move {
                if let Err(e) = c.connect().await {
                    warn!(venue = c.name(), error = %e, "Venue connect failed");
                }
            })
            .collect();
        join_all(pending).await;

        self.connectors.iter().filter(|c| c.is_connected()).count()
    }

    pub async fn close_all(&self) {
        join_all(self.connectors.iter().map(|c| c.close())).await;
        info!(venues = self.connectors.len(), "Venue connections closed");
    }
}

#[async_trait]
impl FundingSnapshotSource for VenueSnapshotSource {
    async fn fetch(&self) -> Result<FundingSnapshot, ArbError> {
        let live = self.connect_all().await;
        if live == 0 {
            return Err(ArbError::DataFetch {
                source_name: "venues".into(),
                message: "no venue is reachable".into(),
            });
        }

        // Symbol-major order keeps each symbol's venues in connector order.
        let requests = self.symbols.iter().flat_map(|symbol| {
            self.connectors
                .iter()
                .filter(|c| c.is_connected())
                .map(move |c| async move { (symbol, c.name(), c.get_funding_rate(symbol).await) })
        });
        let responses = join_all(requests).await;

        let mut snapshot = FundingSnapshot::new();
        let mut failures = 0usize;
        for (symbol, venue, outcome) in responses {
            match outcome {
                Ok(info) => match info.rate {
                    Some(rate) => snapshot.insert(symbol, venue, rate),
                    None => debug!(venue, symbol = %symbol, "Funding rate unknown"),
                },
                Err(e) => {
                    failures += 1;
                    warn!(venue, symbol = %symbol, error = %e, "Funding rate fetch failed");
                }
            }
        }

        if snapshot.is_empty() && failures > 0 {
            return Err(ArbError::DataFetch {
                source_name: "venues".into(),
                message: format!("all {failures} funding requests failed"),
            });
        }

        debug!(
            symbols = snapshot.len(),
            quotes = snapshot.quote_count(),
            failures,
            "Funding snapshot assembled"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VenueFundingRate;
    use anyhow::Result;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeVenue {
        name: &'static str,
        rates: HashMap<&'static str, Option<Decimal>>,
        connectable: bool,
        connected: AtomicBool,
    }

    impl FakeVenue {
        fn new(name: &'static str, rates: &[(&'static str, Option<Decimal>)]) -> Self {
            Self {
                name,
                rates: rates.iter().cloned().collect(),
                connectable: true,
                connected: AtomicBool::new(false),
            }
        }

        fn unreachable(name: &'static str) -> Self {
            Self {
                connectable: false,
                ..Self::new(name, &[])
            }
        }
    }

    #[async_trait]
    impl VenueConnector for FakeVenue {
        async fn connect(&self) -> Result<()> {
            if !self.connectable {
                anyhow::bail!("refused");
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate> {
            match self.rates.get(instrument) {
                Some(rate) => Ok(VenueFundingRate {
                    rate: *rate,
                    ..Default::default()
                }),
                None => anyhow::bail!("unknown instrument {instrument}"),
            }
        }

        async fn close(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn test_assembles_snapshot_in_connector_order() {
        let source = VenueSnapshotSource::new(
            vec![
                Box::new(FakeVenue::new("bybit", &[("BTC", Some(dec!(0.0002)))])),
                Box::new(FakeVenue::new(
                    "binance",
                    &[("BTC", Some(dec!(0.0001))), ("ETH", None)],
                )),
            ],
            vec!["BTC".into(), "ETH".into()],
        );

        let snap = source.fetch().await.unwrap();
        let btc = snap.venues("BTC").unwrap();
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[0].venue, "bybit");
        assert_eq!(btc[1].venue, "binance");
        // Unknown ETH rate on binance and failed ETH lookup on bybit leave no entry.
        assert!(snap.venues("ETH").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_venues_skipped() {
        let source = VenueSnapshotSource::new(
            vec![
                Box::new(FakeVenue::unreachable("okx")),
                Box::new(FakeVenue::new("binance", &[("BTC", Some(dec!(0.0001)))])),
            ],
            vec!["BTC".into()],
        );
        let snap = source.fetch().await.unwrap();
        assert_eq!(snap.quote_count(), 1);
    }

    #[tokio::test]
    async fn test_no_reachable_venue_is_fetch_error() {
        let source = VenueSnapshotSource::new(
            vec![Box::new(FakeVenue::unreachable("okx"))],
            vec!["BTC".into()],
        );
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, ArbError::DataFetch { .. }));
    }

    #[tokio::test]
    async fn test_all_requests_failing_is_fetch_error() {
        let source = VenueSnapshotSource::new(
            vec![Box::new(FakeVenue::new("binance", &[]))],
            vec!["BTC".into(), "ETH".into()],
        );
        assert!(source.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_close_all_disconnects() {
        let source = VenueSnapshotSource::new(
            vec![Box::new(FakeVenue::new("binance", &[]))],
            vec!["BTC".into()],
        );
        assert_eq!(source.connect_all().await, 1);
        source.close_all().await;
        assert_eq!(source.connectors.iter().filter(|c| c.is_connected()).count(), 0);
    }
}
