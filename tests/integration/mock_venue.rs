//! Mock venue for integration testing.
//!
//! Deterministic `VenueConnector` whose funding rates are set from test
//! code. Clones share state, so a test can keep a handle after boxing one
//! into the snapshot source.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fundbridge::types::VenueFundingRate;
use fundbridge::venues::VenueConnector;

#[derive(Clone)]
pub struct MockVenue {
    name: String,
    rates: Arc<Mutex<HashMap<String, Decimal>>>,
    connected: Arc<AtomicBool>,
    /// If set, every request fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockVenue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rates: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_rate(self, instrument: &str, rate: Decimal) -> Self {
        self.set_rate(instrument, rate);
        self
    }

    pub fn set_rate(&self, instrument: &str, rate: Decimal) {
        self.rates
            .lock()
            .unwrap()
            .insert(instrument.to_string(), rate);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{}: {msg}", self.name)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VenueConnector for MockVenue {
    async fn connect(&self) -> Result<()> {
        self.check_error()?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate> {
        self.check_error()?;
        Ok(VenueFundingRate {
            rate: self.rates.lock().unwrap().get(instrument).copied(),
            ..Default::default()
        })
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_reports_set_rate() {
        let venue = MockVenue::new("binance").with_rate("BTC/USDT:USDT", dec!(0.0001));
        venue.connect().await.unwrap();
        let info = venue.get_funding_rate("BTC/USDT:USDT").await.unwrap();
        assert_eq!(info.rate, Some(dec!(0.0001)));
        let unknown = venue.get_funding_rate("ETH/USDT:USDT").await.unwrap();
        assert_eq!(unknown.rate, None);
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let venue = MockVenue::new("okx");
        venue.set_error("maintenance");
        assert!(venue.connect().await.is_err());
        venue.clear_error();
        assert!(venue.connect().await.is_ok());
        assert!(venue.is_connected());
    }
}
