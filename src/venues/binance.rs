//! Binance USDⓈ-M futures funding rates.
//!
//! API docs: https://developers.binance.com/docs/derivatives/usds-margined-futures
//! Base URL: https://fapi.binance.com
//! Auth: not required for market data.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{parse_millis, parse_rate, split_instrument, HttpVenue, RawField, VenueConnector};
use crate::types::VenueFundingRate;

const BASE_URL: &str = "https://fapi.binance.com";
const VENUE_NAME: &str = "binance";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// `/fapi/v1/premiumIndex` for a single symbol.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PremiumIndex {
    #[serde(default)]
    pub symbol: String,
    /// Empty string between listings and the first settlement.
    #[serde(default)]
    pub last_funding_rate: Option<RawField>,
    #[serde(default)]
    pub next_funding_time: Option<RawField>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BinanceConnector {
    http: HttpVenue,
}

impl BinanceConnector {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: HttpVenue::new(VENUE_NAME, base_url)?,
        })
    }

    /// `BTC/USDT:USDT` → `BTCUSDT`.
    pub fn venue_symbol(instrument: &str) -> Option<String> {
        split_instrument(instrument).map(|(base, quote)| format!("{base}{quote}"))
    }
}

/// The endpoint does not expose the settlement interval.
pub(crate) fn parse_premium_index(body: &PremiumIndex) -> VenueFundingRate {
    VenueFundingRate {
        rate: parse_rate(body.last_funding_rate.as_ref()),
        next_funding_time: parse_millis(body.next_funding_time.as_ref()),
        funding_interval: None,
    }
}

#[async_trait]
impl VenueConnector for BinanceConnector {
    async fn connect(&self) -> Result<()> {
        self.http.connect("/fapi/v1/ping").await
    }

    async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate> {
        self.http.ensure_connected()?;
        let Some(symbol) = Self::venue_symbol(instrument) else {
            anyhow::bail!("Unrecognised instrument: {instrument}");
        };

        let body: PremiumIndex = self
            .http
            .get_json(&format!(
                "/fapi/v1/premiumIndex?symbol={}",
                urlencoding::encode(&symbol)
            ))
            .await?;

        let info = parse_premium_index(&body);
        debug!(
            venue = VENUE_NAME,
            instrument,
            symbol = %body.symbol,
            rate = ?info.rate,
            "Funding rate fetched"
        );
        Ok(info)
    }

    async fn close(&self) {
        self.http.close();
    }

    fn is_connected(&self) -> bool {
        self.http.is_connected()
    }

    fn name(&self) -> &str {
        self.http.name()
    }
}
