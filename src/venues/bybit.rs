//! Bybit linear perpetual funding rates.
//!
//! API docs: https://bybit-exchange.github.io/docs/v5/market/tickers
//! Base URL: https://api.bybit.com

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{parse_millis, parse_rate, split_instrument, HttpVenue, RawField, VenueConnector};
use crate::types::VenueFundingRate;

const BASE_URL: &str = "https://api.bybit.com";
const VENUE_NAME: &str = "bybit";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Envelope of `/v5/market/tickers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TickersResponse {
    #[serde(default)]
    pub ret_code: Option<i64>,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Option<TickersResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TickersResult {
    #[serde(default)]
    pub list: Vec<LinearTicker>,
}

/// One linear ticker; only the funding fields are read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LinearTicker {
    #[serde(default)]
    pub funding_rate: Option<RawField>,
    #[serde(default)]
    pub next_funding_time: Option<RawField>,
    #[serde(default)]
    pub funding_interval_hour: Option<RawField>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BybitConnector {
    http: HttpVenue,
}

impl BybitConnector {
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

/// Extract funding info from a `/v5/market/tickers` body.
pub(crate) fn parse_tickers(body: &TickersResponse) -> Result<VenueFundingRate> {
    let code = body.ret_code.unwrap_or(-1);
    if code != 0 {
        let msg = if body.ret_msg.is_empty() { "unknown" } else { body.ret_msg.as_str() };
        anyhow::bail!("bybit error {code}: {msg}");
    }

    let Some(ticker) = body.result.as_ref().and_then(|r| r.list.first()) else {
        return Ok(VenueFundingRate::default());
    };

    let funding_interval = ticker
        .funding_interval_hour
        .as_ref()
        .and_then(|v| match v {
            RawField::Text(s) => s.parse::<u32>().ok(),
            RawField::Number(n) => n.as_u64().and_then(|h| u32::try_from(h).ok()),
        })
        .filter(|h| *h > 0)
        .map(|h| format!("{h}h"));

    Ok(VenueFundingRate {
        rate: parse_rate(ticker.funding_rate.as_ref()),
        next_funding_time: parse_millis(ticker.next_funding_time.as_ref()),
        funding_interval,
    })
}

#[async_trait]
impl VenueConnector for BybitConnector {
    async fn connect(&self) -> Result<()> {
        self.http.connect("/v5/market/time").await
    }

    async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate> {
        self.http.ensure_connected()?;
        let Some(symbol) = Self::venue_symbol(instrument) else {
            anyhow::bail!("Unrecognised instrument: {instrument}");
        };

        let body: TickersResponse = self
            .http
            .get_json(&format!(
                "/v5/market/tickers?category=linear&symbol={}",
                urlencoding::encode(&symbol)
            ))
            .await?;

        let info = parse_tickers(&body)?;
        debug!(venue = VENUE_NAME, instrument, rate = ?info.rate, "Funding rate fetched");
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
