//! OKX USDT-margined swap funding rates.
//!
//! API docs: https://www.okx.com/docs-v5/en/#public-data-rest-api-get-funding-rate
//! Base URL: https://www.okx.com

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    interval_label, parse_millis, parse_rate, split_instrument, HttpVenue, RawField, VenueConnector,
};
use crate::types::VenueFundingRate;

const BASE_URL: &str = "https://www.okx.com";
const VENUE_NAME: &str = "okx";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Envelope of `/api/v5/public/funding-rate`. `code` is `"0"` on success.
#[derive(Debug, Deserialize)]
pub(crate) struct FundingRateResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<FundingRateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FundingRateEntry {
    #[serde(default)]
    pub funding_rate: Option<RawField>,
    /// Upcoming settlement.
    #[serde(default)]
    pub funding_time: Option<RawField>,
    /// The settlement after that.
    #[serde(default)]
    pub next_funding_time: Option<RawField>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OkxConnector {
    http: HttpVenue,
}

impl OkxConnector {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: HttpVenue::new(VENUE_NAME, base_url)?,
        })
    }

    /// `BTC/USDT:USDT` → `BTC-USDT-SWAP`.
    pub fn venue_symbol(instrument: &str) -> Option<String> {
        split_instrument(instrument).map(|(base, quote)| format!("{base}-{quote}-SWAP"))
    }
}

/// Extract funding info from a `/api/v5/public/funding-rate` body.
///
/// The spacing of the two settlement times is the settlement interval.
pub(crate) fn parse_funding_rate(body: &FundingRateResponse) -> Result<VenueFundingRate> {
    if body.code != "0" {
        let msg = if body.msg.is_empty() { "unknown" } else { body.msg.as_str() };
        anyhow::bail!("okx error {}: {msg}", body.code);
    }

    let Some(entry) = body.data.first() else {
        return Ok(VenueFundingRate::default());
    };

    let settlement = parse_millis(entry.funding_time.as_ref());
    let following = parse_millis(entry.next_funding_time.as_ref());
    let funding_interval = match (settlement, following) {
        (Some(a), Some(b)) => interval_label(a, b),
        _ => None,
    };

    Ok(VenueFundingRate {
        rate: parse_rate(entry.funding_rate.as_ref()),
        next_funding_time: settlement.or(following),
        funding_interval,
    })
}

#[async_trait]
impl VenueConnector for OkxConnector {
    async fn connect(&self) -> Result<()> {
        self.http.connect("/api/v5/public/time").await
    }

    async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate> {
        self.http.ensure_connected()?;
        let Some(inst_id) = Self::venue_symbol(instrument) else {
            anyhow::bail!("Unrecognised instrument: {instrument}");
        };

        let body: FundingRateResponse = self
            .http
            .get_json(&format!(
                "/api/v5/public/funding-rate?instId={}",
                urlencoding::encode(&inst_id)
            ))
            .await?;

        let info = parse_funding_rate(&body)?;
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
