//! Venue integrations.
//!
//! Defines the `VenueConnector` trait and provides public-endpoint
//! implementations for:
//! - Binance USDⓈ-M futures
//! - Bybit linear perpetuals
//! - OKX USDT swaps
//!
//! Instruments are named `BASE/QUOTE:SETTLE` (e.g. `BTC/USDT:USDT`);
//! each connector maps that to its own symbol format.

pub mod binance;
pub mod bybit;
pub mod okx;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::config::VenuesConfig;
use crate::types::VenueFundingRate;

/// Abstraction over venues reporting perpetual funding rates.
#[async_trait]
pub trait VenueConnector: Send + Sync {
    /// Establish (or verify) connectivity with the venue.
    async fn connect(&self) -> Result<()>;

    /// Current funding information for one instrument. Unknown fields
    /// come back as `None`; only transport/protocol failures are errors.
    async fn get_funding_rate(&self, instrument: &str) -> Result<VenueFundingRate>;

    /// Release the connection. Safe to call when not connected.
    async fn close(&self);

    fn is_connected(&self) -> bool;

    /// Venue name for logging and snapshot keys.
    fn name(&self) -> &str;
}

/// Build the connectors enabled in config, in a fixed order.
pub fn from_config(config: &VenuesConfig) -> Result<Vec<Box<dyn VenueConnector>>> {
    let mut out: Vec<Box<dyn VenueConnector>> = Vec::new();
    for name in config.enabled() {
        let connector: Box<dyn VenueConnector> = match name {
            "binance" => Box::new(binance::BinanceConnector::new()?),
            "bybit" => Box::new(bybit::BybitConnector::new()?),
            "okx" => Box::new(okx::OkxConnector::new()?),
            other => anyhow::bail!("Unknown venue: {other}"),
        };
        out.push(connector);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Instrument naming
// ---------------------------------------------------------------------------

/// Split `BASE/QUOTE:SETTLE` into `(base, quote)`. The settle suffix is
/// optional.
pub fn split_instrument(instrument: &str) -> Option<(&str, &str)> {
    let pair = instrument.split(':').next()?;
    let (base, quote) = pair.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

// ---------------------------------------------------------------------------
// Loosely typed fields
// ---------------------------------------------------------------------------

/// A field venues send either as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawField {
    Text(String),
    Number(serde_json::Number),
}

/// Parse a rate; empty or absent means unknown.
pub(crate) fn parse_rate(raw: Option<&RawField>) -> Option<Decimal> {
    let text = match raw? {
        RawField::Text(s) if !s.is_empty() => s.clone(),
        RawField::Text(_) => return None,
        // Shortest round-trip form, so 0.0005 stays 0.0005.
        RawField::Number(n) => n.to_string(),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parse a millisecond timestamp; zero means unknown.
pub(crate) fn parse_millis(raw: Option<&RawField>) -> Option<DateTime<Utc>> {
    let ms = match raw? {
        RawField::Text(s) => s.parse::<i64>().ok()?,
        RawField::Number(n) => n.as_i64()?,
    };
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Human-readable settlement cadence, e.g. "8h".
pub(crate) fn interval_label(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<String> {
    let minutes = (to - from).num_minutes();
    if minutes <= 0 {
        None
    } else if minutes % 60 == 0 {
        Some(format!("{}h", minutes / 60))
    } else {
        Some(format!("{minutes}m"))
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

/// HTTP client plus connection flag shared by the REST connectors.
pub(crate) struct HttpVenue {
    name: &'static str,
    base_url: String,
    http: Client,
    connected: AtomicBool,
}

impl HttpVenue {
    pub(crate) fn new(name: &'static str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("FUNDBRIDGE/0.1.0 (funding-monitor)")
            .build()
            .with_context(|| format!("Failed to build HTTP client for {name}"))?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            connected: AtomicBool::new(false),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Request `path` and mark the venue connected on success.
    pub(crate) async fn connect(&self, path: &str) -> Result<()> {
        let _: serde_json::Value = self.get_json(path).await?;
        self.connected.store(true, Ordering::SeqCst);
        debug!(venue = self.name, "Venue connected");
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            anyhow::bail!("{} is not connected", self.name);
        }
        Ok(())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(venue = self.name, url = %url, "Venue request");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            // A failing venue is treated as gone until the next connect.
            self.close();
            anyhow::bail!("{} API error {status}: {body}", self.name);
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name))
    }
}
