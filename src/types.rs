//! Shared types for the FUNDBRIDGE monitor.
//!
//! These types form the data model used across all modules: funding
//! snapshots coming in from venues, the strategies derived from them,
//! and the execution results coming back from either backend.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Funding snapshot
// ---------------------------------------------------------------------------

/// One venue's current funding rate for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRate {
    pub venue: String,
    pub rate: Decimal,
}

impl VenueRate {
    pub fn new(venue: impl Into<String>, rate: Decimal) -> Self {
        Self {
            venue: venue.into(),
            rate,
        }
    }
}

/// Symbol → venue rates, as reported by a snapshot source for one cycle.
///
/// Venues are kept in the order the source enumerated them; the analyzer
/// relies on that order to break ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingSnapshot {
    symbols: BTreeMap<String, Vec<VenueRate>>,
}

impl FundingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a venue's rate for a symbol. A repeated venue overwrites its
    /// earlier rate but keeps its original position.
    pub fn insert(&mut self, symbol: &str, venue: &str, rate: Decimal) {
        let venues = self.symbols.entry(symbol.to_string()).or_default();
        match venues.iter_mut().find(|v| v.venue == venue) {
            Some(existing) => existing.rate = rate,
            None => venues.push(VenueRate::new(venue, rate)),
        }
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_rate(mut self, symbol: &str, venue: &str, rate: Decimal) -> Self {
        self.insert(symbol, venue, rate);
        self
    }

    pub fn venues(&self, symbol: &str) -> Option<&[VenueRate]> {
        self.symbols.get(symbol).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[VenueRate])> {
        self.symbols
            .iter()
            .map(|(symbol, venues)| (symbol.as_str(), venues.as_slice()))
    }

    /// Number of symbols in the snapshot.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Total venue quotes across all symbols.
    pub fn quote_count(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }
}

/// Funding information reported by a single venue for one instrument.
///
/// Every field may be unknown; absence is a valid answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueFundingRate {
    pub rate: Option<Decimal>,
    pub next_funding_time: Option<DateTime<Utc>>,
    /// Settlement cadence such as "8h", when the venue exposes it.
    pub funding_interval: Option<String>,
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Which backend carries out a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionClass {
    /// Low-latency remote engine, reached through the bridge.
    Remote,
    /// Local paper/fallback engine.
    Local,
}

impl ExecutionClass {
    /// Large differentials go to the remote engine.
    pub fn for_rate_diff(rate_diff: Decimal, remote_threshold: Decimal) -> Self {
        if rate_diff > remote_threshold {
            ExecutionClass::Remote
        } else {
            ExecutionClass::Local
        }
    }
}

impl fmt::Display for ExecutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionClass::Remote => write!(f, "remote"),
            ExecutionClass::Local => write!(f, "local"),
        }
    }
}

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// `clamp(round(rate_diff × 1000), 1, 10)`, halves rounded away from zero.
pub fn priority_for(rate_diff: Decimal) -> u8 {
    let scaled = (rate_diff * dec!(1000))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX);
    scaled.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as u8
}

/// A proposed cross-venue funding-rate trade.
///
/// Immutable once built: fields are private and only [`ArbitrageStrategy::new`]
/// can produce one, which guarantees `rate_diff > 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageStrategy {
    id: String,
    symbol: String,
    /// Venue with the higher funding rate.
    primary_venue: String,
    /// Venue with the lower funding rate.
    secondary_venue: String,
    rate_diff: Decimal,
    estimated_profit: Decimal,
    execution_class: ExecutionClass,
    priority: u8,
    created_at: DateTime<Utc>,
}

impl ArbitrageStrategy {
    /// Build a strategy from the high-rate and low-rate legs.
    ///
    /// Derives `rate_diff`, `estimated_profit`, `execution_class` and
    /// `priority`. Fails if the differential is not strictly positive.
    pub fn new(
        symbol: &str,
        primary: &VenueRate,
        secondary: &VenueRate,
        notional: Decimal,
        remote_threshold: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ArbError> {
        if symbol.is_empty() {
            return Err(ArbError::InvalidStrategy("empty symbol".into()));
        }
        if primary.venue == secondary.venue {
            return Err(ArbError::InvalidStrategy(format!(
                "{symbol}: primary and secondary venue are both {}",
                primary.venue
            )));
        }
        if notional.is_sign_negative() {
            return Err(ArbError::InvalidStrategy(format!(
                "{symbol}: negative notional {notional}"
            )));
        }

        let rate_diff = primary.rate - secondary.rate;
        if rate_diff <= Decimal::ZERO {
            return Err(ArbError::InvalidStrategy(format!(
                "{symbol}: non-positive rate differential {rate_diff}"
            )));
        }

        Ok(Self {
            id: format!("funding_{symbol}_{}", created_at.timestamp_millis()),
            symbol: symbol.to_string(),
            primary_venue: primary.venue.clone(),
            secondary_venue: secondary.venue.clone(),
            rate_diff,
            estimated_profit: rate_diff * notional,
            execution_class: ExecutionClass::for_rate_diff(rate_diff, remote_threshold),
            priority: priority_for(rate_diff),
            created_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn primary_venue(&self) -> &str {
        &self.primary_venue
    }

    pub fn secondary_venue(&self) -> &str {
        &self.secondary_venue
    }

    pub fn rate_diff(&self) -> Decimal {
        self.rate_diff
    }

    pub fn estimated_profit(&self) -> Decimal {
        self.estimated_profit
    }

    pub fn execution_class(&self) -> ExecutionClass {
        self.execution_class
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for ArbitrageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} long {} / short {} diff={:.4}% est=${:.2} [{} p{}]",
            self.symbol,
            self.secondary_venue,
            self.primary_venue,
            self.rate_diff * dec!(100),
            self.estimated_profit,
            self.execution_class,
            self.priority,
        )
    }
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of dispatching one strategy to either backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub profit: Decimal,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(profit: Decimal, message: Option<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            profit,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Failed dispatch. Errors never contribute profit.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            profit: Decimal::ZERO,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} profit=${:.2} ({msg})", self.status, self.profit),
            None => write!(f, "{} profit=${:.2}", self.status, self.profit),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for FUNDBRIDGE.
#[derive(Debug, thiserror::Error)]
pub enum ArbError {
    #[error("Data fetch error ({source_name}): {message}")]
    DataFetch { source_name: String, message: String },

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
