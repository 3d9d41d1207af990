//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every tunable has a default so a sparse file (or an empty one) still
//! yields a runnable configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::ArbError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub analyzer: AnalyzerConfig,
    pub validator: ValidatorConfig,
    pub bridge: BridgeConfig,
    pub local: LocalConfig,
    pub venues: VenuesConfig,
    pub dashboard: DashboardConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between healthy cycles.
    pub interval_secs: u64,
    /// Sleep after a failed cycle.
    pub backoff_secs: u64,
    /// Maximum strategies kept in history; 0 keeps everything.
    pub history_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            backoff_secs: 60,
            history_limit: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Reference trade size in quote units.
    pub notional: Decimal,
    /// Differentials at or below this are ignored (0.1%).
    pub min_rate_diff: Decimal,
    /// Differentials above this are routed to the remote engine (0.5%).
    pub remote_rate_diff: Decimal,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            notional: dec!(10000),
            min_rate_diff: dec!(0.001),
            remote_rate_diff: dec!(0.005),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidatorConfig {
    pub min_profit: Decimal,
    /// Prior strategies count as "similar" when their diff is at least
    /// this fraction of the candidate's.
    pub similarity_ratio: Decimal,
    pub min_success_rate: Decimal,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_profit: dec!(10),
            similarity_ratio: dec!(0.8),
            min_success_rate: dec!(0.6),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the remote execution engine.
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocalConfig {
    /// Share of the estimated profit the paper executor books.
    pub realization_factor: Decimal,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            realization_factor: dec!(0.8),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenuesConfig {
    /// Instruments to poll, in `BASE/QUOTE:SETTLE` form.
    pub symbols: Vec<String>,
    pub binance: VenueToggle,
    pub bybit: VenueToggle,
    pub okx: VenueToggle,
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            symbols: vec![
                "BTC/USDT:USDT".to_string(),
                "ETH/USDT:USDT".to_string(),
                "SOL/USDT:USDT".to_string(),
            ],
            binance: VenueToggle::default(),
            bybit: VenueToggle::default(),
            okx: VenueToggle::default(),
        }
    }
}

impl VenuesConfig {
    /// Names of enabled venues, in a fixed order.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.binance.enabled {
            out.push("binance");
        }
        if self.bybit.enabled {
            out.push("bybit");
        }
        if self.okx.enabled {
            out.push("okx");
        }
        out
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenueToggle {
    pub enabled: bool,
}

impl Default for VenueToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8090,
        }
    }
}

/// Telegram alerts. Credentials are read from the named env vars.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub bot_token_env: String,
    pub chat_id_env: String,
    pub api_base: String,
    /// One message per dispatched strategy (noisy).
    pub notify_opportunities: bool,
    pub notify_executions: bool,
    /// Failed cycles.
    pub notify_errors: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id_env: "TELEGRAM_CHAT_ID".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            notify_opportunities: false,
            notify_executions: true,
            notify_errors: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the monitor misbehave.
    pub fn validate(&self) -> Result<(), ArbError> {
        if self.monitor.interval_secs == 0 || self.monitor.backoff_secs == 0 {
            return Err(ArbError::Config("monitor intervals must be positive".into()));
        }
        if self.analyzer.notional <= Decimal::ZERO {
            return Err(ArbError::Config("analyzer.notional must be positive".into()));
        }
        if self.analyzer.min_rate_diff.is_sign_negative() {
            return Err(ArbError::Config("analyzer.min_rate_diff must not be negative".into()));
        }
        if self.analyzer.remote_rate_diff < self.analyzer.min_rate_diff {
            return Err(ArbError::Config(
                "analyzer.remote_rate_diff must be >= analyzer.min_rate_diff".into(),
            ));
        }
        for (name, value) in [
            ("validator.similarity_ratio", self.validator.similarity_ratio),
            ("validator.min_success_rate", self.validator.min_success_rate),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(ArbError::Config(format!("{name} must be in (0, 1]")));
            }
        }
        if self.local.realization_factor.is_sign_negative() {
            return Err(ArbError::Config("local.realization_factor must not be negative".into()));
        }
        if self.bridge.request_timeout_secs == 0 || self.bridge.connect_timeout_secs == 0 {
            return Err(ArbError::Config("bridge timeouts must be positive".into()));
        }
        if !self.bridge.endpoint.starts_with("ws://") && !self.bridge.endpoint.starts_with("wss://") {
            return Err(ArbError::Config(format!(
                "bridge.endpoint must be a ws:// or wss:// URL, got {}",
                self.bridge.endpoint
            )));
        }
        if self.notifier.enabled && !self.notifier.api_base.starts_with("http") {
            return Err(ArbError::Config(format!(
                "notifier.api_base must be an http(s) URL, got {}",
                self.notifier.api_base
            )));
        }
        if !self.venues.enabled().is_empty() && self.venues.symbols.is_empty() {
            return Err(ArbError::Config("venues.symbols is empty".into()));
        }
        Ok(())
    }
}
