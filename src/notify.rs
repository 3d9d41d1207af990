//! Telegram alerts.
//!
//! Optional push notifications for dispatched opportunities, execution
//! outcomes and failed cycles. Delivery is best effort: a failed send is
//! logged and never affects the monitor.
//!
//! API docs: https://core.telegram.org/bots/api#sendmessage

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::types::{ArbitrageStrategy, ExecutionResult};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply envelope of every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    http: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    notify_opportunities: bool,
    notify_executions: bool,
    notify_errors: bool,
}

impl TelegramNotifier {
    /// Build from config, reading credentials from the configured env vars.
    /// `None` when disabled or when credentials are missing.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let token = std::env::var(&config.bot_token_env).ok().filter(|v| !v.is_empty());
        let chat_id = std::env::var(&config.chat_id_env).ok().filter(|v| !v.is_empty());
        let (Some(token), Some(chat_id)) = (token, chat_id) else {
            warn!(
                token_env = %config.bot_token_env,
                chat_env = %config.chat_id_env,
                "Telegram alerts enabled but credentials missing; alerts disabled"
            );
            return Ok(None);
        };
        Self::new(config, token, chat_id).map(Some)
    }

    pub fn new(config: &NotifierConfig, bot_token: String, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            notify_opportunities: config.notify_opportunities,
            notify_executions: config.notify_executions,
            notify_errors: config.notify_errors,
        })
    }

    pub async fn notify_opportunity(&self, strategy: &ArbitrageStrategy) {
        if self.notify_opportunities {
            self.deliver(format_opportunity(strategy)).await;
        }
    }

    pub async fn notify_execution(&self, strategy: &ArbitrageStrategy, result: &ExecutionResult) {
        if self.notify_executions {
            self.deliver(format_execution(strategy, result)).await;
        }
    }

    pub async fn notify_error(&self, context: &str, error: &str) {
        if self.notify_errors {
            self.deliver(format_error(context, error)).await;
        }
    }

    async fn deliver(&self, text: String) {
        match self.send(&text).await {
            Ok(()) => debug!("Telegram alert sent"),
            Err(e) => warn!(error = %e, "Telegram alert failed"),
        }
    }

    /// POST one HTML message to `sendMessage`.
    pub async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .context("Telegram request failed")?;

        let status = resp.status();
        let body: ApiResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram response ({status})"))?;
        if !status.is_success() || !body.ok {
            anyhow::bail!(
                "Telegram API error {status}: {}",
                body.description.unwrap_or_default()
            );
        }
        Ok(())
    }

    /// Check the token with `getMe`.
    pub async fn check(&self) -> Result<()> {
        let url = format!("{}/bot{}/getMe", self.api_base, self.bot_token);
        let body: ApiResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("Telegram request failed")?
            .json()
            .await
            .context("Failed to parse Telegram response")?;
        if !body.ok {
            anyhow::bail!("Telegram rejected token: {}", body.description.unwrap_or_default());
        }
        info!("Telegram bot reachable");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn format_opportunity(s: &ArbitrageStrategy) -> String {
    format!(
        "🎯 <b>Opportunity {}</b>\n\
         Long {} / short {}\n\
         Diff: {:.4}%\n\
         Est. profit: ${:.2}\n\
         Route: {} (p{})",
        escape_html(s.symbol()),
        escape_html(s.secondary_venue()),
        escape_html(s.primary_venue()),
        s.rate_diff() * rust_decimal::Decimal::ONE_HUNDRED,
        s.estimated_profit(),
        s.execution_class(),
        s.priority(),
    )
}

pub fn format_execution(s: &ArbitrageStrategy, result: &ExecutionResult) -> String {
    let head = if result.is_success() {
        format!("✅ <b>Executed {}</b>\nProfit: ${:.2}", escape_html(s.symbol()), result.profit)
    } else {
        format!("❌ <b>Execution failed {}</b>", escape_html(s.symbol()))
    };
    let mut text = format!("{head}\nRoute: {}\nId: <code>{}</code>", s.execution_class(), escape_html(s.id()));
    if let Some(msg) = &result.message {
        text.push_str(&format!("\n{}", escape_html(msg)));
    }
    text
}

pub fn format_error(context: &str, error: &str) -> String {
    format!("🚨 <b>{}</b>\n{}", escape_html(context), escape_html(error))
}
