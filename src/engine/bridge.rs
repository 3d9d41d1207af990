//! Remote execution bridge.
//!
//! Mediates requests to the external low-latency execution engine over a
//! single persistent WebSocket connection. The connection is owned by one
//! actor task; every caller goes through its command queue, so the socket
//! is never written by two callers at once.
//!
//! Wire contract: one JSON text frame per request, exactly one JSON frame
//! back, correlated by ordering on the connection.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::{FutureExt, SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::ExecutionEngine;
use crate::config::BridgeConfig;
use crate::types::{ArbitrageStrategy, ExecutionResult, ExecutionStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const REQUEST_TYPE: &str = "funding_rate_arbitrage";
const COMMAND_QUEUE: usize = 32;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request frame sent to the remote engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub strategy_id: String,
    pub symbol: String,
    pub primary_exchange: String,
    pub secondary_exchange: String,
    pub amount: Decimal,
    pub priority: u8,
    /// Send time, RFC 3339.
    pub timestamp: String,
}

impl WireRequest {
    pub fn from_strategy(strategy: &ArbitrageStrategy, amount: Decimal, sent_at: DateTime<Utc>) -> Self {
        Self {
            kind: REQUEST_TYPE.to_string(),
            strategy_id: strategy.id().to_string(),
            symbol: strategy.symbol().to_string(),
            primary_exchange: strategy.primary_venue().to_string(),
            secondary_exchange: strategy.secondary_venue().to_string(),
            amount,
            priority: strategy.priority(),
            timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Response frame from the remote engine. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub profit: Option<Decimal>,
    #[serde(default)]
    pub message: Option<String>,
    /// Older engines report failures here instead of `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WireResponse {
    pub fn into_result(self) -> ExecutionResult {
        let message = self.message.or(self.error_message);
        match self.status {
            ExecutionStatus::Success => {
                ExecutionResult::success(self.profit.unwrap_or(Decimal::ZERO), message)
            }
            ExecutionStatus::Error => ExecutionResult::error(
                message.unwrap_or_else(|| "remote engine reported an error".to_string()),
            ),
        }
    }
}

fn decode(payload: &[u8]) -> Result<WireResponse, BridgeError> {
    serde_json::from_slice(payload).map_err(|e| BridgeError::Decode {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Bridge failure. The `Display` text is what callers see in the
/// resulting `ExecutionResult`; details go to the log.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("engine unreachable")]
    Unreachable { reason: String },

    /// `send_stalled` means the request never fully left, so the
    /// connection is no longer usable.
    #[error("timeout")]
    Timeout { send_stalled: bool },

    #[error("decode failure")]
    Decode { reason: String },

    #[error("connection lost")]
    ConnectionLost { reason: String },

    #[error("bridge stopped")]
    Stopped,
}

impl BridgeError {
    fn detail(&self) -> &str {
        match self {
            BridgeError::Unreachable { reason }
            | BridgeError::Decode { reason }
            | BridgeError::ConnectionLost { reason } => reason,
            BridgeError::Timeout { send_stalled: true } => "engine stopped reading",
            BridgeError::Timeout { .. } | BridgeError::Stopped => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Connection actor
// ---------------------------------------------------------------------------

enum Command {
    EnsureConnected {
        reply: oneshot::Sender<bool>,
    },
    Call {
        request: WireRequest,
        timeout: Duration,
        reply: oneshot::Sender<Result<WireResponse, BridgeError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Sole owner of the connection handle.
struct ConnectionActor {
    endpoint: String,
    connect_timeout: Duration,
    stream: Option<WsStream>,
    connected: Arc<AtomicBool>,
}

impl ConnectionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::EnsureConnected { reply } => {
                    let ok = self.ensure_connected().await.is_ok();
                    let _ = reply.send(ok);
                }
                Command::Call {
                    request,
                    timeout,
                    reply,
                } => {
                    let outcome = self.call(request, timeout).await;
                    let _ = reply.send(outcome);
                }
                Command::Close { reply } => {
                    self.shutdown().await;
                    let _ = reply.send(());
                }
            }
        }
        self.shutdown().await;
        debug!("Bridge actor exiting");
    }

    async fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_some() {
            return Ok(());
        }

        match tokio::time::timeout(self.connect_timeout, connect_async(self.endpoint.as_str())).await {
            Ok(Ok((ws, response))) => {
                info!(
                    endpoint = %self.endpoint,
                    status = %response.status(),
                    "Connected to remote execution engine"
                );
                self.stream = Some(ws);
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(e)) => {
                self.mark_disconnected();
                Err(BridgeError::Unreachable {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                self.mark_disconnected();
                Err(BridgeError::Unreachable {
                    reason: format!("connect timed out after {:?}", self.connect_timeout),
                })
            }
        }
    }

    async fn call(
        &mut self,
        request: WireRequest,
        timeout: Duration,
    ) -> Result<WireResponse, BridgeError> {
        let payload = serde_json::to_string(&request).map_err(|e| BridgeError::Decode {
            reason: format!("request encoding: {e}"),
        })?;

        self.ensure_connected().await?;

        // A frame still buffered here belongs to an earlier timed-out call.
        if let Some(ws) = self.stream.as_mut() {
            if let Err(e) = drain_stale(ws) {
                warn!(reason = e.detail(), "Engine connection found dead, reconnecting");
                self.mark_disconnected();
                self.ensure_connected().await?;
            }
        }

        let Some(ws) = self.stream.as_mut() else {
            return Err(BridgeError::Unreachable {
                reason: "no connection".into(),
            });
        };

        let outcome = exchange(ws, payload, Instant::now() + timeout).await;
        if matches!(
            outcome,
            Err(BridgeError::ConnectionLost { .. } | BridgeError::Timeout { send_stalled: true })
        ) {
            self.mark_disconnected();
        }
        outcome
    }

    fn mark_disconnected(&mut self) {
        self.stream = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn shutdown(&mut self) {
        if let Some(mut ws) = self.stream.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await.is_err() {
                warn!(endpoint = %self.endpoint, "Engine did not acknowledge close");
            }
            info!(endpoint = %self.endpoint, "Engine connection closed");
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Send one request and wait for its response until `deadline`.
async fn exchange(
    ws: &mut WsStream,
    payload: String,
    deadline: Instant,
) -> Result<WireResponse, BridgeError> {
    match tokio::time::timeout_at(deadline, ws.send(Message::Text(payload))).await {
        Err(_) => return Err(BridgeError::Timeout { send_stalled: true }),
        Ok(Err(e)) => {
            return Err(BridgeError::ConnectionLost {
                reason: format!("send: {e}"),
            })
        }
        Ok(Ok(())) => {}
    }

    loop {
        let frame = match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return Err(BridgeError::Timeout { send_stalled: false }),
            Ok(None) => {
                return Err(BridgeError::ConnectionLost {
                    reason: "stream ended".into(),
                })
            }
            Ok(Some(Err(e))) => {
                return Err(BridgeError::ConnectionLost {
                    reason: e.to_string(),
                })
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => return decode(text.as_bytes()),
            Message::Binary(bytes) => return decode(&bytes),
            Message::Close(close) => {
                return Err(BridgeError::ConnectionLost {
                    reason: format!("closed by engine: {close:?}"),
                })
            }
            // Control frames; tungstenite answers pings itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
}

/// Discard frames that are already buffered. Errors if the connection
/// turns out to be closed.
fn drain_stale(ws: &mut WsStream) -> Result<usize, BridgeError> {
    let mut dropped = 0;
    loop {
        match ws.next().now_or_never() {
            None => return Ok(dropped),
            Some(None) => {
                return Err(BridgeError::ConnectionLost {
                    reason: "stream ended".into(),
                })
            }
            Some(Some(Err(e))) => {
                return Err(BridgeError::ConnectionLost {
                    reason: e.to_string(),
                })
            }
            Some(Some(Ok(Message::Close(_)))) => {
                return Err(BridgeError::ConnectionLost {
                    reason: "closed by engine".into(),
                })
            }
            Some(Some(Ok(frame))) => {
                if frame.is_text() || frame.is_binary() {
                    dropped += 1;
                    warn!("Discarding late engine response");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bridge handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the connection actor.
#[derive(Clone)]
pub struct RemoteExecutionBridge {
    commands: mpsc::Sender<Command>,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
    /// Notional sent as `amount` with every request.
    amount: Decimal,
}

impl RemoteExecutionBridge {
    /// Spawn the connection actor. No connection is attempted until the
    /// first call or `ensure_connected`. Must run inside a Tokio runtime.
    pub fn spawn(config: &BridgeConfig, amount: Decimal) -> Self {
        Self::with_timeouts(
            &config.endpoint,
            config.request_timeout(),
            config.connect_timeout(),
            amount,
        )
    }

    pub fn with_timeouts(
        endpoint: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
        amount: Decimal,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let connected = Arc::new(AtomicBool::new(false));

        let actor = ConnectionActor {
            endpoint: endpoint.to_string(),
            connect_timeout,
            stream: None,
            connected: Arc::clone(&connected),
        };
        tokio::spawn(actor.run(rx));

        Self {
            commands: tx,
            connected,
            request_timeout,
            amount,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect if needed. Returns whether a connection is live.
    pub async fn ensure_connected(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(Command::EnsureConnected { reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// One request/response round trip.
    pub async fn call(
        &self,
        request: WireRequest,
        timeout: Duration,
    ) -> Result<WireResponse, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                request,
                timeout,
                reply,
            })
            .await
            .map_err(|_| BridgeError::Stopped)?;
        rx.await.map_err(|_| BridgeError::Stopped)?
    }

    /// Close the connection. A later call reconnects.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

#[async_trait::async_trait]
impl ExecutionEngine for RemoteExecutionBridge {
    async fn execute(&self, strategy: &ArbitrageStrategy) -> ExecutionResult {
        let request = WireRequest::from_strategy(strategy, self.amount, Utc::now());
        match self.call(request, self.request_timeout).await {
            Ok(response) => {
                let result = response.into_result();
                debug!(id = strategy.id(), result = %result, "Remote execution finished");
                result
            }
            Err(e) => {
                warn!(
                    id = strategy.id(),
                    symbol = strategy.symbol(),
                    error = %e,
                    detail = e.detail(),
                    "Remote execution failed"
                );
                ExecutionResult::error(e.to_string())
            }
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
