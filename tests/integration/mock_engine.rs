//! Mock remote execution engine.
//!
//! A local WebSocket server speaking the engine's JSON protocol. Records
//! every request it receives and answers with a configurable profit.

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub struct MockEngine {
    pub endpoint: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockEngine {
    /// Start an engine that reports success with `profit` for every request.
    pub async fn start(profit: Decimal) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(socket).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Text(text) = msg else { continue };
                        let request: Value = serde_json::from_str(&text).unwrap();
                        let reply = json!({
                            "status": "success",
                            "profit": profit,
                            "message": format!("filled {}", request["strategy_id"].as_str().unwrap_or("")),
                            "execution_time": "2ms",
                        });
                        log.lock().unwrap().push(request);
                        if ws.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { endpoint, requests }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}
