//! Minimal Chrome DevTools Protocol client
//!
//! One WebSocket per browser. Commands carry an id; the reader task routes
//! each response to the caller waiting on that id. Events are not
//! subscribed to and are dropped.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::error::BrowserError;
use crate::Result;

type Reply = std::result::Result<Value, String>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolErrorBody>,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

impl ProtocolErrorBody {
    fn describe(&self) -> String {
        match &self.data {
            Some(data) => format!("{} ({}): {}", self.message, self.code, data),
            None => format!("{} ({})", self.message, self.code),
        }
    }
}

pub struct CdpConnection {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    tasks: Vec<JoinHandle<()>>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        // Whole-store scans can be large single messages
        let config = WebSocketConfig::default()
            .max_message_size(None)
            .max_frame_size(None);
        let (stream, _) =
            tokio_tungstenite::connect_async_with_config(ws_url, Some(config), false).await?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let writer = tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "DevTools socket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => dispatch(&reader_pending, text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "DevTools socket read failed");
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.lock().clear();
        });

        tracing::debug!(url = %ws_url, "Connected to DevTools endpoint");

        Ok(Self {
            outgoing,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            tasks: vec![writer, reader],
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send one command and wait for its response
    pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id,
        };

        if self.is_closed() {
            return Err(BrowserError::ConnectionClosed);
        }

        let payload = encode_command(id, method, params, session_id);
        tracing::trace!(id, method, "DevTools command");
        self.outgoing
            .send(Message::Text(payload.into()))
            .map_err(|_| BrowserError::ConnectionClosed)?;

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(BrowserError::Protocol {
                method: method.to_string(),
                message,
            }),
            Err(_) => Err(BrowserError::ConnectionClosed),
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Removes an abandoned request id when the waiting call is dropped
struct PendingSlot<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

fn encode_command(id: u64, method: &str, params: Value, session_id: Option<&str>) -> String {
    let mut command = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(session_id) = session_id {
        command["sessionId"] = Value::String(session_id.to_string());
    }
    command.to_string()
}

/// Response id and outcome, or `None` for events and unreadable frames
fn decode_reply(text: &str) -> Option<(u64, Reply)> {
    let incoming: Incoming = match serde_json::from_str(text) {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unreadable DevTools frame");
            return None;
        }
    };

    let Some(id) = incoming.id else {
        if let Some(method) = incoming.method {
            tracing::trace!(method = %method, "Ignoring DevTools event");
        }
        return None;
    };

    let reply = match incoming.error {
        Some(error) => Err(error.describe()),
        None => Ok(incoming.result.unwrap_or(Value::Null)),
    };
    Some((id, reply))
}

fn dispatch(pending: &Pending, text: &str) {
    let Some((id, reply)) = decode_reply(text) else {
        return;
    };

    match pending.lock().remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(reply);
        }
        None => tracing::trace!(id, "Response for abandoned DevTools command"),
    }
}
