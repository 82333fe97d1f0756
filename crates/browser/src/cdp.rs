//! Chrome DevTools Protocol client over WebSocket.
//!
//! One connection per page target. Commands are written by a dedicated
//! writer task and answered by a reader task that matches response ids to
//! pending oneshot senders; protocol events fan out to subscribers.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

use tradepilot_core::{Error, Result};

/// Hard ceiling per CDP command. Individual page operations poll with
/// their own shorter timeouts; this only catches a wedged connection.
const COMMAND_TIMEOUT_SECS: u64 = 30;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type ListenerMap = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

pub struct CdpClient {
    /// Sender to write messages to the WebSocket.
    ws_tx: mpsc::Sender<String>,
    /// Pending command responses, keyed by request ID.
    pending: PendingMap,
    /// Auto-incrementing command ID.
    next_id: AtomicU64,
    /// Event listeners (domain.event -> channel).
    event_listeners: ListenerMap,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

/// Route one incoming frame: a response goes to the pending sender with
/// its id, an event goes to every subscriber of its method.
async fn dispatch_incoming(val: Value, pending: &PendingMap, listeners: &ListenerMap) {
    if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
        let mut pending = pending.lock().await;
        if let Some(tx) = pending.remove(&id) {
            let _ = tx.send(val);
        }
        return;
    }
    if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
        let listeners = listeners.lock().await;
        if let Some(senders) = listeners.get(method) {
            let params = val.get("params").cloned().unwrap_or(Value::Null);
            for tx in senders {
                let _ = tx.try_send(params.clone());
            }
        }
    }
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            Error::Cdp(format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))
        })?;

        let (mut ws_sink, mut ws_stream_read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let event_listeners: ListenerMap = Arc::new(Mutex::new(HashMap::new()));
        let events_clone = event_listeners.clone();

        // Writer task: owns the sink, forwards messages from the channel.
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        // Reader task: dispatches responses by id, events by method name.
        let reader_handle = tokio::spawn(async move {
            while let Some(msg_result) = ws_stream_read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if let Ok(val) = serde_json::from_str::<Value>(&text) {
                            dispatch_incoming(val, &pending_clone, &events_clone).await;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            event_listeners,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        })
    }

    /// Send a CDP command and wait for its response.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Cdp(format!("Failed to send CDP command: {}", e)))?;

        let timeout = std::time::Duration::from_secs(COMMAND_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(protocol_err) = response.get("error") {
                    Err(Error::Cdp(format!("CDP error: {}", protocol_err)))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Cdp("CDP response channel closed".to_string())),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(Error::Timeout(format!(
                    "CDP command '{}' timed out after {}s",
                    method, COMMAND_TIMEOUT_SECS
                )))
            }
        }
    }

    /// Subscribe to a CDP event. Returns a receiver fed with event params.
    pub async fn subscribe_event(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        let mut listeners = self.event_listeners.lock().await;
        listeners
            .entry(method.to_string())
            .or_insert_with(Vec::new)
            .push(tx);
        rx
    }

    /// Enable a CDP domain ("Page", "Runtime", "DOM", "Network").
    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({}))
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value> {
        self.send_command("Page.navigate", json!({"url": url}))
            .await
    }

    /// Evaluate JavaScript in the page context.
    pub async fn evaluate_js(&self, expression: &str) -> Result<Value> {
        self.send_command(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
        .await
    }

    /// Screenshot of the page as base64 PNG. `full_page` captures beyond
    /// the viewport.
    pub async fn screenshot(&self, full_page: bool) -> Result<String> {
        let mut params = json!({"format": "png"});
        if full_page {
            params["captureBeyondViewport"] = json!(true);
        }
        let result = self.send_command("Page.captureScreenshot", params).await?;
        result
            .get("data")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Cdp("No screenshot data returned".to_string()))
    }

    /// Screenshot of a page-coordinate rectangle as base64 PNG.
    pub async fn screenshot_clip(&self, x: f64, y: f64, width: f64, height: f64) -> Result<String> {
        let result = self
            .send_command(
                "Page.captureScreenshot",
                json!({
                    "format": "png",
                    "clip": {"x": x, "y": y, "width": width, "height": height, "scale": 1},
                    "captureBeyondViewport": true,
                }),
            )
            .await?;
        result
            .get("data")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Cdp("No screenshot data returned".to_string()))
    }

    /// Get the document root node.
    pub async fn get_document(&self) -> Result<Value> {
        self.send_command("DOM.getDocument", json!({"depth": -1}))
            .await
    }

    /// Query a CSS selector under a node and return matching node IDs.
    pub async fn query_selector_all(&self, node_id: i64, selector: &str) -> Result<Vec<i64>> {
        let result = self
            .send_command(
                "DOM.querySelectorAll",
                json!({
                    "nodeId": node_id,
                    "selector": selector,
                }),
            )
            .await?;
        let ids = result
            .get("nodeIds")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    /// Resolve a DOM node to a Runtime object for JS interaction.
    pub async fn resolve_node(&self, node_id: i64) -> Result<String> {
        let result = self
            .send_command("DOM.resolveNode", json!({"nodeId": node_id}))
            .await?;
        result
            .get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Cdp(format!("Failed to resolve node {}", node_id)))
    }

    /// Call a function on a remote object.
    pub async fn call_function_on(&self, object_id: &str, function_declaration: &str) -> Result<Value> {
        self.send_command(
            "Runtime.callFunctionOn",
            json!({
                "objectId": object_id,
                "functionDeclaration": function_declaration,
                "returnByValue": true,
            }),
        )
        .await
    }

    /// Dispatch a mouse event via the Input domain.
    pub async fn dispatch_mouse_event(
        &self,
        event_type: &str,
        x: f64,
        y: f64,
        button: &str,
        click_count: i32,
    ) -> Result<()> {
        self.send_command(
            "Input.dispatchMouseEvent",
            json!({
                "type": event_type,
                "x": x,
                "y": y,
                "button": button,
                "clickCount": click_count,
            }),
        )
        .await?;
        Ok(())
    }

    /// Insert text into the focused element (bypasses key events).
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send_command("Input.insertText", json!({"text": text}))
            .await?;
        Ok(())
    }

    /// All cookies visible to the page.
    pub async fn get_cookies(&self) -> Result<Value> {
        self.send_command("Network.getCookies", json!({})).await
    }

    /// Set files on a file input element identified by objectId.
    pub async fn set_file_input_files_by_object(
        &self,
        files: Vec<String>,
        object_id: &str,
    ) -> Result<()> {
        self.send_command(
            "DOM.setFileInputFiles",
            json!({
                "files": files,
                "objectId": object_id,
            }),
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._reader_handle.abort();
        self._writer_handle.abort();
    }
}
