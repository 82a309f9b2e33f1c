use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event types for topology change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NodeAdded,
    NodeRemoved,
    NodeRenamed,
    NodeUpdated,
    NodeMoved,
    LinkAdded,
    LinkRemoved,
    LinkUpdated,
    TopologyCleared,
    TopologyImported,
    RegionChanged,
    SelectionChanged,
    ModeChanged,
    ConfirmationChanged,
    AssignmentChanged,
    CandidatesLoaded,
    ActionStarted,
    ActionFinished,
}

/// Change notification message
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self { event_type, payload }
    }
}

/// Callback type for change notifications
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// WebSocket hub manages connections and broadcasts events
pub struct Hub {
    tx: broadcast::Sender<String>,
    client_count: AtomicUsize,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            client_count: AtomicUsize::new(0),
        }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast_event(&self, event: &Event) {
        let data = match serde_json::to_string(event) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error serializing WebSocket event: {}", e);
                return;
            }
        };

        let count = self.client_count();
        if count > 0 {
            if let Err(e) = self.tx.send(data) {
                tracing::warn!("Error broadcasting WebSocket event: {}", e);
            } else {
                tracing::debug!("Broadcasting {:?} to {} clients", event.event_type, count);
            }
        }
    }

    /// Callback forwarding workspace events to this hub
    pub fn callback(self: &Arc<Self>) -> EventCallback {
        let hub = self.clone();
        Arc::new(move |event| hub.broadcast_event(event))
    }

    /// Get the number of connected clients
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    /// Subscribe to events
    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    fn increment_clients(&self) {
        let count = self.client_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("WebSocket client connected. Total clients: {}", count);
    }

    fn decrement_clients(&self) {
        let previous = self
            .client_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)))
            .unwrap_or(0);
        tracing::info!(
            "WebSocket client disconnected. Total clients: {}",
            previous.saturating_sub(1)
        );
    }
}

/// WebSocket handler for axum
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sender, mut receiver) = socket.split();

    hub.increment_clients();

    // Subscribe to broadcast events
    let mut rx = hub.subscribe();

    // Task to send messages to client
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = next_frame(&mut rx).await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Task to receive messages from client (just to keep connection alive)
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.decrement_clients();
}

/// Next frame for a client; a lagging receiver skips what it missed and keeps going
async fn next_frame(rx: &mut broadcast::Receiver<String>) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("WebSocket client lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
