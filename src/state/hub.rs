use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::ws::ServerMessage;

/// Per-session publish/subscribe hub used for quiz push messages.
///
/// The orchestrator only ever publishes here; it never iterates individual
/// connections. Each WebSocket task subscribes to its session's channel and
/// forwards messages through its own writer, which preserves per-connection
/// ordering.
pub struct SessionHub {
    channels: DashMap<String, broadcast::Sender<ServerMessage>>,
    capacity: usize,
}

impl SessionHub {
    /// Construct a hub whose per-session channels hold `capacity` in-flight messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber for the session, creating its channel on first use.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ServerMessage> {
        self.channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send a message to all current subscribers of the session, ignoring
    /// delivery errors (a session without subscribers is not an error).
    pub fn broadcast(&self, session_id: &str, message: ServerMessage) {
        if let Some(channel) = self.channels.get(session_id) {
            let _ = channel.send(message);
        }
    }

    /// Drop the session's channel, disconnecting all subscribers.
    pub fn remove(&self, session_id: &str) {
        self.channels.remove(session_id);
    }
}
