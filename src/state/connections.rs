use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Role held by a connection within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionRole {
    /// May start the quiz and advance questions.
    Organizer,
    /// Regular team member.
    #[default]
    Participant,
}

impl ConnectionRole {
    /// Whether this role carries organizer privileges.
    pub fn is_organizer(self) -> bool {
        matches!(self, ConnectionRole::Organizer)
    }
}

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    /// Writer channel feeding the connection's WebSocket sender task.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Session the connection joined, if any.
    pub session_id: Option<String>,
    /// Player record bound to the connection after a team join.
    pub player_id: Option<Uuid>,
    /// Role claimed when joining the session.
    pub role: ConnectionRole,
}

/// Registry of live WebSocket connections keyed by their identifier.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ClientConnection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly established connection.
    pub fn insert(&self, id: Uuid, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(
            id,
            ClientConnection {
                tx,
                session_id: None,
                player_id: None,
                role: ConnectionRole::default(),
            },
        );
    }

    /// Remove a connection, returning its last known state.
    pub fn remove(&self, id: Uuid) -> Option<ClientConnection> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Record which session a connection joined and the role it claimed.
    pub fn set_session(&self, id: Uuid, session_id: &str, role: ConnectionRole) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.session_id = Some(session_id.to_string());
            connection.role = role;
        }
    }

    /// Bind a player record to a connection after a successful team join.
    pub fn set_player(&self, id: Uuid, player_id: Uuid) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.player_id = Some(player_id);
        }
    }

    /// Snapshot of a connection's session membership.
    pub fn get(&self, id: Uuid) -> Option<ClientConnection> {
        self.connections.get(&id).map(|entry| entry.clone())
    }

    /// All connections currently joined to a session.
    pub fn connections_in_session(&self, session_id: &str) -> Vec<(Uuid, ClientConnection)> {
        self.connections
            .iter()
            .filter(|entry| entry.session_id.as_deref() == Some(session_id))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}
