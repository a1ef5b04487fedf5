use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use tag_core::net::messages::{
    PlayerMovedMsg, PlayerRemovedMsg, PositionUpdateMsg, RosterInitMsg, ServerMessage,
};
use tag_core::net::protocol::encode_server_message;
use tag_core::player::{PlayerColor, PlayerSnapshot, SessionId};

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded so a slow client drops messages instead of growing memory.
/// Uses `Bytes` for zero-copy cloning when broadcasting.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Fan-out of server messages to connected sessions. Delivery is
/// best-effort: a full or closed channel skips that recipient only.
#[derive(Debug, Default)]
pub struct RosterBroadcaster {
    senders: HashMap<SessionId, PlayerSender>,
}

fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server message");
            None
        },
    }
}

impl RosterBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: SessionId, sender: PlayerSender) {
        self.senders.insert(id, sender);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<PlayerSender> {
        self.senders.remove(&id)
    }

    fn deliver(&self, id: SessionId, sender: &PlayerSender, bytes: Bytes) {
        if let Err(e) = sender.try_send(bytes) {
            tracing::debug!(
                session = %id, error = %e,
                "Skipping message to slow or disconnected client"
            );
        }
    }

    /// Send a message to one session.
    pub fn send_to(&self, id: SessionId, msg: &ServerMessage) {
        if let Some(sender) = self.senders.get(&id)
            && let Some(bytes) = encode(msg)
        {
            self.deliver(id, sender, bytes);
        }
    }

    /// Send a message to every connected session.
    pub fn broadcast(&self, msg: &ServerMessage) {
        let Some(bytes) = encode(msg) else {
            return;
        };
        for (&id, sender) in &self.senders {
            self.deliver(id, sender, bytes.clone());
        }
    }

    /// Send a message to every connected session except `exclude`.
    pub fn broadcast_except(&self, exclude: SessionId, msg: &ServerMessage) {
        let Some(bytes) = encode(msg) else {
            return;
        };
        for (&id, sender) in &self.senders {
            if id != exclude {
                self.deliver(id, sender, bytes.clone());
            }
        }
    }

    /// Give a new session the full roster, then announce it to everyone else.
    pub fn on_join(&self, joined: &PlayerSnapshot, roster: Vec<PlayerSnapshot>) {
        self.send_to(
            joined.id,
            &ServerMessage::RosterInit(RosterInitMsg {
                self_id: joined.id,
                players: roster,
            }),
        );
        self.broadcast_except(joined.id, &ServerMessage::PlayerJoined(joined.clone()));
    }

    pub fn on_leave(&self, id: SessionId) {
        self.broadcast(&ServerMessage::PlayerRemoved(PlayerRemovedMsg {
            session_id: id,
        }));
    }

    /// Relay a position update verbatim to every other session.
    pub fn relay_position(&self, from: SessionId, color: PlayerColor, update: PositionUpdateMsg) {
        self.broadcast_except(
            from,
            &ServerMessage::PlayerMoved(PlayerMovedMsg {
                session_id: from,
                color,
                update,
            }),
        );
    }
}
