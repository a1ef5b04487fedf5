use serde::{Deserialize, Serialize};

use crate::player::{AnimState, PlayerColor, PlayerSnapshot, SessionId};
use crate::powerup::{Buff, BuffFlags, BuffId, BuffKind, SpawnLocation};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    PositionUpdate = 0x01,
    TagAttempt = 0x02,
    BuffCollect = 0x03,
    SpawnLocations = 0x04,
    SetName = 0x05,
    Ping = 0x06,

    // Server -> Client
    RosterInit = 0x10,
    PlayerJoined = 0x11,
    PlayerRemoved = 0x12,
    PlayerMoved = 0x13,
    TagAssigned = 0x14,
    BuffSpawned = 0x15,
    BuffCollected = 0x16,
    BuffsCleared = 0x17,
    NameChanged = 0x18,
    Pong = 0x19,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::PositionUpdate),
            0x02 => Some(Self::TagAttempt),
            0x03 => Some(Self::BuffCollect),
            0x04 => Some(Self::SpawnLocations),
            0x05 => Some(Self::SetName),
            0x06 => Some(Self::Ping),
            0x10 => Some(Self::RosterInit),
            0x11 => Some(Self::PlayerJoined),
            0x12 => Some(Self::PlayerRemoved),
            0x13 => Some(Self::PlayerMoved),
            0x14 => Some(Self::TagAssigned),
            0x15 => Some(Self::BuffSpawned),
            0x16 => Some(Self::BuffCollected),
            0x17 => Some(Self::BuffsCleared),
            0x18 => Some(Self::NameChanged),
            0x19 => Some(Self::Pong),
            _ => None,
        }
    }

    /// True for types only the server may send.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

// ---------------------------------------------------------------------------
// Client -> Server payloads
// ---------------------------------------------------------------------------

/// Position and visible state reported every client frame. Untrusted: the
/// server stores it and relays it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdateMsg {
    pub x: f32,
    pub y: f32,
    pub is_tagged: bool,
    pub buffs: BuffFlags,
    pub anim: AnimState,
}

/// The sender claims to have touched `target` while being "it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAttemptMsg {
    pub target: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffCollectMsg {
    pub buff_id: BuffId,
    pub kind: BuffKind,
}

/// One-time registration of buff spawn points from the client's map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnLocationsMsg {
    pub locations: Vec<SpawnLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNameMsg {
    pub name: String,
}

/// Latency probe. The server answers with a `Pong` carrying the same nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMsg {
    pub nonce: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PositionUpdate(PositionUpdateMsg),
    TagAttempt(TagAttemptMsg),
    BuffCollect(BuffCollectMsg),
    SpawnLocations(SpawnLocationsMsg),
    SetName(SetNameMsg),
    Ping(PingMsg),
}

// ---------------------------------------------------------------------------
// Server -> Client payloads
// ---------------------------------------------------------------------------

/// Full roster sent once to a newly connected session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterInitMsg {
    pub self_id: SessionId,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRemovedMsg {
    pub session_id: SessionId,
}

/// A client's `PositionUpdateMsg`, annotated with who sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMovedMsg {
    pub session_id: SessionId,
    pub color: PlayerColor,
    pub update: PositionUpdateMsg,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssignedMsg {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffCollectedMsg {
    pub session_id: SessionId,
    pub buff_id: BuffId,
    pub kind: BuffKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameChangedMsg {
    pub session_id: SessionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RosterInit(RosterInitMsg),
    PlayerJoined(PlayerSnapshot),
    PlayerRemoved(PlayerRemovedMsg),
    PlayerMoved(PlayerMovedMsg),
    TagAssigned(TagAssignedMsg),
    BuffSpawned(Buff),
    BuffCollected(BuffCollectedMsg),
    BuffsCleared,
    NameChanged(NameChangedMsg),
    Pong(PingMsg),
}
