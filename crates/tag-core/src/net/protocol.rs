use serde::{Deserialize, Serialize};

use super::messages::{
    BuffCollectMsg, BuffCollectedMsg, ClientMessage, MessageType, NameChangedMsg, PingMsg,
    PlayerMovedMsg, PlayerRemovedMsg, PositionUpdateMsg, RosterInitMsg, ServerMessage,
    SetNameMsg, SpawnLocationsMsg, TagAssignedMsg, TagAttemptMsg,
};
use crate::player::PlayerSnapshot;
use crate::powerup::Buff;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::PositionUpdate(m) => encode_message(MessageType::PositionUpdate, m),
        ClientMessage::TagAttempt(m) => encode_message(MessageType::TagAttempt, m),
        ClientMessage::BuffCollect(m) => encode_message(MessageType::BuffCollect, m),
        ClientMessage::SpawnLocations(m) => encode_message(MessageType::SpawnLocations, m),
        ClientMessage::SetName(m) => encode_message(MessageType::SetName, m),
        ClientMessage::Ping(m) => encode_message(MessageType::Ping, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RosterInit(m) => encode_message(MessageType::RosterInit, m),
        ServerMessage::PlayerJoined(m) => encode_message(MessageType::PlayerJoined, m),
        ServerMessage::PlayerRemoved(m) => encode_message(MessageType::PlayerRemoved, m),
        ServerMessage::PlayerMoved(m) => encode_message(MessageType::PlayerMoved, m),
        ServerMessage::TagAssigned(m) => encode_message(MessageType::TagAssigned, m),
        ServerMessage::BuffSpawned(m) => encode_message(MessageType::BuffSpawned, m),
        ServerMessage::BuffCollected(m) => encode_message(MessageType::BuffCollected, m),
        ServerMessage::BuffsCleared => encode_message(MessageType::BuffsCleared, &()),
        ServerMessage::NameChanged(m) => encode_message(MessageType::NameChanged, m),
        ServerMessage::Pong(m) => encode_message(MessageType::Pong, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`. Server-only types are
/// rejected as unknown.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::PositionUpdate => Ok(ClientMessage::PositionUpdate(decode_payload::<
            PositionUpdateMsg,
        >(data)?)),
        MessageType::TagAttempt => Ok(ClientMessage::TagAttempt(decode_payload::<TagAttemptMsg>(
            data,
        )?)),
        MessageType::BuffCollect => Ok(ClientMessage::BuffCollect(
            decode_payload::<BuffCollectMsg>(data)?,
        )),
        MessageType::SpawnLocations => Ok(ClientMessage::SpawnLocations(decode_payload::<
            SpawnLocationsMsg,
        >(data)?)),
        MessageType::SetName => Ok(ClientMessage::SetName(decode_payload::<SetNameMsg>(data)?)),
        MessageType::Ping => Ok(ClientMessage::Ping(decode_payload::<PingMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RosterInit => Ok(ServerMessage::RosterInit(decode_payload::<RosterInitMsg>(
            data,
        )?)),
        MessageType::PlayerJoined => Ok(ServerMessage::PlayerJoined(decode_payload::<
            PlayerSnapshot,
        >(data)?)),
        MessageType::PlayerRemoved => Ok(ServerMessage::PlayerRemoved(decode_payload::<
            PlayerRemovedMsg,
        >(data)?)),
        MessageType::PlayerMoved => Ok(ServerMessage::PlayerMoved(
            decode_payload::<PlayerMovedMsg>(data)?,
        )),
        MessageType::TagAssigned => Ok(ServerMessage::TagAssigned(
            decode_payload::<TagAssignedMsg>(data)?,
        )),
        MessageType::BuffSpawned => Ok(ServerMessage::BuffSpawned(decode_payload::<Buff>(data)?)),
        MessageType::BuffCollected => Ok(ServerMessage::BuffCollected(decode_payload::<
            BuffCollectedMsg,
        >(data)?)),
        MessageType::BuffsCleared => {
            decode_payload::<()>(data)?;
            Ok(ServerMessage::BuffsCleared)
        },
        MessageType::NameChanged => Ok(ServerMessage::NameChanged(
            decode_payload::<NameChangedMsg>(data)?,
        )),
        MessageType::Pong => Ok(ServerMessage::Pong(decode_payload::<PingMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
