//! Key expression types for room traffic
//!
//! All keyexprs live under `<prefix>/room/<room_id>/...`:
//!
//! - `<prefix>/room/<room_id>/state/<player_id>` snapshots published by a player
//! - `<prefix>/room/<room_id>/status` room status changes
//! - `<prefix>/room/<room_id>/store` queryable serving the room record
//!
//! `None` in an identifier position stands for the `*` wildcard.

use crate::error::DuelError;
use crate::types::{PlayerId, RoomId};
use zenoh::key_expr::KeyExpr;

fn chunk_or_wildcard<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "*".to_string(),
    }
}

fn into_keyexpr(s: String) -> KeyExpr<'static> {
    // Identifiers are validated as single chunks and the prefix is already a keyexpr
    KeyExpr::try_from(s).expect("valid keyexpr")
}

/// Split `<prefix>/room/<room>/<tail...>` and return (prefix, room, tail)
fn split_room(keyexpr: &KeyExpr<'_>, tail_len: usize) -> Result<(String, Option<RoomId>, Vec<String>), DuelError> {
    let parts: Vec<&str> = keyexpr.as_str().split('/').collect();
    // [...prefix]/room/<room>/<tail>
    if parts.len() < 3 + tail_len {
        return Err(DuelError::InvalidKeyexpr(keyexpr.as_str().to_string()));
    }
    let room_pos = parts.len() - tail_len - 1;
    if parts[room_pos - 1] != "room" {
        return Err(DuelError::InvalidKeyexpr(keyexpr.as_str().to_string()));
    }
    let room = match parts[room_pos] {
        "*" => None,
        id => Some(RoomId::parse(id)?),
    };
    let prefix = parts[..room_pos - 1].join("/");
    let tail = parts[room_pos + 1..].iter().map(|s| s.to_string()).collect();
    Ok((prefix, room, tail))
}

/// Snapshot keyexpr: `<prefix>/room/<room_id>/state/<player_id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprRoomState {
    prefix: KeyExpr<'static>,
    room: Option<RoomId>,
    player: Option<PlayerId>,
}

impl KeyexprRoomState {
    pub fn new(prefix: impl Into<KeyExpr<'static>>, room: Option<RoomId>, player: Option<PlayerId>) -> Self {
        Self {
            prefix: prefix.into(),
            room,
            player,
        }
    }

    pub fn prefix(&self) -> &KeyExpr<'static> {
        &self.prefix
    }

    pub fn room(&self) -> &Option<RoomId> {
        &self.room
    }

    pub fn player(&self) -> &Option<PlayerId> {
        &self.player
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprRoomState {
    type Error = DuelError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self, Self::Error> {
        let (prefix, room, tail) = split_room(&keyexpr, 2)?;
        if tail[0] != "state" {
            return Err(DuelError::InvalidKeyexpr(format!(
                "Invalid KeyexprRoomState pattern: {}",
                keyexpr.as_str()
            )));
        }
        let player = match tail[1].as_str() {
            "*" => None,
            name => Some(PlayerId::from_name(name.to_string())?),
        };
        let prefix = KeyExpr::try_from(prefix).map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;
        Ok(Self { prefix, room, player })
    }
}

impl From<KeyexprRoomState> for KeyExpr<'static> {
    fn from(ke: KeyexprRoomState) -> Self {
        into_keyexpr(format!(
            "{}/room/{}/state/{}",
            ke.prefix,
            chunk_or_wildcard(&ke.room),
            chunk_or_wildcard(&ke.player)
        ))
    }
}

/// Room status keyexpr: `<prefix>/room/<room_id>/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprRoomStatus {
    prefix: KeyExpr<'static>,
    room: Option<RoomId>,
}

impl KeyexprRoomStatus {
    pub fn new(prefix: impl Into<KeyExpr<'static>>, room: Option<RoomId>) -> Self {
        Self {
            prefix: prefix.into(),
            room,
        }
    }

    pub fn room(&self) -> &Option<RoomId> {
        &self.room
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprRoomStatus {
    type Error = DuelError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self, Self::Error> {
        let (prefix, room, tail) = split_room(&keyexpr, 1)?;
        if tail[0] != "status" {
            return Err(DuelError::InvalidKeyexpr(format!(
                "Invalid KeyexprRoomStatus pattern: {}",
                keyexpr.as_str()
            )));
        }
        let prefix = KeyExpr::try_from(prefix).map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;
        Ok(Self { prefix, room })
    }
}

impl From<KeyexprRoomStatus> for KeyExpr<'static> {
    fn from(ke: KeyexprRoomStatus) -> Self {
        into_keyexpr(format!("{}/room/{}/status", ke.prefix, chunk_or_wildcard(&ke.room)))
    }
}

/// Room store keyexpr: `<prefix>/room/<room_id>/store`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprRoomStore {
    prefix: KeyExpr<'static>,
    room: Option<RoomId>,
}

impl KeyexprRoomStore {
    pub fn new(prefix: impl Into<KeyExpr<'static>>, room: Option<RoomId>) -> Self {
        Self {
            prefix: prefix.into(),
            room,
        }
    }

    pub fn room(&self) -> &Option<RoomId> {
        &self.room
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprRoomStore {
    type Error = DuelError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self, Self::Error> {
        let (prefix, room, tail) = split_room(&keyexpr, 1)?;
        if tail[0] != "store" {
            return Err(DuelError::InvalidKeyexpr(format!(
                "Invalid KeyexprRoomStore pattern: {}",
                keyexpr.as_str()
            )));
        }
        let prefix = KeyExpr::try_from(prefix).map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;
        Ok(Self { prefix, room })
    }
}

impl From<KeyexprRoomStore> for KeyExpr<'static> {
    fn from(ke: KeyexprRoomStore) -> Self {
        into_keyexpr(format!("{}/room/{}/store", ke.prefix, chunk_or_wildcard(&ke.room)))
    }
}
