/// Room records owned by one process
use std::collections::HashMap;

use crate::error::{DuelError, Result};
use crate::types::{PlayerId, RoomId, RoomState, RoomStatus};

/// Waiting rooms nobody joined are dropped after one hour
pub const WAITING_ROOM_TTL_MS: u64 = 60 * 60 * 1000;
/// Finished rooms are kept for one day
pub const FINISHED_ROOM_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Map of room records with the store semantics applied on top
///
/// Both store implementations keep their owned rooms in a `RoomBook`, so
/// join races, idempotent finalization and cleanup behave the same.
#[derive(Debug, Default)]
pub struct RoomBook {
    rooms: HashMap<RoomId, RoomState>,
}

impl RoomBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Create a waiting room hosted by `host`
    pub fn create(&mut self, host: PlayerId, now_ms: u64) -> RoomState {
        let mut id = RoomId::generate();
        while self.rooms.contains_key(&id) {
            id = RoomId::generate();
        }
        let room = RoomState::new(id.clone(), host, now_ms);
        self.rooms.insert(id, room.clone());
        room
    }

    pub fn get(&self, room: &RoomId) -> Result<RoomState> {
        self.rooms
            .get(room)
            .cloned()
            .ok_or_else(|| DuelError::RoomNotFound(room.to_string()))
    }

    /// Seat the guest and start the match
    ///
    /// Only a waiting room can be joined; the first join wins and every
    /// later one fails with [`DuelError::RoomNotJoinable`].
    pub fn join(&mut self, room: &RoomId, guest: PlayerId) -> Result<RoomState> {
        let state = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| DuelError::RoomNotFound(room.to_string()))?;
        if state.status != RoomStatus::Waiting || state.host == guest {
            return Err(DuelError::RoomNotJoinable {
                room: room.to_string(),
                status: state.status.to_string(),
            });
        }
        state.transition(RoomStatus::Playing)?;
        state.guest = Some(guest);
        Ok(state.clone())
    }

    /// Waiting rooms, newest first
    pub fn list_waiting(&self, limit: usize) -> Vec<RoomState> {
        let mut waiting: Vec<RoomState> = self
            .rooms
            .values()
            .filter(|room| room.status == RoomStatus::Waiting)
            .cloned()
            .collect();
        sort_newest_first(&mut waiting);
        waiting.truncate(limit);
        waiting
    }

    pub fn report_score(&mut self, room: &RoomId, player: &PlayerId, score: u64) -> Result<RoomState> {
        let state = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| DuelError::RoomNotFound(room.to_string()))?;
        if !state.record_score(player, score) {
            return Err(DuelError::NotInRoom {
                room: room.to_string(),
                player: player.to_string(),
            });
        }
        Ok(state.clone())
    }

    /// Mark the room finished with the given winner
    ///
    /// A room that is already finished is returned unchanged, whoever asks.
    pub fn finalize(&mut self, room: &RoomId, winner: Option<PlayerId>) -> Result<(RoomState, bool)> {
        let state = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| DuelError::RoomNotFound(room.to_string()))?;
        if state.status == RoomStatus::Finished {
            return Ok((state.clone(), false));
        }
        state.transition(RoomStatus::Finished)?;
        state.winner = winner.filter(|w| state.has_player(w));
        Ok((state.clone(), true))
    }

    /// Drop expired rooms, returning their ids
    pub fn cleanup(&mut self, now_ms: u64) -> Vec<RoomId> {
        let expired: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| {
                let age = now_ms.saturating_sub(room.created_at_ms);
                match room.status {
                    RoomStatus::Waiting => age > WAITING_ROOM_TTL_MS,
                    RoomStatus::Finished => age > FINISHED_ROOM_TTL_MS,
                    RoomStatus::Playing => false,
                }
            })
            .map(|room| room.id.clone())
            .collect();
        for id in &expired {
            self.rooms.remove(id);
        }
        expired
    }
}

/// Sort by creation time, newest first (room id breaks ties)
pub fn sort_newest_first(rooms: &mut [RoomState]) {
    rooms.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
}
