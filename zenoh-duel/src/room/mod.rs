//! Room lifecycle store
//!
//! A room pairs a host with at most one guest and moves forward through
//! `waiting -> playing -> finished`. The store is an external collaborator of
//! the match: the session only needs the operations of [`RoomStore`].

pub(crate) mod book;
pub mod memory;
pub mod zenoh_store;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{PlayerId, RoomId, RoomState};

pub use book::{RoomBook, FINISHED_ROOM_TTL_MS, WAITING_ROOM_TTL_MS};
pub use memory::MemoryRoomStore;
pub use zenoh_store::ZenohRoomStore;

/// Async, fallible room store
pub trait RoomStore: Send + Sync {
    /// Create a waiting room hosted by `host`
    fn create_room<'a>(&'a self, host: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>>;

    /// Join a waiting room as its guest; fails unless the room is waiting
    fn join_room<'a>(&'a self, room: &'a RoomId, guest: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>>;

    fn get_room<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<RoomState>>;

    /// Waiting rooms, newest first, at most `limit`
    fn list_waiting(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RoomState>>>;

    /// Record the final score of a player
    fn report_score<'a>(
        &'a self,
        room: &'a RoomId,
        player: &'a PlayerId,
        score: u64,
    ) -> BoxFuture<'a, Result<RoomState>>;

    /// Mark the room finished; an already finished room is returned as-is
    fn finalize_room<'a>(
        &'a self,
        room: &'a RoomId,
        winner: Option<PlayerId>,
    ) -> BoxFuture<'a, Result<RoomState>>;

    /// Receive every change of the room record
    fn watch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<RoomState>>>;

    /// Drop expired rooms, returning how many were removed
    fn cleanup(&self, now_ms: u64) -> BoxFuture<'_, Result<usize>>;
}
