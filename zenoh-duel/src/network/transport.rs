//! Publish/subscribe seam for snapshot delivery

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{PlayerId, RoomId};

/// One payload delivered to a room subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Player that published the payload
    pub sender: PlayerId,
    /// Encoded snapshot
    pub payload: Vec<u8>,
}

/// At-least-once, possibly out-of-order room broadcast
///
/// Subscribers receive every payload published to the room, including their
/// own; filtering by sender is up to the caller.
pub trait Transport: Send + Sync {
    /// Publish a payload to all subscribers of the room
    fn publish<'a>(
        &'a self,
        room: &'a RoomId,
        sender: &'a PlayerId,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Subscribe to all payloads of the room
    ///
    /// The subscription lives until the returned receiver is dropped (or the
    /// transport itself is dropped).
    fn subscribe<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<Delivery>>>;
}
