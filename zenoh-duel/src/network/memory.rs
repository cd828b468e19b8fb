//! In-process transport

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::error::{DuelError, Result};
use crate::network::transport::{Delivery, Transport};
use crate::types::{PlayerId, RoomId};

/// Transport delivering payloads between tasks of one process
///
/// Clones share the same hub, so two players of a local match simply hold
/// clones of one `MemoryTransport`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    rooms: Arc<Mutex<HashMap<RoomId, Vec<flume::Sender<Delivery>>>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a connectivity loss: publishes fail while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn deliver(&self, room: &RoomId, delivery: Delivery) -> Result<()> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| DuelError::Internal("memory transport lock poisoned".to_string()))?;
        if let Some(subscribers) = rooms.get_mut(room) {
            // Drop subscribers whose receiver is gone
            subscribers.retain(|tx| tx.send(delivery.clone()).is_ok());
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn publish<'a>(
        &'a self,
        room: &'a RoomId,
        sender: &'a PlayerId,
        payload: Vec<u8>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.offline.load(Ordering::Relaxed) {
                return Err(DuelError::Transport("memory transport is offline".to_string()));
            }
            self.deliver(
                room,
                Delivery {
                    sender: sender.clone(),
                    payload,
                },
            )
        })
    }

    fn subscribe<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<Delivery>>> {
        Box::pin(async move {
            let (tx, rx) = flume::unbounded();
            self.rooms
                .lock()
                .map_err(|_| DuelError::Internal("memory transport lock poisoned".to_string()))?
                .entry(room.clone())
                .or_default()
                .push(tx);
            Ok(rx)
        })
    }
}
