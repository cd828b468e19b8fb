//! In-process room store
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;

use crate::error::{DuelError, Result};
use crate::room::{RoomBook, RoomStore};
use crate::types::{now_unix_ms, PlayerId, RoomId, RoomState};

#[derive(Debug, Default)]
struct Inner {
    book: RoomBook,
    watchers: HashMap<RoomId, Vec<flume::Sender<RoomState>>>,
}

impl Inner {
    fn notify(&mut self, state: &RoomState) {
        if let Some(watchers) = self.watchers.get_mut(&state.id) {
            watchers.retain(|tx| tx.send(state.clone()).is_ok());
        }
    }
}

/// Room store shared by clones within one process
#[derive(Debug, Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| DuelError::Internal("room store lock poisoned".to_string()))
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room<'a>(&'a self, host: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let room = self.lock()?.book.create(host.clone(), now_unix_ms());
            tracing::info!("Room '{}' created by '{}'", room.id, host);
            Ok(room)
        })
    }

    fn join_room<'a>(&'a self, room: &'a RoomId, guest: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let state = inner.book.join(room, guest.clone())?;
            inner.notify(&state);
            tracing::info!("Player '{}' joined room '{}'", guest, room);
            Ok(state)
        })
    }

    fn get_room<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move { self.lock()?.book.get(room) })
    }

    fn list_waiting(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RoomState>>> {
        Box::pin(async move { Ok(self.lock()?.book.list_waiting(limit)) })
    }

    fn report_score<'a>(
        &'a self,
        room: &'a RoomId,
        player: &'a PlayerId,
        score: u64,
    ) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let state = inner.book.report_score(room, player, score)?;
            inner.notify(&state);
            Ok(state)
        })
    }

    fn finalize_room<'a>(
        &'a self,
        room: &'a RoomId,
        winner: Option<PlayerId>,
    ) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let (state, changed) = inner.book.finalize(room, winner)?;
            if changed {
                inner.notify(&state);
                tracing::info!(
                    "Room '{}' finalized, winner: {}",
                    room,
                    state.winner.as_ref().map(|w| w.as_str()).unwrap_or("none")
                );
            }
            Ok(state)
        })
    }

    fn watch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<RoomState>>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            // Watching an unknown room is an error, like any other room access
            inner.book.get(room)?;
            let (tx, rx) = flume::unbounded();
            inner.watchers.entry(room.clone()).or_default().push(tx);
            Ok(rx)
        })
    }

    fn cleanup(&self, now_ms: u64) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let removed = inner.book.cleanup(now_ms);
            for id in &removed {
                inner.watchers.remove(id);
            }
            if !removed.is_empty() {
                tracing::debug!("Removed {} expired room(s)", removed.len());
            }
            Ok(removed.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::WAITING_ROOM_TTL_MS;
    use crate::types::RoomStatus;

    fn player(name: &str) -> PlayerId {
        PlayerId::from_name(name.to_string()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_room_lifecycle() {
        let store = MemoryRoomStore::new();
        let host = player("host");
        let guest = player("guest");

        let room = store.create_room(&host).await.unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(store.list_waiting(10).await.unwrap().len(), 1);

        let watch = store.watch(&room.id).await.unwrap();
        store.join_room(&room.id, &guest).await.unwrap();
        assert_eq!(watch.recv_async().await.unwrap().status, RoomStatus::Playing);
        assert!(store.list_waiting(10).await.unwrap().is_empty());

        store.report_score(&room.id, &host, 300).await.unwrap();
        assert_eq!(watch.recv_async().await.unwrap().host_score, Some(300));

        let finished = store.finalize_room(&room.id, Some(host.clone())).await.unwrap();
        assert_eq!(finished.status, RoomStatus::Finished);
        assert_eq!(finished.winner, Some(host.clone()));
        assert_eq!(watch.recv_async().await.unwrap().status, RoomStatus::Finished);

        // Second finalization changes nothing and notifies nobody
        let again = store.finalize_room(&room.id, None).await.unwrap();
        assert_eq!(again.winner, Some(host));
        assert!(watch.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_concurrent_joins_have_one_winner() {
        let store = MemoryRoomStore::new();
        let room = store.create_room(&player("host")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            let id = room.id.clone();
            handles.push(tokio::spawn(async move {
                store.join_room(&id, &player(&format!("guest{}", i))).await
            }));
        }
        let mut joined = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => joined += 1,
                Err(e) => assert!(matches!(e, DuelError::RoomNotJoinable { .. })),
            }
        }
        assert_eq!(joined, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_watch_unknown_room_fails() {
        let store = MemoryRoomStore::new();
        let missing = RoomId::parse("missing").unwrap();
        assert!(matches!(store.watch(&missing).await, Err(DuelError::RoomNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_cleanup_drops_stale_waiting_rooms() {
        let store = MemoryRoomStore::new();
        let room = store.create_room(&player("host")).await.unwrap();
        assert_eq!(store.cleanup(room.created_at_ms).await.unwrap(), 0);
        assert_eq!(
            store
                .cleanup(room.created_at_ms + WAITING_ROOM_TTL_MS + 1)
                .await
                .unwrap(),
            1
        );
        assert!(store.get_room(&room.id).await.is_err());
    }
}
