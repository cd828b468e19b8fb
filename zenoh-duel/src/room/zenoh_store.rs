//! Room store over Zenoh query/queryable
//!
//! ## Protocol Overview
//!
//! The process that creates a room owns its record. Every store declares a
//! SINGLE queryable on `<prefix>/room/*/store` and answers for the rooms it
//! owns:
//!
//! 1. **Room operations**: query on `<prefix>/room/<room_id>/store` with a
//!    JSON [`StoreRequest`] payload (`get`, `join`, `report`, `finalize`).
//!    Only the owner replies, with a JSON [`StoreReply`]. No reply before the
//!    timeout means the room is unknown.
//!
//! 2. **Listing**: query on `<prefix>/room/*/store` with a `list_waiting`
//!    request. Each owner replies once per waiting room, on the concrete
//!    `<prefix>/room/<room_id>/store` keyexpr.
//!
//! Operations on rooms owned by the calling store are applied locally without
//! a network round trip. Every change of a record is published on
//! `<prefix>/room/<room_id>/status`, which is what `watch()` subscribes to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use zenoh::key_expr::KeyExpr;
use zenoh::query::Query;

use crate::error::{DuelError, Result};
use crate::network::keyexpr::{KeyexprRoomStatus, KeyexprRoomStore};
use crate::room::book::sort_newest_first;
use crate::room::{RoomBook, RoomStore};
use crate::types::{now_unix_ms, PlayerId, RoomId, RoomState};

/// Request carried in the query payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRequest {
    Get,
    Join { guest: PlayerId },
    Report { player: PlayerId, score: u64 },
    Finalize { winner: Option<PlayerId> },
    ListWaiting { limit: usize },
}

/// Reply carried in the sample payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StoreReply {
    Room { room: RoomState },
    NotFound,
    NotJoinable { status: String },
    NotInRoom { player: String },
    Failed { message: String },
}

impl StoreReply {
    fn from_result(result: Result<RoomState>) -> Self {
        match result {
            Ok(room) => StoreReply::Room { room },
            Err(DuelError::RoomNotFound(_)) => StoreReply::NotFound,
            Err(DuelError::RoomNotJoinable { status, .. }) => StoreReply::NotJoinable { status },
            Err(DuelError::NotInRoom { player, .. }) => StoreReply::NotInRoom { player },
            Err(e) => StoreReply::Failed { message: e.to_string() },
        }
    }

    fn into_result(self, room: &RoomId) -> Result<RoomState> {
        match self {
            StoreReply::Room { room } => Ok(room),
            StoreReply::NotFound => Err(DuelError::RoomNotFound(room.to_string())),
            StoreReply::NotJoinable { status } => Err(DuelError::RoomNotJoinable {
                room: room.to_string(),
                status,
            }),
            StoreReply::NotInRoom { player } => Err(DuelError::NotInRoom {
                room: room.to_string(),
                player,
            }),
            StoreReply::Failed { message } => Err(DuelError::Internal(message)),
        }
    }
}

/// Owner side: the records created by this process
#[derive(Debug)]
struct Owner {
    session: zenoh::Session,
    prefix: KeyExpr<'static>,
    book: Mutex<RoomBook>,
}

impl Owner {
    fn book(&self) -> Result<MutexGuard<'_, RoomBook>> {
        self.book
            .lock()
            .map_err(|_| DuelError::Internal("room book lock poisoned".to_string()))
    }

    fn owns(&self, room: &RoomId) -> Result<bool> {
        Ok(self.book()?.contains(room))
    }

    /// Apply a room operation; the flag tells whether the record changed
    fn apply(&self, room: &RoomId, request: StoreRequest) -> Result<(RoomState, bool)> {
        let mut book = self.book()?;
        match request {
            StoreRequest::Get => Ok((book.get(room)?, false)),
            StoreRequest::Join { guest } => Ok((book.join(room, guest)?, true)),
            StoreRequest::Report { player, score } => Ok((book.report_score(room, &player, score)?, true)),
            StoreRequest::Finalize { winner } => book.finalize(room, winner),
            StoreRequest::ListWaiting { .. } => Err(DuelError::Internal(
                "listing is not an operation on a single room".to_string(),
            )),
        }
    }

    async fn publish_status(&self, state: &RoomState) {
        let keyexpr: KeyExpr = KeyexprRoomStatus::new(self.prefix.clone(), Some(state.id.clone())).into();
        let payload = match serde_json::to_vec(state) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode status of room '{}': {}", state.id, e);
                return;
            }
        };
        if let Err(e) = self.session.put(keyexpr, payload).await {
            tracing::warn!("Failed to publish status of room '{}': {}", state.id, e);
        }
    }

    async fn run(&self, room: &RoomId, request: StoreRequest) -> Result<RoomState> {
        let (state, changed) = self.apply(room, request)?;
        if changed {
            self.publish_status(&state).await;
        }
        Ok(state)
    }

    /// Answer one query from the store queryable
    async fn serve(&self, query: Query) {
        let room = match KeyexprRoomStore::try_from(query.key_expr().clone()) {
            Ok(parsed) => parsed.room().clone(),
            Err(e) => {
                tracing::debug!("Failed to parse store query keyexpr: {}", e);
                return;
            }
        };
        let request: StoreRequest = match query
            .payload()
            .map(|payload| serde_json::from_slice(&payload.to_bytes()))
        {
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                tracing::debug!("Malformed store request on '{}': {}", query.key_expr(), e);
                return;
            }
            None => StoreRequest::Get,
        };

        match (room, request) {
            (None, StoreRequest::ListWaiting { limit }) => {
                let waiting = match self.book() {
                    Ok(book) => book.list_waiting(limit),
                    Err(e) => {
                        tracing::warn!("Failed to list rooms: {}", e);
                        return;
                    }
                };
                for room in waiting {
                    let keyexpr: KeyExpr = KeyexprRoomStore::new(self.prefix.clone(), Some(room.id.clone())).into();
                    self.reply(&query, keyexpr, StoreReply::Room { room }).await;
                }
            }
            (Some(room), request) => {
                // Not ours: let the owner answer
                if !matches!(self.owns(&room), Ok(true)) {
                    return;
                }
                let reply = StoreReply::from_result(self.run(&room, request).await);
                let keyexpr = query.key_expr().clone().into_owned();
                self.reply(&query, keyexpr, reply).await;
            }
            (None, request) => {
                tracing::debug!("Ignoring wildcard store query with request {:?}", request);
            }
        }
    }

    async fn reply(&self, query: &Query, keyexpr: KeyExpr<'static>, reply: StoreReply) {
        match serde_json::to_vec(&reply) {
            Ok(payload) => {
                if let Err(e) = query.reply(keyexpr, payload).await {
                    tracing::debug!("Failed to reply to store query: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode store reply: {}", e),
        }
    }
}

/// Room store distributed over the zenoh session
///
/// Rooms created through this store are owned and served by it for as long
/// as it lives; rooms of other processes are reached with queries.
pub struct ZenohRoomStore {
    owner: Arc<Owner>,
    query_timeout: Duration,
    serving: tokio::task::JoinHandle<()>,
    subscribers: Mutex<Vec<zenoh::pubsub::Subscriber<()>>>,
}

impl std::fmt::Debug for ZenohRoomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohRoomStore")
            .field("prefix", &self.owner.prefix)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl Drop for ZenohRoomStore {
    fn drop(&mut self) {
        self.serving.abort();
    }
}

impl ZenohRoomStore {
    /// Declare the store queryable and start serving owned rooms
    pub async fn declare(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
        query_timeout: Duration,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let keyexpr: KeyExpr = KeyexprRoomStore::new(prefix.clone(), None).into();
        let queryable = session
            .declare_queryable(keyexpr)
            .await
            .map_err(DuelError::Zenoh)?;

        let owner = Arc::new(Owner {
            session: session.clone(),
            prefix,
            book: Mutex::new(RoomBook::new()),
        });

        let serving = tokio::spawn({
            let owner = owner.clone();
            async move {
                while let Ok(query) = queryable.recv_async().await {
                    owner.serve(query).await;
                }
                tracing::debug!("Room store queryable closed");
            }
        });

        Ok(Self {
            owner,
            query_timeout,
            serving,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    async fn remote(&self, room: &RoomId, request: StoreRequest) -> Result<RoomState> {
        let keyexpr: KeyExpr = KeyexprRoomStore::new(self.owner.prefix.clone(), Some(room.clone())).into();
        let replies = self
            .owner
            .session
            .get(keyexpr)
            .payload(serde_json::to_vec(&request)?)
            .timeout(self.query_timeout)
            .await
            .map_err(DuelError::Zenoh)?;

        while let Ok(reply) = replies.recv_async().await {
            match reply.result() {
                Ok(sample) => {
                    let reply: StoreReply = serde_json::from_slice(&sample.payload().to_bytes())?;
                    return reply.into_result(room);
                }
                Err(e) => tracing::debug!("Room store reply error: {:?}", e),
            }
        }
        Err(DuelError::RoomNotFound(room.to_string()))
    }

    async fn execute(&self, room: &RoomId, request: StoreRequest) -> Result<RoomState> {
        if self.owner.owns(room)? {
            self.owner.run(room, request).await
        } else {
            self.remote(room, request).await
        }
    }
}

impl RoomStore for ZenohRoomStore {
    fn create_room<'a>(&'a self, host: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let room = self.owner.book()?.create(host.clone(), now_unix_ms());
            self.owner.publish_status(&room).await;
            tracing::info!("Room '{}' created by '{}'", room.id, host);
            Ok(room)
        })
    }

    fn join_room<'a>(&'a self, room: &'a RoomId, guest: &'a PlayerId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let state = self
                .execute(room, StoreRequest::Join { guest: guest.clone() })
                .await?;
            tracing::info!("Player '{}' joined room '{}'", guest, room);
            Ok(state)
        })
    }

    fn get_room<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move { self.execute(room, StoreRequest::Get).await })
    }

    fn list_waiting(&self, limit: usize) -> BoxFuture<'_, Result<Vec<RoomState>>> {
        Box::pin(async move {
            let mut rooms: HashMap<RoomId, RoomState> = self
                .owner
                .book()?
                .list_waiting(limit)
                .into_iter()
                .map(|room| (room.id.clone(), room))
                .collect();

            let keyexpr: KeyExpr = KeyexprRoomStore::new(self.owner.prefix.clone(), None).into();
            let replies = self
                .owner
                .session
                .get(keyexpr)
                .payload(serde_json::to_vec(&StoreRequest::ListWaiting { limit })?)
                .timeout(self.query_timeout)
                .await
                .map_err(DuelError::Zenoh)?;

            while let Ok(reply) = replies.recv_async().await {
                let sample = match reply.result() {
                    Ok(sample) => sample,
                    Err(e) => {
                        tracing::debug!("Room listing reply error: {:?}", e);
                        continue;
                    }
                };
                match serde_json::from_slice::<StoreReply>(&sample.payload().to_bytes()) {
                    Ok(StoreReply::Room { room }) => {
                        rooms.entry(room.id.clone()).or_insert(room);
                    }
                    Ok(other) => tracing::debug!("Unexpected listing reply: {:?}", other),
                    Err(e) => tracing::debug!("Malformed listing reply: {}", e),
                }
            }

            let mut rooms: Vec<RoomState> = rooms.into_values().collect();
            sort_newest_first(&mut rooms);
            rooms.truncate(limit);
            Ok(rooms)
        })
    }

    fn report_score<'a>(
        &'a self,
        room: &'a RoomId,
        player: &'a PlayerId,
        score: u64,
    ) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            self.execute(
                room,
                StoreRequest::Report {
                    player: player.clone(),
                    score,
                },
            )
            .await
        })
    }

    fn finalize_room<'a>(
        &'a self,
        room: &'a RoomId,
        winner: Option<PlayerId>,
    ) -> BoxFuture<'a, Result<RoomState>> {
        Box::pin(async move {
            let state = self.execute(room, StoreRequest::Finalize { winner }).await?;
            tracing::info!(
                "Room '{}' finalized, winner: {}",
                room,
                state.winner.as_ref().map(|w| w.as_str()).unwrap_or("none")
            );
            Ok(state)
        })
    }

    fn watch<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<flume::Receiver<RoomState>>> {
        Box::pin(async move {
            let keyexpr: KeyExpr = KeyexprRoomStatus::new(self.owner.prefix.clone(), Some(room.clone())).into();
            let (tx, rx) = flume::unbounded();
            let subscriber = self
                .owner
                .session
                .declare_subscriber(keyexpr)
                .callback(move |sample| {
                    match serde_json::from_slice::<RoomState>(&sample.payload().to_bytes()) {
                        Ok(state) => {
                            let _ = tx.send(state);
                        }
                        Err(e) => tracing::debug!("Malformed room status on '{}': {}", sample.key_expr(), e),
                    }
                })
                .await
                .map_err(DuelError::Zenoh)?;
            self.subscribers
                .lock()
                .map_err(|_| DuelError::Internal("subscriber list lock poisoned".to_string()))?
                .push(subscriber);
            Ok(rx)
        })
    }

    fn cleanup(&self, now_ms: u64) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move {
            let removed = self.owner.book()?.cleanup(now_ms);
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
    use crate::types::RoomStatus;

    fn player(name: &str) -> PlayerId {
        PlayerId::from_name(name.to_string()).unwrap()
    }

    async fn store_pair(prefix: &'static str) -> (ZenohRoomStore, ZenohRoomStore) {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let prefix = KeyExpr::try_from(prefix).unwrap();
        let timeout = Duration::from_millis(500);
        let host_side = ZenohRoomStore::declare(&session, prefix.clone(), timeout).await.unwrap();
        let guest_side = ZenohRoomStore::declare(&session, prefix, timeout).await.unwrap();
        (host_side, guest_side)
    }

    #[test]
    fn test_request_wire_format() {
        let request = StoreRequest::Report {
            player: player("alice"),
            score: 42,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"op":"report","player":"alice","score":42}"#);
        assert_eq!(serde_json::from_str::<StoreRequest>(&json).unwrap(), request);
    }

    #[test]
    fn test_reply_maps_back_to_errors() {
        let room = RoomId::parse("r1").unwrap();
        let reply = StoreReply::from_result(Err(DuelError::RoomNotJoinable {
            room: room.to_string(),
            status: "playing".to_string(),
        }));
        assert!(matches!(
            reply.into_result(&room),
            Err(DuelError::RoomNotJoinable { status, .. }) if status == "playing"
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_remote_join_and_finalize() {
        let (host_side, guest_side) = store_pair("test/duel/store/join").await;
        let host = player("host");
        let guest = player("guest");

        let room = host_side.create_room(&host).await.unwrap();

        // The guest side does not own the room: everything goes through queries
        let listed = guest_side.list_waiting(10).await.unwrap();
        assert!(listed.iter().any(|r| r.id == room.id));

        let joined = guest_side.join_room(&room.id, &guest).await.unwrap();
        assert_eq!(joined.status, RoomStatus::Playing);
        assert!(matches!(
            guest_side.join_room(&room.id, &player("late")).await,
            Err(DuelError::RoomNotJoinable { .. })
        ));

        guest_side.report_score(&room.id, &guest, 900).await.unwrap();
        let finished = guest_side.finalize_room(&room.id, Some(guest.clone())).await.unwrap();
        assert_eq!(finished.winner, Some(guest));
        assert_eq!(host_side.get_room(&room.id).await.unwrap().guest_score, Some(900));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_unknown_room_times_out_as_not_found() {
        let (_host_side, guest_side) = store_pair("test/duel/store/missing").await;
        let missing = RoomId::parse("missing").unwrap();
        assert!(matches!(
            guest_side.get_room(&missing).await,
            Err(DuelError::RoomNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_watch_receives_status_changes() {
        let (host_side, guest_side) = store_pair("test/duel/store/watch").await;
        let room = host_side.create_room(&player("host")).await.unwrap();
        let watch = host_side.watch(&room.id).await.unwrap();

        guest_side.join_room(&room.id, &player("guest")).await.unwrap();
        let state = tokio::time::timeout(Duration::from_secs(2), watch.recv_async())
            .await
            .expect("status within timeout")
            .unwrap();
        assert_eq!(state.status, RoomStatus::Playing);
    }
}
