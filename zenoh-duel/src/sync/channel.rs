/// Snapshot channel between a player and its opponent
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::{DuelError, Result};
use crate::network::{Delivery, Transport};
use crate::stats::{StatsTracker, SyncStats};
use crate::sync::{OutboundThrottle, Reconciler, Snapshot, TimestampSource};
use crate::types::{now_unix_ms, PlayerId, RoomId};

/// Outcome of reconciling one inbound delivery
#[derive(Debug)]
pub enum Inbound<S> {
    /// Newer opponent snapshot, to be applied
    Applied(S),
    /// Our own publication echoed back by the transport
    Own,
    /// Sent by someone who is not the opponent of this room, or before the
    /// opponent is known
    Foreign(PlayerId),
    /// Older than or equal to the last applied snapshot
    Stale(u64),
    /// Payload could not be decoded; previous opponent state stays
    Malformed(String),
}

/// Throttled outbound publication plus reconciled inbound reception for one
/// player of one room
pub struct SyncChannel<S: Snapshot> {
    room: RoomId,
    me: PlayerId,
    peer: Option<PlayerId>,
    transport: Arc<dyn Transport>,
    throttle: OutboundThrottle<S>,
    reconciler: Reconciler,
    timestamps: TimestampSource,
    stats: StatsTracker,
    inbound: flume::Receiver<Delivery>,
}

impl<S: Snapshot> std::fmt::Debug for SyncChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncChannel")
            .field("room", &self.room)
            .field("me", &self.me)
            .field("peer", &self.peer)
            .field("last_applied", &self.reconciler.last_applied())
            .field("pending", &self.throttle.has_pending())
            .finish()
    }
}

impl<S: Snapshot> SyncChannel<S> {
    /// Subscribe to the room and create the channel
    pub async fn open(
        transport: Arc<dyn Transport>,
        room: RoomId,
        me: PlayerId,
        config: &SyncConfig,
    ) -> Result<Self> {
        let inbound = transport.subscribe(&room).await?;
        tracing::debug!("Player '{}' subscribed to snapshots of room '{}'", me, room);
        Ok(Self {
            room,
            me,
            peer: None,
            transport,
            throttle: OutboundThrottle::new(config.throttle_window()),
            reconciler: Reconciler::new(),
            timestamps: TimestampSource::new(),
            stats: StatsTracker::new(),
            inbound,
        })
    }

    /// Restrict inbound snapshots to the given opponent
    pub fn set_peer(&mut self, peer: PlayerId) {
        self.peer = Some(peer);
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn player(&self) -> &PlayerId {
        &self.me
    }

    /// Queue a draft; it goes out at the end of the current window
    pub fn offer(&mut self, now: Instant, draft: S) {
        self.throttle.offer(now, draft);
    }

    /// Instant at which [`SyncChannel::poll_outbound`] has something to do
    pub fn deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    pub fn has_pending(&self) -> bool {
        self.throttle.has_pending()
    }

    /// Transmit the pending draft if its window expired
    ///
    /// Returns the timestamp of the published snapshot, if one was published.
    pub async fn poll_outbound(&mut self, now: Instant) -> Option<u64> {
        let draft = self.throttle.poll(now)?;
        self.transmit(now, draft).await
    }

    /// Transmit immediately, bypassing the window
    ///
    /// If publishing fails the snapshot is queued again, so the next window
    /// retries it rather than losing it.
    pub async fn send_now(&mut self, now: Instant, draft: S) -> Option<u64> {
        let draft = self.throttle.flush(draft);
        self.transmit(now, draft).await
    }

    async fn transmit(&mut self, now: Instant, draft: S) -> Option<u64> {
        let timestamp = self.timestamps.next(now_unix_ms());
        let snapshot = draft.with_timestamp(timestamp);
        let payload = match snapshot.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Player '{}' failed to encode snapshot: {}", self.me, e);
                return None;
            }
        };
        let size = payload.len();
        match self.transport.publish(&self.room, &self.me, payload).await {
            Ok(()) => {
                self.stats.record_sent(size);
                tracing::debug!(
                    "Player '{}' published snapshot {} ({} bytes) to room '{}'",
                    self.me,
                    timestamp,
                    size,
                    self.room
                );
                Some(timestamp)
            }
            Err(e) => {
                self.stats.record_transport_error();
                tracing::warn!(
                    "Player '{}' failed to publish snapshot to room '{}': {}",
                    self.me,
                    self.room,
                    e
                );
                self.throttle.offer(now, snapshot);
                None
            }
        }
    }

    /// Wait for the next inbound delivery
    pub async fn recv(&self) -> Result<Delivery> {
        self.inbound
            .recv_async()
            .await
            .map_err(|e| DuelError::ChannelClosed(format!("room '{}' subscription: {}", self.room, e)))
    }

    /// Decide what to do with an inbound delivery
    pub fn reconcile(&self, delivery: Delivery) -> Inbound<S> {
        if delivery.sender == self.me {
            return Inbound::Own;
        }
        // Nothing is accepted before the opponent is known
        match &self.peer {
            Some(peer) if peer == &delivery.sender => {}
            _ => return Inbound::Foreign(delivery.sender),
        }
        self.stats.add_input_bytes(delivery.payload.len());

        let snapshot = match S::decode(&delivery.payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.record_malformed();
                tracing::warn!(
                    "Player '{}' discarded malformed snapshot from '{}': {}",
                    self.me,
                    delivery.sender,
                    e
                );
                return Inbound::Malformed(e.to_string());
            }
        };

        let timestamp = snapshot.timestamp();
        if self.reconciler.accept(timestamp) {
            self.stats.record_applied();
            Inbound::Applied(snapshot)
        } else {
            self.stats.record_stale();
            tracing::debug!(
                "Player '{}' discarded stale snapshot {} (last applied {})",
                self.me,
                timestamp,
                self.reconciler.last_applied()
            );
            Inbound::Stale(timestamp)
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get_stats()
    }

    /// Connectivity-degraded indicator
    pub fn is_degraded(&self) -> bool {
        self.stats.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;
    use crate::sync::throttle::tests::TestSnapshot;
    use std::time::Duration;

    fn player(name: &str) -> PlayerId {
        PlayerId::from_name(name.to_string()).unwrap()
    }

    async fn pair(transport: &MemoryTransport) -> (SyncChannel<TestSnapshot>, SyncChannel<TestSnapshot>) {
        let room = RoomId::parse("room").unwrap();
        let config = SyncConfig::default();
        let shared: Arc<dyn Transport> = Arc::new(transport.clone());
        let mut alice = SyncChannel::open(shared.clone(), room.clone(), player("alice"), &config)
            .await
            .unwrap();
        let mut bob = SyncChannel::open(shared, room, player("bob"), &config).await.unwrap();
        alice.set_peer(player("bob"));
        bob.set_peer(player("alice"));
        (alice, bob)
    }

    fn snapshot_bytes(ts: u64, value: u32) -> Vec<u8> {
        TestSnapshot { ts, value, attack: 0 }.encode().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_burst_is_published_once_with_latest_state() {
        let transport = MemoryTransport::new();
        let (mut alice, bob) = pair(&transport).await;
        let start = Instant::now();

        alice.offer(start, TestSnapshot::draft(1, 0));
        alice.offer(start + Duration::from_millis(30), TestSnapshot::draft(2, 0));
        alice.offer(start + Duration::from_millis(60), TestSnapshot::draft(3, 0));
        assert_eq!(alice.poll_outbound(start + Duration::from_millis(60)).await, None);
        assert!(alice.poll_outbound(start + Duration::from_millis(100)).await.is_some());

        let delivery = bob.recv().await.unwrap();
        match bob.reconcile(delivery) {
            Inbound::Applied(snapshot) => assert_eq!(snapshot.value, 3),
            other => panic!("Expected applied snapshot, got {:?}", other),
        }
        assert_eq!(alice.stats().sent, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_reconcile_discards_regressions_and_own_echo() {
        let transport = MemoryTransport::new();
        let (alice, bob) = pair(&transport).await;

        let from_alice = |payload| Delivery {
            sender: player("alice"),
            payload,
        };

        assert!(matches!(bob.reconcile(from_alice(snapshot_bytes(100, 1))), Inbound::Applied(_)));
        assert!(matches!(bob.reconcile(from_alice(snapshot_bytes(80, 2))), Inbound::Stale(80)));
        assert!(matches!(bob.reconcile(from_alice(snapshot_bytes(120, 3))), Inbound::Applied(_)));
        assert_eq!(bob.reconciler().last_applied(), 120);

        // Alice hears her own publication
        assert!(matches!(alice.reconcile(from_alice(snapshot_bytes(200, 1))), Inbound::Own));

        let stats = bob.stats();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.stale, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_malformed_and_foreign_deliveries() {
        let transport = MemoryTransport::new();
        let (_alice, bob) = pair(&transport).await;

        let garbage = Delivery {
            sender: player("alice"),
            payload: b"not a snapshot".to_vec(),
        };
        assert!(matches!(bob.reconcile(garbage), Inbound::Malformed(_)));
        assert_eq!(bob.reconciler().last_applied(), 0);
        assert_eq!(bob.stats().malformed, 1);

        let stranger = Delivery {
            sender: player("mallory"),
            payload: snapshot_bytes(500, 1),
        };
        assert!(matches!(bob.reconcile(stranger), Inbound::Foreign(_)));
        assert_eq!(bob.reconciler().last_applied(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_deliveries_before_peer_is_known_leave_watermark_alone() {
        let transport = MemoryTransport::new();
        let shared: Arc<dyn Transport> = Arc::new(transport.clone());
        let room = RoomId::parse("room").unwrap();
        let mut host: SyncChannel<TestSnapshot> =
            SyncChannel::open(shared, room, player("alice"), &SyncConfig::default())
                .await
                .unwrap();

        let stray = Delivery {
            sender: player("mallory"),
            payload: snapshot_bytes(u64::MAX / 2, 9),
        };
        assert!(matches!(host.reconcile(stray), Inbound::Foreign(_)));
        assert_eq!(host.reconciler().last_applied(), 0);

        host.set_peer(player("bob"));
        let guest = Delivery {
            sender: player("bob"),
            payload: snapshot_bytes(100, 1),
        };
        assert!(matches!(host.reconcile(guest), Inbound::Applied(_)));
        assert_eq!(host.reconciler().last_applied(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_failed_publish_is_retried_with_attacks_kept() {
        let transport = MemoryTransport::new();
        let (mut alice, bob) = pair(&transport).await;
        let start = Instant::now();

        transport.set_offline(true);
        assert_eq!(alice.send_now(start, TestSnapshot::draft(1, 2)).await, None);
        assert!(alice.is_degraded());
        assert!(alice.has_pending());

        transport.set_offline(false);
        alice.offer(start + Duration::from_millis(10), TestSnapshot::draft(2, 1));
        assert!(alice.poll_outbound(start + Duration::from_millis(100)).await.is_some());
        assert!(!alice.is_degraded());

        // The retried draft and the fresh one went out as a single snapshot
        let delivery = bob.recv().await.unwrap();
        match bob.reconcile(delivery) {
            Inbound::Applied(snapshot) => {
                assert_eq!(snapshot.value, 2);
                assert_eq!(snapshot.attack, 3);
            }
            other => panic!("Expected applied snapshot, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_timestamps_of_published_snapshots_increase() {
        let transport = MemoryTransport::new();
        let (mut alice, _bob) = pair(&transport).await;
        let now = Instant::now();
        let t1 = alice.send_now(now, TestSnapshot::draft(1, 0)).await.unwrap();
        let t2 = alice.send_now(now, TestSnapshot::draft(2, 0)).await.unwrap();
        assert!(t2 > t1);
    }
}
