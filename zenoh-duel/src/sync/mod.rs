//! Snapshot synchronization between the two players of a room
//!
//! Outbound snapshots go through an [`OutboundThrottle`] (one transmission per
//! window, latest state wins), inbound ones through a [`Reconciler`]
//! (strictly increasing timestamps only). [`SyncChannel`] ties both to a
//! [`Transport`](crate::network::Transport).

pub(crate) mod channel;
pub(crate) mod reconcile;
pub(crate) mod throttle;

pub use channel::{Inbound, SyncChannel};
pub use reconcile::{Reconciler, TimestampSource};
pub use throttle::OutboundThrottle;

/// A snapshot type that can travel through a [`SyncChannel`]
///
/// Drafts are built without a timestamp; the channel seals them with
/// [`Snapshot::with_timestamp`] at transmission time, after which the
/// snapshot is never changed.
pub trait Snapshot: Sized + Send {
    /// Error produced when a payload cannot be decoded
    type Error: std::fmt::Display;

    /// Timestamp carried by the snapshot
    fn timestamp(&self) -> u64;

    /// Seal the snapshot with its transmission timestamp
    fn with_timestamp(self, timestamp: u64) -> Self;

    /// Merge an older, not yet transmitted snapshot into this newer one
    ///
    /// The newer state wins; cumulative fields (like sent attacks) must be
    /// carried over so that coalescing never loses them.
    fn absorb(self, older: Self) -> Self;

    /// Serialize into the wire form
    fn encode(&self) -> Result<Vec<u8>, Self::Error>;

    /// Deserialize from the wire form
    fn decode(payload: &[u8]) -> Result<Self, Self::Error>;
}
