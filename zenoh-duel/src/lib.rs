//! # zenoh-duel
//!
//! State synchronization for two-player matches built on top of Zenoh.
//!
//! ## Overview
//!
//! Each player simulates its own game locally and exchanges compact state
//! snapshots with its opponent. The `zenoh-duel` library provides everything
//! around the simulation: player and room identities, the room lifecycle store,
//! the pub/sub transport, and the sync channel that throttles outbound
//! snapshots and reconciles inbound ones.
//!
//! ## Key Features
//!
//! - At most one outbound snapshot per throttle window, latest state wins
//! - Last-write-wins reconciliation on strictly increasing timestamps
//! - Room store with first-writer-wins joins and idempotent finalization
//! - In-memory and Zenoh-backed transports and room stores
//! - Traffic statistics with a connectivity-degraded flag
//!
//! ## Example
//!
//! ```rust,no_run
//! use zenoh_duel::{PlayerId, RoomStore, SessionExt, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = SyncConfig::default();
//!     let session = zenoh::open(zenoh::Config::default()).await?;
//!     let rooms = session
//!         .declare_room_store()
//!         .prefix(config.keyexpr_prefix.clone())
//!         .await?;
//!
//!     let me = PlayerId::generate();
//!     let room = rooms.create_room(&me).await?;
//!     println!("Room {} waiting for an opponent", room.id);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod name_generator;
pub mod network;
pub mod room;
pub mod session_ext;
pub mod stats;
pub mod sync;
pub mod types;

// Re-export main types
pub use config::SyncConfig;
pub use error::{DuelError, Result};
pub use network::{Delivery, MemoryTransport, Transport, ZenohTransport};
pub use room::{MemoryRoomStore, RoomStore, ZenohRoomStore};
pub use session_ext::SessionExt;
pub use stats::{StatsTracker, SyncStats};
pub use sync::{Inbound, OutboundThrottle, Reconciler, Snapshot, SyncChannel, TimestampSource};
pub use types::{now_unix_ms, PlayerId, RoomId, RoomState, RoomStatus};
