//! Network layer for zenoh-duel

pub mod keyexpr;
pub mod memory;
pub mod transport;
pub mod zenoh_transport;

pub use keyexpr::{KeyexprRoomState, KeyexprRoomStatus, KeyexprRoomStore};
pub use memory::MemoryTransport;
pub use transport::{Delivery, Transport};
pub use zenoh_transport::ZenohTransport;
