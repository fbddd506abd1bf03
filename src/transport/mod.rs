//! Tokio-based TCP transport: the proxy channel between the real game
//! client and the real game server.
//!
//! The transport owns the two physical connections, reassembles each byte
//! stream into discrete frames (`codec`), pushes every frame through the
//! dispatch fabric, and forwards survivors to the opposite peer
//! (`proxy`). Encryption and compression of the underlying streams are
//! outside this crate; the codec assumes plain framed bytes.

pub mod codec;
pub mod proxy;

pub use proxy::RelayServer;
