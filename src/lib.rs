//! Packet interception and protocol decoding core for MMO game traffic.
//!
//! This crate implements the network heart of an automation client: a
//! transparent relay between the real game client and the real game
//! server. Raw TCP bytes are reassembled into discrete [`Frame`]s, each
//! frame is routed through the [`DispatchFabric`] (hooks, handlers,
//! pending-request continuations), and version-aware structural decoders
//! turn payloads into typed world objects.
//!
//! Layering, leaf-first:
//! - `protocol`: the frame abstraction and wire-level constants.
//! - `refdata`: the read-only reference catalog (item/quest rows).
//! - `world`: structural decoders and the live entity registry.
//! - `dispatch`: the routing fabric between transport and consumers.
//! - `transport`: the Tokio TCP relay and stream codec.

use thiserror::Error;

pub mod dispatch;
pub mod protocol;
pub mod refdata;
pub mod transport;
pub mod world;

pub use dispatch::{DispatchFabric, PendingRequest};
pub use protocol::constants::ClientRevision;
pub use protocol::error::{DecodeError, FrameError};
pub use protocol::frame::{Direction, Frame};

/// Top-level error type shared by dispatch, decoding and transport.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A cursor-level frame read or write failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A structural decoder could not make sense of a frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An underlying socket operation failed.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer (or the session writer task) went away.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, RelayError>;
