//! Wire-level vocabulary: the frame abstraction, cursor errors and
//! protocol constants.
//!
//! Everything above this module (dispatch, decoders, transport) speaks in
//! terms of [`frame::Frame`] and never touches raw byte offsets directly.

pub mod constants;
pub mod error;
pub mod frame;
