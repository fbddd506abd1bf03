use thiserror::Error;

/// Errors raised by cursor-level reads and writes on a frame.
///
/// This type is kept small so it can be shared by every typed accessor
/// and by the stream codec.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The payload did not contain enough bytes to read the requested value.
    ///
    /// A truncated frame invalidates every subsequent offset in it, so
    /// callers drop the whole frame rather than resynchronize.
    #[error("truncated frame: needed {needed} byte(s) at offset {offset}, {remaining} remaining")]
    Truncated {
        needed: usize,
        offset: usize,
        remaining: usize,
    },

    /// A write was attempted after the frame was locked for hand-off.
    #[error("write attempted on a locked frame")]
    Locked,
}

/// Errors produced while decoding structured objects out of a frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The underlying cursor read failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A decoder needed a reference row that the catalog does not hold.
    ///
    /// Without the row the byte layout of the remaining payload is
    /// unknowable, so the decode aborts for this entity only.
    #[error("no reference record for id {0}")]
    UnknownReference(u32),
}
