/// Size of the stream-level frame header: `u16` payload length + `u16` opcode.
pub const WIRE_HEADER_SIZE: usize = 4;

/// Hard cap on a single frame payload, dictated by the `u16` length field.
pub const MAXIMUM_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Talk-flag value that announces a counted option list in an NPC
/// conversation block.
pub const TALK_FLAG_OPTIONS: u8 = 2;

/// Client build lineages, ordered by protocol generation.
///
/// The action decoder keys two layout branches off this ordering:
/// revisions above [`ClientRevision::Thailand`] prepend a 2-byte regional
/// header, and revisions at or above [`ClientRevision::Global`] insert
/// extra padding after the action id and after the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientRevision {
    Classic,
    Thailand,
    Vietnam,
    Global,
}
