use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::constants::{MAXIMUM_PAYLOAD_SIZE, WIRE_HEADER_SIZE};
use crate::protocol::frame::{Direction, Frame};

/// Extracts the next complete frame from a stream reassembly buffer.
///
/// Returns `None` until a full header and payload are buffered; consumed
/// bytes are removed from the front of `buf`. Frames come off the wire
/// unlocked; dispatch locks them at fan-out.
pub fn decode(direction: Direction, buf: &mut BytesMut) -> Option<Frame> {
    if buf.len() < WIRE_HEADER_SIZE {
        return None;
    }

    let length = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    if buf.len() < WIRE_HEADER_SIZE + length {
        return None;
    }

    buf.advance(2);
    let opcode = buf.get_u16_le();
    let payload = buf.split_to(length).to_vec();
    Some(Frame::with_payload(opcode, direction, payload))
}

/// Appends a frame's wire form (length, opcode, payload) to `dst`.
pub fn encode(frame: &Frame, dst: &mut BytesMut) {
    debug_assert!(frame.len() <= MAXIMUM_PAYLOAD_SIZE);
    dst.put_u16_le(frame.len() as u16);
    dst.put_u16_le(frame.opcode());
    dst.put_slice(frame.payload());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut frame = Frame::new(0x3012, Direction::ToServer);
        frame.write_u32(0xCAFE_F00D).unwrap();

        let mut wire = BytesMut::new();
        encode(&frame, &mut wire);

        let mut decoded = decode(Direction::ToServer, &mut wire).unwrap();
        assert!(wire.is_empty());
        assert_eq!(decoded.opcode(), 0x3012);
        assert_eq!(decoded.read_u32().unwrap(), 0xCAFE_F00D);
        assert!(!decoded.locked());
    }

    #[test]
    fn partial_header_and_partial_payload_yield_nothing() {
        let mut frame = Frame::new(0x1, Direction::ToClient);
        frame.write_bytes(&[1, 2, 3, 4]).unwrap();
        let mut wire = BytesMut::new();
        encode(&frame, &mut wire);

        let mut partial = BytesMut::from(&wire[..3]);
        assert!(decode(Direction::ToClient, &mut partial).is_none());
        assert_eq!(partial.len(), 3); // nothing consumed

        let mut partial = BytesMut::from(&wire[..6]);
        assert!(decode(Direction::ToClient, &mut partial).is_none());
        assert_eq!(partial.len(), 6);
    }

    #[test]
    fn back_to_back_frames_come_out_in_order() {
        let mut wire = BytesMut::new();
        for opcode in [0x10u16, 0x11, 0x12] {
            let mut frame = Frame::new(opcode, Direction::ToServer);
            frame.write_u16(opcode).unwrap();
            encode(&frame, &mut wire);
        }

        for expected in [0x10u16, 0x11, 0x12] {
            let mut frame = decode(Direction::ToServer, &mut wire).unwrap();
            assert_eq!(frame.opcode(), expected);
            assert_eq!(frame.read_u16().unwrap(), expected);
        }
        assert!(decode(Direction::ToServer, &mut wire).is_none());
    }

    #[test]
    fn empty_payload_frames_are_valid() {
        let frame = Frame::new(0x2, Direction::ToClient);
        let mut wire = BytesMut::new();
        encode(&frame, &mut wire);
        assert_eq!(wire.len(), WIRE_HEADER_SIZE);

        let decoded = decode(Direction::ToClient, &mut wire).unwrap();
        assert!(decoded.is_empty());
    }
}
