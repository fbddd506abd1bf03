use crate::protocol::error::FrameError;
use crate::protocol::frame::Frame;

/// Wire offsets are tenths of a world unit.
const WIRE_SCALE: f32 = 10.0;

/// A world-space location produced from one packed position unit.
///
/// The region-relative coordinate math lives with the game-content layer;
/// this type only fixes how many bytes one position occupies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    /// Consumes exactly one packed position: three signed 32-bit offsets.
    pub fn decode(frame: &mut Frame) -> Result<Self, FrameError> {
        let x = frame.read_i32()?;
        let y = frame.read_i32()?;
        let z = frame.read_i32()?;
        Ok(Self::from_wire(x, y, z))
    }

    /// Writes one packed position in the same layout [`Position::decode`]
    /// consumes.
    pub fn encode(&self, frame: &mut Frame) -> Result<(), FrameError> {
        frame.write_i32((self.x * WIRE_SCALE) as i32)?;
        frame.write_i32((self.y * WIRE_SCALE) as i32)?;
        frame.write_i32((self.z * WIRE_SCALE) as i32)
    }

    fn from_wire(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x as f32 / WIRE_SCALE,
            y: y as f32 / WIRE_SCALE,
            z: z as f32 / WIRE_SCALE,
        }
    }
}
