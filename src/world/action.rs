use bitflags::bitflags;

use crate::protocol::constants::ClientRevision;
use crate::protocol::error::DecodeError;
use crate::protocol::frame::Frame;
use crate::world::position::Position;
use crate::world::{EntityRegistry, SpawnedEntity};

bitflags! {
    /// Flag mask attached to every combat action message. Several bits may
    /// be set at once; each one gates an independent detail section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActionFlags: u8 {
        const ATTACK   = 0b0000_0001;
        const TELEPORT = 0b0000_0010;
        const BUFF     = 0b0000_0100;
    }
}

bitflags! {
    /// Per-hit state tag inside an attack section.
    ///
    /// `ABORT` is a sentinel compared as a whole byte; knock-down values
    /// arrive with the knock-back bit also set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HitState: u8 {
        const HIT        = 0b0000_0001;
        const BLOCK      = 0b0000_0010;
        const KNOCKDOWN  = 0b0000_0100;
        const KNOCK_BACK = 0b0000_1000;
        const ABORT      = 0b0001_0000;
    }
}

/// A decoded combat/teleport event.
#[derive(Debug, Clone, Default)]
pub struct Action {
    pub skill_id: u32,
    pub executor_id: u32,
    /// Action instance id assigned by the server.
    pub id: u32,
    pub target_id: u32,
    pub flags: ActionFlags,
}

impl Action {
    /// Decodes an action-begin message.
    ///
    /// Revisions above [`ClientRevision::Thailand`] prepend a 2-byte
    /// regional header; [`ClientRevision::Global`] and later insert one
    /// 4-byte field after the action id and one byte after the flag mask.
    /// All padding is consumed and discarded.
    pub fn decode_begin(
        frame: &mut Frame,
        revision: ClientRevision,
        registry: &EntityRegistry,
    ) -> Result<Self, DecodeError> {
        if revision > ClientRevision::Thailand {
            frame.read_u16()?;
        }

        let mut action = Action {
            skill_id: frame.read_u32()?,
            executor_id: frame.read_u32()?,
            id: frame.read_u32()?,
            ..Default::default()
        };

        if revision >= ClientRevision::Global {
            frame.read_u32()?;
        }

        action.target_id = frame.read_u32()?;
        action.flags = ActionFlags::from_bits_retain(frame.read_u8()?);

        if revision >= ClientRevision::Global {
            frame.read_u8()?;
        }

        action.decode_detail(frame, registry)?;
        Ok(action)
    }

    /// Decodes an action-end message.
    ///
    /// Executor and target ids are not carried by this message and stay at
    /// their defaults.
    pub fn decode_end(frame: &mut Frame, registry: &EntityRegistry) -> Result<Self, DecodeError> {
        frame.read_u32()?; // action id
        frame.read_u32()?; // original target id

        let action = Action {
            flags: ActionFlags::from_bits_retain(frame.read_u8()?),
            ..Default::default()
        };
        action.decode_detail(frame, registry)?;
        Ok(action)
    }

    /// Whether the locally-controlled character performed this action.
    pub fn player_is_executor(&self, registry: &EntityRegistry) -> bool {
        registry.player_id() == self.executor_id
    }

    /// Whether the locally-controlled character is the target.
    pub fn player_is_target(&self, registry: &EntityRegistry) -> bool {
        registry.player_id() == self.target_id
    }

    /// Resolves the executor entity, unless it is the local player.
    pub fn executor(&self, registry: &EntityRegistry) -> Option<SpawnedEntity> {
        if self.player_is_executor(registry) {
            return None;
        }
        registry.get(self.executor_id)
    }

    /// Resolves the target entity, unless it is the local player.
    pub fn target(&self, registry: &EntityRegistry) -> Option<SpawnedEntity> {
        if self.player_is_target(registry) {
            return None;
        }
        registry.get(self.target_id)
    }

    /// Decodes the flag-driven detail body shared by begin and end
    /// messages. Each set bit is an independent section, processed in
    /// wire order.
    fn decode_detail(
        &self,
        frame: &mut Frame,
        registry: &EntityRegistry,
    ) -> Result<(), DecodeError> {
        if self.flags.contains(ActionFlags::ATTACK) {
            let hit_count = frame.read_u8()?;
            let affected_count = frame.read_u8()?;

            for _ in 0..affected_count {
                let unique_id = frame.read_u32()?;
                // An unresolved target still consumes its hit records so
                // the cursor stays aligned for the next affected object.
                let resolved = registry.is_bionic(unique_id);

                for _ in 0..hit_count {
                    let state = HitState::from_bits_retain(frame.read_u8()?);
                    if state == HitState::ABORT {
                        break;
                    }

                    if resolved {
                        registry.set_hit_state(unique_id, state);
                    }

                    if state != HitState::BLOCK {
                        frame.read_u8()?; // crit status
                        frame.read_i32()?; // damage
                        frame.read_u16()?;
                        frame.read_u8()?;
                    }

                    if state.contains(HitState::KNOCK_BACK) {
                        let position = Position::decode(frame)?;
                        if resolved {
                            registry.set_position(unique_id, position);
                        }
                    }
                }
            }
        }

        if self.flags.contains(ActionFlags::TELEPORT) {
            let position = Position::decode(frame)?;
            if self.player_is_executor(registry) {
                registry.set_player_position(position);
            } else {
                // A teleport by an entity outside current visibility is
                // benign; the position is discarded.
                registry.set_position(self.executor_id, position);
            }
        }

        Ok(())
    }
}
