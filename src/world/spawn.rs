use crate::protocol::constants::TALK_FLAG_OPTIONS;
use crate::protocol::error::{DecodeError, FrameError};
use crate::protocol::frame::Frame;
use crate::refdata::{ItemCategory, ReferenceCatalog};
use crate::world::position::Position;
use crate::world::{BionicState, SpawnKind, SpawnedEntity};

/// Rarity grade attached to a ground drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rarity {
    #[default]
    General,
    Blue,
    SealOfStar,
    SealOfMoon,
    SealOfSun,
    Legend,
}

impl Rarity {
    /// Unknown grades degrade to `General` rather than failing the decode.
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => Rarity::Blue,
            2 => Rarity::SealOfStar,
            3 => Rarity::SealOfMoon,
            4 => Rarity::SealOfSun,
            5 => Rarity::Legend,
            _ => Rarity::General,
        }
    }
}

/// Variant payload of an item lying on the ground.
#[derive(Debug, Clone, Default)]
pub struct ItemDrop {
    /// Enhancement level; only present for equipment.
    pub opt_level: u8,
    /// Stack amount; only present for currency.
    pub amount: u32,
    /// Pick-up owner by name; only present for quest/trade-bound items.
    pub owner_name: Option<String>,
    pub has_owner: bool,
    /// Account-wide owner id, present when `has_owner` is set.
    pub owner_jid: u32,
    pub rarity: Rarity,
}

/// Conversation block attached to a spawned NPC.
#[derive(Debug, Clone, Default)]
pub struct NpcTalk {
    pub flag: u8,
    pub options: Vec<u8>,
}

impl NpcTalk {
    pub fn decode(frame: &mut Frame) -> Result<Self, FrameError> {
        let flag = frame.read_u8()?;
        let mut options = Vec::new();
        if flag == TALK_FLAG_OPTIONS {
            let count = frame.read_u8()?;
            options = frame.read_bytes(count as usize)?;
        }
        Ok(Self { flag, options })
    }
}

/// Decodes a spawned ground item.
///
/// The reference lookup must happen before any byte is consumed: the
/// row's category decides how many bytes precede the shared spawn suffix
/// (equipment carries an option level, currency an amount, quest/trade
/// items an owner name). Only then follow unique id, position, ownership
/// and rarity, identical for every category.
pub fn decode_item(
    frame: &mut Frame,
    item_id: u32,
    catalog: &ReferenceCatalog,
) -> Result<SpawnedEntity, DecodeError> {
    let record = catalog
        .item(item_id)
        .ok_or(DecodeError::UnknownReference(item_id))?;

    let mut drop = ItemDrop::default();
    match record.category {
        ItemCategory::Equipment => drop.opt_level = frame.read_u8()?,
        ItemCategory::Gold => drop.amount = frame.read_u32()?,
        ItemCategory::Quest | ItemCategory::Trade => {
            drop.owner_name = Some(frame.read_string()?)
        }
        ItemCategory::Consumable | ItemCategory::Other => {}
    }

    let unique_id = frame.read_u32()?;
    let position = Position::decode(frame)?;
    drop.has_owner = frame.read_bool()?;
    if drop.has_owner {
        drop.owner_jid = frame.read_u32()?;
    }
    drop.rarity = Rarity::from_wire(frame.read_u8()?);

    Ok(SpawnedEntity {
        unique_id,
        ref_id: item_id,
        position,
        kind: SpawnKind::Item(drop),
    })
}

/// Decodes a spawned NPC: the common spawn fields followed by its
/// conversation block. No category branching is involved.
pub fn decode_npc(frame: &mut Frame, ref_id: u32) -> Result<SpawnedEntity, DecodeError> {
    let unique_id = frame.read_u32()?;
    let position = Position::decode(frame)?;
    let talk = NpcTalk::decode(frame)?;

    Ok(SpawnedEntity {
        unique_id,
        ref_id,
        position,
        kind: SpawnKind::Npc {
            state: BionicState::default(),
            talk,
        },
    })
}
