//! Live world model: spawned entities and the registry that tracks them.
//!
//! Decoders never mutate entities through raw bytes: they resolve unique
//! ids against the [`EntityRegistry`] and go through its accessor contract
//! (`set_hit_state`, `set_position`), so a failed resolution degrades to
//! "consume the bytes, skip the mutation".

pub mod action;
pub mod position;
pub mod spawn;

pub use action::{Action, ActionFlags, HitState};
pub use position::Position;
pub use spawn::{ItemDrop, NpcTalk, Rarity};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Live combat state carried by players, monsters and NPCs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BionicState {
    pub hit_state: HitState,
}

/// Variant payload of a spawned world object.
///
/// A closed set: lookups either return the shared capability view
/// ([`SpawnedEntity`]) or a specific variant, which fails on a mismatch.
#[derive(Debug, Clone)]
pub enum SpawnKind {
    Bionic(BionicState),
    Npc { state: BionicState, talk: NpcTalk },
    Item(ItemDrop),
}

/// A currently-spawned world object, keyed by its unique instance id.
#[derive(Debug, Clone)]
pub struct SpawnedEntity {
    /// Per-spawn instance id, unique within the session.
    pub unique_id: u32,
    /// Reference id into the static catalog.
    pub ref_id: u32,
    pub position: Position,
    pub kind: SpawnKind,
}

impl SpawnedEntity {
    /// Whether this entity carries live combat state.
    pub fn is_bionic(&self) -> bool {
        matches!(self.kind, SpawnKind::Bionic(_) | SpawnKind::Npc { .. })
    }
}

/// The live collection of spawned world objects.
///
/// Shared between the network thread (decoders) and application threads;
/// the map is guarded by one mutex held only for the duration of a single
/// lookup or attribute write.
pub struct EntityRegistry {
    player_id: AtomicU32,
    player_position: Mutex<Position>,
    entities: Mutex<HashMap<u32, SpawnedEntity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            player_id: AtomicU32::new(0),
            player_position: Mutex::new(Position::default()),
            entities: Mutex::new(HashMap::new()),
        }
    }

    /// Unique id of the locally-controlled character.
    pub fn player_id(&self) -> u32 {
        self.player_id.load(Ordering::Relaxed)
    }

    pub fn set_player_id(&self, unique_id: u32) {
        self.player_id.store(unique_id, Ordering::Relaxed);
    }

    pub fn player_position(&self) -> Position {
        *lock(&self.player_position)
    }

    pub fn set_player_position(&self, position: Position) {
        *lock(&self.player_position) = position;
    }

    /// Inserts or replaces a spawned entity.
    pub fn insert(&self, entity: SpawnedEntity) {
        lock(&self.entities).insert(entity.unique_id, entity);
    }

    pub fn remove(&self, unique_id: u32) -> Option<SpawnedEntity> {
        lock(&self.entities).remove(&unique_id)
    }

    /// Capability view of an entity, regardless of variant.
    pub fn get(&self, unique_id: u32) -> Option<SpawnedEntity> {
        lock(&self.entities).get(&unique_id).cloned()
    }

    /// Item payload of an entity; `None` if absent or not an item.
    pub fn item(&self, unique_id: u32) -> Option<ItemDrop> {
        match lock(&self.entities).get(&unique_id) {
            Some(SpawnedEntity {
                kind: SpawnKind::Item(drop),
                ..
            }) => Some(drop.clone()),
            _ => None,
        }
    }

    /// Conversation block of an entity; `None` if absent or not an NPC.
    pub fn npc_talk(&self, unique_id: u32) -> Option<NpcTalk> {
        match lock(&self.entities).get(&unique_id) {
            Some(SpawnedEntity {
                kind: SpawnKind::Npc { talk, .. },
                ..
            }) => Some(talk.clone()),
            _ => None,
        }
    }

    pub fn is_bionic(&self, unique_id: u32) -> bool {
        lock(&self.entities)
            .get(&unique_id)
            .is_some_and(SpawnedEntity::is_bionic)
    }

    /// Applies a hit state to a bionic entity. Returns whether anything
    /// was updated; a missing entity or an item is left untouched.
    pub fn set_hit_state(&self, unique_id: u32, hit_state: HitState) -> bool {
        let mut entities = lock(&self.entities);
        match entities.get_mut(&unique_id).map(|e| &mut e.kind) {
            Some(SpawnKind::Bionic(state)) | Some(SpawnKind::Npc { state, .. }) => {
                state.hit_state = hit_state;
                true
            }
            _ => false,
        }
    }

    /// Moves an entity. Returns whether anything was updated.
    pub fn set_position(&self, unique_id: u32, position: Position) -> bool {
        match lock(&self.entities).get_mut(&unique_id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entities).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entities).is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bionic(unique_id: u32) -> SpawnedEntity {
        SpawnedEntity {
            unique_id,
            ref_id: 1907,
            position: Position::default(),
            kind: SpawnKind::Bionic(BionicState::default()),
        }
    }

    fn item(unique_id: u32) -> SpawnedEntity {
        SpawnedEntity {
            unique_id,
            ref_id: 2381,
            position: Position::default(),
            kind: SpawnKind::Item(ItemDrop::default()),
        }
    }

    #[test]
    fn variant_lookup_fails_on_mismatch() {
        let registry = EntityRegistry::new();
        registry.insert(bionic(10));
        registry.insert(item(11));

        assert!(registry.get(10).is_some());
        assert!(registry.item(10).is_none());
        assert!(registry.item(11).is_some());
        assert!(registry.npc_talk(11).is_none());
    }

    #[test]
    fn hit_state_only_applies_to_bionics() {
        let registry = EntityRegistry::new();
        registry.insert(bionic(10));
        registry.insert(item(11));

        assert!(registry.set_hit_state(10, HitState::KNOCK_BACK));
        assert!(!registry.set_hit_state(11, HitState::KNOCK_BACK));
        assert!(!registry.set_hit_state(99, HitState::KNOCK_BACK));

        match registry.get(10).unwrap().kind {
            SpawnKind::Bionic(state) => assert_eq!(state.hit_state, HitState::KNOCK_BACK),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn position_updates_report_whether_anything_moved() {
        let registry = EntityRegistry::new();
        registry.insert(bionic(10));

        let target = Position { x: 1.0, y: 2.0, z: 3.0 };
        assert!(registry.set_position(10, target));
        assert_eq!(registry.get(10).unwrap().position, target);
        assert!(!registry.set_position(99, target));
    }

    #[test]
    fn player_identity_and_position() {
        let registry = EntityRegistry::new();
        assert_eq!(registry.player_id(), 0);
        registry.set_player_id(7);
        assert_eq!(registry.player_id(), 7);

        let home = Position { x: 5.0, y: 0.0, z: -5.0 };
        registry.set_player_position(home);
        assert_eq!(registry.player_position(), home);
    }
}
