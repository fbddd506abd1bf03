//! Read-only reference catalog of static game-content definitions.
//!
//! Rows come from columnar text files: one logical record per line,
//! tab-separated, column-indexed. A record is rejected outright only when
//! its "service" column is missing or zero or its key columns fail to
//! parse; every other column degrades to a type default instead of
//! rejecting the row.

use std::collections::HashMap;
use std::str::FromStr;

/// Column-indexed view over one source line.
pub struct ReferenceParser<'a> {
    fields: Vec<&'a str>,
}

impl<'a> ReferenceParser<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            fields: line.split('\t').collect(),
        }
    }

    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied()
    }

    /// Parses column `index` as `T`; `None` on a missing or malformed cell.
    pub fn try_parse<T: FromStr>(&self, index: usize) -> Option<T> {
        self.field(index)?.trim().parse().ok()
    }

    /// Column `index` as an owned string; `None` when missing or empty.
    pub fn try_parse_string(&self, index: usize) -> Option<String> {
        let value = self.field(index)?.trim();
        if value.is_empty() {
            return None;
        }
        Some(value.to_owned())
    }
}

/// A reference row loadable from one columnar line.
pub trait ReferenceRecord: Sized {
    /// Key used for catalog lookups.
    fn primary_key(&self) -> u32;

    /// Parses one line; `None` rejects the row outright.
    fn load(parser: &ReferenceParser<'_>) -> Option<Self>;
}

/// Item category deciding the wire layout of a spawned drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    Equipment,
    Gold,
    Quest,
    Trade,
    Consumable,
    Other,
}

/// Static definition of an item, keyed by reference id.
#[derive(Debug, Clone)]
pub struct RefItem {
    pub service: u8,
    pub id: u32,
    pub code_name: String,
    pub type_group: u8,
    pub type_kind: u8,
    pub category: ItemCategory,
}

impl RefItem {
    fn categorize(type_group: u8, type_kind: u8) -> ItemCategory {
        match (type_group, type_kind) {
            (1, _) => ItemCategory::Equipment,
            (3, 5) => ItemCategory::Gold,
            (3, 13) => ItemCategory::Quest,
            (3, 8) => ItemCategory::Trade,
            (3, _) => ItemCategory::Consumable,
            _ => ItemCategory::Other,
        }
    }
}

impl ReferenceRecord for RefItem {
    fn primary_key(&self) -> u32 {
        self.id
    }

    fn load(parser: &ReferenceParser<'_>) -> Option<Self> {
        // Disabled rows and rows without a usable key are skipped.
        let service = parser.try_parse::<u8>(0)?;
        if service == 0 {
            return None;
        }
        let id = parser.try_parse::<u32>(1)?;
        let code_name = parser.try_parse_string(2)?;

        let type_group = parser.try_parse::<u8>(3).unwrap_or_default();
        let type_kind = parser.try_parse::<u8>(4).unwrap_or_default();

        Some(Self {
            service,
            id,
            code_name,
            type_group,
            type_kind,
            category: Self::categorize(type_group, type_kind),
        })
    }
}

/// Static definition of a quest, keyed by reference id.
#[derive(Debug, Clone, Default)]
pub struct RefQuest {
    pub service: u8,
    pub id: u32,
    pub code_name: String,
    pub level: u8,
    pub desc_name: String,
    pub name_string: String,
    pub pay_string: String,
    pub contents_string: String,
    pub pay_contents: String,
    pub notice_npc: String,
    pub notice_condition: String,
}

impl ReferenceRecord for RefQuest {
    fn primary_key(&self) -> u32 {
        self.id
    }

    fn load(parser: &ReferenceParser<'_>) -> Option<Self> {
        let service = parser.try_parse::<u8>(0)?;
        if service == 0 {
            return None;
        }
        let id = parser.try_parse::<u32>(1)?;
        let code_name = parser.try_parse_string(2)?;

        Some(Self {
            service,
            id,
            code_name,
            level: parser.try_parse::<u8>(3).unwrap_or_default(),
            desc_name: parser.try_parse_string(4).unwrap_or_default(),
            name_string: parser.try_parse_string(5).unwrap_or_default(),
            pay_string: parser.try_parse_string(6).unwrap_or_default(),
            contents_string: parser.try_parse_string(7).unwrap_or_default(),
            pay_contents: parser.try_parse_string(8).unwrap_or_default(),
            notice_npc: parser.try_parse_string(9).unwrap_or_default(),
            notice_condition: parser.try_parse_string(10).unwrap_or_default(),
        })
    }
}

/// Pre-loaded, read-only table of static definitions.
#[derive(Default)]
pub struct ReferenceCatalog {
    items: HashMap<u32, RefItem>,
    quests: HashMap<u32, RefQuest>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads item rows from columnar text; returns the number accepted.
    pub fn load_items(&mut self, source: &str) -> usize {
        load_into(&mut self.items, source, "items")
    }

    /// Loads quest rows from columnar text; returns the number accepted.
    pub fn load_quests(&mut self, source: &str) -> usize {
        load_into(&mut self.quests, source, "quests")
    }

    pub fn item(&self, id: u32) -> Option<&RefItem> {
        self.items.get(&id)
    }

    pub fn quest(&self, id: u32) -> Option<&RefQuest> {
        self.quests.get(&id)
    }
}

fn load_into<R: ReferenceRecord>(
    map: &mut HashMap<u32, R>,
    source: &str,
    kind: &'static str,
) -> usize {
    let mut accepted = 0;
    for line in source.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if let Some(record) = R::load(&ReferenceParser::new(line)) {
            map.insert(record.primary_key(), record);
            accepted += 1;
        }
    }
    tracing::debug!(kind, accepted, "reference rows loaded");
    accepted
}
