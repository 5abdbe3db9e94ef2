//! The game registry: `game_id -> (final_move_hash, metadata_hash,
//! source_hash)`, rewritten in full on every `save()`.
//!
//! Text form, one line per game: `game_id : final_hex16 : meta_hex16 :
//! source_hex16`. Game IDs may themselves contain colons, so entries are
//! split from the right with a max-split of 3.

use std::collections::HashMap;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RegistryEntry {
    pub final_move_hash: u64,
    pub metadata_hash: u64,
    pub source_hash: u64,
}

#[derive(Debug, Default)]
pub struct Registry {
    // insertion order matters for list/export stability and is preserved
    // by appending new ids once and overwriting in place on re-ingest.
    order: Vec<String>,
    entries: HashMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, game_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(game_id)
    }

    pub fn insert(&mut self, game_id: String, entry: RegistryEntry) {
        if !self.entries.contains_key(&game_id) {
            self.order.push(game_id.clone());
        }
        self.entries.insert(game_id, entry);
    }

    pub fn game_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.order.iter().map(move |id| (id.as_str(), &self.entries[id]))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for id in &self.order {
            let e = &self.entries[id];
            out.push_str(&format!(
                "{} : {:016x} : {:016x} : {:016x}\n",
                id, e.final_move_hash, e.metadata_hash, e.source_hash
            ));
        }
        out
    }

    pub fn from_text(text: &str) -> Result<Self, StoreError> {
        let mut registry = Registry::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            // game id may contain colons: split from the right, max 3 splits
            // so the 4 fields are (game_id, final, meta, source).
            let parts: Vec<&str> = line.rsplitn(4, " : ").collect();
            if parts.len() != 4 {
                return Err(StoreError::Truncated { file: "registry", offset: 0 });
            }
            // rsplitn yields fields in reverse order
            let source_hash = parse_hex16(parts[0])?;
            let metadata_hash = parse_hex16(parts[1])?;
            let final_move_hash = parse_hex16(parts[2])?;
            let game_id = parts[3].to_string();
            registry.insert(game_id, RegistryEntry { final_move_hash, metadata_hash, source_hash });
        }
        Ok(registry)
    }
}

fn parse_hex16(s: &str) -> Result<u64, StoreError> {
    u64::from_str_radix(s.trim(), 16).map_err(|_| StoreError::Truncated { file: "registry", offset: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut reg = Registry::new();
        reg.insert("game-1".to_string(), RegistryEntry { final_move_hash: 1, metadata_hash: 2, source_hash: 3 });
        let text = reg.to_text();
        let loaded = Registry::from_text(&text).unwrap();
        assert_eq!(loaded.get("game-1"), reg.get("game-1"));
    }

    #[test]
    fn game_id_with_colons_round_trips() {
        let mut reg = Registry::new();
        reg.insert("twic:1234:5".to_string(), RegistryEntry { final_move_hash: 9, metadata_hash: 8, source_hash: 7 });
        let text = reg.to_text();
        let loaded = Registry::from_text(&text).unwrap();
        assert_eq!(loaded.get("twic:1234:5"), reg.get("twic:1234:5"));
    }

    #[test]
    fn reinsert_overwrites_without_duplicate_order_entry() {
        let mut reg = Registry::new();
        reg.insert("g".to_string(), RegistryEntry { final_move_hash: 1, metadata_hash: 1, source_hash: 1 });
        reg.insert("g".to_string(), RegistryEntry { final_move_hash: 2, metadata_hash: 2, source_hash: 2 });
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("g").unwrap().final_move_hash, 2);
    }
}
