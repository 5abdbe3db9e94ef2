//! Provenance entries: one per imported file, identified by a content
//! hash of its canonical serialization. Stored as a tab-separated text
//! file, one entry per line.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::hash::blake2b64;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceEntry {
    pub label: String,
    pub imported_at: String, // ISO-8601 UTC
    pub byte_size: u64,
    pub source_sha256_hex: String,
}

impl SourceEntry {
    /// The canonical, tab-free serialization that the content hash is
    /// computed over.
    fn canonical(&self) -> String {
        format!("{}\n{}\n{}\n{}", self.label, self.imported_at, self.byte_size, self.source_sha256_hex)
    }

    pub fn content_hash(&self) -> u64 {
        blake2b64(self.canonical().as_bytes())
    }
}

#[derive(Debug, Default)]
pub struct SourceStore {
    entries: HashMap<u64, SourceEntry>,
    order: Vec<u64>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&SourceEntry> {
        self.entries.get(&hash)
    }

    pub fn insert(&mut self, entry: SourceEntry) -> u64 {
        let hash = entry.content_hash();
        if !self.entries.contains_key(&hash) {
            self.entries.insert(hash, entry);
            self.order.push(hash);
        }
        hash
    }

    pub fn by_label(&self, label: &str) -> Vec<(u64, &SourceEntry)> {
        self.order
            .iter()
            .filter_map(|h| self.entries.get(h).map(|e| (*h, e)))
            .filter(|(_, e)| e.label == label)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = (u64, &SourceEntry)> {
        self.order.iter().filter_map(move |h| self.entries.get(h).map(|e| (*h, e)))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for hash in &self.order {
            let e = &self.entries[hash];
            out.push_str(&format!(
                "{:016x}\t{}\t{}\t{}\t{}\n",
                hash, e.label, e.imported_at, e.byte_size, e.source_sha256_hex
            ));
        }
        out
    }

    pub fn from_text(text: &str) -> Result<Self, StoreError> {
        let mut store = SourceStore::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(5, '\t');
            let _hash_hex = fields.next().ok_or_else(|| StoreError::Truncated { file: "sources", offset: 0 })?;
            let label = fields.next().ok_or_else(|| StoreError::Truncated { file: "sources", offset: 0 })?.to_string();
            let imported_at = fields.next().ok_or_else(|| StoreError::Truncated { file: "sources", offset: 0 })?.to_string();
            let byte_size: u64 = fields
                .next()
                .ok_or_else(|| StoreError::Truncated { file: "sources", offset: 0 })?
                .parse()
                .map_err(|_| StoreError::Truncated { file: "sources", offset: 0 })?;
            let source_sha256_hex = fields.next().ok_or_else(|| StoreError::Truncated { file: "sources", offset: 0 })?.to_string();
            store.insert(SourceEntry { label, imported_at, byte_size, source_sha256_hex });
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SourceEntry {
        SourceEntry {
            label: "twic".to_string(),
            imported_at: "2026-07-27T00:00:00Z".to_string(),
            byte_size: 1234,
            source_sha256_hex: "abc123".to_string(),
        }
    }

    #[test]
    fn insert_is_idempotent_by_content_hash() {
        let mut store = SourceStore::new();
        let h1 = store.insert(entry());
        let h2 = store.insert(entry());
        assert_eq!(h1, h2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn text_round_trip() {
        let mut store = SourceStore::new();
        store.insert(entry());
        let text = store.to_text();
        let loaded = SourceStore::from_text(&text).unwrap();
        assert_eq!(loaded.len(), 1);
        let (_, e) = loaded.all().next().unwrap();
        assert_eq!(e, &entry());
    }

    #[test]
    fn by_label_filters() {
        let mut store = SourceStore::new();
        store.insert(entry());
        store.insert(SourceEntry { label: "other".to_string(), ..entry() });
        assert_eq!(store.by_label("twic").len(), 1);
        assert_eq!(store.by_label("nope").len(), 0);
    }
}
