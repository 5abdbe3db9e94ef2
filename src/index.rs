//! The index file: a sorted `(blob_hash, byte_offset)` table built from a
//! pack's insertion order, enabling O(log n) lookup without loading the
//! whole pack. Not currently consulted by reconstruction, which just
//! walks the pack directly; kept for future random-access readers.

use std::io::{Read, Write};

use crate::blob::BLOB_SIZE;
use crate::error::StoreError;
use crate::pack::HEADER_SIZE;

const ENTRY_SIZE: usize = 16;

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct IndexEntry {
    pub hash: u64,
    pub offset: u64,
}

#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Builds the index from a pack's insertion order: offset = 16 + i*64.
    pub fn build(insertion_order: &[u64]) -> Self {
        let mut entries: Vec<IndexEntry> = insertion_order
            .iter()
            .enumerate()
            .map(|(i, &hash)| IndexEntry {
                hash,
                offset: HEADER_SIZE as u64 + (i * BLOB_SIZE) as u64,
            })
            .collect();
        entries.sort_by_key(|e| e.hash);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search by hash.
    pub fn lookup(&self, hash: u64) -> Option<u64> {
        self.entries
            .binary_search_by_key(&hash, |e| e.hash)
            .ok()
            .map(|i| self.entries[i].offset)
    }

    pub fn save<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        for entry in &self.entries {
            w.write_all(&entry.hash.to_le_bytes())?;
            w.write_all(&entry.offset.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn load<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let mut entries = Vec::new();
        loop {
            let mut buf = [0u8; ENTRY_SIZE];
            match r.read_exact(&mut buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(StoreError::Io(e)),
            }
            entries.push(IndexEntry {
                hash: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
                offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            });
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sorts_by_hash() {
        let order = vec![500u64, 10, 300];
        let idx = Index::build(&order);
        assert!(idx.entries.windows(2).all(|w| w[0].hash <= w[1].hash));
    }

    #[test]
    fn lookup_matches_offsets() {
        let order = vec![5u64, 1, 3];
        let idx = Index::build(&order);
        assert_eq!(idx.lookup(5), Some(16));
        assert_eq!(idx.lookup(1), Some(16 + BLOB_SIZE as u64));
        assert_eq!(idx.lookup(3), Some(16 + 2 * BLOB_SIZE as u64));
        assert_eq!(idx.lookup(999), None);
    }

    #[test]
    fn save_load_round_trip() {
        let idx = Index::build(&[9, 2, 7]);
        let mut buf = Vec::new();
        idx.save(&mut buf).unwrap();
        let loaded = Index::load(&buf[..]).unwrap();
        assert_eq!(loaded.entries, idx.entries);
    }
}
