//! Metadata blobs: a tag map and annotation list bound to a final move
//! hash, plus the store that keeps them keyed by content hash.
//!
//! Wire form: `final_move_hash: u64`, STR-tag map (`u8` count then
//! `(tag_id: u8, string_hash: u64)` pairs), extra-tag map (`u16` count
//! then `(name_hash: u64, value_hash: u64)` pairs), annotation list
//! (`u16` count then records).

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use crate::annotation::AnnotationRecord;
use crate::error::StoreError;
use crate::hash::blake2b64;

/// The Seven Tag Roster, in wire order.
pub const STR_TAGS: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GameMetadata {
    pub final_move_hash: u64,
    /// STR tag id (0-6) -> interned string hash.
    pub str_tags: Vec<(u8, u64)>,
    /// Extra tag name hash -> interned value hash.
    pub extra_tags: Vec<(u64, u64)>,
    pub annotations: Vec<AnnotationRecord>,
}

impl GameMetadata {
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.final_move_hash.to_le_bytes());

        buf.push(self.str_tags.len() as u8);
        for &(tag_id, string_hash) in &self.str_tags {
            buf.push(tag_id);
            buf.extend_from_slice(&string_hash.to_le_bytes());
        }

        buf.extend_from_slice(&(self.extra_tags.len() as u16).to_le_bytes());
        for &(name_hash, value_hash) in &self.extra_tags {
            buf.extend_from_slice(&name_hash.to_le_bytes());
            buf.extend_from_slice(&value_hash.to_le_bytes());
        }

        buf.extend_from_slice(&(self.annotations.len() as u16).to_le_bytes());
        for record in &self.annotations {
            record.write(&mut buf)?;
        }
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut r = Cursor::new(bytes);
        let mut hash_buf = [0u8; 8];
        r.read_exact(&mut hash_buf)?;
        let final_move_hash = u64::from_le_bytes(hash_buf);

        let mut count_buf = [0u8; 1];
        r.read_exact(&mut count_buf)?;
        let mut str_tags = Vec::with_capacity(count_buf[0] as usize);
        for _ in 0..count_buf[0] {
            let mut tag_id = [0u8; 1];
            r.read_exact(&mut tag_id)?;
            let mut sh = [0u8; 8];
            r.read_exact(&mut sh)?;
            str_tags.push((tag_id[0], u64::from_le_bytes(sh)));
        }

        let mut extra_count_buf = [0u8; 2];
        r.read_exact(&mut extra_count_buf)?;
        let extra_count = u16::from_le_bytes(extra_count_buf);
        let mut extra_tags = Vec::with_capacity(extra_count as usize);
        for _ in 0..extra_count {
            let mut nh = [0u8; 8];
            let mut vh = [0u8; 8];
            r.read_exact(&mut nh)?;
            r.read_exact(&mut vh)?;
            extra_tags.push((u64::from_le_bytes(nh), u64::from_le_bytes(vh)));
        }

        let mut anno_count_buf = [0u8; 2];
        r.read_exact(&mut anno_count_buf)?;
        let anno_count = u16::from_le_bytes(anno_count_buf);
        let mut annotations = Vec::with_capacity(anno_count as usize);
        for _ in 0..anno_count {
            annotations.push(AnnotationRecord::read(&mut r)?);
        }

        Ok(Self { final_move_hash, str_tags, extra_tags, annotations })
    }

    pub fn content_hash(&self) -> Result<u64, StoreError> {
        Ok(blake2b64(&self.to_bytes()?))
    }
}

/// Metadata blobs keyed by content hash. Two games with identical tags,
/// identical final-move-hash, and identical annotations share one blob.
#[derive(Debug, Default)]
pub struct MetadataStore {
    blobs: HashMap<u64, GameMetadata>,
    order: Vec<u64>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&GameMetadata> {
        self.blobs.get(&hash)
    }

    pub fn insert(&mut self, metadata: GameMetadata) -> Result<u64, StoreError> {
        let hash = metadata.content_hash()?;
        if !self.blobs.contains_key(&hash) {
            self.blobs.insert(hash, metadata);
            self.order.push(hash);
        }
        Ok(hash)
    }

    pub fn save<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        w.write_all(&(self.order.len() as u64).to_le_bytes())?;
        for hash in &self.order {
            let bytes = self.blobs[hash].to_bytes()?;
            w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            w.write_all(&bytes)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let mut count_buf = [0u8; 8];
        r.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf);
        let mut store = MetadataStore::new();
        for _ in 0..count {
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes)?;
            let metadata = GameMetadata::from_bytes(&bytes)?;
            store.insert(metadata)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let metadata = GameMetadata {
            final_move_hash: 42,
            str_tags: vec![(0, 10), (6, 20)],
            extra_tags: vec![(100, 200)],
            annotations: vec![AnnotationRecord::nag(3, 1)],
        };
        let bytes = metadata.to_bytes().unwrap();
        let back = GameMetadata::from_bytes(&bytes).unwrap();
        assert_eq!(metadata, back);
    }

    #[test]
    fn identical_metadata_shares_one_blob() {
        let mut store = MetadataStore::new();
        let m1 = GameMetadata { final_move_hash: 1, ..Default::default() };
        let m2 = GameMetadata { final_move_hash: 1, ..Default::default() };
        let h1 = store.insert(m1).unwrap();
        let h2 = store.insert(m2).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_final_hash_means_different_metadata_hash() {
        let mut store = MetadataStore::new();
        let m1 = GameMetadata { final_move_hash: 1, ..Default::default() };
        let m2 = GameMetadata { final_move_hash: 2, ..Default::default() };
        let h1 = store.insert(m1).unwrap();
        let h2 = store.insert(m2).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn save_load_round_trip() {
        let mut store = MetadataStore::new();
        store.insert(GameMetadata { final_move_hash: 9, ..Default::default() }).unwrap();
        let mut buf = Vec::new();
        store.save(&mut buf).unwrap();
        let loaded = MetadataStore::load(&buf[..]).unwrap();
        assert_eq!(loaded.len(), store.len());
    }
}
