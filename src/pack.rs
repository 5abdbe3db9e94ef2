//! The append-only blob pack and its in-memory dedup index.
//!
//! Layout: magic `"CHSS"` (4 bytes), version `u16`, 2 reserved bytes,
//! blob-count `u64` (16-byte header), then `blob-count` 64-byte blobs in
//! insertion order.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::blob::{MoveBlob, BLOB_SIZE};
use crate::error::StoreError;

const MAGIC: &[u8; 4] = b"CHSS";
const VERSION: u16 = 1;
const RESERVED: [u8; 2] = [0, 0];
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 8;

/// The blob pack, plus the two in-memory structures that make
/// `add_blob` idempotent: an insertion-ordered list of hashes (for
/// deterministic save order) and a dedup index keyed by
/// `(parent_hash, move_tuple) -> blob_hash`.
#[derive(Debug, Default)]
pub struct Pack {
    blobs: HashMap<u64, MoveBlob>,
    order: Vec<u64>,
    dedup: HashMap<(u64, Vec<u16>), u64>,
}

impl Pack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&MoveBlob> {
        self.blobs.get(&hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.blobs.contains_key(&hash)
    }

    /// Insertion order, for deterministic pack-file / index-file writes.
    pub fn insertion_order(&self) -> &[u64] {
        &self.order
    }

    /// Looks up an existing blob by its dedup key without inserting.
    pub fn find_by_key(&self, parent_hash: u64, moves: &[u16]) -> Option<u64> {
        self.dedup.get(&(parent_hash, moves.to_vec())).copied()
    }

    /// Inserts `blob` if its content hash isn't already present. Returns
    /// the (possibly pre-existing) content hash. Idempotent: a second
    /// insert of the same blob is a no-op on both the blob map and the
    /// order list, but always keeps the dedup index in sync with the
    /// blob map, per the single invariant that must hold "together" from
    /// any caller's point of view.
    pub fn add_blob(&mut self, blob: MoveBlob) -> u64 {
        let hash = blob.content_hash();
        let key = blob.dedup_key();
        if !self.blobs.contains_key(&hash) {
            self.blobs.insert(hash, blob);
            self.order.push(hash);
        }
        self.dedup.insert(key, hash);
        hash
    }

    pub fn save<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&RESERVED)?;
        w.write_all(&(self.order.len() as u64).to_le_bytes())?;
        for hash in &self.order {
            let blob = &self.blobs[hash];
            w.write_all(&blob.to_bytes())?;
        }
        Ok(())
    }

    /// Loads a pack file, repopulating both in-memory structures. A short
    /// read mid-blob is treated as truncation: load halts and whatever
    /// was read so far is kept (best-effort recovery, no automatic
    /// repair).
    pub fn load<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(|_| StoreError::BadMagic)?;
        if &magic != MAGIC {
            return Err(StoreError::BadMagic);
        }
        let mut version_buf = [0u8; 2];
        r.read_exact(&mut version_buf)?;
        let mut reserved_buf = [0u8; 2];
        r.read_exact(&mut reserved_buf)?;
        let mut count_buf = [0u8; 8];
        r.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf);

        let mut pack = Pack::new();
        for i in 0..count {
            let mut blob_buf = [0u8; BLOB_SIZE];
            match r.read_exact(&mut blob_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // truncated pack: drop the remaining (undiscoverable) records
                    break;
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
            let Some(blob) = MoveBlob::from_bytes(&blob_buf) else {
                return Err(StoreError::Truncated { file: "moves", offset: HEADER_SIZE as u64 + i * BLOB_SIZE as u64 });
            };
            pack.add_blob(blob);
        }
        Ok(pack)
    }
}
