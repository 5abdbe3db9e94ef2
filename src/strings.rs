//! Content-addressed UTF-8 string pool. Two strings with identical bytes
//! share one copy; lookup is always by hash, callers never iterate.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::StoreError;
use crate::hash::blake2b64;

#[derive(Debug, Default)]
pub struct StringPool {
    strings: HashMap<u64, String>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Interns `s`, returning its content hash. Idempotent: a second
    /// intern of the same bytes is a no-op.
    pub fn intern(&mut self, s: &str) -> u64 {
        let hash = blake2b64(s.as_bytes());
        self.strings.entry(hash).or_insert_with(|| s.to_string());
        hash
    }

    pub fn get(&self, hash: u64) -> Option<&str> {
        self.strings.get(&hash).map(|s| s.as_str())
    }

    pub fn save<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        w.write_all(&(self.strings.len() as u64).to_le_bytes())?;
        // Deterministic order for a deterministic pack-file byte sequence.
        let mut entries: Vec<_> = self.strings.iter().collect();
        entries.sort_by_key(|(hash, _)| **hash);
        for (hash, s) in entries {
            w.write_all(&hash.to_le_bytes())?;
            let bytes = s.as_bytes();
            w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            w.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let mut count_buf = [0u8; 8];
        r.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf);
        let mut strings = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let mut hash_buf = [0u8; 8];
            r.read_exact(&mut hash_buf)?;
            let hash = u64::from_le_bytes(hash_buf);
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes)?;
            let s = String::from_utf8(bytes)
                .map_err(|_| StoreError::Truncated { file: "strings", offset: 0 })?;
            strings.insert(hash, s);
        }
        Ok(Self { strings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups_identical_bytes() {
        let mut pool = StringPool::new();
        let h1 = pool.intern("hello");
        let h2 = pool.intern("hello");
        assert_eq!(h1, h2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn empty_string_is_preserved() {
        let mut pool = StringPool::new();
        let hash = pool.intern("");
        assert_eq!(pool.get(hash), Some(""));
    }

    #[test]
    fn save_load_round_trip() {
        let mut pool = StringPool::new();
        let h1 = pool.intern("Ruy Lopez");
        let h2 = pool.intern("");
        let mut buf = Vec::new();
        pool.save(&mut buf).unwrap();
        let loaded = StringPool::load(&buf[..]).unwrap();
        assert_eq!(loaded.get(h1), Some("Ruy Lopez"));
        assert_eq!(loaded.get(h2), Some(""));
    }
}
