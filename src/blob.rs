//! The move blob: a fixed 64-byte record carrying a parent link, up to 27
//! packed moves, and a game result. Content-addressed by BLAKE2b-64 of its
//! canonical serialization.

use strum_macros::{EnumIter, FromRepr};

use crate::hash::blake2b64;
use crate::moves::EMPTY_SLOT;

pub const BLOB_SIZE: usize = 64;
pub const MAX_MOVES_PER_BLOB: usize = 27;

/// Game result, as stored in a blob's trailing two bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumIter, FromRepr, derive_more::Display)]
#[repr(u16)]
pub enum GameResult {
    WhiteWins = 0,
    BlackWins = 1,
    Draw = 2,
    Unknown = 3,
}

impl GameResult {
    pub fn from_code(code: u16) -> Option<Self> {
        Self::from_repr(code)
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A single move blob: up to 27 packed moves chained off `parent_hash`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MoveBlob {
    pub parent_hash: u64,
    pub moves: Vec<u16>,
    pub result: GameResult,
}

impl MoveBlob {
    pub fn new(parent_hash: u64, moves: Vec<u16>, result: GameResult) -> Self {
        debug_assert!(moves.len() <= MAX_MOVES_PER_BLOB);
        debug_assert!(!moves.contains(&EMPTY_SLOT), "slots are implicit, don't pad manually");
        Self { parent_hash, moves, result }
    }

    /// Serializes to the canonical 64-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; BLOB_SIZE] {
        let mut buf = [0u8; BLOB_SIZE];
        buf[0..8].copy_from_slice(&self.parent_hash.to_le_bytes());
        for (i, &mv) in self.moves.iter().enumerate() {
            let offset = 8 + i * 2;
            buf[offset..offset + 2].copy_from_slice(&mv.to_le_bytes());
        }
        // unused slots are already EMPTY_SLOT (0x0000) from zero-init
        buf[62..64].copy_from_slice(&self.result.code().to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOB_SIZE]) -> Option<Self> {
        let parent_hash = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let mut moves = Vec::with_capacity(MAX_MOVES_PER_BLOB);
        let mut terminated = false;
        for i in 0..MAX_MOVES_PER_BLOB {
            let offset = 8 + i * 2;
            let mv = u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());
            if mv == EMPTY_SLOT {
                terminated = true;
            } else if terminated {
                // first empty slot must terminate the sequence
                return None;
            } else {
                moves.push(mv);
            }
        }
        let result_code = u16::from_le_bytes(buf[62..64].try_into().unwrap());
        let result = GameResult::from_code(result_code)?;
        Some(Self { parent_hash, moves, result })
    }

    /// BLAKE2b-64 of the canonical serialization, interpreted little-endian.
    pub fn content_hash(&self) -> u64 {
        blake2b64(&self.to_bytes())
    }

    /// Key identifying this blob for dedup purposes: everything but the
    /// content hash itself.
    pub fn dedup_key(&self) -> (u64, Vec<u16>) {
        (self.parent_hash, self.moves.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let blob = MoveBlob::new(42, vec![0x1234, 0x5678], GameResult::Draw);
        let bytes = blob.to_bytes();
        assert_eq!(bytes.len(), BLOB_SIZE);
        let back = MoveBlob::from_bytes(&bytes).unwrap();
        assert_eq!(blob, back);
    }

    #[test]
    fn empty_blob_hash_matches_init_blob_hash() {
        let blob = MoveBlob::new(0, vec![], GameResult::Unknown);
        assert_eq!(blob.content_hash(), crate::hash::init_blob_hash());
    }

    #[test]
    fn content_hash_is_a_function_of_fields() {
        let a = MoveBlob::new(1, vec![10, 20], GameResult::WhiteWins);
        let b = MoveBlob::new(1, vec![10, 20], GameResult::WhiteWins);
        let c = MoveBlob::new(1, vec![10, 20], GameResult::BlackWins);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn rejects_move_after_empty_slot() {
        let mut buf = [0u8; BLOB_SIZE];
        // slot 0 non-empty, slot 1 empty, slot 2 non-empty: invalid
        buf[8..10].copy_from_slice(&1u16.to_le_bytes());
        buf[12..14].copy_from_slice(&2u16.to_le_bytes());
        buf[63] = 3;
        assert!(MoveBlob::from_bytes(&buf).is_none());
    }

    #[test]
    fn full_27_moves_fit() {
        let moves: Vec<u16> = (1..=MAX_MOVES_PER_BLOB as u16).collect();
        let blob = MoveBlob::new(0, moves.clone(), GameResult::Unknown);
        let back = MoveBlob::from_bytes(&blob.to_bytes()).unwrap();
        assert_eq!(back.moves, moves);
    }
}
