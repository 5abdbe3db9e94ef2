//! The ECO catalog and its prefix trie. Pre-seeds well-known openings so
//! that ingestion can canonicalise and share common lines across games.

use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::time::SystemTime;

use chess::Board;

use crate::error::StoreError;
use crate::pgn::resolve_san;

const MIN_PREFIX_PLIES: usize = 6;

#[derive(Debug, Clone)]
pub struct EcoEntry {
    pub eco: String,
    pub name: String,
    pub packed_moves: Vec<u16>,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<u16, TrieNode>,
    /// Terminal payloads: multiple ECO lines can share the same move
    /// sequence under different labels.
    terminal: Vec<usize>,
}

/// A match discovered while walking the trie alongside a game's packed
/// mainline: the prefix length in plies and the catalog entries at that
/// terminal node.
#[derive(Debug, Clone)]
pub struct EcoMatch {
    pub ply_count: usize,
    pub entry_indices: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct EcoCatalog {
    entries: Vec<EcoEntry>,
    root: TrieNode,
}

impl EcoCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[EcoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a tab-separated catalog (`eco`, `name`, `pgn` columns),
    /// converting each PGN line to packed moves and discarding lines
    /// shorter than the noise floor. Malformed entries are skipped, not
    /// fatal, per the corrupt-input policy.
    pub fn load_tsv<R: Read>(r: R) -> Self {
        let mut catalog = EcoCatalog::default();
        let reader = std::io::BufReader::new(r);
        for (line_no, line) in reader.lines().enumerate() {
            let Ok(line) = line else { continue };
            if line_no == 0 && line.starts_with("eco\t") {
                continue; // header row
            }
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.splitn(3, '\t');
            let (Some(eco), Some(name), Some(pgn)) = (cols.next(), cols.next(), cols.next()) else {
                continue;
            };
            let Some(packed_moves) = pgn_line_to_packed(pgn) else {
                continue;
            };
            if packed_moves.len() < MIN_PREFIX_PLIES {
                continue;
            }
            catalog.insert(eco.to_string(), name.to_string(), packed_moves);
        }
        catalog
    }

    fn insert(&mut self, eco: String, name: String, packed_moves: Vec<u16>) {
        let idx = self.entries.len();
        let mut node = &mut self.root;
        for &mv in &packed_moves {
            node = node.children.entry(mv).or_default();
        }
        node.terminal.push(idx);
        self.entries.push(EcoEntry { eco, name, packed_moves });
    }

    /// Walks the trie alongside `mainline`, recording every terminal node
    /// encountered. Matches are returned in ascending order of prefix
    /// length, i.e. the order they were encountered while walking.
    pub fn matching_prefixes(&self, mainline: &[u16]) -> Vec<EcoMatch> {
        let mut matches = Vec::new();
        let mut node = &self.root;
        if !node.terminal.is_empty() {
            matches.push(EcoMatch { ply_count: 0, entry_indices: node.terminal.clone() });
        }
        for (i, &mv) in mainline.iter().enumerate() {
            let Some(next) = node.children.get(&mv) else { break };
            node = next;
            if !node.terminal.is_empty() {
                matches.push(EcoMatch { ply_count: i + 1, entry_indices: node.terminal.clone() });
            }
        }
        matches
    }

    /// Sidecar cache serialization, keyed externally by `(mtime, len)` of
    /// the source TSV file: a flat list of `(eco, name, packed_moves)`.
    pub fn write_cache<W: Write>(&self, mut w: W) -> Result<(), StoreError> {
        w.write_all(&(self.entries.len() as u64).to_le_bytes())?;
        for e in &self.entries {
            write_cache_string(&mut w, &e.eco)?;
            write_cache_string(&mut w, &e.name)?;
            w.write_all(&(e.packed_moves.len() as u32).to_le_bytes())?;
            for &mv in &e.packed_moves {
                w.write_all(&mv.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read_cache<R: Read>(mut r: R) -> Result<Self, StoreError> {
        let mut count_buf = [0u8; 8];
        r.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf);
        let mut catalog = EcoCatalog::default();
        for _ in 0..count {
            let eco = read_cache_string(&mut r)?;
            let name = read_cache_string(&mut r)?;
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut moves = Vec::with_capacity(len);
            for _ in 0..len {
                let mut mv_buf = [0u8; 2];
                r.read_exact(&mut mv_buf)?;
                moves.push(u16::from_le_bytes(mv_buf));
            }
            catalog.insert(eco, name, moves);
        }
        Ok(catalog)
    }
}

fn write_cache_string<W: Write>(w: &mut W, s: &str) -> Result<(), StoreError> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_cache_string<R: Read>(r: &mut R) -> Result<String, StoreError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| StoreError::MalformedEco("non-utf8 cache entry".to_string()))
}

/// A cache is valid only if both the modification time and length of the
/// source file match what it was built from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CacheKey {
    pub mtime: SystemTime,
    pub len: u64,
}

/// Converts a bare movetext line (no tags, no result token) into packed
/// moves, replaying it from the standard starting position. Returns
/// `None` on any parse or legality failure -- the catalog loader treats
/// that as corrupt-input and skips the line.
fn pgn_line_to_packed(pgn: &str) -> Option<Vec<u16>> {
    let mut board = Board::default();
    let mut packed = Vec::new();
    for tok in pgn.split_whitespace() {
        let trimmed = tok.trim_end_matches('.');
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if matches!(tok, "1-0" | "0-1" | "1/2-1/2" | "*") {
            continue;
        }
        let mv = resolve_san(&board, tok).ok()?;
        packed.push(crate::moves::encode_move_packed(mv));
        board = board.make_move_new(mv);
    }
    Some(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_discarded() {
        let tsv = "eco\tname\tpgn\nC60\tRuy Lopez\t1. e4 e5 2. Nf3\n";
        let catalog = EcoCatalog::load_tsv(tsv.as_bytes());
        assert!(catalog.is_empty());
    }

    #[test]
    fn loads_and_matches_prefix() {
        let tsv = "eco\tname\tpgn\nC60\tRuy Lopez\t1. e4 e5 2. Nf3 Nc6 3. Bb5 a6\n";
        let catalog = EcoCatalog::load_tsv(tsv.as_bytes());
        assert_eq!(catalog.len(), 1);
        let mainline = &catalog.entries()[0].packed_moves.clone();
        let matches = catalog.matching_prefixes(mainline);
        assert_eq!(matches.last().unwrap().ply_count, mainline.len());
    }

    #[test]
    fn ties_share_a_terminal_node() {
        let tsv = "eco\tname\tpgn\nC60\tRuy Lopez\t1. e4 e5 2. Nf3 Nc6 3. Bb5 a6\nC60a\tRuy Lopez Alt\t1. e4 e5 2. Nf3 Nc6 3. Bb5 a6\n";
        let catalog = EcoCatalog::load_tsv(tsv.as_bytes());
        let mainline = catalog.entries()[0].packed_moves.clone();
        let matches = catalog.matching_prefixes(&mainline);
        assert_eq!(matches.last().unwrap().entry_indices.len(), 2);
    }

    #[test]
    fn matches_are_ascending_by_prefix_length() {
        let tsv = "eco\tname\tpgn\nC60\tShort line\t1. e4 e5 2. Nf3 Nc6\nC65\tLonger line\t1. e4 e5 2. Nf3 Nc6 3. Bb5 Nf6\n";
        let catalog = EcoCatalog::load_tsv(tsv.as_bytes());
        let mainline = catalog.entries()[1].packed_moves.clone();
        let matches = catalog.matching_prefixes(&mainline);
        assert!(matches.windows(2).all(|w| w[0].ply_count < w[1].ply_count));
    }

    #[test]
    fn cache_round_trip() {
        let tsv = "eco\tname\tpgn\nC60\tRuy Lopez\t1. e4 e5 2. Nf3 Nc6 3. Bb5 a6\n";
        let catalog = EcoCatalog::load_tsv(tsv.as_bytes());
        let mut buf = Vec::new();
        catalog.write_cache(&mut buf).unwrap();
        let loaded = EcoCatalog::read_cache(&buf[..]).unwrap();
        assert_eq!(loaded.len(), catalog.len());
        assert_eq!(loaded.entries()[0].packed_moves, catalog.entries()[0].packed_moves);
    }
}
