//! The ingestion engine: turns a parsed [`GameTree`] into blobs, string
//! pool entries, and a metadata record, sharing structure with whatever
//! is already in the pack.

use crate::blob::{GameResult, MoveBlob};
use crate::eco::EcoCatalog;
use crate::error::StoreError;
use crate::hash::init_blob_hash;
use crate::metadata::{GameMetadata, MetadataStore, STR_TAGS};
use crate::moves::encode_move_packed;
use crate::pack::Pack;
use crate::pgn::{Comment, GameTree, MoveSlot};
use crate::strings::StringPool;

/// Chunks stop short of the blob's full 27-move capacity, both for ECO
/// prefixes and for the greedy dedup matcher that follows them, so a
/// longer game that diverges inside a blob can still prefix-match it.
const CHAIN_CHUNK_SIZE: usize = 22;

const MAX_VARIATION_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestResult {
    pub final_move_hash: u64,
    pub metadata_hash: u64,
}

/// Ingests a top-level game. The mainline is chunked against the ECO
/// catalog first, then against whatever else is already in the pack;
/// variations ingest independently and recursively.
pub fn ingest_game(
    pack: &mut Pack,
    strings: &mut StringPool,
    metadata_store: &mut MetadataStore,
    eco: &EcoCatalog,
    tree: &GameTree,
) -> Result<IngestResult, StoreError> {
    let packed: Vec<u16> = tree.moves.iter().map(|slot| encode_move_packed(slot.mv)).collect();
    let result = GameResult::from_code(tree.result.to_blob_code()).expect("to_blob_code is always in range");

    let mut parent = init_blob_hash();
    let mut move_idx = 0usize;

    for eco_match in eco.matching_prefixes(&packed) {
        while move_idx < eco_match.ply_count {
            let chunk_size = (eco_match.ply_count - move_idx).min(CHAIN_CHUNK_SIZE);
            let chunk = &packed[move_idx..move_idx + chunk_size];
            parent = match pack.find_by_key(parent, chunk) {
                Some(hash) => hash,
                None => pack.add_blob(MoveBlob::new(parent, chunk.to_vec(), GameResult::Unknown)),
            };
            move_idx += chunk_size;
        }
    }

    let final_move_hash = greedy_dedup_chain(pack, &packed[move_idx..], parent, result);

    let mut str_tags = Vec::new();
    for (name, value) in &tree.str_tags {
        if let Some(tag_id) = STR_TAGS.iter().position(|&t| t == name) {
            let value_hash = strings.intern(value);
            str_tags.push((tag_id as u8, value_hash));
        }
    }
    let mut extra_tags = Vec::new();
    for (name, value) in &tree.extra_tags {
        let name_hash = strings.intern(name);
        let value_hash = strings.intern(value);
        extra_tags.push((name_hash, value_hash));
    }

    let annotations = extract_annotations(pack, strings, metadata_store, &tree.leading_comments, &tree.moves, 0);

    let metadata = GameMetadata { final_move_hash, str_tags, extra_tags, annotations };
    let metadata_hash = metadata_store.insert(metadata)?;

    Ok(IngestResult { final_move_hash, metadata_hash })
}

/// Ingests a variation as an independent chain rooted at `INIT_BLOB_HASH`
/// (not spliced to its fork point, per the design). Returns the
/// variation's own final move hash and metadata hash.
fn ingest_variation(
    pack: &mut Pack,
    strings: &mut StringPool,
    metadata_store: &mut MetadataStore,
    variation: &GameTree,
    depth: usize,
) -> Result<(u64, u64), StoreError> {
    if depth > MAX_VARIATION_DEPTH {
        return Err(StoreError::VariationTooDeep(MAX_VARIATION_DEPTH));
    }
    let packed: Vec<u16> = variation.moves.iter().map(|slot| encode_move_packed(slot.mv)).collect();
    let result = GameResult::from_code(variation.result.to_blob_code()).expect("to_blob_code is always in range");

    let final_move_hash = greedy_dedup_chain(pack, &packed, init_blob_hash(), result);
    let annotations = extract_annotations(pack, strings, metadata_store, &variation.leading_comments, &variation.moves, depth);
    let metadata = GameMetadata { final_move_hash, str_tags: Vec::new(), extra_tags: Vec::new(), annotations };
    let metadata_hash = metadata_store.insert(metadata)?;
    Ok((final_move_hash, metadata_hash))
}

/// Walks a mainline (or variation) move list, recording a sparse
/// annotation per comment, NAG, bare newline, and variation fork. A
/// variation fork that fails to ingest (e.g. nesting too deep) is logged
/// and dropped; the rest of the host game's annotations still ingest,
/// per the corrupt-input policy for nested variations.
///
/// `leading_comments` are comments that precede the first move; they are
/// only ever non-empty when `moves` is empty (otherwise the parser has
/// already attached them to `moves[0]`), so they're recorded at
/// `move_index = 0` without risk of colliding with a real move's
/// annotations.
fn extract_annotations(
    pack: &mut Pack,
    strings: &mut StringPool,
    metadata_store: &mut MetadataStore,
    leading_comments: &[Comment],
    moves: &[MoveSlot],
    depth: usize,
) -> Vec<crate::annotation::AnnotationRecord> {
    use crate::annotation::AnnotationRecord;

    let mut records = Vec::new();
    for comment in leading_comments {
        let text_hash = strings.intern(&comment.text);
        records.push(AnnotationRecord::comment(0, text_hash, comment.is_pre, comment.is_semicolon, comment.comment_newline));
    }
    for (i, slot) in moves.iter().enumerate() {
        let move_index = i as u64;
        for comment in &slot.comments {
            let text_hash = strings.intern(&comment.text);
            records.push(AnnotationRecord::comment(move_index, text_hash, comment.is_pre, comment.is_semicolon, comment.comment_newline));
        }
        for &nag in &slot.nags {
            records.push(AnnotationRecord::nag(move_index, nag));
        }
        if slot.newline {
            records.push(AnnotationRecord::newline(move_index));
        }
        for variation in &slot.variations {
            match ingest_variation(pack, strings, metadata_store, variation, depth + 1) {
                Ok((variation_move_hash, variation_meta_hash)) => {
                    records.push(AnnotationRecord::variation(move_index, variation_move_hash, variation_meta_hash));
                }
                Err(e) => crate::log::warn(&format!("skipping variation at ply {move_index}: {e}")),
            }
        }
    }
    records
}

/// Greedy longest-match dedup: from the front of `packed`, try the
/// largest chunk size first and fall back to smaller sizes before giving
/// up and emitting a fresh blob. No backtracking once a choice is made.
fn greedy_dedup_chain(pack: &mut Pack, packed: &[u16], mut parent: u64, final_result: GameResult) -> u64 {
    let mut idx = 0;
    let n = packed.len();
    while idx < n {
        let remaining = n - idx;
        let mut matched = false;
        for chunk_size in (1..=remaining.min(CHAIN_CHUNK_SIZE)).rev() {
            if let Some(hash) = pack.find_by_key(parent, &packed[idx..idx + chunk_size]) {
                parent = hash;
                idx += chunk_size;
                matched = true;
                break;
            }
        }
        if !matched {
            let chunk_size = remaining.min(CHAIN_CHUNK_SIZE);
            let is_last = idx + chunk_size == n;
            let blob_result = if is_last { final_result } else { GameResult::Unknown };
            let blob = MoveBlob::new(parent, packed[idx..idx + chunk_size].to_vec(), blob_result);
            parent = pack.add_blob(blob);
            idx += chunk_size;
        }
    }
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn::parse_pgn;

    fn fresh() -> (Pack, StringPool, MetadataStore, EcoCatalog) {
        (Pack::new(), StringPool::new(), MetadataStore::new(), EcoCatalog::empty())
    }

    #[test]
    fn zero_move_game_roots_at_init_blob_hash() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let tree = parse_pgn("[Result \"*\"]\n\n*").unwrap();
        let result = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        assert_eq!(result.final_move_hash, init_blob_hash());
        assert!(pack.is_empty());
    }

    #[test]
    fn short_game_is_one_blob() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let tree = parse_pgn("1. e4 e5 1-0").unwrap();
        let result = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        assert_eq!(pack.len(), 1);
        let blob = pack.get(result.final_move_hash).unwrap();
        assert_eq!(blob.moves.len(), 2);
        assert_eq!(blob.result, GameResult::WhiteWins);
    }

    #[test]
    fn twenty_three_move_game_splits_into_two_blobs() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let mut pgn = String::new();
        let moves = [
            "e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O", "Be7", "Re1", "b5", "Bb3", "d6", "c3", "O-O",
            "h3", "Nb8", "d4", "Nbd7", "c4", "c6", "Bc2",
        ];
        for (i, mv) in moves.iter().enumerate() {
            if i % 2 == 0 {
                pgn.push_str(&format!("{}. ", i / 2 + 1));
            }
            pgn.push_str(mv);
            pgn.push(' ');
        }
        pgn.push_str("*");
        let tree = parse_pgn(&pgn).unwrap();
        assert_eq!(tree.moves.len(), 23);
        let result = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        assert_eq!(pack.len(), 2);
        let last = pack.get(result.final_move_hash).unwrap();
        assert_eq!(last.moves.len(), 1);
    }

    #[test]
    fn shared_prefix_reuses_blob() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let ruy = parse_pgn("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 *").unwrap();
        let berlin = parse_pgn("1. e4 e5 2. Nf3 Nc6 3. Bb5 Nf6 *").unwrap();
        ingest_game(&mut pack, &mut strings, &mut meta, &eco, &ruy).unwrap();
        let before = pack.len();
        ingest_game(&mut pack, &mut strings, &mut meta, &eco, &berlin).unwrap();
        // both games share everything up to the fifth move; only the sixth
        // move differs, so at most one new blob should appear.
        assert!(pack.len() <= before + 1);
    }

    #[test]
    fn reingesting_same_game_adds_no_blobs() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let tree = parse_pgn("1. e4 e5 2. Nf3 Nc6 1-0").unwrap();
        let first = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        let before = pack.len();
        let second = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        assert_eq!(pack.len(), before);
        assert_eq!(first, second);
    }

    #[test]
    fn variation_ingests_as_independent_chain_with_annotation() {
        let (mut pack, mut strings, mut meta, eco) = fresh();
        let pgn = "1. e4 e5 (1... c5 {interesting} 2. Nf3) 2. Nf3 *";
        let tree = parse_pgn(pgn).unwrap();
        let result = ingest_game(&mut pack, &mut strings, &mut meta, &eco, &tree).unwrap();
        let metadata = meta.get(result.metadata_hash).unwrap();
        assert_eq!(metadata.annotations.len(), 1);
        let crate::annotation::AnnotationKind::Variation { variation_move_hash, variation_meta_hash } = metadata.annotations[0].kind else {
            panic!("expected a variation annotation");
        };
        assert_ne!(variation_move_hash, init_blob_hash());
        let variation_meta = meta.get(variation_meta_hash).unwrap();
        assert_eq!(variation_meta.annotations.len(), 1);
    }
}
