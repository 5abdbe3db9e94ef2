//! The reconstruction engine: walks a chain backward from a final move
//! hash, replays it forward against a fresh board, and rehydrates a
//! metadata blob into a [`GameTree`].

use chess::{Board, ChessMove};

use crate::hash::{init_blob_hash, orphan_parent_hash};
use crate::metadata::{GameMetadata, MetadataStore, STR_TAGS};
use crate::moves::decode_move_packed;
use crate::pack::Pack;
use crate::pgn::{Comment, GameResultTag, GameTree, MoveSlot};
use crate::strings::StringPool;

/// Collects the chain `[blob_n, ..., blob_1]` backward from `final_hash`,
/// reverses it to chronological order, then replays it against a fresh
/// board. Each blob's first `0x0000` slot (if any) stops that blob's
/// contribution; the walk itself stops at a sentinel parent hash.
pub fn reconstruct_moves(pack: &Pack, final_hash: u64) -> Vec<ChessMove> {
    let sentinels = [init_blob_hash(), orphan_parent_hash(), 0u64];
    let mut chain = Vec::new();
    let mut current = final_hash;
    while !sentinels.contains(&current) {
        let Some(blob) = pack.get(current) else { break };
        chain.push(blob);
        current = blob.parent_hash;
    }
    chain.reverse();

    let mut board = Board::default();
    let mut moves = Vec::new();
    for blob in chain {
        for &packed in &blob.moves {
            let Some(mv) = decode_move_packed(packed, &board) else { break };
            board = board.make_move_new(mv);
            moves.push(mv);
        }
    }
    moves
}

/// Rehydrates a full game tree from a metadata blob: headers from the
/// STR/extra tag maps, mainline from [`reconstruct_moves`], and
/// annotations (comments, NAGs, recursively reconstructed variations)
/// attached back to their move indices.
pub fn reconstruct_pgn(pack: &Pack, strings: &StringPool, metadata_store: &MetadataStore, metadata: &GameMetadata) -> GameTree {
    reconstruct_tree(pack, strings, metadata_store, metadata, true)
}

fn reconstruct_tree(pack: &Pack, strings: &StringPool, metadata_store: &MetadataStore, metadata: &GameMetadata, is_top_level: bool) -> GameTree {
    let moves = reconstruct_moves(pack, metadata.final_move_hash);
    let mut slots: Vec<MoveSlot> = moves
        .into_iter()
        .map(|mv| MoveSlot { mv, comments: Vec::new(), nags: Vec::new(), variations: Vec::new(), newline: false, fork_board: None })
        .collect();

    let mut result = GameResultTag::Unknown;
    let mut str_tags = Vec::new();
    let mut extra_tags = Vec::new();

    if is_top_level {
        for &(tag_id, value_hash) in &metadata.str_tags {
            let name = STR_TAGS.get(tag_id as usize).copied().unwrap_or("Unknown");
            let value = strings.get(value_hash).unwrap_or_default();
            if name == "Result" {
                result = GameResultTag::from_str_tag(value);
            }
            str_tags.push((name.to_string(), value.to_string()));
        }
        for &(name_hash, value_hash) in &metadata.extra_tags {
            let name = strings.get(name_hash).unwrap_or_default().to_string();
            let value = strings.get(value_hash).unwrap_or_default().to_string();
            extra_tags.push((name, value));
        }
    }

    let mut leading_comments = Vec::new();

    for record in &metadata.annotations {
        // A comment at move_index 0 with no slot to attach to is a
        // leading comment recorded against a moveless mainline/variation
        // (see `extract_annotations`); every other record with no
        // matching slot is unreachable and dropped.
        let Some(slot) = slots.get_mut(record.move_index as usize) else {
            if let crate::annotation::AnnotationKind::Comment { text_hash, is_pre, is_semicolon, comment_newline } = &record.kind {
                let text = strings.get(*text_hash).unwrap_or_default().to_string();
                leading_comments.push(Comment { text, is_pre: *is_pre, is_semicolon: *is_semicolon, comment_newline: *comment_newline });
            }
            continue;
        };
        match &record.kind {
            crate::annotation::AnnotationKind::Comment { text_hash, is_pre, is_semicolon, comment_newline } => {
                let text = strings.get(*text_hash).unwrap_or_default().to_string();
                slot.comments.push(Comment { text, is_pre: *is_pre, is_semicolon: *is_semicolon, comment_newline: *comment_newline });
            }
            crate::annotation::AnnotationKind::Nag { code } => slot.nags.push(*code),
            crate::annotation::AnnotationKind::Newline => slot.newline = true,
            crate::annotation::AnnotationKind::Variation { variation_meta_hash, .. } => {
                if let Some(variation_metadata) = metadata_store.get(*variation_meta_hash) {
                    slot.variations.push(reconstruct_tree(pack, strings, metadata_store, variation_metadata, false));
                }
            }
        }
    }

    GameTree { str_tags, extra_tags, moves: slots, result, starting_board: None, leading_comments }
}
