//! Chain-reachability and cross-store integrity checks. Reports, never
//! repairs: `verify` only inspects the store and surfaces problems.

use crate::error::BrokenChain;
use crate::hash::{init_blob_hash, orphan_parent_hash};
use crate::index::Index;
use crate::pack::Pack;
use crate::registry::Registry;

#[derive(Debug, Default, Clone)]
pub struct VerifyReport {
    pub broken_chains: Vec<BrokenChain>,
    pub dangling_final_hashes: Vec<String>,
    pub index_mismatches: Vec<u64>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.broken_chains.is_empty() && self.dangling_final_hashes.is_empty() && self.index_mismatches.is_empty()
    }
}

/// Walks every registry entry's chain backward to a sentinel, recording
/// any hash along the way that isn't present in the pack. Also checks
/// that the index (if present) agrees with the pack's own offsets.
pub fn verify(pack: &Pack, registry: &Registry, index: Option<&Index>) -> VerifyReport {
    let mut report = VerifyReport::default();
    let sentinels = [init_blob_hash(), orphan_parent_hash(), 0u64];

    for (game_id, entry) in registry.iter() {
        let mut current = entry.final_move_hash;
        let mut broken = false;
        while !sentinels.contains(&current) {
            match pack.get(current) {
                Some(blob) => current = blob.parent_hash,
                None => {
                    report.broken_chains.push(BrokenChain { game_id: game_id.to_string(), missing_hash: current });
                    broken = true;
                    break;
                }
            }
        }
        if !broken && !sentinels.contains(&entry.final_move_hash) && pack.get(entry.final_move_hash).is_none() {
            report.dangling_final_hashes.push(game_id.to_string());
        }
    }

    if let Some(index) = index {
        let expected = Index::build(pack.insertion_order());
        for &hash in pack.insertion_order() {
            if index.lookup(hash) != expected.lookup(hash) {
                report.index_mismatches.push(hash);
            }
        }
    }

    report
}
