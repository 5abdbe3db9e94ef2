//! Ties every sub-store together: load/save orchestration, workspace vs
//! bare-store discovery, and the public operations the CLI dispatches
//! to (`init`, `import`, `export`, `list sources`, `show`, `stats`,
//! `verify`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::eco::EcoCatalog;
use crate::error::{Res, StoreError};
use crate::hash::sha256_hex;
use crate::index::Index;
use crate::ingest::{self, IngestResult};
use crate::metadata::MetadataStore;
use crate::pack::Pack;
use crate::pgn::{parse_pgn, GameTree};
use crate::reconstruct;
use crate::registry::{Registry, RegistryEntry};
use crate::source::{SourceEntry, SourceStore};
use crate::strings::StringPool;
use crate::verify::{self, VerifyReport};

const ECO_TSV_BYTES: &str = include_str!("../eco/eco.tsv");

/// File names within either a `.positional/` directory (workspace mode)
/// or directly in the store root (bare mode).
mod files {
    pub const CONFIG: &str = "config";
    pub const MOVES: &str = "moves";
    pub const IDX: &str = "idx";
    pub const STRINGS: &str = "strings";
    pub const METADATA: &str = "metadata";
    pub const SOURCES: &str = "sources";
    pub const REGISTRY: &str = "registry";
}

pub struct Store {
    root: PathBuf,
    pack: Pack,
    index: Index,
    strings: StringPool,
    metadata: MetadataStore,
    sources: SourceStore,
    registry: Registry,
    eco: EcoCatalog,
}

pub struct Stats {
    pub blob_count: usize,
    pub string_count: usize,
    pub metadata_count: usize,
    pub source_count: usize,
    pub game_count: usize,
    pub pack_bytes: u64,
}

impl Store {
    /// Creates a new workspace store at `dir` (`<dir>/.positional/` with
    /// an empty `config` marker and empty sub-stores).
    pub fn init(dir: &Path) -> Res<()> {
        let positional_dir = dir.join(".positional");
        fs::create_dir_all(&positional_dir)?;
        let config_path = positional_dir.join(files::CONFIG);
        if config_path.exists() {
            return Err(StoreError::NotAStore { path: format!("{} is already initialised", dir.display()) }.into());
        }
        fs::write(&config_path, "positional store\n")?;
        let store = Store {
            root: positional_dir,
            pack: Pack::new(),
            index: Index::build(&[]),
            strings: StringPool::new(),
            metadata: MetadataStore::new(),
            sources: SourceStore::new(),
            registry: Registry::new(),
            eco: EcoCatalog::load_tsv(ECO_TSV_BYTES.as_bytes()),
        };
        store.save()
    }

    /// Discovers a store starting at `start`: walk upward looking for
    /// `.positional/config`; if none is found, check whether `start`
    /// itself is a bare store (a `config` file directly in it).
    pub fn discover(start: &Path) -> Res<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(".positional").join(files::CONFIG);
            if candidate.exists() {
                return Self::load(dir.join(".positional"));
            }
            if !dir.pop() {
                break;
            }
        }
        if start.join(files::CONFIG).exists() {
            return Self::load(start.to_path_buf());
        }
        Err(StoreError::NotAStore { path: start.display().to_string() }.into())
    }

    fn load(root: PathBuf) -> Res<Self> {
        let pack = Pack::load(fs::File::open(root.join(files::MOVES))?)?;
        let index = Index::load(fs::File::open(root.join(files::IDX))?)?;
        let strings = StringPool::load(fs::File::open(root.join(files::STRINGS))?)?;
        let metadata = MetadataStore::load(fs::File::open(root.join(files::METADATA))?)?;
        let sources = SourceStore::from_text(&fs::read_to_string(root.join(files::SOURCES))?)?;
        let registry = Registry::from_text(&fs::read_to_string(root.join(files::REGISTRY))?)?;
        let eco = EcoCatalog::load_tsv(ECO_TSV_BYTES.as_bytes());
        Ok(Store { root, pack, index, strings, metadata, sources, registry, eco })
    }

    /// Rebuilds the index from the pack's insertion order and rewrites
    /// every file. This is the only durability point: a crash between
    /// saves loses whatever was ingested since the last one.
    pub fn save(&self) -> Res<()> {
        self.pack.save(fs::File::create(self.root.join(files::MOVES))?)?;
        let index = Index::build(self.pack.insertion_order());
        index.save(fs::File::create(self.root.join(files::IDX))?)?;
        self.strings.save(fs::File::create(self.root.join(files::STRINGS))?)?;
        self.metadata.save(fs::File::create(self.root.join(files::METADATA))?)?;
        fs::write(self.root.join(files::SOURCES), self.sources.to_text())?;
        fs::write(self.root.join(files::REGISTRY), self.registry.to_text())?;
        Ok(())
    }

    /// Ingests every game in `pgn_text`, each game registered under
    /// `game_id = "{label}#{n}"`. Malformed games are skipped and
    /// logged; the rest of the file still imports.
    pub fn import(&mut self, pgn_text: &str, label: &str, source_path: &Path) -> Res<usize> {
        let byte_size = pgn_text.len() as u64;
        let source_sha256_hex = sha256_hex(pgn_text.as_bytes());
        let imported_at = chrono::Utc::now().to_rfc3339();
        let source_entry = SourceEntry { label: label.to_string(), imported_at, byte_size, source_sha256_hex };
        let source_hash = self.sources.insert(source_entry);

        let mut imported = 0usize;
        for (i, game_text) in split_pgn_games(pgn_text).enumerate() {
            let game_id = format!("{label}#{i}");
            match parse_pgn(game_text) {
                Ok(tree) => match ingest_one(&mut self.pack, &mut self.strings, &mut self.metadata, &self.eco, &tree) {
                    Ok(result) => {
                        self.registry.insert(
                            game_id,
                            RegistryEntry { final_move_hash: result.final_move_hash, metadata_hash: result.metadata_hash, source_hash },
                        );
                        imported += 1;
                        if imported % 100 == 0 {
                            self.save()?;
                            crate::log::info(&format!("checkpoint: {imported} games imported from {}", source_path.display()));
                        }
                    }
                    Err(e) => crate::log::warn(&format!("skipping {game_id}: {e}")),
                },
                Err(e) => crate::log::warn(&format!("skipping {game_id}: {e}")),
            }
        }
        Ok(imported)
    }

    pub fn export(&self, label: &str) -> Vec<GameTree> {
        self.registry
            .iter()
            .filter(|(_, entry)| self.sources.get(entry.source_hash).map(|s| s.label == label).unwrap_or(false))
            .filter_map(|(_, entry)| self.metadata.get(entry.metadata_hash))
            .map(|m| reconstruct::reconstruct_pgn(&self.pack, &self.strings, &self.metadata, m))
            .collect()
    }

    pub fn reconstruct(&self, game_id: &str) -> Option<GameTree> {
        let entry = self.registry.get(game_id)?;
        let metadata = self.metadata.get(entry.metadata_hash)?;
        Some(reconstruct::reconstruct_pgn(&self.pack, &self.strings, &self.metadata, metadata))
    }

    pub fn list_sources(&self) -> Vec<(&SourceEntry, usize)> {
        self.sources
            .all()
            .map(|(hash, entry)| {
                let count = self.registry.iter().filter(|(_, e)| e.source_hash == hash).count();
                (entry, count)
            })
            .collect()
    }

    pub fn source_games(&self, label: &str) -> Vec<&str> {
        let hashes: Vec<u64> = self.sources.by_label(label).into_iter().map(|(h, _)| h).collect();
        self.registry
            .iter()
            .filter(|(_, e)| hashes.contains(&e.source_hash))
            .map(|(id, _)| id)
            .collect()
    }

    /// The most recent source entry imported under `label`, if any. A
    /// label can in principle be reused across several imports (each a
    /// distinct source entry by content hash); `show` reports the last one.
    pub fn source_entry(&self, label: &str) -> Option<&SourceEntry> {
        self.sources.by_label(label).into_iter().map(|(_, e)| e).last()
    }

    pub fn verify(&self) -> VerifyReport {
        verify::verify(&self.pack, &self.registry, Some(&self.index))
    }

    pub fn stats(&self) -> Res<Stats> {
        let pack_bytes = fs::metadata(self.root.join(files::MOVES)).map(|m| m.len()).unwrap_or(0);
        Ok(Stats {
            blob_count: self.pack.len(),
            string_count: self.strings.len(),
            metadata_count: self.metadata.len(),
            source_count: self.sources.len(),
            game_count: self.registry.len(),
            pack_bytes,
        })
    }
}

fn ingest_one(
    pack: &mut Pack,
    strings: &mut StringPool,
    metadata: &mut MetadataStore,
    eco: &EcoCatalog,
    tree: &GameTree,
) -> Result<IngestResult, StoreError> {
    ingest::ingest_game(pack, strings, metadata, eco, tree)
}

/// Splits a multi-game PGN file into individual game texts. A new game
/// starts at a `[Event` tag pair that isn't nested inside the previous
/// game's movetext (tag pairs only ever appear at the top of a game).
fn split_pgn_games(text: &str) -> impl Iterator<Item = &str> {
    let mut starts = Vec::new();
    let mut in_tags = false;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && !in_tags {
            starts.push(offset);
            in_tags = true;
        } else if !trimmed.starts_with('[') && !trimmed.is_empty() {
            in_tags = false;
        }
        offset += line.len();
    }
    if starts.is_empty() && !text.trim().is_empty() {
        starts.push(0);
    }
    let mut ends = starts[1..].to_vec();
    ends.push(text.len());
    starts.into_iter().zip(ends).map(move |(s, e)| text[s..e].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_two_games() {
        let text = "[Event \"A\"]\n[Result \"1-0\"]\n\n1. e4 e5 1-0\n\n[Event \"B\"]\n[Result \"*\"]\n\n1. d4 *";
        let games: Vec<&str> = split_pgn_games(text).collect();
        assert_eq!(games.len(), 2);
        assert!(games[0].contains("\"A\""));
        assert!(games[1].contains("\"B\""));
    }

    #[test]
    fn single_untagged_game_is_one_game() {
        let text = "1. e4 e5 *";
        let games: Vec<&str> = split_pgn_games(text).collect();
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn same_file_imported_twice_under_different_labels_dedups_blobs_but_keeps_both_game_ids() {
        let dir = std::env::temp_dir().join(format!("positional-test-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        Store::init(&dir).unwrap();
        let mut store = Store::discover(&dir).unwrap();

        let pgn = "[Event \"A\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 1-0";
        let count_a = store.import(pgn, "first", &dir.join("a.pgn")).unwrap();
        let count_b = store.import(pgn, "second", &dir.join("b.pgn")).unwrap();
        store.save().unwrap();

        assert_eq!(count_a, 1);
        assert_eq!(count_b, 1);
        assert!(store.reconstruct("first#0").is_some());
        assert!(store.reconstruct("second#0").is_some());
        let stats = store.stats().unwrap();
        // two distinct games, but only one chain of blobs behind them
        assert_eq!(stats.game_count, 2);
        assert_eq!(stats.blob_count, 1);

        fs::remove_dir_all(&dir).ok();
    }
}
