//! CLI surface: subcommand definitions and dispatch. `-C <path>` is
//! peeled off ahead of `clap`, the same way a hand-rolled argument
//! iterator strips global flags before handing the rest to a subcommand
//! parser, since it must take effect before store discovery runs.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::error::Res;
use crate::store::Store;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NOT_A_STORE: i32 = 3;
pub const EXIT_NOT_FOUND: i32 = 4;
pub const EXIT_INTEGRITY: i32 = 5;

#[derive(Parser)]
#[command(name = "positional", about = "Content-addressable storage for chess games")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a workspace store
    Init { dir: Option<PathBuf> },
    /// Ingest a PGN file under a source label
    Import {
        pgn: PathBuf,
        #[arg(long)]
        label: String,
        #[arg(long)]
        quiet: bool,
    },
    /// Emit PGNs for every game imported under a label
    Export {
        label: String,
        #[arg(long)]
        quiet: bool,
    },
    /// List subcommands (currently only `sources`)
    List {
        #[command(subcommand)]
        what: ListWhat,
    },
    /// Show source metadata and the first 20 game headers
    Show { label: String },
    /// Print store sizes, counts, and dedup ratio
    Stats,
    /// Check chain reachability across the whole registry
    Verify {
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Subcommand)]
enum ListWhat {
    Sources,
}

/// Strips a leading `-C <path>` (in either `-C path` or `-C=path` form)
/// from `args`, returning the path if present and the remaining args.
fn extract_dir_flag(args: Vec<String>) -> (Option<PathBuf>, Vec<String>) {
    let mut dir = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "-C" {
            if let Some(path) = iter.next() {
                dir = Some(PathBuf::from(path));
            }
        } else if let Some(path) = arg.strip_prefix("-C=") {
            dir = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }
    (dir, rest)
}

pub fn run() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    let (dir, rest) = extract_dir_flag(args);
    let start_dir = dir.unwrap_or_else(|| PathBuf::from("."));

    let cli = match Cli::try_parse_from(rest) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_USAGE;
        }
    };

    match dispatch(&cli.command, &start_dir) {
        Ok(code) => code,
        Err(e) => {
            crate::log::error(&format!("{e:#}"));
            EXIT_FATAL
        }
    }
}

fn dispatch(command: &Command, start_dir: &Path) -> Res<i32> {
    match command {
        Command::Init { dir } => {
            let target = dir.clone().unwrap_or_else(|| start_dir.to_path_buf());
            Store::init(&target)?;
            println!("{}", format!("initialized empty store in {}", target.display()).green());
            Ok(EXIT_OK)
        }
        Command::Import { pgn, label, quiet } => {
            crate::log::set_quiet(*quiet);
            let Ok(mut store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            let text = std::fs::read_to_string(pgn)?;
            let count = store.import(&text, label, pgn)?;
            store.save()?;
            println!("imported {count} games under label {label:?}");
            Ok(EXIT_OK)
        }
        Command::Export { label, quiet } => {
            crate::log::set_quiet(*quiet);
            let Ok(store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            let games = store.export(label);
            if games.is_empty() {
                return Ok(EXIT_NOT_FOUND);
            }
            for game in games {
                println!("{}", render_pgn(&game));
            }
            Ok(EXIT_OK)
        }
        Command::List { what: ListWhat::Sources } => {
            let Ok(store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            for (entry, count) in store.list_sources() {
                println!("{:<20} {:>6} games  {:>10} bytes  {}", entry.label, count, entry.byte_size, entry.imported_at);
            }
            Ok(EXIT_OK)
        }
        Command::Show { label } => {
            let Ok(store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            let ids = store.source_games(label);
            if ids.is_empty() {
                return Ok(EXIT_NOT_FOUND);
            }
            if let Some(entry) = store.source_entry(label) {
                println!(
                    "{}: {} games, {} bytes, imported {}, sha256 {}",
                    entry.label.bold(),
                    ids.len(),
                    entry.byte_size,
                    entry.imported_at,
                    entry.source_sha256_hex
                );
            }
            for id in ids.iter().take(20) {
                if let Some(tree) = store.reconstruct(id) {
                    let headers: Vec<String> = tree.str_tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    println!("{id}: {}", headers.join(", "));
                }
            }
            Ok(EXIT_OK)
        }
        Command::Stats => {
            let Ok(store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            let stats = store.stats()?;
            println!("blobs:     {}", stats.blob_count);
            println!("strings:   {}", stats.string_count);
            println!("metadata:  {}", stats.metadata_count);
            println!("sources:   {}", stats.source_count);
            println!("games:     {}", stats.game_count);
            println!("pack size: {} bytes", stats.pack_bytes);
            if stats.game_count > 0 {
                let ratio = stats.blob_count as f64 / stats.game_count as f64;
                println!("blobs/game (lower = more sharing): {ratio:.2}");
            }
            Ok(EXIT_OK)
        }
        Command::Verify { quiet } => {
            crate::log::set_quiet(*quiet);
            let Ok(store) = Store::discover(start_dir) else { return Ok(EXIT_NOT_A_STORE) };
            let report = store.verify();
            if report.is_clean() {
                println!("{}", "store is consistent".green());
                Ok(EXIT_OK)
            } else {
                for broken in &report.broken_chains {
                    println!("broken chain: game {} missing blob {:016x}", broken.game_id, broken.missing_hash);
                }
                for dangling in &report.dangling_final_hashes {
                    println!("dangling final hash for game {dangling}");
                }
                for mismatch in &report.index_mismatches {
                    println!("index/pack offset mismatch for blob {mismatch:016x}");
                }
                Ok(EXIT_INTEGRITY)
            }
        }
    }
}

/// Writes a minimal canonical PGN rendering of a reconstructed game
/// tree: tag pairs, then mainline in numbered pairs, then the result.
fn render_pgn(tree: &crate::pgn::GameTree) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for (name, value) in &tree.str_tags {
        let _ = writeln!(out, "[{name} \"{value}\"]");
    }
    for (name, value) in &tree.extra_tags {
        let _ = writeln!(out, "[{name} \"{value}\"]");
    }
    out.push('\n');
    for (i, slot) in tree.moves.iter().enumerate() {
        if i % 2 == 0 {
            let _ = write!(out, "{}. ", i / 2 + 1);
        }
        let _ = write!(out, "{} ", slot.mv);
    }
    let result_str = match tree.result {
        crate::pgn::GameResultTag::WhiteWins => "1-0",
        crate::pgn::GameResultTag::BlackWins => "0-1",
        crate::pgn::GameResultTag::Draw => "1/2-1/2",
        crate::pgn::GameResultTag::Unknown => "*",
    };
    out.push_str(result_str);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_dash_c_with_space() {
        let (dir, rest) = extract_dir_flag(vec!["positional".to_string(), "-C".to_string(), "/tmp/x".to_string(), "stats".to_string()]);
        assert_eq!(dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(rest, vec!["positional".to_string(), "stats".to_string()]);
    }

    #[test]
    fn extracts_dash_c_with_equals() {
        let (dir, rest) = extract_dir_flag(vec!["positional".to_string(), "-C=/tmp/x".to_string(), "stats".to_string()]);
        assert_eq!(dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(rest, vec!["positional".to_string(), "stats".to_string()]);
    }

    #[test]
    fn no_dash_c_leaves_args_untouched() {
        let (dir, rest) = extract_dir_flag(vec!["positional".to_string(), "stats".to_string()]);
        assert_eq!(dir, None);
        assert_eq!(rest, vec!["positional".to_string(), "stats".to_string()]);
    }
}
