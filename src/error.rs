//! Error kinds for the store: corrupt-input is recoverable (skip and
//! continue), corrupt-store is fatal for the operation, not-found maps to
//! an absent result at the call site.

use thiserror::Error;

/// Errors raised by the store's own components. CLI-level plumbing wraps
/// these in `anyhow::Error` for a uniform `Res<T>` return type across the
/// library and binary boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("bad pack magic: expected \"CHSS\"")]
    BadMagic,

    #[error("truncated record in {file} at byte {offset}")]
    Truncated { file: &'static str, offset: u64 },

    #[error("corrupt annotation record: unknown tag {0:#04x}")]
    UnknownAnnotationTag(u8),

    #[error("corrupt metadata blob: final move hash {0:#018x} not present in pack")]
    DanglingFinalHash(u64),

    #[error("blob {0:#018x} has a move slot after an empty slot")]
    NonTerminalEmptySlot(u64),

    #[error("illegal move in mainline at ply {0}")]
    IllegalMove(usize),

    #[error("malformed ECO entry: {0}")]
    MalformedEco(String),

    #[error("malformed PGN: {0}")]
    MalformedPgn(String),

    #[error("variation nesting exceeds the maximum depth of {0}")]
    VariationTooDeep(usize),

    #[error("source label {0:?} not found")]
    UnknownSource(String),

    #[error("game id {0:?} not found")]
    UnknownGame(String),

    #[error("{path} is not a positional store (no config marker)")]
    NotAStore { path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results at the library boundary.
pub type Res<T> = anyhow::Result<T>;

/// A single broken-chain report produced by `verify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenChain {
    pub game_id: String,
    pub missing_hash: u64,
}
