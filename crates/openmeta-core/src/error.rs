//! Error types for openmeta-core.

use thiserror::Error;

/// Core errors.
///
/// These surface below the decoder boundary; decoders fold them into their
/// [`Status`](crate::Status)-carrying result records.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("unexpected end of data: need {need} bytes, have {have}")]
    UnexpectedEof { need: usize, have: usize },

    #[error("invalid byte order marker: expected 'II' or 'MM', got {0:?}")]
    InvalidByteOrder([u8; 2]),

    #[error("arena capacity exceeded: {requested} requested bytes over limit {limit}")]
    ArenaFull { requested: u64, limit: u64 },

    #[error("block limit reached ({0})")]
    BlockLimitReached(u32),

    #[error("entry limit reached ({0})")]
    EntryLimitReached(u32),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
