//! Error type for the crate.
//!
//! The index itself has no recoverable runtime errors; the only failure that
//! crosses the API boundary is allocation exhaustion in a capacity-limited
//! arena. Everything else (duplicate inserts, out-of-domain transforms,
//! cursor misuse) is a caller contract violation checked by debug assertions.

use thiserror::Error;

/// Errors surfaced by the index and its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The arena's capacity limit cannot satisfy an allocation.
    #[error("arena limit of {limit} bytes exceeded allocating {requested} bytes")]
    ArenaFull {
        /// Size of the allocation that failed.
        requested: usize,
        /// The configured capacity limit.
        limit: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
