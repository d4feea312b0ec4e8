//! Domain error types.
//!
//! Per spec.md §7 the core never raises errors across its public surface for
//! unknown identifiers, malformed persisted records, or out-of-range input —
//! those are logged and handled in place. `PersistenceError` is the one
//! error type that does cross a function boundary, surfaced only by the
//! explicit `save`/`load` pair on each engine.

use thiserror::Error;

/// Failure while persisting or loading an engine's on-disk state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Could not read or write the underlying file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file's contents did not parse as valid JSON for the expected schema.
    #[error("failed to (de)serialize {path}: {source}")]
    Serde {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
