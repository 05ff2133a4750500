//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while operating on a ledger file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file has been closed.
    #[error("file is closed")]
    Closed,

    /// The file was opened read-only and cannot accept writes.
    #[error("file is not writable")]
    NotWritable,
}
