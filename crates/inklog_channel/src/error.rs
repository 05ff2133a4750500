//! Error types for channel operations.

use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur on a buffered channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying file store error.
    #[error("store error: {0}")]
    Store(#[from] inklog_store::StoreError),

    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,

    /// Attempted to read at or past the end of readable data.
    #[error("read past end of data: pos {pos}, len {len}, end {end}")]
    ReadPastEnd {
        /// The requested read position.
        pos: u64,
        /// The requested read length.
        len: usize,
        /// The offset at which readable data ends.
        end: u64,
    },

    /// A buffer was used after it was released.
    #[error("buffer has been released")]
    BufferReleased,

    /// The allocator did not produce a buffer.
    #[error("buffer allocation failed: capacity {capacity}")]
    AllocationFailed {
        /// The capacity that was requested.
        capacity: usize,
    },
}
