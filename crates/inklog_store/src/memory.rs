//! In-memory ledger file for testing.

use crate::error::{StoreError, StoreResult};
use crate::file::RandomAccessFile;
use parking_lot::RwLock;

#[derive(Debug)]
struct MemoryState {
    data: Vec<u8>,
    cursor: u64,
    closed: bool,
}

/// An in-memory ledger file.
///
/// All data lives in a byte vector. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral journals that don't need persistence
///
/// # Thread Safety
///
/// The file is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use inklog_store::{MemoryFile, RandomAccessFile};
///
/// let file = MemoryFile::new();
/// file.write(b"test data").unwrap();
/// assert_eq!(file.size().unwrap(), 9);
/// assert_eq!(file.position().unwrap(), 9);
/// ```
#[derive(Debug)]
pub struct MemoryFile {
    state: RwLock<MemoryState>,
    writable: bool,
}

impl MemoryFile {
    /// Creates a new empty in-memory file.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(Vec::new())
    }

    /// Creates an in-memory file with pre-existing data.
    ///
    /// The write cursor is placed at the end of the data, as
    /// [`DiskFile::open`](super::DiskFile::open) does for existing files.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let cursor = data.len() as u64;
        Self {
            state: RwLock::new(MemoryState {
                data,
                cursor,
                closed: false,
            }),
            writable: true,
        }
    }

    /// Creates a read-only in-memory file with the given data.
    ///
    /// All `write` calls fail with [`StoreError::NotWritable`].
    #[must_use]
    pub fn read_only(data: Vec<u8>) -> Self {
        let mut file = Self::with_data(data);
        file.writable = false;
        file
    }

    /// Returns a copy of all data in the file.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.state.read().data.clone()
    }

    /// Moves the write cursor to `pos`.
    ///
    /// A cursor beyond the current end is allowed; the next write
    /// zero-fills the gap.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed.
    pub fn set_position(&self, pos: u64) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.cursor = pos;
        Ok(())
    }
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomAccessFile for MemoryFile {
    fn position(&self) -> StoreResult<u64> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.cursor)
    }

    fn size(&self) -> StoreResult<u64> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.data.len() as u64)
    }

    fn write(&self, data: &[u8]) -> StoreResult<()> {
        if !self.writable {
            return Err(StoreError::NotWritable);
        }
        let mut state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        if data.is_empty() {
            return Ok(());
        }

        let pos = state.cursor as usize;
        let end = pos + data.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[pos..end].copy_from_slice(data);
        state.cursor = end as u64;
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], pos: u64) -> StoreResult<usize> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let size = state.data.len() as u64;
        if buf.is_empty() || pos >= size {
            return Ok(0);
        }

        let start = pos as usize;
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        Ok(n)
    }

    fn force(&self, _metadata: bool) -> StoreResult<()> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        // Nothing to make durable in memory
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.state.write().closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.state.read().closed
    }
}
