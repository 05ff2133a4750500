//! Random-access file trait definition.

use crate::error::StoreResult;

/// A random-access ledger file for inklog.
///
/// Files are **opaque byte stores** with a write cursor. They provide
/// positioned reads, cursor-relative writes, and durability control. The
/// channel layer owns all interpretation of the bytes - files do not
/// understand journal records or buffer windows.
///
/// # Invariants
///
/// - `write` puts data at the cursor and advances it by the bytes written,
///   even when the call fails partway; `position` always reflects exactly
///   the bytes handed to the underlying storage
/// - `read_at` never moves the write cursor
/// - `read_at` may return fewer bytes than requested; `Ok(0)` means no
///   byte was available at that offset
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryFile`] - For testing
/// - [`super::DiskFile`] - For persistent storage
pub trait RandomAccessFile: Send + Sync {
    /// Returns the current write-cursor position.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed.
    fn position(&self) -> StoreResult<u64>;

    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the size cannot be
    /// determined.
    fn size(&self) -> StoreResult<u64>;

    /// Writes all of `data` at the write cursor, advancing it.
    ///
    /// Writing past the current end extends the file; a cursor placed
    /// beyond the end zero-fills the gap.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed, was opened read-only, or an
    /// I/O error occurs. On an I/O error the cursor has advanced by the
    /// bytes that did reach storage.
    fn write(&self, data: &[u8]) -> StoreResult<()>;

    /// Reads up to `buf.len()` bytes starting at `pos` into `buf`.
    ///
    /// Returns the number of bytes read. Short reads are allowed; reading
    /// at or past the end of the file returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or an I/O error occurs.
    fn read_at(&self, buf: &mut [u8], pos: u64) -> StoreResult<usize>;

    /// Forces written data to stable storage.
    ///
    /// With `metadata` set, file metadata (size, timestamps) is forced as
    /// well, the fsync-versus-fdatasync distinction.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is closed or the force fails.
    fn force(&self, metadata: bool) -> StoreResult<()>;

    /// Closes the file. Idempotent.
    ///
    /// Closing does not force; callers that need durability call
    /// [`force`](Self::force) first.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the handle fails.
    fn close(&self) -> StoreResult<()>;

    /// Returns whether the file is still open.
    fn is_open(&self) -> bool;
}
