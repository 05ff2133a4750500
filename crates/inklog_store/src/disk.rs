//! Disk-backed ledger file for persistent storage.

use crate::error::{StoreError, StoreResult};
use crate::file::RandomAccessFile;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A disk-backed ledger file.
///
/// Data survives process restarts. On open, the write cursor is placed at
/// the end of existing data, where a journal writer resumes appending.
///
/// # Durability
///
/// - `write()` hands bytes to the OS; they may still sit in kernel buffers
/// - `force(false)` calls `File::sync_data()`
/// - `force(true)` calls `File::sync_all()`, making metadata durable too
///
/// # Thread Safety
///
/// The file is thread-safe and can be shared across threads. Internal
/// locking keeps the cursor and the OS handle consistent.
///
/// # Example
///
/// ```no_run
/// use inklog_store::{DiskFile, RandomAccessFile};
/// use std::path::Path;
///
/// let file = DiskFile::open(Path::new("journal.0")).unwrap();
/// file.write(b"record").unwrap();
/// file.force(false).unwrap();
/// ```
#[derive(Debug)]
pub struct DiskFile {
    path: PathBuf,
    file: RwLock<Option<File>>,
    cursor: RwLock<u64>,
    writable: bool,
}

impl DiskFile {
    /// Opens or creates a ledger file at the given path.
    ///
    /// If the file exists it is opened for reading and writing with the
    /// cursor at the end of existing data. If it doesn't exist, a new
    /// empty file is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let end = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            cursor: RwLock::new(end),
            writable: true,
        })
    }

    /// Opens or creates a ledger file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Opens an existing ledger file for reading only.
    ///
    /// All `write` calls on the returned file fail with
    /// [`StoreError::NotWritable`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let end = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            cursor: RwLock::new(end),
            writable: false,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
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
        let guard = self.file.read();
        if guard.is_none() {
            return Err(StoreError::Closed);
        }
        *self.cursor.write() = pos;
        Ok(())
    }
}

impl RandomAccessFile for DiskFile {
    fn position(&self) -> StoreResult<u64> {
        let guard = self.file.read();
        if guard.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(*self.cursor.read())
    }

    fn size(&self) -> StoreResult<u64> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(file.metadata()?.len())
    }

    fn write(&self, data: &[u8]) -> StoreResult<()> {
        if !self.writable {
            return Err(StoreError::NotWritable);
        }
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or(StoreError::Closed)?;
        if data.is_empty() {
            return Ok(());
        }

        let mut cursor = self.cursor.write();
        file.seek(SeekFrom::Start(*cursor))?;

        // The cursor advances per chunk actually accepted, so it stays
        // accurate even when a later chunk fails.
        let mut written = 0;
        while written < data.len() {
            match file.write(&data[written..]) {
                Ok(0) => {
                    return Err(StoreError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "file refused additional bytes",
                    )))
                }
                Ok(n) => {
                    written += n;
                    *cursor += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], pos: u64) -> StoreResult<usize> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or(StoreError::Closed)?;
        if buf.is_empty() {
            return Ok(0);
        }

        // Seeking moves only the OS-level offset; write() re-seeks to the
        // tracked cursor, so the logical write position is undisturbed.
        file.seek(SeekFrom::Start(pos))?;
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    fn force(&self, metadata: bool) -> StoreResult<()> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or(StoreError::Closed)?;
        if metadata {
            file.sync_all()?;
        } else {
            file.sync_data()?;
        }
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.file.write().take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.read().is_some()
    }
}
