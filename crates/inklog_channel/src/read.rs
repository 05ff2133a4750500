//! Read-ahead cache channel over a ledger file.

use crate::buffer::IoBuffer;
use crate::error::{ChannelError, ChannelResult};
use inklog_store::{RandomAccessFile, StoreError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

struct ReadCache {
    buffer: IoBuffer,
    /// File offset of the buffer's first byte; meaningful only while the
    /// buffer is non-empty.
    start: u64,
}

/// A buffered read channel over a ledger file.
///
/// Serves positioned reads from a single cache window, refilling the
/// window from the file on a miss. The window only moves on a refill,
/// never while a read is being satisfied from inside it. Readers
/// serialize on the window; the file handle is shared and stays owned by
/// the caller.
///
/// A read capacity of zero disables the window entirely and every read
/// goes straight to the file.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use inklog_channel::{BufferedReadChannel, IoBuffer};
/// use inklog_store::MemoryFile;
///
/// let file = Arc::new(MemoryFile::with_data(vec![7u8; 128]));
/// let channel = BufferedReadChannel::new(file, 64);
///
/// let mut dest = IoBuffer::with_capacity(16);
/// let n = channel.read(&mut dest, 0, 16).unwrap();
/// assert_eq!(n, 16);
/// ```
pub struct BufferedReadChannel {
    file: Arc<dyn RandomAccessFile>,
    read_capacity: usize,
    cache: Mutex<ReadCache>,
    closed: AtomicBool,
    invocations: AtomicU64,
    cache_hits: AtomicU64,
}

impl BufferedReadChannel {
    /// Creates a read channel over `file` with the given cache capacity.
    #[must_use]
    pub fn new(file: Arc<dyn RandomAccessFile>, read_capacity: usize) -> Self {
        Self {
            file,
            read_capacity,
            cache: Mutex::new(ReadCache {
                buffer: IoBuffer::with_capacity(read_capacity),
                start: 0,
            }),
            closed: AtomicBool::new(false),
            invocations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Reads exactly `length` bytes starting at `pos` into `dest`.
    ///
    /// Bytes already inside the cache window are copied directly; anything
    /// else refills the window from the file at the missing position. On
    /// success the full `length` has been appended to `dest`.
    ///
    /// A `length` of zero returns `Ok(0)` without touching `dest`.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel has been closed
    /// - [`ChannelError::Store`] if the file has been closed or a file
    ///   read fails
    /// - [`ChannelError::ReadPastEnd`] if the file runs out of bytes
    ///   before `length` is satisfied; the error reports the file's end
    ///   offset, and `dest` may have received a partial prefix by then
    /// - [`ChannelError::BufferReleased`] if `dest` or the window buffer
    ///   was already released
    pub fn read(&self, dest: &mut IoBuffer, pos: u64, length: usize) -> ChannelResult<usize> {
        self.ensure_open()?;
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if length == 0 {
            return Ok(0);
        }
        if !dest.is_live() {
            return Err(ChannelError::BufferReleased);
        }

        let mut cache = self.cache.lock();
        // A close that raced past ensure_open released the window buffer.
        if !cache.buffer.is_live() {
            return Err(ChannelError::BufferReleased);
        }
        let mut current = pos;
        let mut remaining = length;
        while remaining > 0 {
            let start = cache.start;
            let valid = cache.buffer.len() as u64;
            if current >= start && current < start + valid {
                let offset = (current - start) as usize;
                let n = remaining.min(cache.buffer.len() - offset);
                dest.put_slice(&cache.buffer.as_slice()[offset..offset + n]);
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                current += n as u64;
                remaining -= n;
                continue;
            }

            if self.read_capacity == 0 {
                // No window: read straight through into dest.
                let mut scratch = vec![0u8; remaining];
                let n = self.file.read_at(&mut scratch, current)?;
                if n == 0 {
                    return Err(ChannelError::ReadPastEnd {
                        pos,
                        len: length,
                        end: self.file.size()?.min(current),
                    });
                }
                dest.put_slice(&scratch[..n]);
                current += n as u64;
                remaining -= n;
                continue;
            }

            // Miss: refill the window starting at the missing byte.
            cache.buffer.clear();
            cache.buffer.resize_zeroed(self.read_capacity);
            let n = self.file.read_at(cache.buffer.as_mut_slice(), current)?;
            cache.buffer.truncate(n);
            cache.start = current;
            if n == 0 {
                return Err(ChannelError::ReadPastEnd {
                    pos,
                    len: length,
                    end: self.file.size()?.min(current),
                });
            }
            trace!(pos = current, bytes = n, "read cache refill");
        }
        Ok(length)
    }

    /// Invalidates the cache window.
    ///
    /// The next read refills from the file. Used when the underlying file
    /// has been rewritten or rolled out from under the channel.
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        if cache.buffer.is_live() {
            cache.buffer.clear();
        }
        cache.start = 0;
    }

    /// Returns the cache capacity in bytes.
    #[must_use]
    pub fn read_capacity(&self) -> usize {
        self.read_capacity
    }

    /// Returns how many times `read` has been called.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Returns how many copy steps were served from the cache window.
    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Closes the channel, releasing its cache buffer. Idempotent.
    ///
    /// The file handle stays open; the caller owns it.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` mirrors the write channel.
    pub fn close(&self) -> ChannelResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut cache = self.cache.lock();
        if cache.buffer.is_live() {
            cache.buffer.release();
        }
        Ok(())
    }

    fn ensure_open(&self) -> ChannelResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        if !self.file.is_open() {
            return Err(ChannelError::Store(StoreError::Closed));
        }
        Ok(())
    }
}

impl Drop for BufferedReadChannel {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let cache = self.cache.get_mut();
        if cache.buffer.is_live() {
            cache.buffer.release();
        }
    }
}

impl fmt::Debug for BufferedReadChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedReadChannel")
            .field("read_capacity", &self.read_capacity)
            .field("invocations", &self.invocations.load(Ordering::Relaxed))
            .field("cache_hits", &self.cache_hits.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inklog_store::{MemoryFile, StoreResult};
    use std::sync::atomic::AtomicUsize;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Wraps a [`MemoryFile`] and counts positioned reads.
    struct CountingFile {
        inner: MemoryFile,
        reads: AtomicUsize,
    }

    impl CountingFile {
        fn with_data(data: Vec<u8>) -> Self {
            Self {
                inner: MemoryFile::with_data(data),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::Relaxed)
        }
    }

    impl RandomAccessFile for CountingFile {
        fn position(&self) -> StoreResult<u64> {
            self.inner.position()
        }

        fn size(&self) -> StoreResult<u64> {
            self.inner.size()
        }

        fn write(&self, data: &[u8]) -> StoreResult<()> {
            self.inner.write(data)
        }

        fn read_at(&self, buf: &mut [u8], pos: u64) -> StoreResult<usize> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            self.inner.read_at(buf, pos)
        }

        fn force(&self, metadata: bool) -> StoreResult<()> {
            self.inner.force(metadata)
        }

        fn close(&self) -> StoreResult<()> {
            self.inner.close()
        }

        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    #[test]
    fn read_spans_multiple_refills() {
        let file = Arc::new(MemoryFile::with_data(pattern(2048)));
        let channel = BufferedReadChannel::new(file, 64);

        let mut dest = IoBuffer::with_capacity(100);
        let n = channel.read(&mut dest, 0, 100).unwrap();
        assert_eq!(n, 100);
        assert_eq!(dest.as_slice(), &pattern(2048)[..100]);
    }

    #[test]
    fn read_last_byte_succeeds() {
        let data = pattern(2048);
        let last = data[2047];
        let file = Arc::new(MemoryFile::with_data(data));
        let channel = BufferedReadChannel::new(file, 64);

        let mut dest = IoBuffer::with_capacity(1);
        assert_eq!(channel.read(&mut dest, 2047, 1).unwrap(), 1);
        assert_eq!(dest.as_slice(), &[last]);
    }

    #[test]
    fn read_past_end_fails() {
        let file = Arc::new(MemoryFile::with_data(pattern(2048)));
        let channel = BufferedReadChannel::new(file, 64);

        let mut dest = IoBuffer::with_capacity(1);
        let err = channel.read(&mut dest, 2048, 1).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::ReadPastEnd { pos: 2048, len: 1, .. }
        ));
    }

    #[test]
    fn read_far_past_end_reports_file_end() {
        let file = Arc::new(MemoryFile::with_data(pattern(10)));
        let channel = BufferedReadChannel::new(file, 64);

        let mut dest = IoBuffer::with_capacity(8);
        let err = channel.read(&mut dest, 50, 8).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::ReadPastEnd { pos: 50, len: 8, end: 10 }
        ));
    }

    #[test]
    fn zero_capacity_read_past_end_reports_file_end() {
        let file = Arc::new(MemoryFile::with_data(pattern(10)));
        let channel = BufferedReadChannel::new(file, 0);

        let mut dest = IoBuffer::with_capacity(8);
        let err = channel.read(&mut dest, 50, 8).unwrap_err();
        assert!(matches!(err, ChannelError::ReadPastEnd { end: 10, .. }));
    }

    #[test]
    fn window_serves_repeat_reads() {
        let file = Arc::new(CountingFile::with_data(pattern(512)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 64);

        let mut dest = IoBuffer::with_capacity(32);
        channel.read(&mut dest, 0, 16).unwrap();
        channel.read(&mut dest, 8, 8).unwrap();

        assert_eq!(file.reads(), 1);
        assert_eq!(channel.invocations(), 2);
        assert_eq!(channel.cache_hits(), 2);
        assert_eq!(&dest.as_slice()[16..], &pattern(512)[8..16]);
    }

    #[test]
    fn miss_moves_window() {
        let file = Arc::new(CountingFile::with_data(pattern(512)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 64);

        let mut dest = IoBuffer::with_capacity(16);
        channel.read(&mut dest, 0, 8).unwrap();
        dest.clear();
        channel.read(&mut dest, 100, 8).unwrap();

        assert_eq!(file.reads(), 2);
        assert_eq!(dest.as_slice(), &pattern(512)[100..108]);
    }

    #[test]
    fn short_refill_keeps_valid_length() {
        let file = Arc::new(CountingFile::with_data(pattern(100)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 64);

        let mut dest = IoBuffer::with_capacity(64);
        assert_eq!(channel.read(&mut dest, 64, 36).unwrap(), 36);
        assert_eq!(dest.as_slice(), &pattern(100)[64..]);

        // The 36-byte tail window serves later reads without a refill.
        dest.clear();
        assert_eq!(channel.read(&mut dest, 90, 10).unwrap(), 10);
        assert_eq!(file.reads(), 1);
    }

    #[test]
    fn read_beyond_file_tail_fails_after_partial_copy() {
        let file = Arc::new(MemoryFile::with_data(pattern(100)));
        let channel = BufferedReadChannel::new(file, 64);

        let mut dest = IoBuffer::with_capacity(64);
        let err = channel.read(&mut dest, 50, 60).unwrap_err();
        assert!(matches!(err, ChannelError::ReadPastEnd { end: 100, .. }));
    }

    #[test]
    fn zero_capacity_reads_through() {
        let file = Arc::new(CountingFile::with_data(pattern(256)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 0);

        let mut dest = IoBuffer::with_capacity(16);
        assert_eq!(channel.read(&mut dest, 5, 10).unwrap(), 10);
        assert_eq!(dest.as_slice(), &pattern(256)[5..15]);
        assert_eq!(file.reads(), 1);
        assert_eq!(channel.cache_hits(), 0);

        dest.clear();
        channel.read(&mut dest, 5, 10).unwrap();
        assert_eq!(file.reads(), 2);
    }

    #[test]
    fn zero_length_read_touches_nothing() {
        let file = Arc::new(CountingFile::with_data(pattern(64)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 16);

        let mut dest = IoBuffer::with_capacity(4);
        assert_eq!(channel.read(&mut dest, 0, 0).unwrap(), 0);
        assert!(dest.is_empty());
        assert_eq!(file.reads(), 0);
        assert_eq!(channel.invocations(), 1);
    }

    #[test]
    fn released_dest_is_rejected() {
        let file = Arc::new(MemoryFile::with_data(pattern(64)));
        let channel = BufferedReadChannel::new(file, 16);

        let mut dest = IoBuffer::with_capacity(4);
        dest.release();
        assert!(matches!(
            channel.read(&mut dest, 0, 4),
            Err(ChannelError::BufferReleased)
        ));
    }

    #[test]
    fn closed_channel_rejects_reads() {
        let file = Arc::new(MemoryFile::with_data(pattern(64)));
        let channel = BufferedReadChannel::new(file, 16);

        channel.close().unwrap();
        let mut dest = IoBuffer::with_capacity(4);
        assert!(matches!(
            channel.read(&mut dest, 0, 4),
            Err(ChannelError::Closed)
        ));

        // close is idempotent
        channel.close().unwrap();
    }

    #[test]
    fn closed_file_is_detected_even_on_cached_data() {
        let file = Arc::new(MemoryFile::with_data(pattern(64)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 16);

        let mut dest = IoBuffer::with_capacity(8);
        channel.read(&mut dest, 0, 8).unwrap();

        file.close().unwrap();
        dest.clear();
        assert!(matches!(
            channel.read(&mut dest, 0, 8),
            Err(ChannelError::Store(StoreError::Closed))
        ));
    }

    #[test]
    fn clear_forces_refill() {
        let file = Arc::new(CountingFile::with_data(pattern(256)));
        let channel = BufferedReadChannel::new(Arc::clone(&file) as Arc<dyn RandomAccessFile>, 64);

        let mut dest = IoBuffer::with_capacity(16);
        channel.read(&mut dest, 0, 8).unwrap();
        channel.clear();
        dest.clear();
        channel.read(&mut dest, 0, 8).unwrap();

        assert_eq!(file.reads(), 2);
        assert_eq!(dest.as_slice(), &pattern(256)[..8]);
    }
}
