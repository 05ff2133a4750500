//! Buffered write channel with merged reads.

use crate::buffer::{BufferAllocator, IoBuffer};
use crate::error::{ChannelError, ChannelResult};
use crate::read::BufferedReadChannel;
use inklog_store::{RandomAccessFile, StoreError};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A buffered write channel over a ledger file.
///
/// Appends accumulate in an in-memory write buffer and reach the file in
/// buffer-sized sequential writes. Reads merge three sources in address
/// order: bytes still in the write buffer, bytes in the composed
/// read-ahead cache, and bytes in the file itself.
///
/// Two offsets describe the stream. `position` is the logical end of
/// everything appended; `flushed_position` is the offset below which
/// bytes have reached the file, and the delta between them is exactly the
/// write buffer's fill. Both are atomics: the single writer stores them
/// with release ordering and readers load them with acquire ordering,
/// the only cross-thread synchronization in this layer besides the
/// buffer lock itself.
///
/// With an unpersisted-bytes bound above zero, an append that pushes the
/// unpersisted count to the bound flushes and forces the file before
/// returning. A bound of zero or below disables that policy; durability
/// then happens only on explicit [`force_write`](Self::force_write).
///
/// A write capacity of zero degenerates to unbuffered mode: every append
/// goes straight to the file.
///
/// The file handle stays owned by the caller; closing the channel never
/// closes the file.
pub struct BufferedWriteChannel {
    file: Arc<dyn RandomAccessFile>,
    write_capacity: usize,
    write_buffer: RwLock<IoBuffer>,
    /// File offset of the write buffer's first byte.
    write_buffer_start: AtomicU64,
    /// Logical end of the appended stream.
    position: AtomicU64,
    unpersisted: AtomicU64,
    unpersisted_bound: i64,
    do_regular_flushes: bool,
    reader: BufferedReadChannel,
    closed: AtomicBool,
}

impl BufferedWriteChannel {
    /// Creates a write channel over `file`.
    ///
    /// The write buffer is obtained from `allocator` with
    /// `write_capacity`; `read_capacity` sizes the composed read-ahead
    /// cache. Both offsets start at the file's current write cursor, so a
    /// file opened on existing data resumes where it left off.
    ///
    /// `unpersisted_bytes_bound` above zero enables the periodic force
    /// policy; zero or below disables it.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Store`] if the file is already closed
    /// - [`ChannelError::AllocationFailed`] if the allocator produces no
    ///   buffer
    pub fn new(
        allocator: &dyn BufferAllocator,
        file: Arc<dyn RandomAccessFile>,
        write_capacity: usize,
        read_capacity: usize,
        unpersisted_bytes_bound: i64,
    ) -> ChannelResult<Self> {
        let write_buffer = allocator
            .allocate(write_capacity)
            .ok_or(ChannelError::AllocationFailed {
                capacity: write_capacity,
            })?;
        let start = file.position()?;

        Ok(Self {
            reader: BufferedReadChannel::new(Arc::clone(&file), read_capacity),
            file,
            write_capacity,
            write_buffer: RwLock::new(write_buffer),
            write_buffer_start: AtomicU64::new(start),
            position: AtomicU64::new(start),
            unpersisted: AtomicU64::new(0),
            unpersisted_bound: unpersisted_bytes_bound,
            do_regular_flushes: unpersisted_bytes_bound > 0,
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a write channel with equal write and read capacities and
    /// no periodic force policy.
    ///
    /// # Errors
    ///
    /// Same conditions as [`new`](Self::new).
    pub fn with_capacity(
        allocator: &dyn BufferAllocator,
        file: Arc<dyn RandomAccessFile>,
        capacity: usize,
    ) -> ChannelResult<Self> {
        Self::new(allocator, file, capacity, capacity, 0)
    }

    /// Appends `data` to the stream, returning the offset it begins at.
    ///
    /// Bytes are copied into the write buffer; whenever the buffer fills,
    /// its whole content is flushed to the file before copying continues.
    /// The logical end advances as bytes are staged and always covers the
    /// flushed prefix.
    ///
    /// Must be called from the single writer thread.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel has been closed
    /// - [`ChannelError::Store`] if the file has been closed, is not
    ///   writable, or a flush fails. Bytes staged before the failure stay
    ///   appended and readable, with `flushed_position` advanced by
    ///   exactly the bytes that reached the file; the rest of `data` is
    ///   not appended.
    pub fn append(&self, data: &[u8]) -> ChannelResult<u64> {
        self.ensure_open()?;
        let offset = self.position.load(Ordering::Acquire);
        if data.is_empty() {
            return Ok(offset);
        }

        {
            let mut buffer = self.write_buffer.write();
            if !buffer.is_live() {
                return Err(ChannelError::BufferReleased);
            }
            let mut written = 0;
            while written < data.len() {
                let n = buffer.writable_bytes().min(data.len() - written);
                if n == 0 {
                    self.flush_locked(&mut buffer)?;
                    if buffer.writable_bytes() == 0 {
                        // Zero-capacity buffer: nothing can ever be staged,
                        // so the remainder goes straight to the file.
                        self.write_through(&data[written..])?;
                        written = data.len();
                    }
                    continue;
                }
                buffer.put_slice(&data[written..written + n]);
                written += n;
                // The logical end covers staged bytes before any later
                // flush can advance the buffer start past them.
                self.position
                    .store(offset + written as u64, Ordering::Release);
                self.unpersisted.fetch_add(n as u64, Ordering::Relaxed);
            }
        }

        if self.should_force() {
            self.flush_and_force_write(false)?;
        }
        Ok(offset)
    }

    /// Flushes buffered bytes to the file without forcing durability.
    ///
    /// Idempotent when the buffer is empty. Must be called from the
    /// single writer thread.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel has been closed
    /// - [`ChannelError::Store`] if the file write fails; the buffer then
    ///   retains exactly the bytes that did not reach the file, and a
    ///   retried flush writes only those
    pub fn flush(&self) -> ChannelResult<()> {
        self.ensure_open()?;
        let mut buffer = self.write_buffer.write();
        if !buffer.is_live() {
            return Err(ChannelError::BufferReleased);
        }
        self.flush_locked(&mut buffer)
    }

    /// Forces the file to stable storage and resets the unpersisted-byte
    /// count.
    ///
    /// Returns the durable watermark: the offset below which bytes are
    /// guaranteed durable once the call returns. Bytes still in the write
    /// buffer are not covered; call [`flush`](Self::flush) first, or use
    /// [`flush_and_force_write`](Self::flush_and_force_write).
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel has been closed
    /// - [`ChannelError::Store`] if the file force fails
    pub fn force_write(&self, metadata: bool) -> ChannelResult<u64> {
        self.ensure_open()?;
        // Sample before forcing: only bytes already in the file become
        // durable, and the start can advance concurrently with the force.
        let watermark = self.write_buffer_start.load(Ordering::Acquire);
        self.file.force(metadata)?;
        self.unpersisted.store(0, Ordering::Relaxed);
        debug!(watermark, metadata, "forced file to stable storage");
        Ok(watermark)
    }

    /// Flushes buffered bytes, then forces the file.
    ///
    /// Returns the durable watermark, which covers everything appended
    /// before the call.
    ///
    /// # Errors
    ///
    /// Same conditions as [`flush`](Self::flush) and
    /// [`force_write`](Self::force_write).
    pub fn flush_and_force_write(&self, metadata: bool) -> ChannelResult<u64> {
        self.flush()?;
        self.force_write(metadata)
    }

    /// Reads up to `length` bytes starting at `pos` into `dest`.
    ///
    /// The request is served in address order from up to three sources:
    /// bytes below `flushed_position` come from the read-ahead cache or
    /// the file, bytes at or above it come straight out of the write
    /// buffer. Requests extending past the logical end are clamped;
    /// the return value is `min(length, position() - pos)`.
    ///
    /// Safe to call from any number of threads concurrently with the
    /// writer.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel has been closed
    /// - [`ChannelError::Store`] if the file has been closed or a file
    ///   read fails
    /// - [`ChannelError::ReadPastEnd`] if `pos` is at or past the logical
    ///   end
    /// - [`ChannelError::BufferReleased`] if `dest` was already released
    pub fn read(&self, dest: &mut IoBuffer, pos: u64, length: usize) -> ChannelResult<usize> {
        self.ensure_open()?;
        if length == 0 {
            return Ok(0);
        }
        if !dest.is_live() {
            return Err(ChannelError::BufferReleased);
        }

        // The end is sampled once; everything below it is reachable for
        // the whole call, either in the file or in the write buffer.
        let end = self.position.load(Ordering::Acquire);
        if pos >= end {
            return Err(ChannelError::ReadPastEnd {
                pos,
                len: length,
                end,
            });
        }

        let mut current = pos;
        let mut remaining = (length as u64).min(end - pos) as usize;
        let request = remaining;
        while remaining > 0 {
            let (copied, start) = {
                let buffer = self.write_buffer.read();
                let start = self.write_buffer_start.load(Ordering::Acquire);
                if current >= start {
                    if !buffer.is_live() {
                        return Err(ChannelError::BufferReleased);
                    }
                    let offset = (current - start) as usize;
                    let n = remaining.min(buffer.len().saturating_sub(offset));
                    if n == 0 {
                        return Err(ChannelError::ReadPastEnd {
                            pos,
                            len: length,
                            end,
                        });
                    }
                    dest.put_slice(&buffer.as_slice()[offset..offset + n]);
                    (n, start)
                } else {
                    (0, start)
                }
            };

            if copied > 0 {
                current += copied as u64;
                remaining -= copied;
                continue;
            }

            // Bytes below the buffer start are in the file; cap the
            // delegated range at the sampled start so the cache never
            // overlaps the write buffer's window.
            let tier_len = remaining.min((start - current) as usize);
            let n = self.reader.read(dest, current, tier_len)?;
            current += n as u64;
            remaining -= n;
        }
        Ok(request)
    }

    /// Returns the logical end of the appended stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Returns the offset below which bytes have reached the file.
    ///
    /// Never exceeds [`position`](Self::position).
    #[must_use]
    pub fn flushed_position(&self) -> u64 {
        self.write_buffer_start.load(Ordering::Acquire)
    }

    /// Returns the number of bytes currently staged in the write buffer.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.write_buffer.read().len()
    }

    /// Returns the bytes appended since the last force.
    #[must_use]
    pub fn unpersisted_bytes(&self) -> u64 {
        self.unpersisted.load(Ordering::Relaxed)
    }

    /// Returns the write buffer's capacity.
    #[must_use]
    pub fn write_capacity(&self) -> usize {
        self.write_capacity
    }

    /// Returns the configured unpersisted-bytes bound.
    #[must_use]
    pub fn unpersisted_bytes_bound(&self) -> i64 {
        self.unpersisted_bound
    }

    /// Returns whether the periodic force policy is active.
    #[must_use]
    pub fn regular_flushes(&self) -> bool {
        self.do_regular_flushes
    }

    /// Closes the channel. Idempotent.
    ///
    /// Residual buffered bytes are flushed to the file first when it is
    /// still open; the buffers are then released regardless. The file
    /// handle itself stays open, the caller owns it.
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any; the channel is closed and its
    /// buffers released either way.
    pub fn close(&self) -> ChannelResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut buffer = self.write_buffer.write();
        let flush_result = if buffer.is_live() && !buffer.is_empty() {
            if self.file.is_open() {
                self.flush_locked(&mut buffer)
            } else {
                warn!(
                    bytes = buffer.len(),
                    "file closed under channel; discarding buffered bytes"
                );
                Ok(())
            }
        } else {
            Ok(())
        };
        if buffer.is_live() {
            buffer.release();
        }
        drop(buffer);
        self.reader.close()?;
        flush_result
    }

    /// Writes the buffer's content to the file and accounts for it.
    ///
    /// On a partial failure, the written prefix is drained from the
    /// buffer and `write_buffer_start` advances past it, so nothing is
    /// written twice on retry.
    fn flush_locked(&self, buffer: &mut IoBuffer) -> ChannelResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let len = buffer.len();
        match self.file.write(buffer.as_slice()) {
            Ok(()) => {
                buffer.clear();
                self.write_buffer_start
                    .fetch_add(len as u64, Ordering::AcqRel);
                trace!(bytes = len, "flushed write buffer");
                Ok(())
            }
            Err(err) => {
                let start = self.write_buffer_start.load(Ordering::Acquire);
                let written = match self.file.position() {
                    Ok(cursor) => cursor.saturating_sub(start).min(len as u64) as usize,
                    Err(_) => 0,
                };
                if written > 0 {
                    buffer.advance(written);
                    self.write_buffer_start
                        .fetch_add(written as u64, Ordering::AcqRel);
                }
                Err(err.into())
            }
        }
    }

    /// Unbuffered write used when the write buffer has zero capacity.
    ///
    /// The logical end and the buffer start advance together over the
    /// bytes the file accepted, including on failure.
    fn write_through(&self, data: &[u8]) -> ChannelResult<()> {
        let start = self.write_buffer_start.load(Ordering::Acquire);
        match self.file.write(data) {
            Ok(()) => {
                let end = start + data.len() as u64;
                self.position.store(end, Ordering::Release);
                self.write_buffer_start.store(end, Ordering::Release);
                self.unpersisted
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                let written = match self.file.position() {
                    Ok(cursor) => cursor.saturating_sub(start),
                    Err(_) => 0,
                };
                if written > 0 {
                    self.position.store(start + written, Ordering::Release);
                    self.write_buffer_start
                        .fetch_add(written, Ordering::AcqRel);
                    self.unpersisted.fetch_add(written, Ordering::Relaxed);
                }
                Err(err.into())
            }
        }
    }

    fn should_force(&self) -> bool {
        self.do_regular_flushes
            && self.unpersisted.load(Ordering::Relaxed) >= self.unpersisted_bound as u64
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

impl Drop for BufferedWriteChannel {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let buffer = self.write_buffer.get_mut();
        if buffer.is_live() {
            if !buffer.is_empty() {
                warn!(
                    bytes = buffer.len(),
                    "write channel dropped with unflushed bytes"
                );
            }
            buffer.release();
        }
    }
}

impl fmt::Debug for BufferedWriteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedWriteChannel")
            .field("write_capacity", &self.write_capacity)
            .field("position", &self.position.load(Ordering::Relaxed))
            .field(
                "write_buffer_start",
                &self.write_buffer_start.load(Ordering::Relaxed),
            )
            .field("unpersisted_bytes_bound", &self.unpersisted_bound)
            .finish_non_exhaustive()
    }
}
