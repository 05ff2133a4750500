//! Byte buffers and the allocator seam used by the channels.

use bytes::{Buf, BytesMut};

/// A byte region with a writer index, backed by [`BytesMut`].
///
/// The buffer carries a nominal capacity fixed at allocation.
/// [`put_slice`](Self::put_slice) appends at the writer index and grows
/// the backing storage on demand, so a destination buffer can always
/// accept a full read; [`writable_bytes`](Self::writable_bytes) reports
/// room relative to the nominal capacity, which is what the write channel
/// uses to decide when to flush.
///
/// The read cursor is the front of the slice;
/// [`advance`](Self::advance) consumes from it.
///
/// # Lifecycle
///
/// A buffer is owned by exactly one channel (or test) and released
/// exactly once via [`release`](Self::release). Using a released buffer
/// is a programming error: debug builds assert on it, and the channels
/// surface [`ChannelError::BufferReleased`](crate::ChannelError::BufferReleased)
/// before touching one at their boundaries.
#[derive(Debug)]
pub struct IoBuffer {
    bytes: BytesMut,
    capacity: usize,
    live: bool,
}

impl IoBuffer {
    /// Allocates a buffer with the given nominal capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            capacity,
            live: true,
        }
    }

    /// Returns the nominal capacity fixed at allocation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of valid bytes (the writer index).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether the buffer holds no valid bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the room left before the nominal capacity is reached.
    ///
    /// Zero once the writer index has reached or passed the nominal
    /// capacity; appends still succeed by growing.
    #[must_use]
    pub fn writable_bytes(&self) -> usize {
        self.capacity.saturating_sub(self.bytes.len())
    }

    /// Returns whether the buffer is still live (not released).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Appends `src` at the writer index, growing if needed.
    pub fn put_slice(&mut self, src: &[u8]) {
        debug_assert!(self.live, "buffer used after release");
        self.bytes.extend_from_slice(src);
    }

    /// Returns the valid bytes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        debug_assert!(self.live, "buffer used after release");
        &self.bytes
    }

    /// Returns the valid bytes as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        debug_assert!(self.live, "buffer used after release");
        &mut self.bytes
    }

    /// Drops all valid bytes, resetting the writer index to zero.
    pub fn clear(&mut self) {
        debug_assert!(self.live, "buffer used after release");
        self.bytes.clear();
    }

    /// Consumes `n` bytes from the front of the buffer.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.live, "buffer used after release");
        debug_assert!(n <= self.bytes.len(), "advance past writer index");
        self.bytes.advance(n);
    }

    /// Grows the valid region to `new_len`, zero-filling new bytes.
    pub fn resize_zeroed(&mut self, new_len: usize) {
        debug_assert!(self.live, "buffer used after release");
        self.bytes.resize(new_len, 0);
    }

    /// Shortens the valid region to `new_len`.
    pub fn truncate(&mut self, new_len: usize) {
        debug_assert!(self.live, "buffer used after release");
        self.bytes.truncate(new_len);
    }

    /// Releases the buffer, dropping its contents.
    ///
    /// Must be called at most once.
    pub fn release(&mut self) {
        debug_assert!(self.live, "buffer released twice");
        self.live = false;
        self.bytes = BytesMut::new();
    }
}

/// Allocates buffers for channels.
///
/// Returning `None` signals allocation failure; channels surface it as
/// [`ChannelError::AllocationFailed`](crate::ChannelError::AllocationFailed).
pub trait BufferAllocator: Send + Sync {
    /// Allocates a buffer with the given nominal capacity.
    fn allocate(&self, capacity: usize) -> Option<IoBuffer>;
}

/// Plain heap allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate(&self, capacity: usize) -> Option<IoBuffer> {
        Some(IoBuffer::with_capacity(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_starts_empty() {
        let buf = IoBuffer::with_capacity(8);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.writable_bytes(), 8);
        assert!(buf.is_live());
    }

    #[test]
    fn put_advances_writer_index() {
        let mut buf = IoBuffer::with_capacity(8);
        buf.put_slice(b"abcde");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.writable_bytes(), 3);
        assert_eq!(buf.as_slice(), b"abcde");
    }

    #[test]
    fn put_beyond_capacity_grows() {
        let mut buf = IoBuffer::with_capacity(4);
        buf.put_slice(b"0123456789");
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.writable_bytes(), 0);
        assert_eq!(buf.as_slice(), b"0123456789");
    }

    #[test]
    fn advance_consumes_front() {
        let mut buf = IoBuffer::with_capacity(8);
        buf.put_slice(b"01234567");
        buf.advance(3);
        assert_eq!(buf.as_slice(), b"34567");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn clear_resets_writer_index() {
        let mut buf = IoBuffer::with_capacity(8);
        buf.put_slice(b"abc");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.writable_bytes(), 8);
    }

    #[test]
    fn resize_and_truncate() {
        let mut buf = IoBuffer::with_capacity(8);
        buf.resize_zeroed(6);
        assert_eq!(buf.as_slice(), &[0u8; 6]);

        buf.as_mut_slice()[0] = 0xAB;
        buf.truncate(2);
        assert_eq!(buf.as_slice(), &[0xAB, 0]);
    }

    #[test]
    fn release_marks_dead() {
        let mut buf = IoBuffer::with_capacity(8);
        buf.put_slice(b"abc");
        buf.release();
        assert!(!buf.is_live());
    }

    #[test]
    fn heap_allocator_allocates() {
        let buf = HeapAllocator.allocate(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert!(buf.is_live());
    }
}
