//! # Inklog Channel
//!
//! Buffered write/read channels over ledger files.
//!
//! This crate sits between a journal or entry-log writer and its
//! [`RandomAccessFile`](inklog_store::RandomAccessFile). An append-only
//! writer accumulates small records in memory and flushes them to the file
//! in large sequential writes, while readers observe one consistent byte
//! stream that may span three physical locations at once: bytes still in
//! the unflushed write buffer, bytes cached in a read-ahead window, and
//! bytes already in the file.
//!
//! ## Components
//!
//! - [`BufferedWriteChannel`] - staged appends, on-demand flushes, a
//!   bounded unpersisted-byte durability policy, and merged reads
//! - [`BufferedReadChannel`] - a read-ahead cache window over the file,
//!   also usable on its own for read-only consumers
//! - [`IoBuffer`] / [`BufferAllocator`] - the buffer model the channels
//!   are built on
//!
//! ## Concurrency
//!
//! Single writer, many readers: exactly one thread calls `append`,
//! `flush` and `force_write` per channel, while any number of threads
//! call `read` concurrently with it. All I/O is blocking and runs on the
//! caller's thread; there is no background flusher.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use inklog_channel::{BufferedWriteChannel, HeapAllocator, IoBuffer};
//! use inklog_store::MemoryFile;
//!
//! let file = Arc::new(MemoryFile::new());
//! let channel = BufferedWriteChannel::new(&HeapAllocator, file, 64, 64, 0).unwrap();
//!
//! let offset = channel.append(b"hello world").unwrap();
//! assert_eq!(offset, 0);
//!
//! let mut dest = IoBuffer::with_capacity(16);
//! let n = channel.read(&mut dest, 6, 5).unwrap();
//! assert_eq!(n, 5);
//! assert_eq!(dest.as_slice(), b"world");
//!
//! channel.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod error;
mod read;
mod write;

pub use buffer::{BufferAllocator, HeapAllocator, IoBuffer};
pub use error::{ChannelError, ChannelResult};
pub use read::BufferedReadChannel;
pub use write::BufferedWriteChannel;
