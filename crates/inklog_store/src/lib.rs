//! # Inklog Store
//!
//! Random-access ledger file trait and implementations for inklog.
//!
//! This crate provides the lowest-level file abstraction for inklog.
//! Files are **opaque byte stores** with a write cursor - they do not
//! interpret the data they hold, and they add no framing of their own.
//!
//! ## Design Principles
//!
//! - Files are simple seekable byte stores (positioned read, cursor write)
//! - No knowledge of journal record formats or channel buffering
//! - Must be `Send + Sync`; callers share them as `Arc<dyn RandomAccessFile>`
//! - The channel layer owns all logical end-of-stream accounting
//!
//! ## Available Implementations
//!
//! - [`MemoryFile`] - For testing and ephemeral journals
//! - [`DiskFile`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use inklog_store::{MemoryFile, RandomAccessFile};
//!
//! let file = MemoryFile::new();
//! file.write(b"hello world").unwrap();
//!
//! let mut buf = [0u8; 5];
//! let n = file.read_at(&mut buf, 6).unwrap();
//! assert_eq!(n, 5);
//! assert_eq!(&buf, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod disk;
mod error;
mod file;
mod memory;

pub use disk::DiskFile;
pub use error::{StoreError, StoreResult};
pub use file::RandomAccessFile;
pub use memory::MemoryFile;
