//! Journal Tail Example
//!
//! This example demonstrates:
//! - Appending length-framed records through a buffered write channel
//! - Reading records back while some still sit in the write buffer
//! - Flushing and forcing to obtain a durable watermark
//!
//! Run with `RUST_LOG=trace` to watch the channel's flush and force
//! activity interleaved with the output. Pass a path to journal onto a
//! real file instead of a temporary one.

use inklog_channel::{BufferedWriteChannel, HeapAllocator, IoBuffer};
use inklog_store::{DiskFile, RandomAccessFile};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const WRITE_CAPACITY: usize = 4 * 1024;
const READ_CAPACITY: usize = 4 * 1024;
const UNPERSISTED_BOUND: i64 = 64 * 1024;

/// Read one length-framed record starting at `offset`.
fn read_record(
    channel: &BufferedWriteChannel,
    offset: u64,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut header = IoBuffer::with_capacity(4);
    channel.read(&mut header, offset, 4)?;
    let len = u32::from_le_bytes(header.as_slice()[..4].try_into()?) as usize;

    let mut payload = IoBuffer::with_capacity(len);
    let n = channel.read(&mut payload, offset + 4, len)?;
    Ok(payload.as_slice()[..n].to_vec())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The temp dir must stay alive for the whole run when no path is given.
    let (path, _scratch) = match std::env::args().nth(1) {
        Some(arg) => (PathBuf::from(arg), None),
        None => {
            let dir = TempDir::new()?;
            (dir.path().join("demo.journal"), Some(dir))
        }
    };

    println!("📓 Journal Tail Example");
    println!("=======================\n");
    println!("Journal file: {}", path.display());

    let file = Arc::new(DiskFile::open(&path)?);
    let channel = BufferedWriteChannel::new(
        &HeapAllocator,
        Arc::clone(&file) as Arc<dyn RandomAccessFile>,
        WRITE_CAPACITY,
        READ_CAPACITY,
        UNPERSISTED_BOUND,
    )?;

    // Append length-framed records; every record is a u32 length in
    // little endian followed by the payload.
    let record_count = 2000;
    println!("\n📥 Appending {} records...", record_count);

    let mut offsets = Vec::with_capacity(record_count);
    for i in 0..record_count {
        let payload = format!("journal entry {i}: ledger add, amount {}", i * 3 + 1);
        let mut record = (payload.len() as u32).to_le_bytes().to_vec();
        record.extend_from_slice(payload.as_bytes());
        offsets.push(channel.append(&record)?);
    }

    println!("  position:          {}", channel.position());
    println!("  flushed position:  {}", channel.flushed_position());
    println!("  buffered bytes:    {}", channel.buffered_bytes());
    println!("  unpersisted bytes: {}", channel.unpersisted_bytes());

    // Records near the tail are still in the write buffer, yet reads
    // see them merged with the flushed part of the file.
    println!("\n📋 Sampled records:");
    for &idx in &[0, record_count / 2, record_count - 1] {
        let payload = read_record(&channel, offsets[idx])?;
        println!("  @{:>7} {}", offsets[idx], String::from_utf8_lossy(&payload));
    }

    println!("\n💾 Flushing and forcing...");
    let watermark = channel.flush_and_force_write(false)?;
    println!("✅ Durable up to offset {}", watermark);

    // Tail the journal: walk frames from a known offset to the end.
    println!("\n🔎 Tailing the last 3 records:");
    let mut tail = Vec::new();
    let mut offset = offsets[record_count - 3];
    while offset < channel.position() {
        let payload = read_record(&channel, offset)?;
        offset += 4 + payload.len() as u64;
        tail.push(payload);
    }
    for payload in &tail {
        println!("  {}", String::from_utf8_lossy(payload));
    }

    channel.close()?;

    // The channel never owns the file; it is still open for the caller.
    println!("\n📊 Journal size on disk: {} bytes", file.size()?);
    file.close()?;
    println!("👋 Journal closed");

    Ok(())
}
