//! LZ4 payload compression for stored objects
//!
//! Object payloads are framed with a 4-byte header so the reader never has to
//! guess how a payload was written:
//!
//! - `LZ4A`: LZ4 block with prepended size follows
//! - `\0\0\0\0`: raw bytes follow
//!
//! Compression is purely a storage concern. Digests are always computed over
//! the uncompressed canonical bytes, so switching strategy never changes an
//! object's identity.
//!
//! ## Examples
//!
//! ```rust
//! use arbor::compression::{CompressionEngine, CompressionStrategy};
//!
//! let mut engine = CompressionEngine::new(CompressionStrategy::Fast);
//! let data = b"fn main() {}\n".repeat(200);
//! let framed = engine.compress(&data);
//! assert!(framed.len() < data.len());
//! assert_eq!(engine.decompress(&framed).unwrap(), data);
//! ```

use crate::error::{ArborError, Result};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use std::str::FromStr;
use tracing::trace;

// Frame headers
const LZ4_MAGIC: &[u8; 4] = b"LZ4A";
const RAW_MAGIC: &[u8; 4] = &[0, 0, 0, 0];

/// Payloads below this size are never worth an LZ4 attempt
const MIN_COMPRESS_SIZE: usize = 1024;

/// When stored payloads are compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionStrategy {
    /// Store every payload raw
    None,
    /// LZ4 for payloads of at least 1KB, raw otherwise (default)
    #[default]
    Fast,
}

impl CompressionStrategy {
    /// Name persisted in the repository configuration
    pub fn name(&self) -> &'static str {
        match self {
            CompressionStrategy::None => "none",
            CompressionStrategy::Fast => "fast",
        }
    }
}

impl FromStr for CompressionStrategy {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(CompressionStrategy::None),
            "fast" => Ok(CompressionStrategy::Fast),
            other => Err(ArborError::InvalidConfiguration(format!(
                "unknown compression strategy '{}'",
                other
            ))),
        }
    }
}

/// Running totals for the lifetime of an engine
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompressionStats {
    /// Payloads written with LZ4
    pub payloads_compressed: usize,
    /// Payloads written raw
    pub payloads_stored_raw: usize,
    /// Bytes saved by compression
    pub bytes_saved: usize,
}

/// Frames payloads according to a [`CompressionStrategy`]
#[derive(Debug)]
pub struct CompressionEngine {
    strategy: CompressionStrategy,
    stats: CompressionStats,
}

impl CompressionEngine {
    /// Create a new engine with the given strategy
    pub fn new(strategy: CompressionStrategy) -> Self {
        Self {
            strategy,
            stats: CompressionStats::default(),
        }
    }

    /// Strategy this engine was built with
    pub fn strategy(&self) -> CompressionStrategy {
        self.strategy
    }

    /// Statistics since creation
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Frame `content` for storage
    ///
    /// Falls back to a raw frame whenever LZ4 would not shrink the payload.
    pub fn compress(&mut self, content: &[u8]) -> Vec<u8> {
        if self.strategy == CompressionStrategy::Fast && content.len() >= MIN_COMPRESS_SIZE {
            let compressed = compress_prepend_size(content);
            if compressed.len() < content.len() {
                self.stats.payloads_compressed += 1;
                self.stats.bytes_saved += content.len() - compressed.len();
                trace!("Compressed payload {} -> {} bytes", content.len(), compressed.len());
                return frame(LZ4_MAGIC, &compressed);
            }
        }

        self.stats.payloads_stored_raw += 1;
        frame(RAW_MAGIC, content)
    }

    /// Recover the original payload from a frame
    ///
    /// # Errors
    ///
    /// [`ArborError::Decompression`] if the frame is truncated, carries an
    /// unknown header, or the LZ4 block is damaged.
    pub fn decompress(&self, framed: &[u8]) -> Result<Vec<u8>> {
        if framed.len() < 4 {
            return Err(ArborError::Decompression("payload too short".to_string()));
        }

        let (header, body) = framed.split_at(4);
        if header == LZ4_MAGIC {
            decompress_size_prepended(body)
                .map_err(|e| ArborError::Decompression(format!("LZ4 decompression failed: {}", e)))
        } else if header == RAW_MAGIC {
            Ok(body.to_vec())
        } else {
            Err(ArborError::Decompression(format!(
                "unknown payload header {:02x?}",
                header
            )))
        }
    }
}

fn frame(magic: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(magic.len() + body.len());
    result.extend_from_slice(magic);
    result.extend_from_slice(body);
    result
}
