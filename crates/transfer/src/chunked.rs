use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::ChunkError;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, ChunkError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Number of parts needed for `file_size` bytes: `ceil(file_size / part_size)`.
pub fn part_count(file_size: u64, part_size: u64) -> u64 {
    if part_size == 0 {
        return 0;
    }
    file_size.div_ceil(part_size)
}

// ---------------------------------------------------------------------------
// PartReader
// ---------------------------------------------------------------------------

/// One positional slice of the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// 1-based part number.
    pub number: usize,
    /// Byte offset of `data` within the file.
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Reads a file sequentially in `part_size` chunks.
///
/// Parts carry no offset on the wire, so they must be read strictly in
/// order: part `n` covers `[(n-1) * part_size, n * part_size)`, the last
/// part whatever remains.
pub struct PartReader {
    file: tokio::fs::File,
    part_size: u64,
    offset: u64,
    next_number: usize,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` for part-sized reading.
    pub async fn open(path: &Path, part_size: u64) -> Result<Self, ChunkError> {
        if part_size == 0 {
            return Err(ChunkError::ZeroPartSize);
        }
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self {
            file,
            part_size,
            offset: 0,
            next_number: 1,
            file_size,
        })
    }

    /// Reads the next part. Returns `None` at EOF.
    pub async fn next_part(&mut self) -> Result<Option<Part>, ChunkError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.part_size) as usize;
        let mut data = vec![0u8; read_size];
        self.file.read_exact(&mut data).await?;

        let part = Part {
            number: self.next_number,
            offset: self.offset,
            data,
        };
        self.offset += read_size as u64;
        self.next_number += 1;
        Ok(Some(part))
    }

    /// Total file size in bytes, as seen when the file was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size - self.offset
    }

    /// Number of parts this reader will yield in total.
    pub fn part_count(&self) -> u64 {
        part_count(self.file_size, self.part_size)
    }
}
