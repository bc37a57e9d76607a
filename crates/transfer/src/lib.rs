//! File-side primitives for multipart transfers.
//!
//! Splits a local file into positional parts, renders the multipart
//! completion manifest, and validates remote paths.

mod chunked;
mod manifest;
mod validation;

pub use chunked::{Part, PartReader, calculate_file_checksum, checksum_bytes, part_count};
pub use manifest::{CompletionManifest, S3_NAMESPACE};
pub use validation::split_remote_path;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("part size must be greater than zero")]
    ZeroPartSize,

    #[error("part {0} missing from manifest")]
    MissingPart(usize),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
