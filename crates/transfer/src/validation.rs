use crate::ChunkError;

/// Splits an absolute remote POSIX path into `(directory, file_name)`.
///
/// Remote paths are always `/`-separated regardless of the local OS.
///
/// Rejects:
/// - Empty paths
/// - Relative paths
/// - Paths ending in `/` (no file name)
/// - `.` or `..` components
pub fn split_remote_path(remote: &str) -> Result<(String, String), ChunkError> {
    if remote.is_empty() {
        return Err(ChunkError::InvalidPath("empty path".into()));
    }
    if !remote.starts_with('/') {
        return Err(ChunkError::InvalidPath(format!(
            "remote path must be absolute: {remote}"
        )));
    }
    if remote.split('/').any(|c| c == ".." || c == ".") {
        return Err(ChunkError::InvalidPath(format!(
            "relative components not allowed: {remote}"
        )));
    }

    let (dir, name) = remote.rsplit_once('/').unwrap_or(("", remote));
    if name.is_empty() {
        return Err(ChunkError::InvalidPath(format!("missing file name: {remote}")));
    }
    let dir = if dir.is_empty() { "/" } else { dir };
    Ok((dir.to_string(), name.to_string()))
}
