//! File system utility functions.
//!
//! Sampling reads, extension checks and the atomic replace used when a file
//! is rewritten.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::core::detector::ByteSample;

/// Check if a directory exists at the given path.
pub fn directory_exists(path: &Path) -> bool {
    path.exists() && path.is_dir()
}

/// Get the filename from a path, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Lowercase extension with its leading dot, e.g. `.txt`.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// True when the path's extension is in the allow-list (entries are `.ext`).
pub fn has_extension(path: &Path, allow_list: &HashSet<String>) -> bool {
    dotted_extension(path).is_some_and(|ext| allow_list.contains(&ext))
}

/// Read at most `cap` bytes from the start of the file.
pub fn read_sample(path: &Path, cap: usize) -> std::io::Result<ByteSample> {
    let file = fs::File::open(path)?;
    let mut buffer = Vec::with_capacity(cap.min(64 * 1024));
    // One extra byte tells us whether the file continues past the cap.
    let limit = u64::try_from(cap).unwrap_or(u64::MAX).saturating_add(1);
    file.take(limit).read_to_end(&mut buffer)?;
    Ok(ByteSample::new(buffer, cap))
}

/// Replace the file's content without ever exposing a partial write.
///
/// The bytes go to a temporary file in the same directory, which is synced
/// and then renamed over the target. The original keeps its permissions.
/// On error the temporary is dropped and the target is left as it was.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
