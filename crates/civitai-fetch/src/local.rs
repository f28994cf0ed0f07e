use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Whether a target path already holds the expected artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Complete,
    Missing,
}

impl LocalState {
    pub fn is_complete(self) -> bool {
        self == LocalState::Complete
    }
}

/// Classify `path` against an optional expected size in bytes.
///
/// A regular file is `Complete` when no size is expected, or when its length
/// equals `expected_size` exactly. Shorter and longer files alike are
/// `Missing`, as is anything that is not a regular file.
pub fn check(path: &Path, expected_size: Option<u64>) -> LocalState {
    let meta = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return LocalState::Missing,
    };

    match expected_size {
        Some(expected) if meta.len() != expected => LocalState::Missing,
        _ => LocalState::Complete,
    }
}

/// Create `path` with `bytes` unless something already exists there.
///
/// The bytes go to a temporary file in the same directory first, which is
/// then linked into place without replacing anything, so a failed write
/// never leaves a partial file at `path`. Returns `Ok(false)` without
/// touching the file when it exists.
pub(crate) fn write_if_absent(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    if fs::symlink_metadata(path).is_ok() {
        return Ok(false);
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
