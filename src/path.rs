//! Validated paths of archive entries.

use std::fmt;

use thiserror::Error;

/// The separator between segments of an [`ArchivePath`].
pub const PATH_SEP: char = '/';

/// Reasons for a path declared in an archive to be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("no path provided")]
    Empty,
    #[error("path is absolute")]
    Absolute,
    #[error("path contains an empty segment")]
    EmptySegment,
    #[error("path contains a relative segment {0:?}")]
    RelativeSegment(String),
    #[error("path is not valid UTF-8")]
    NotUtf8,
}

/// A relative, `/`-separated path declared by an archive entry.
///
/// A path ending in `/` names a directory.  Every other path names a regular file.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchivePath(String);

/// Checks that `path` is a legal entry path: one or more non-empty segments joined by `/`,
/// optionally followed by a single trailing `/`, with no `.` or `..` segments.
pub fn validate(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    if path.starts_with(PATH_SEP) {
        return Err(PathError::Absolute);
    }

    let path = path.strip_suffix(PATH_SEP).unwrap_or(path);

    for segment in path.split(PATH_SEP) {
        match segment {
            "" => return Err(PathError::EmptySegment),
            "." | ".." => return Err(PathError::RelativeSegment(segment.to_string())),
            _ => {}
        }
    }

    Ok(())
}

impl ArchivePath {
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        validate(&path)?;
        Ok(ArchivePath(path))
    }

    /// Parses a path from the raw bytes of a declaration line.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PathError> {
        let path = std::str::from_utf8(bytes).map_err(|_| PathError::NotUtf8)?;
        Self::new(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path names a directory (ends in `/`).
    pub fn is_dir(&self) -> bool {
        self.0.ends_with(PATH_SEP)
    }

    /// The path with any trailing `/` removed.
    pub fn trimmed(&self) -> &str {
        self.0.strip_suffix(PATH_SEP).unwrap_or(&self.0)
    }

    /// The directory containing this entry, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<&str> {
        self.trimmed()
            .rsplit_once(PATH_SEP)
            .map(|(parent, _)| parent)
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
