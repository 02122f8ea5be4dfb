//! Errors produced while reading an archive.

use thiserror::Error;

use crate::path::PathError;

/// An error encountered while parsing an archive.
///
/// Errors raised while processing an entry are wrapped in [`Error::Line`], which records where in
/// the input the problem was found.  Use [`Error::kind()`] to classify an error regardless of
/// that wrapping.
#[derive(Error, Debug)]
pub enum Error {
    /// The input violates the structure of the archive format.
    #[error("{0}")]
    MalformedArchive(&'static str),
    /// An entry declares an illegal path.
    #[error("path is invalid [{path}]: {reason}")]
    InvalidPath { path: String, reason: PathError },
    /// The filesystem receiving the entries refused an operation.
    #[error("filesystem operation failed: {0}")]
    SinkFailure(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The underlying reader failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Another error, annotated with the (1-based) line number and text being processed.
    #[error("[line {line}] {source}, line: [{text}]")]
    Line {
        line: usize,
        text: String,
        source: Box<Error>,
    },
}

/// The classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedArchive,
    InvalidPath,
    SinkFailure,
    Io,
}

impl Error {
    /// Returns the kind of the underlying error, looking through any line annotation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedArchive(..) => ErrorKind::MalformedArchive,
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::SinkFailure(..) => ErrorKind::SinkFailure,
            Error::Io(..) => ErrorKind::Io,
            Error::Line { source, .. } => source.kind(),
        }
    }

    /// The line number the error was found on, if it is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Line { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
