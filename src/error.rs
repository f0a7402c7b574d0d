//! Error types for indexing archives and resolving paths.

use thiserror::Error;

use crate::header::HeaderError;

/// Errors that can occur while indexing an archive or resolving a path inside of it.
///
/// Every error is final: nothing is retried and no partial result is produced.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying archive reader or output writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header field could not be decoded.
    #[error("malformed header: {0}")]
    Header(#[from] HeaderError),

    /// The first block of the archive isn't a ustar header.
    #[error("not a compatible archive (no ustar header at offset 0)")]
    NotCompatible,

    /// The archive contains an entry kind that can't be indexed.
    #[error("unsupported entry {path:?}: {typeflag}")]
    UnsupportedEntryType {
        path: String,
        typeflag: crate::header::EntryType,
    },

    /// A path component doesn't exist in the archive.
    #[error("{0:?}: no such file or directory")]
    NotFound(String),

    /// A path tries to descend through something that isn't a directory.
    #[error("{0:?}: not a directory")]
    NotADirectory(String),

    /// The requested path names a directory, where a file was expected.
    #[error("{0:?}: is a directory")]
    IsADirectory(String),

    /// A symlink was reached again while it was still being expanded.
    #[error("{0:?}: symbolic link loop")]
    SymlinkLoop(String),

    /// Resolving the path needed more symlink expansions than allowed.
    #[error("{path:?}: too many levels of symbolic links (limit {limit})")]
    TooManyLinks { path: String, limit: usize },

    /// A `..` component was applied at the archive root.
    #[error("{0:?}: path escapes the archive root")]
    EscapesRoot(String),

    /// The archive ends before the content of a file does.
    #[error("{path:?}: archive truncated, {size} bytes at offset {offset} but only {available} available")]
    Truncated {
        path: String,
        offset: u64,
        size: u64,
        available: u64,
    },

    /// A configuration value couldn't be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidLimit { name: &'static str, value: String },
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
