//! Error types shared by every snpkit crate.
//!
//! Row-level problems (`MalformedRecord`) are collected into reports by the
//! readers and never abort a stream. Everything else is structural and aborts
//! the enclosing call.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which axis of the genotype matrix an index refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Sample,
    Variant,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Sample => f.write_str("sample"),
            Axis::Variant => f.write_str("variant"),
        }
    }
}

/// Main error type for snpkit operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (file missing, permission denied, read failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reader recognized the content of the file
    #[error("could not detect the format of {}: {reason}", path.display())]
    FormatDetection { path: PathBuf, reason: String },

    /// A single row could not be parsed (recoverable, reported per file)
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// The genotype encoding of a file is not understood (fatal for that file)
    #[error("unsupported genotype encoding in {} at line {line}: token '{token}'", path.display())]
    UnsupportedEncoding {
        path: PathBuf,
        line: usize,
        token: String,
    },

    /// Caller passed a sample/variant index outside the matrix
    #[error("{axis} index {index} out of range (len {len})")]
    IndexOutOfRange { axis: Axis, index: usize, len: usize },

    /// A format needs a sibling file that is not there (PED without MAP)
    #[error("{} requires a companion file at {}", path.display(), expected.display())]
    MissingCompanion { path: PathBuf, expected: PathBuf },

    /// The companion file exists but cannot describe the main file's layout
    #[error("{} line {line}: {message}", path.display())]
    MalformedCompanion {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Invalid parameter passed to an engine call
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Configuration file could not be decoded
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Type alias for Results using snpkit's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn detection(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FormatDetection {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Line number carried by a malformed-record error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedRecord { line, .. } | Self::UnsupportedEncoding { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

/// Bounds check used by every index-taking engine call.
pub fn check_index(axis: Axis, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { axis, index, len })
    }
}
