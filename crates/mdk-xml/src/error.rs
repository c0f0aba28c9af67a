//! Error types for XML document handling

use std::path::PathBuf;

/// Errors raised while loading, parsing or saving a document
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Input is not well-formed XML
    #[error("malformed xml at byte {position}: {message}")]
    Malformed {
        /// Byte offset of the failure
        position: u64,
        /// Parser message
        message: String,
    },

    /// Document has no root element
    #[error("document has no root element")]
    MissingRoot,

    /// More than one top-level element
    #[error("document has more than one root element")]
    MultipleRoots,

    /// Closing tag without a matching opening tag
    #[error("unexpected closing tag: '{0}'")]
    UnexpectedEnd(String),

    /// IO error while reading or writing a file
    #[error("io error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
}

impl XmlError {
    /// Create malformed-input error at position
    pub fn malformed(position: u64, message: impl ToString) -> Self {
        Self::Malformed {
            position,
            message: message.to_string(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the underlying cause is a missing file
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type alias for XML operations
pub type XmlResult<T> = Result<T, XmlError>;
