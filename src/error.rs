//! Error types for the Gindex library.
//!
//! All errors are represented by the [`GindexError`] enum, which provides
//! detailed information about what went wrong.
//!
//! # Examples
//!
//! ```
//! use gindex::error::{GindexError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(GindexError::index("segment is sealed"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Gindex operations.
///
/// This enum represents all possible errors that can occur in the library.
/// It uses the `thiserror` crate for automatic `Error` trait implementation
/// and provides convenient constructor methods for creating specific error
/// types.
#[derive(Error, Debug)]
pub enum GindexError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Analysis-related errors (tokenization, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// The stored index format version is not supported by this build
    #[error("Unsupported index format version: {0}")]
    FormatVersionMismatch(u8),

    /// A segment's on-disk data failed structural validation. Lookups that
    /// touch this segment fail; the rest of the store stays readable.
    #[error("Corrupt segment {segment_id}: {message}")]
    CorruptSegment { segment_id: u32, message: String },

    /// A postings list header byte matched no known encoding
    #[error("Unknown postings encoding header: {0:#04x}")]
    EncodingMismatch(u8),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with GindexError.
pub type Result<T> = std::result::Result<T, GindexError>;

impl GindexError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        GindexError::Index(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        GindexError::Analysis(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        GindexError::Storage(msg.into())
    }

    /// Create a new corrupt-segment error scoped to `segment_id`.
    pub fn corrupt_segment<S: Into<String>>(segment_id: u32, msg: S) -> Self {
        GindexError::CorruptSegment {
            segment_id,
            message: msg.into(),
        }
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GindexError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = GindexError::index("Test index error");
        assert_eq!(error.to_string(), "Index error: Test index error");

        let error = GindexError::storage("Test storage error");
        assert_eq!(error.to_string(), "Storage error: Test storage error");

        let error = GindexError::corrupt_segment(7, "truncated dictionary blob");
        assert_eq!(
            error.to_string(),
            "Corrupt segment 7: truncated dictionary blob"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let gindex_error = GindexError::from(io_error);

        match gindex_error {
            GindexError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_version_and_encoding_errors() {
        let error = GindexError::FormatVersionMismatch(9);
        assert_eq!(error.to_string(), "Unsupported index format version: 9");

        let error = GindexError::EncodingMismatch(0xFF);
        assert_eq!(
            error.to_string(),
            "Unknown postings encoding header: 0xff"
        );
    }
}
