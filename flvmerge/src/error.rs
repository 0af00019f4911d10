//! Error types for FLV merging.

use thiserror::Error;

/// Errors produced while merging FLV streams.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Input does not start with the FLV signature.
    #[error("Invalid FLV signature: expected 'FLV', got '{0}'")]
    InvalidSignature(String),

    /// Input ended before a complete file header could be read.
    #[error("Truncated file header: got {got} of {expected} bytes")]
    TruncatedFileHeader {
        /// Bytes actually read.
        got: usize,
        /// Bytes a complete header needs.
        expected: usize,
    },

    /// Input ended in the middle of a tag header.
    #[error("Truncated tag header: got {got} of {expected} bytes")]
    TruncatedTagHeader {
        /// Bytes actually read.
        got: usize,
        /// Bytes a complete header needs.
        expected: usize,
    },

    /// A script payload exceeds the scanner bound. Input this malformed
    /// aborts the whole merge, not just the current file.
    #[error("Script payload of {size} bytes exceeds the {limit}-byte bound")]
    ScriptPayloadTooLarge {
        /// Declared payload size.
        size: u32,
        /// The scanner bound.
        limit: usize,
    },

    /// A payload copy stopped before the declared length was transferred.
    #[error("Payload copy incomplete: {remaining} bytes missing after {copied}")]
    CopyIncomplete {
        /// Bytes that reached the output.
        copied: u64,
        /// Bytes still owed when the input ran out.
        remaining: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Whether this error must abort the whole run instead of only the
    /// input file it occurred in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MergeError::ScriptPayloadTooLarge { .. })
    }
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;
