//! Error types for NTFS index parsing, traversal and building

use thiserror::Error;

/// Errors that can occur while reading or building an NTFS sorted index
#[derive(Debug, Error)]
pub enum IndexError {
    /// Node bytes do not form a valid entry list (missing end marker,
    /// overrunning entry, bad block signature, fixup mismatch, ...)
    #[error("malformed index: {0}")]
    MalformedIndex(String),

    /// The allocation stream could not supply an index block
    #[error("failed to read index block at VCN {vcn}: {source}")]
    BlockRead {
        /// Block address that was requested
        vcn: u64,
        /// Underlying stream error
        source: std::io::Error,
    },

    /// An entry points at a child block but the index has no allocation stream
    #[error("entry references child block VCN {vcn} but the index has no allocation stream")]
    InconsistentIndex {
        /// Child block address carried by the entry
        vcn: u64,
    },

    /// No entry compares equal to the requested key
    #[error("key not found in index")]
    KeyNotFound,

    /// Descent went deeper than the configured level limit
    #[error("index descent exceeded {limit} levels")]
    DepthExceeded {
        /// Configured maximum depth
        limit: usize,
    },

    /// The file exposes no index root with the requested name
    #[error("index attribute not found: {0}")]
    AttributeNotFound(String),

    /// A node is too large for the space available to it
    #[error("node needs {required} bytes but only {capacity} are available")]
    NodeOverflow {
        /// Bytes needed to store the node
        required: usize,
        /// Bytes available
        capacity: usize,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for index operation results
pub type Result<T> = std::result::Result<T, IndexError>;
