//! Configuration for index traversal

use serde::{Deserialize, Serialize};

/// Traversal options for a sorted index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of levels a traversal may hold, root included
    pub max_depth: usize,

    /// Reject blocks whose header VCN differs from the requested VCN
    pub verify_block_vcn: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            verify_block_vcn: true,
        }
    }
}

impl IndexConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum traversal depth
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable or disable the block VCN check
    #[must_use]
    pub const fn with_block_vcn_check(mut self, enable: bool) -> Self {
        self.verify_block_vcn = enable;
        self
    }
}
