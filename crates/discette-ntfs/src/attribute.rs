//! Adapters that hand index attributes to [`SortedIndex`](crate::SortedIndex)
//!
//! A file with a named index exposes up to two attributes under that name:
//! the resident `$INDEX_ROOT` value and, for indexes that outgrew the root,
//! the non-resident `$INDEX_ALLOCATION` stream.

use crate::error::Result;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

/// Directory index of a regular directory
pub const FILE_NAME_INDEX: &str = "$I30";

/// A file whose named index attributes can be opened for reading
pub trait IndexedFile {
    /// Stream type of the allocation attribute
    type Stream: Read + Seek;

    /// Full value of the `$INDEX_ROOT` attribute called `name`
    fn index_root(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Open the `$INDEX_ALLOCATION` attribute called `name`, if present
    fn index_allocation(&self, name: &str) -> Result<Option<Self::Stream>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryIndex {
    root: Vec<u8>,
    allocation: Option<Vec<u8>>,
}

/// In-memory file holding index attributes by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFile {
    indexes: HashMap<String, MemoryIndex>,
}

impl MemoryFile {
    /// Create a file without indexes
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index and return the file
    #[must_use]
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        root: Vec<u8>,
        allocation: Option<Vec<u8>>,
    ) -> Self {
        self.insert_index(name, root, allocation);
        self
    }

    /// Add or replace an index
    pub fn insert_index(
        &mut self,
        name: impl Into<String>,
        root: Vec<u8>,
        allocation: Option<Vec<u8>>,
    ) {
        self.indexes
            .insert(name.into(), MemoryIndex { root, allocation });
    }

    /// Names of all indexes in the file
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }
}

impl IndexedFile for MemoryFile {
    type Stream = Cursor<Vec<u8>>;

    fn index_root(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.indexes.get(name).map(|index| index.root.clone()))
    }

    fn index_allocation(&self, name: &str) -> Result<Option<Self::Stream>> {
        Ok(self
            .indexes
            .get(name)
            .and_then(|index| index.allocation.clone())
            .map(Cursor::new))
    }
}
