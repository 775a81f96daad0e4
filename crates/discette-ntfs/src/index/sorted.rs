//! Read-only view over a complete NTFS sorted index

use crate::attribute::IndexedFile;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::geometry::VolumeGeometry;
use crate::index::block::IndexBlock;
use crate::index::entry::Vcn;
use crate::index::iter::{EntryIter, FindIter};
use crate::index::node::IndexNode;
use crate::index::query::{Collation, ExactKey, IndexQuery, KeyRange, NaturalOrder};
use crate::index::root::{IndexRoot, IndexRootHeader};
use binrw::BinRead;
use parking_lot::Mutex;
use std::io::{Read, Seek};
use std::ops::RangeBounds;
use tracing::debug;

/// A sorted index made of a resident root node and an optional stream of
/// `INDX` blocks
///
/// The root is decoded when the index is created. Child blocks are read on
/// demand during each traversal and never cached, so every call starts from
/// the on-disk state. Traversals borrow the index immutably; the allocation
/// stream is locked only for the seek and read of a single block.
pub struct SortedIndex<K, D, S, C = NaturalOrder> {
    root_header: IndexRootHeader,
    root: IndexNode<K, D>,
    allocation: Option<Mutex<S>>,
    geometry: VolumeGeometry,
    collation: C,
    config: IndexConfig,
}

impl<K, D, S, C> SortedIndex<K, D, S, C>
where
    K: for<'a> BinRead<Args<'a> = ()> + Clone,
    D: for<'a> BinRead<Args<'a> = ()> + Clone,
    S: Read + Seek,
    C: Collation<K>,
{
    /// Decode the root attribute value and attach the allocation stream
    pub fn new(
        root_bytes: &[u8],
        allocation: Option<S>,
        geometry: VolumeGeometry,
        collation: C,
    ) -> Result<Self> {
        Self::with_config(
            root_bytes,
            allocation,
            geometry,
            collation,
            IndexConfig::default(),
        )
    }

    /// Like [`SortedIndex::new`], with explicit traversal options
    pub fn with_config(
        root_bytes: &[u8],
        allocation: Option<S>,
        geometry: VolumeGeometry,
        collation: C,
        config: IndexConfig,
    ) -> Result<Self> {
        let IndexRoot { header, node } = IndexRoot::parse(root_bytes)?;
        debug!(
            collation = %header.collation_rule,
            index_buffer_size = header.index_buffer_size,
            root_entries = node.entries.len(),
            has_allocation = allocation.is_some(),
            "opened sorted index"
        );

        Ok(Self {
            root_header: header,
            root: node,
            allocation: allocation.map(Mutex::new),
            geometry,
            collation,
            config,
        })
    }

    /// Open the index called `name` through a file adapter
    pub fn open<F>(file: &F, name: &str, geometry: VolumeGeometry, collation: C) -> Result<Self>
    where
        F: IndexedFile<Stream = S>,
    {
        let root_bytes = file
            .index_root(name)?
            .ok_or_else(|| IndexError::AttributeNotFound(name.to_string()))?;
        let allocation = file.index_allocation(name)?;
        debug!(name, root_size = root_bytes.len(), "resolved index attributes");
        Self::new(&root_bytes, allocation, geometry, collation)
    }

    /// Every `(key, data)` pair in ascending key order
    pub fn entries(&self) -> EntryIter<'_, K, D, S, C> {
        EntryIter::new(self)
    }

    /// Every key in ascending order
    pub fn keys(&self) -> impl Iterator<Item = Result<K>> + '_ {
        self.entries().map(|entry| entry.map(|(key, _)| key))
    }

    /// Every data value in key order
    pub fn values(&self) -> impl Iterator<Item = Result<D>> + '_ {
        self.entries().map(|entry| entry.map(|(_, data)| data))
    }

    /// Number of records, reading every block
    pub fn count(&self) -> Result<usize> {
        self.entries()
            .try_fold(0usize, |count, entry| entry.map(|_| count + 1))
    }

    /// True if the index holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries().next().transpose()?.is_none())
    }

    /// All pairs for which `query` answers `Equal`, in ascending key order
    ///
    /// Pairs with equal keys come out in on-disk order, so a duplicate held
    /// in a child block precedes the one in its parent.
    pub fn find_all<Q: IndexQuery<K>>(&self, query: Q) -> FindIter<'_, K, D, S, C, Q> {
        FindIter::new(self, query)
    }

    /// First pair matching `query`
    pub fn find_first<Q: IndexQuery<K>>(&self, query: Q) -> Result<Option<(K, D)>> {
        self.find_all(query).next().transpose()
    }

    /// All pairs whose keys fall inside `range` under the index collation
    pub fn range<R: RangeBounds<K>>(
        &self,
        range: R,
    ) -> FindIter<'_, K, D, S, C, KeyRange<'_, K, C>> {
        self.find_all(KeyRange::new(&range, &self.collation))
    }

    /// Data of the first record with `key`, `None` if there is none
    pub fn try_get(&self, key: &K) -> Result<Option<D>> {
        Ok(self
            .find_first(ExactKey::new(key, &self.collation))?
            .map(|(_, data)| data))
    }

    /// Data of the first record with `key`
    pub fn get(&self, key: &K) -> Result<D> {
        self.try_get(key)?.ok_or(IndexError::KeyNotFound)
    }

    /// True if some record has `key`
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self
            .find_first(ExactKey::new(key, &self.collation))?
            .is_some())
    }

    /// True if some record has the pair's key; the data is not compared
    pub fn contains(&self, pair: &(K, D)) -> Result<bool> {
        self.contains_key(&pair.0)
    }
}

impl<K, D, S, C> SortedIndex<K, D, S, C>
where
    K: for<'a> BinRead<Args<'a> = ()>,
    D: for<'a> BinRead<Args<'a> = ()>,
    S: Read + Seek,
{
    /// Read the child block at `vcn` for a traversal holding `depth` levels
    pub(crate) fn descend(&self, vcn: Vcn, depth: usize) -> Result<IndexNode<K, D>> {
        if depth >= self.config.max_depth {
            return Err(IndexError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        let allocation = self
            .allocation
            .as_ref()
            .ok_or(IndexError::InconsistentIndex { vcn })?;

        let mut stream = allocation.lock();
        let block = IndexBlock::read(
            &mut *stream,
            vcn,
            &self.geometry,
            self.root_header.index_buffer_size,
            self.config.verify_block_vcn,
        )?;
        Ok(block.node)
    }
}

impl<K, D, S, C> SortedIndex<K, D, S, C> {
    /// Root attribute header
    pub const fn root_header(&self) -> &IndexRootHeader {
        &self.root_header
    }

    /// The resident root node
    pub const fn root(&self) -> &IndexNode<K, D> {
        &self.root
    }

    /// True if the index has an `$INDEX_ALLOCATION` stream
    pub const fn has_allocation(&self) -> bool {
        self.allocation.is_some()
    }

    /// Key order used by point lookups and ranges
    pub const fn collation(&self) -> &C {
        &self.collation
    }

    /// Traversal options
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Volume geometry used to address blocks
    pub const fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// Release the allocation stream
    pub fn into_allocation(self) -> Option<S> {
        self.allocation.map(Mutex::into_inner)
    }
}

impl<K, D, S, C> std::fmt::Debug for SortedIndex<K, D, S, C>
where
    K: std::fmt::Debug,
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedIndex")
            .field("root_header", &self.root_header)
            .field("root", &self.root)
            .field("has_allocation", &self.allocation.is_some())
            .field("geometry", &self.geometry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
