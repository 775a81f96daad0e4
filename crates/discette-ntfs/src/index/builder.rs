//! Index image builder for creating `$INDEX_ROOT` values and allocation streams
//!
//! The builder writes fresh images from a tree description. It never edits
//! an existing index.

use crate::attribute::MemoryFile;
use crate::error::{IndexError, Result};
use crate::geometry::VolumeGeometry;
use crate::index::block::encode_block;
use crate::index::entry::{Vcn, encode_entry};
use crate::index::query::Collation;
use crate::index::root::{CollationRule, IndexRootHeader, encode_root};
use crate::index::sorted::SortedIndex;
use binrw::{BinRead, BinWrite};
use std::io::Cursor;
use tracing::debug;

/// A record in a [`NodeSpec`], optionally owning the subtree of smaller keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec<K, D> {
    /// Record key
    pub key: K,
    /// Record data
    pub data: D,
    /// Subtree holding keys that sort before `key`
    pub child: Option<NodeSpec<K, D>>,
}

/// Description of one node and everything below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec<K, D> {
    /// Records in key order
    pub records: Vec<RecordSpec<K, D>>,
    /// Subtree hanging off the end-of-node sentinel
    pub end_child: Option<Box<NodeSpec<K, D>>>,
}

impl<K, D> Default for NodeSpec<K, D> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            end_child: None,
        }
    }
}

impl<K, D> NodeSpec<K, D> {
    /// Create an empty node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node without children from records in key order
    pub fn leaf(records: impl IntoIterator<Item = (K, D)>) -> Self {
        records
            .into_iter()
            .fold(Self::new(), |node, (key, data)| node.record(key, data))
    }

    /// Append a record without a child
    #[must_use]
    pub fn record(mut self, key: K, data: D) -> Self {
        self.records.push(RecordSpec {
            key,
            data,
            child: None,
        });
        self
    }

    /// Append a record whose child holds the keys before it
    #[must_use]
    pub fn record_with_child(mut self, key: K, data: D, child: Self) -> Self {
        self.records.push(RecordSpec {
            key,
            data,
            child: Some(child),
        });
        self
    }

    /// Attach a child to the end-of-node sentinel
    #[must_use]
    pub fn with_end_child(mut self, child: Self) -> Self {
        self.end_child = Some(Box::new(child));
        self
    }

    /// Build a balanced tree from records in key order
    ///
    /// Every node holds at most `fanout` records. Duplicate keys keep their
    /// input order.
    pub fn bulk_load(records: Vec<(K, D)>, fanout: usize) -> Self {
        let fanout = fanout.max(1);
        let total = records.len();
        if total <= fanout {
            return Self::leaf(records);
        }

        // Separators split the remaining records evenly over their children
        let separators = fanout.min((total - 1) / 2).max(1);
        let slots = separators + 1;
        let below = total - separators;
        let (base, extra) = (below / slots, below % slots);

        let mut records = records.into_iter();
        let child = |slot: usize, records: &mut std::vec::IntoIter<(K, D)>| {
            let size = base + usize::from(slot < extra);
            (size > 0).then(|| Self::bulk_load(records.by_ref().take(size).collect(), fanout))
        };

        let mut node = Self::new();
        for slot in 0..separators {
            let subtree = child(slot, &mut records);
            if let Some((key, data)) = records.next() {
                node.records.push(RecordSpec {
                    key,
                    data,
                    child: subtree,
                });
            }
        }
        node.end_child = child(separators, &mut records).map(Box::new);
        node
    }

    /// Number of records in this subtree
    pub fn len(&self) -> usize {
        self.records
            .iter()
            .map(|record| 1 + record.child.as_ref().map_or(0, Self::len))
            .sum::<usize>()
            + self.end_child.as_ref().map_or(0, |child| child.len())
    }

    /// Check if the subtree holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels in this subtree
    pub fn depth(&self) -> usize {
        let deepest = self
            .records
            .iter()
            .filter_map(|record| record.child.as_ref())
            .chain(self.end_child.as_deref())
            .map(Self::depth)
            .max()
            .unwrap_or(0);
        1 + deepest
    }
}

/// Builder for complete index images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexImageBuilder {
    geometry: VolumeGeometry,
    index_buffer_size: u32,
    indexed_attribute_type: u32,
    collation_rule: CollationRule,
}

impl Default for IndexImageBuilder {
    fn default() -> Self {
        Self {
            geometry: VolumeGeometry::default(),
            index_buffer_size: 4096,
            indexed_attribute_type: 0,
            collation_rule: CollationRule::Ulong,
        }
    }
}

impl IndexImageBuilder {
    /// Create a builder for a view index with 4 KiB blocks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the volume geometry
    #[must_use]
    pub const fn with_geometry(mut self, geometry: VolumeGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set the size of each `INDX` block
    #[must_use]
    pub const fn with_index_buffer_size(mut self, size: u32) -> Self {
        self.index_buffer_size = size;
        self
    }

    /// Set the attribute type recorded in the root header
    #[must_use]
    pub const fn with_indexed_attribute_type(mut self, attribute_type: u32) -> Self {
        self.indexed_attribute_type = attribute_type;
        self
    }

    /// Set the collation rule recorded in the root header
    #[must_use]
    pub const fn with_collation_rule(mut self, rule: CollationRule) -> Self {
        self.collation_rule = rule;
        self
    }

    /// Serialize a tree into root bytes and an allocation stream
    ///
    /// Child blocks are written before their parents, at consecutive VCNs.
    pub fn build<K, D>(&self, tree: &NodeSpec<K, D>) -> Result<IndexImage>
    where
        K: for<'a> BinWrite<Args<'a> = ()>,
        D: for<'a> BinWrite<Args<'a> = ()>,
    {
        let mut writer = ImageWriter {
            builder: self,
            allocation: Vec::new(),
            next_vcn: 0,
        };
        let (entries, has_children) = writer.encode_node(tree)?;

        let vcns_per_block = self.geometry.vcns_per_block(self.index_buffer_size);
        let header = IndexRootHeader {
            indexed_attribute_type: self.indexed_attribute_type,
            collation_rule: self.collation_rule,
            index_buffer_size: self.index_buffer_size,
            clusters_per_index_buffer: u8::try_from(vcns_per_block).unwrap_or(u8::MAX),
            reserved: [0; 3],
        };
        let root = encode_root(&header, &entries, has_children)?;

        debug!(
            blocks = writer.next_vcn / vcns_per_block,
            root_size = root.len(),
            allocation_size = writer.allocation.len(),
            "built index image"
        );

        Ok(IndexImage {
            root,
            allocation: (!writer.allocation.is_empty()).then_some(writer.allocation),
            geometry: self.geometry,
        })
    }
}

struct ImageWriter<'a> {
    builder: &'a IndexImageBuilder,
    allocation: Vec<u8>,
    next_vcn: Vcn,
}

impl ImageWriter<'_> {
    /// Encode a node's entry list, writing its children first
    fn encode_node<K, D>(&mut self, node: &NodeSpec<K, D>) -> Result<(Vec<u8>, bool)>
    where
        K: for<'a> BinWrite<Args<'a> = ()>,
        D: for<'a> BinWrite<Args<'a> = ()>,
    {
        let mut entries = Vec::new();
        let mut has_children = false;

        for record in &node.records {
            let child = match &record.child {
                Some(child) => Some(self.write_block(child)?),
                None => None,
            };
            has_children |= child.is_some();
            entries.extend(encode_entry(Some((&record.key, &record.data)), child)?);
        }

        let end_child = match &node.end_child {
            Some(child) => Some(self.write_block(child)?),
            None => None,
        };
        has_children |= end_child.is_some();
        entries.extend(encode_entry::<K, D>(None, end_child)?);

        Ok((entries, has_children))
    }

    /// Write a subtree's top node as an `INDX` block and return its VCN
    fn write_block<K, D>(&mut self, node: &NodeSpec<K, D>) -> Result<Vcn>
    where
        K: for<'a> BinWrite<Args<'a> = ()>,
        D: for<'a> BinWrite<Args<'a> = ()>,
    {
        let (entries, has_children) = self.encode_node(node)?;

        let geometry = &self.builder.geometry;
        let buffer_size = self.builder.index_buffer_size;
        let vcn = self.next_vcn;
        self.next_vcn += geometry.vcns_per_block(buffer_size);

        let block = encode_block(
            vcn,
            &entries,
            has_children,
            buffer_size as usize,
            usize::from(geometry.bytes_per_sector),
        )?;

        let offset = geometry
            .vcn_offset(vcn, buffer_size)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(|| {
                IndexError::MalformedIndex(format!("VCN {vcn} is not addressable in memory"))
            })?;
        let end = offset + block.len();
        if self.allocation.len() < end {
            self.allocation.resize(end, 0);
        }
        self.allocation[offset..end].copy_from_slice(&block);
        Ok(vcn)
    }
}

/// A serialized index: root attribute value plus optional allocation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexImage {
    /// `$INDEX_ROOT` value
    pub root: Vec<u8>,
    /// `$INDEX_ALLOCATION` contents, `None` when everything fits in the root
    pub allocation: Option<Vec<u8>>,
    /// Geometry the blocks were laid out for
    pub geometry: VolumeGeometry,
}

impl IndexImage {
    /// A fresh reader over the allocation stream
    pub fn allocation_stream(&self) -> Option<Cursor<Vec<u8>>> {
        self.allocation.clone().map(Cursor::new)
    }

    /// Open the image as a sorted index
    pub fn open<K, D, C>(&self, collation: C) -> Result<SortedIndex<K, D, Cursor<Vec<u8>>, C>>
    where
        K: for<'a> BinRead<Args<'a> = ()> + Clone,
        D: for<'a> BinRead<Args<'a> = ()> + Clone,
        C: Collation<K>,
    {
        SortedIndex::new(
            &self.root,
            self.allocation_stream(),
            self.geometry,
            collation,
        )
    }

    /// Store the image in an in-memory file under `name`
    pub fn into_file(self, name: impl Into<String>) -> MemoryFile {
        MemoryFile::new().with_index(name, self.root, self.allocation)
    }
}
