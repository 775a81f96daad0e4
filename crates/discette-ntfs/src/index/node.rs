//! Index nodes: one level's ordered entry list behind a node header

use crate::error::{IndexError, Result};
use crate::index::entry::{IndexEntry, decode_le};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Size of the node header
pub const NODE_HEADER_SIZE: usize = 0x10;

/// Node header shared by `$INDEX_ROOT` and `INDX` blocks
///
/// Offsets are relative to the start of this header.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct IndexNodeHeader {
    /// Offset of the first entry
    pub entries_offset: u32,
    /// End of the used area
    pub index_length: u32,
    /// End of the allocated area
    pub allocated_size: u32,
    /// Node flags
    pub flags: u8,
    /// Reserved
    pub reserved: [u8; 3],
}

impl IndexNodeHeader {
    /// Some entries in this node own child blocks
    pub const LARGE_INDEX: u8 = 0x01;

    /// Header for a node whose entries start right after the header
    pub fn new(entries_length: usize, allocated_size: usize, has_children: bool) -> Result<Self> {
        let index_length = NODE_HEADER_SIZE + entries_length;
        Self::with_entries_at(NODE_HEADER_SIZE, index_length, allocated_size, has_children)
    }

    /// Header for a node whose entries start at `entries_offset`
    pub fn with_entries_at(
        entries_offset: usize,
        index_length: usize,
        allocated_size: usize,
        has_children: bool,
    ) -> Result<Self> {
        let to_u32 = |value: usize| {
            u32::try_from(value).map_err(|_| IndexError::NodeOverflow {
                required: value,
                capacity: u32::MAX as usize,
            })
        };
        Ok(Self {
            entries_offset: to_u32(entries_offset)?,
            index_length: to_u32(index_length)?,
            allocated_size: to_u32(allocated_size)?,
            flags: if has_children { Self::LARGE_INDEX } else { 0 },
            reserved: [0; 3],
        })
    }

    /// Check if the node has child blocks
    pub const fn has_children(&self) -> bool {
        (self.flags & Self::LARGE_INDEX) != 0
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> Result<[u8; NODE_HEADER_SIZE]> {
        let mut buffer = [0u8; NODE_HEADER_SIZE];
        self.write_le(&mut Cursor::new(&mut buffer[..]))?;
        Ok(buffer)
    }
}

/// A decoded index node
///
/// The last entry is always the end-of-node sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode<K, D> {
    /// Node header
    pub header: IndexNodeHeader,
    /// Entries in on-disk order, sentinel last
    pub entries: Vec<IndexEntry<K, D>>,
}

impl<K, D> IndexNode<K, D> {
    /// All entries including the sentinel
    pub fn entries(&self) -> &[IndexEntry<K, D>] {
        &self.entries
    }

    /// Regular records, without the sentinel
    pub fn records(&self) -> impl Iterator<Item = (&K, &D)> {
        self.entries.iter().filter_map(IndexEntry::record)
    }

    /// The end-of-node sentinel
    pub fn end_entry(&self) -> Option<&IndexEntry<K, D>> {
        self.entries.last().filter(|entry| entry.is_end())
    }

    /// Check if any entry owns a child block
    pub fn has_children(&self) -> bool {
        self.entries.iter().any(|entry| entry.child.is_some())
    }
}

impl<K, D> IndexNode<K, D>
where
    K: for<'a> BinRead<Args<'a> = ()>,
    D: for<'a> BinRead<Args<'a> = ()>,
{
    /// Decode the node whose header starts at `header_offset` in `buffer`
    pub fn parse(buffer: &[u8], header_offset: usize) -> Result<Self> {
        let header_end = header_offset
            .checked_add(NODE_HEADER_SIZE)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| {
                IndexError::MalformedIndex(format!(
                    "node header at {header_offset} overruns buffer of {} bytes",
                    buffer.len()
                ))
            })?;
        let header: IndexNodeHeader = decode_le(&buffer[header_offset..header_end], "node header")?;

        let start = header_offset + header.entries_offset as usize;
        let end = header_offset + header.index_length as usize;
        if start > end || end > buffer.len() {
            return Err(IndexError::MalformedIndex(format!(
                "entry area {start}..{end} does not fit buffer of {} bytes",
                buffer.len()
            )));
        }

        let entries = Self::parse_entries(&buffer[start..end])?;
        Ok(Self { header, entries })
    }

    /// Decode entries up to and including the end-of-node sentinel
    pub fn parse_entries(bytes: &[u8]) -> Result<Vec<IndexEntry<K, D>>> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let (entry, length) = IndexEntry::parse(&bytes[pos..])?;
            pos += length;

            let is_end = entry.is_end();
            entries.push(entry);
            if is_end {
                return Ok(entries);
            }
        }

        Err(IndexError::MalformedIndex(format!(
            "node ended after {} entries without an end marker",
            entries.len()
        )))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::entry::IndexEntry;

    type Node = IndexNode<u32, u32>;

    fn encode(entries: &[IndexEntry<u32, u32>]) -> Vec<u8> {
        let mut body = Vec::new();
        for entry in entries {
            body.extend(entry.to_bytes().expect("Operation should succeed"));
        }
        let has_children = entries.iter().any(|e| e.child.is_some());
        let header = IndexNodeHeader::new(body.len(), NODE_HEADER_SIZE + body.len(), has_children)
            .expect("Operation should succeed");

        let mut buffer = header.to_bytes().expect("Operation should succeed").to_vec();
        buffer.extend(body);
        buffer
    }

    #[test]
    fn test_parse_node() {
        let bytes = encode(&[
            IndexEntry::new(1, 10),
            IndexEntry::with_child(5, 50, 2),
            IndexEntry::end(Some(4)),
        ]);

        let node = Node::parse(&bytes, 0).expect("Operation should succeed");
        assert_eq!(node.entries().len(), 3);
        assert!(node.header.has_children());
        assert!(node.has_children());
        assert_eq!(node.records().collect::<Vec<_>>(), vec![(&1, &10), (&5, &50)]);
        assert_eq!(node.end_entry().and_then(IndexEntry::child_vcn), Some(4));
    }

    #[test]
    fn test_parse_at_offset() {
        let mut bytes = vec![0xAA; 0x10];
        bytes.extend(encode(&[IndexEntry::new(3, 30), IndexEntry::end(None)]));

        let node = Node::parse(&bytes, 0x10).expect("Operation should succeed");
        assert_eq!(node.records().count(), 1);
        assert!(!node.has_children());
    }

    #[test]
    fn test_sentinel_only_node() {
        let bytes = encode(&[IndexEntry::end(None)]);
        let node = Node::parse(&bytes, 0).expect("Operation should succeed");
        assert_eq!(node.records().count(), 0);
        assert!(node.end_entry().is_some());
    }

    #[test]
    fn test_stops_at_end_marker() {
        let mut bytes = encode(&[IndexEntry::new(1, 1), IndexEntry::end(None)]);
        // Garbage after the sentinel but inside the declared area
        let garbage = vec![0xFF; 24];
        let length = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) + 24;
        bytes[4..8].copy_from_slice(&length.to_le_bytes());
        bytes.extend(garbage);

        let node = Node::parse(&bytes, 0).expect("Operation should succeed");
        assert_eq!(node.entries().len(), 2);
    }

    #[test]
    fn test_missing_end_marker_is_malformed() {
        let bytes = encode(&[IndexEntry::new(1, 1), IndexEntry::new(2, 2)]);
        let result = Node::parse(&bytes, 0);
        assert!(matches!(result, Err(IndexError::MalformedIndex(_))));
    }

    #[test]
    fn test_empty_area_is_malformed() {
        let header = IndexNodeHeader::new(0, NODE_HEADER_SIZE, false).expect("Operation should succeed");
        let bytes = header.to_bytes().expect("Operation should succeed");
        let result = Node::parse(&bytes, 0);
        assert!(matches!(result, Err(IndexError::MalformedIndex(_))));
    }

    #[test]
    fn test_area_overrun_is_malformed() {
        let mut bytes = encode(&[IndexEntry::new(1, 1), IndexEntry::end(None)]);
        bytes[4..8].copy_from_slice(&4096u32.to_le_bytes());
        let result = Node::parse(&bytes, 0);
        assert!(matches!(result, Err(IndexError::MalformedIndex(_))));
    }

    #[test]
    fn test_header_overrun_is_malformed() {
        let result = Node::parse(&[0u8; 12], 0);
        assert!(matches!(result, Err(IndexError::MalformedIndex(_))));
    }
}
