//! `$INDEX_ROOT` attribute value: root header followed by the root node

use crate::error::{IndexError, Result};
use crate::index::entry::decode_le;
use crate::index::node::{IndexNode, IndexNodeHeader, NODE_HEADER_SIZE};
use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::Cursor;

/// Size of the root header that precedes the root node header
pub const ROOT_HEADER_SIZE: usize = 0x10;

/// Collation rule recorded in the root header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollationRule {
    /// Raw byte comparison
    Binary,
    /// Case-insensitive file name comparison (`$I30`)
    FileName,
    /// Unicode string comparison
    UnicodeString,
    /// Single 32-bit unsigned integer (`$SII`, `$Q`)
    Ulong,
    /// Security identifier (`$O` in `$Quota`)
    Sid,
    /// Security hash, then security id (`$SDH`)
    SecurityHash,
    /// Sequence of 32-bit unsigned integers (`$O` in `$ObjId`, `$R`)
    Ulongs,
    /// Value not known to this crate
    Unknown(u32),
}

impl CollationRule {
    /// On-disk value of `Binary`
    pub const BINARY: u32 = 0x00;
    /// On-disk value of `FileName`
    pub const FILE_NAME: u32 = 0x01;
    /// On-disk value of `UnicodeString`
    pub const UNICODE_STRING: u32 = 0x02;
    /// On-disk value of `Ulong`
    pub const ULONG: u32 = 0x10;
    /// On-disk value of `Sid`
    pub const SID: u32 = 0x11;
    /// On-disk value of `SecurityHash`
    pub const SECURITY_HASH: u32 = 0x12;
    /// On-disk value of `Ulongs`
    pub const ULONGS: u32 = 0x13;
}

impl From<u32> for CollationRule {
    fn from(value: u32) -> Self {
        match value {
            Self::BINARY => Self::Binary,
            Self::FILE_NAME => Self::FileName,
            Self::UNICODE_STRING => Self::UnicodeString,
            Self::ULONG => Self::Ulong,
            Self::SID => Self::Sid,
            Self::SECURITY_HASH => Self::SecurityHash,
            Self::ULONGS => Self::Ulongs,
            other => Self::Unknown(other),
        }
    }
}

impl From<CollationRule> for u32 {
    fn from(rule: CollationRule) -> Self {
        match rule {
            CollationRule::Binary => CollationRule::BINARY,
            CollationRule::FileName => CollationRule::FILE_NAME,
            CollationRule::UnicodeString => CollationRule::UNICODE_STRING,
            CollationRule::Ulong => CollationRule::ULONG,
            CollationRule::Sid => CollationRule::SID,
            CollationRule::SecurityHash => CollationRule::SECURITY_HASH,
            CollationRule::Ulongs => CollationRule::ULONGS,
            CollationRule::Unknown(value) => value,
        }
    }
}

impl fmt::Display for CollationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "BINARY"),
            Self::FileName => write!(f, "FILE_NAME"),
            Self::UnicodeString => write!(f, "UNICODE_STRING"),
            Self::Ulong => write!(f, "ULONG"),
            Self::Sid => write!(f, "SID"),
            Self::SecurityHash => write!(f, "SECURITY_HASH"),
            Self::Ulongs => write!(f, "ULONGS"),
            Self::Unknown(value) => write!(f, "UNKNOWN(0x{value:02X})"),
        }
    }
}

/// Header at the start of the `$INDEX_ROOT` value
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct IndexRootHeader {
    /// Attribute type being indexed (0x30 for file names, 0 for view indexes)
    pub indexed_attribute_type: u32,
    /// Ordering of the keys
    #[br(map = |raw: u32| CollationRule::from(raw))]
    #[bw(map = |rule: &CollationRule| u32::from(*rule))]
    pub collation_rule: CollationRule,
    /// Size of one `INDX` block in bytes
    pub index_buffer_size: u32,
    /// Clusters per `INDX` block
    pub clusters_per_index_buffer: u8,
    /// Reserved
    pub reserved: [u8; 3],
}

impl IndexRootHeader {
    /// Serialize the header
    pub fn to_bytes(&self) -> Result<[u8; ROOT_HEADER_SIZE]> {
        let mut buffer = [0u8; ROOT_HEADER_SIZE];
        self.write_le(&mut Cursor::new(&mut buffer[..]))?;
        Ok(buffer)
    }
}

/// Decoded `$INDEX_ROOT` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRoot<K, D> {
    /// Root header
    pub header: IndexRootHeader,
    /// Root node, always resident
    pub node: IndexNode<K, D>,
}

impl<K, D> IndexRoot<K, D>
where
    K: for<'a> BinRead<Args<'a> = ()>,
    D: for<'a> BinRead<Args<'a> = ()>,
{
    /// Decode the full attribute value
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header_bytes = bytes.get(..ROOT_HEADER_SIZE).ok_or_else(|| {
            IndexError::MalformedIndex(format!(
                "index root of {} bytes is shorter than its {ROOT_HEADER_SIZE}-byte header",
                bytes.len()
            ))
        })?;
        let header: IndexRootHeader = decode_le(header_bytes, "index root header")?;
        let node = IndexNode::parse(bytes, ROOT_HEADER_SIZE)?;
        Ok(Self { header, node })
    }
}

/// Serialize a root value from a header and pre-encoded entries
pub(crate) fn encode_root(
    header: &IndexRootHeader,
    entries: &[u8],
    has_children: bool,
) -> Result<Vec<u8>> {
    let node_header = IndexNodeHeader::new(
        entries.len(),
        NODE_HEADER_SIZE + entries.len(),
        has_children,
    )?;

    let mut buffer = Vec::with_capacity(ROOT_HEADER_SIZE + NODE_HEADER_SIZE + entries.len());
    buffer.extend_from_slice(&header.to_bytes()?);
    buffer.extend_from_slice(&node_header.to_bytes()?);
    buffer.extend_from_slice(entries);
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::entry::IndexEntry;

    fn sample_header() -> IndexRootHeader {
        IndexRootHeader {
            indexed_attribute_type: 0,
            collation_rule: CollationRule::Ulong,
            index_buffer_size: 4096,
            clusters_per_index_buffer: 1,
            reserved: [0; 3],
        }
    }

    #[test]
    fn test_collation_rule_values() {
        assert_eq!(CollationRule::from(0x12), CollationRule::SecurityHash);
        assert_eq!(u32::from(CollationRule::Ulongs), 0x13);
        assert_eq!(CollationRule::from(0x99), CollationRule::Unknown(0x99));
        assert_eq!(u32::from(CollationRule::Unknown(0x99)), 0x99);
        assert_eq!(CollationRule::Sid.to_string(), "SID");
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_header().to_bytes().expect("Operation should succeed");
        assert_eq!(&bytes[4..8], &0x10u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &4096u32.to_le_bytes());
        assert_eq!(bytes[12], 1);
    }

    #[test]
    fn test_parse_root() {
        let mut entries = IndexEntry::<u32, u32>::new(9, 90)
            .to_bytes()
            .expect("Operation should succeed");
        entries.extend(
            IndexEntry::<u32, u32>::end(None)
                .to_bytes()
                .expect("Operation should succeed"),
        );
        let bytes = encode_root(&sample_header(), &entries, false).expect("Operation should succeed");

        let root = IndexRoot::<u32, u32>::parse(&bytes).expect("Operation should succeed");
        assert_eq!(root.header, sample_header());
        assert_eq!(root.node.records().collect::<Vec<_>>(), vec![(&9, &90)]);
    }

    #[test]
    fn test_short_root_is_malformed() {
        let result = IndexRoot::<u32, u32>::parse(&[0u8; 8]);
        assert!(matches!(result, Err(IndexError::MalformedIndex(_))));
    }
}
