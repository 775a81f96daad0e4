//! Index entries (keyed records)
//!
//! Entries use the view-index layout shared by `$SII`, `$SDH`, `$O`, `$Q`
//! and `$R`:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 2 | data offset (from entry start) |
//! | 0x02 | 2 | data length |
//! | 0x04 | 4 | reserved |
//! | 0x08 | 2 | entry length |
//! | 0x0A | 2 | key length |
//! | 0x0C | 2 | flags |
//! | 0x0E | 2 | padding |
//! | 0x10 | key length | key |
//! | data offset | data length | data |
//! | entry length - 8 | 8 | child VCN (with `HAS_CHILD` only) |

use crate::error::{IndexError, Result};
use crate::index::flags::IndexEntryFlags;
use binrw::{BinRead, BinWrite, Endian};
use std::io::Cursor;

/// Virtual cluster number addressing a block in the allocation stream
pub type Vcn = u64;

/// Size of the fixed entry header
pub const ENTRY_HEADER_SIZE: usize = 0x10;

/// Size of the trailing child VCN
pub const CHILD_VCN_SIZE: usize = 8;

/// Fixed 16-byte header at the start of every entry
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct IndexEntryHeader {
    /// Offset of the data from the entry start
    pub data_offset: u16,
    /// Length of the data
    pub data_length: u16,
    /// Reserved, zero on disk
    pub reserved: u32,
    /// Total entry length including the child VCN
    pub length: u16,
    /// Length of the key that follows the header
    pub key_length: u16,
    /// Entry flags
    pub flags: IndexEntryFlags,
    /// Alignment padding
    pub padding: u16,
}

/// A decoded index entry
///
/// `record` is `None` only for the end-of-node sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<K, D> {
    /// Entry flags as stored on disk
    pub flags: IndexEntryFlags,
    /// Key and data of a regular record
    pub record: Option<(K, D)>,
    /// Child block, present iff `HAS_CHILD` is set
    pub child: Option<Vcn>,
}

impl<K, D> IndexEntry<K, D> {
    /// Create a record without a child block
    pub fn new(key: K, data: D) -> Self {
        Self {
            flags: IndexEntryFlags::new(IndexEntryFlags::NONE),
            record: Some((key, data)),
            child: None,
        }
    }

    /// Create a record that owns the child block at `vcn`
    pub fn with_child(key: K, data: D, vcn: Vcn) -> Self {
        Self {
            flags: IndexEntryFlags::new(IndexEntryFlags::HAS_CHILD),
            record: Some((key, data)),
            child: Some(vcn),
        }
    }

    /// Create the end-of-node sentinel, optionally pointing at the rightmost child
    pub fn end(child: Option<Vcn>) -> Self {
        let mut flags = IndexEntryFlags::new(IndexEntryFlags::IS_END);
        if child.is_some() {
            flags.set(IndexEntryFlags::HAS_CHILD);
        }
        Self {
            flags,
            record: None,
            child,
        }
    }

    /// Check if this entry terminates its node
    pub const fn is_end(&self) -> bool {
        self.flags.is_end()
    }

    /// Child block address, if any
    pub const fn child_vcn(&self) -> Option<Vcn> {
        self.child
    }

    /// Key of a regular record
    pub fn key(&self) -> Option<&K> {
        self.record.as_ref().map(|(key, _)| key)
    }

    /// Data of a regular record
    pub fn data(&self) -> Option<&D> {
        self.record.as_ref().map(|(_, data)| data)
    }

    /// Key and data of a regular record
    pub fn record(&self) -> Option<(&K, &D)> {
        self.record.as_ref().map(|(key, data)| (key, data))
    }
}

impl<K, D> IndexEntry<K, D>
where
    K: for<'a> BinRead<Args<'a> = ()>,
    D: for<'a> BinRead<Args<'a> = ()>,
{
    /// Decode the entry at the start of `buffer`
    ///
    /// Returns the entry together with its on-disk length.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize)> {
        let header_bytes = buffer.get(..ENTRY_HEADER_SIZE).ok_or_else(|| {
            IndexError::MalformedIndex(format!(
                "{} bytes left in node, entry header needs {ENTRY_HEADER_SIZE}",
                buffer.len()
            ))
        })?;
        let header: IndexEntryHeader = decode_le(header_bytes, "entry header")?;

        let length = usize::from(header.length);
        if length < ENTRY_HEADER_SIZE {
            return Err(IndexError::MalformedIndex(format!(
                "entry length {length} is smaller than the entry header"
            )));
        }
        let entry = buffer.get(..length).ok_or_else(|| {
            IndexError::MalformedIndex(format!(
                "entry length {length} overruns the {} bytes left in node",
                buffer.len()
            ))
        })?;

        let child = if header.flags.has_child() {
            if length < ENTRY_HEADER_SIZE + CHILD_VCN_SIZE {
                return Err(IndexError::MalformedIndex(format!(
                    "entry length {length} leaves no room for a child VCN"
                )));
            }
            Some(decode_le::<u64>(&entry[length - CHILD_VCN_SIZE..], "child VCN")?)
        } else {
            None
        };

        let record = if header.flags.is_end() {
            None
        } else {
            let key_end = ENTRY_HEADER_SIZE + usize::from(header.key_length);
            let key_bytes = entry.get(ENTRY_HEADER_SIZE..key_end).ok_or_else(|| {
                IndexError::MalformedIndex(format!(
                    "key length {} overruns entry of {length} bytes",
                    header.key_length
                ))
            })?;

            let data_start = usize::from(header.data_offset);
            let data_end = data_start + usize::from(header.data_length);
            let data_bytes = entry.get(data_start..data_end).ok_or_else(|| {
                IndexError::MalformedIndex(format!(
                    "data range {data_start}..{data_end} overruns entry of {length} bytes"
                ))
            })?;

            Some((
                decode_le(key_bytes, "entry key")?,
                decode_le(data_bytes, "entry data")?,
            ))
        };

        Ok((
            Self {
                flags: header.flags,
                record,
                child,
            },
            length,
        ))
    }
}

impl<K, D> IndexEntry<K, D>
where
    K: for<'a> BinWrite<Args<'a> = ()>,
    D: for<'a> BinWrite<Args<'a> = ()>,
{
    /// Serialize the entry in on-disk layout
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_entry(self.record(), self.child)
    }
}

/// Serialize an entry from borrowed parts
///
/// `record = None` produces the end-of-node sentinel.
pub(crate) fn encode_entry<K, D>(record: Option<(&K, &D)>, child: Option<Vcn>) -> Result<Vec<u8>>
where
    K: for<'a> BinWrite<Args<'a> = ()>,
    D: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut flags = IndexEntryFlags::default();
    let (key_bytes, data_bytes) = match record {
        Some((key, data)) => (encode_le(key)?, encode_le(data)?),
        None => {
            flags.set(IndexEntryFlags::IS_END);
            (Vec::new(), Vec::new())
        }
    };
    if child.is_some() {
        flags.set(IndexEntryFlags::HAS_CHILD);
    }

    let data_offset = if record.is_some() {
        ENTRY_HEADER_SIZE + key_bytes.len()
    } else {
        0
    };
    let body_end = (ENTRY_HEADER_SIZE + key_bytes.len() + data_bytes.len()).next_multiple_of(8);
    let length = body_end + child.map_or(0, |_| CHILD_VCN_SIZE);

    let header = IndexEntryHeader {
        data_offset: to_u16(data_offset)?,
        data_length: to_u16(data_bytes.len())?,
        reserved: 0,
        length: to_u16(length)?,
        key_length: to_u16(key_bytes.len())?,
        flags,
        padding: 0,
    };

    let mut buffer = vec![0u8; length];
    header.write_le(&mut Cursor::new(&mut buffer[..ENTRY_HEADER_SIZE]))?;
    buffer[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + key_bytes.len()].copy_from_slice(&key_bytes);
    if record.is_some() {
        buffer[data_offset..data_offset + data_bytes.len()].copy_from_slice(&data_bytes);
    }
    if let Some(vcn) = child {
        buffer[length - CHILD_VCN_SIZE..].copy_from_slice(&vcn.to_le_bytes());
    }
    Ok(buffer)
}

/// Decode a little-endian value, reporting failures as a malformed index
pub(crate) fn decode_le<T>(bytes: &[u8], what: &str) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_options(&mut Cursor::new(bytes), Endian::Little, ())
        .map_err(|e| IndexError::MalformedIndex(format!("cannot decode {what}: {e}")))
}

/// Encode a little-endian value into a fresh buffer
pub(crate) fn encode_le<T>(value: &T) -> Result<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    value.write_options(&mut cursor, Endian::Little, ())?;
    Ok(cursor.into_inner())
}

fn to_u16(value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| IndexError::NodeOverflow {
        required: value,
        capacity: usize::from(u16::MAX),
    })
}
