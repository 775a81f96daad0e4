//! `INDX` records: non-root nodes stored in `$INDEX_ALLOCATION`
//!
//! Each block starts with a 24-byte record header followed by the node
//! header at offset 0x18. The record is protected by an update sequence
//! array: the last two bytes of every sector hold the update sequence
//! number on disk, and the original bytes live in the array.

use crate::error::{IndexError, Result};
use crate::geometry::VolumeGeometry;
use crate::index::entry::{Vcn, decode_le};
use crate::index::node::{IndexNode, IndexNodeHeader, NODE_HEADER_SIZE};
use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::{trace, warn};

/// Signature at the start of every index block
pub const INDEX_BLOCK_MAGIC: [u8; 4] = *b"INDX";

/// Size of the record header, and offset of the node header
pub const BLOCK_HEADER_SIZE: usize = 0x18;

/// Offset of the update sequence array written by this crate
pub const UPDATE_SEQUENCE_OFFSET: usize = 0x28;

/// Record header at the start of every index block
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct IndexBlockHeader {
    /// Record signature, `INDX`
    pub magic: [u8; 4],
    /// Offset of the update sequence array
    pub usa_offset: u16,
    /// Number of u16 slots in the array, sequence number included
    pub usa_count: u16,
    /// `$LogFile` sequence number
    pub log_sequence_number: u64,
    /// VCN of this block within the allocation stream
    pub vcn: u64,
}

/// A materialized index block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBlock<K, D> {
    /// Address the block was read from
    pub vcn: Vcn,
    /// Record header
    pub header: IndexBlockHeader,
    /// Decoded node
    pub node: IndexNode<K, D>,
}

impl<K, D> IndexBlock<K, D>
where
    K: for<'a> BinRead<Args<'a> = ()>,
    D: for<'a> BinRead<Args<'a> = ()>,
{
    /// Read the block at `vcn` from the allocation stream
    pub fn read<S: Read + Seek>(
        stream: &mut S,
        vcn: Vcn,
        geometry: &VolumeGeometry,
        index_buffer_size: u32,
        verify_vcn: bool,
    ) -> Result<Self> {
        let offset = geometry
            .vcn_offset(vcn, index_buffer_size)
            .ok_or_else(|| IndexError::BlockRead {
                vcn,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "block offset overflows u64",
                ),
            })?;

        let mut buffer = vec![0u8; index_buffer_size as usize];
        stream
            .seek(SeekFrom::Start(offset))
            .and_then(|_| stream.read_exact(&mut buffer))
            .map_err(|source| IndexError::BlockRead { vcn, source })?;
        trace!(vcn, offset, size = index_buffer_size, "read index block");

        Self::parse(
            &mut buffer,
            vcn,
            usize::from(geometry.bytes_per_sector),
            verify_vcn,
        )
    }

    /// Decode a raw block read for `vcn`, applying fixups in place
    pub fn parse(
        buffer: &mut [u8],
        vcn: Vcn,
        bytes_per_sector: usize,
        verify_vcn: bool,
    ) -> Result<Self> {
        let header_bytes = buffer.get(..BLOCK_HEADER_SIZE).ok_or_else(|| {
            IndexError::MalformedIndex(format!(
                "index block of {} bytes is shorter than its header",
                buffer.len()
            ))
        })?;
        let header: IndexBlockHeader = decode_le(header_bytes, "index block header")?;

        if header.magic != INDEX_BLOCK_MAGIC {
            return Err(IndexError::MalformedIndex(format!(
                "index block at VCN {vcn} has signature {:02X?}, expected INDX",
                header.magic
            )));
        }
        if verify_vcn && header.vcn != vcn {
            return Err(IndexError::MalformedIndex(format!(
                "index block read at VCN {vcn} claims VCN {}",
                header.vcn
            )));
        }

        apply_fixups(buffer, &header, bytes_per_sector).inspect_err(|e| {
            warn!(vcn, "update sequence check failed: {e}");
        })?;

        let node = IndexNode::parse(buffer, BLOCK_HEADER_SIZE)?;
        Ok(Self { vcn, header, node })
    }
}

/// Verify and undo the update sequence protection of a record
pub(crate) fn apply_fixups(
    buffer: &mut [u8],
    header: &IndexBlockHeader,
    bytes_per_sector: usize,
) -> Result<()> {
    let usa_offset = usize::from(header.usa_offset);
    let usa_count = usize::from(header.usa_count);
    let usa_end = usa_offset + usa_count * 2;

    if usa_count == 0 || usa_end > buffer.len() {
        return Err(IndexError::MalformedIndex(format!(
            "update sequence array {usa_offset}..{usa_end} does not fit block of {} bytes",
            buffer.len()
        )));
    }
    if bytes_per_sector < 2 || (usa_count - 1) * bytes_per_sector > buffer.len() {
        return Err(IndexError::MalformedIndex(format!(
            "{} protected sectors of {bytes_per_sector} bytes exceed block of {} bytes",
            usa_count - 1,
            buffer.len()
        )));
    }

    let usn = [buffer[usa_offset], buffer[usa_offset + 1]];
    for sector in 1..usa_count {
        let tail = sector * bytes_per_sector - 2;
        if buffer[tail..tail + 2] != usn {
            return Err(IndexError::MalformedIndex(format!(
                "update sequence mismatch in sector {}: expected {:02X?}, found {:02X?}",
                sector - 1,
                usn,
                &buffer[tail..tail + 2]
            )));
        }
        let slot = usa_offset + sector * 2;
        let original = [buffer[slot], buffer[slot + 1]];
        buffer[tail..tail + 2].copy_from_slice(&original);
    }
    Ok(())
}

/// Build a complete, fixup-protected block around pre-encoded entries
pub(crate) fn encode_block(
    vcn: Vcn,
    entries: &[u8],
    has_children: bool,
    block_size: usize,
    bytes_per_sector: usize,
) -> Result<Vec<u8>> {
    if bytes_per_sector < 2 || block_size % bytes_per_sector != 0 {
        return Err(IndexError::MalformedIndex(format!(
            "block size {block_size} is not a multiple of sector size {bytes_per_sector}"
        )));
    }

    let usa_count = block_size / bytes_per_sector + 1;
    let usa_end = UPDATE_SEQUENCE_OFFSET + usa_count * 2;
    let entries_offset = usa_end.next_multiple_of(8) - BLOCK_HEADER_SIZE;
    let index_length = entries_offset + entries.len();
    let required = BLOCK_HEADER_SIZE + index_length;
    if required > block_size {
        return Err(IndexError::NodeOverflow {
            required,
            capacity: block_size,
        });
    }

    let header = IndexBlockHeader {
        magic: INDEX_BLOCK_MAGIC,
        usa_offset: UPDATE_SEQUENCE_OFFSET as u16,
        usa_count: u16::try_from(usa_count).map_err(|_| IndexError::NodeOverflow {
            required: usa_count,
            capacity: usize::from(u16::MAX),
        })?,
        log_sequence_number: 0,
        vcn,
    };
    let node_header = IndexNodeHeader::with_entries_at(
        entries_offset,
        index_length,
        block_size - BLOCK_HEADER_SIZE,
        has_children,
    )?;

    let mut buffer = vec![0u8; block_size];
    header.write_le(&mut Cursor::new(&mut buffer[..BLOCK_HEADER_SIZE]))?;
    buffer[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + NODE_HEADER_SIZE].copy_from_slice(&node_header.to_bytes()?);
    let entries_start = BLOCK_HEADER_SIZE + entries_offset;
    buffer[entries_start..entries_start + entries.len()].copy_from_slice(entries);

    let usn = 1u16.to_le_bytes();
    buffer[UPDATE_SEQUENCE_OFFSET..UPDATE_SEQUENCE_OFFSET + 2].copy_from_slice(&usn);
    for sector in 1..usa_count {
        let tail = sector * bytes_per_sector - 2;
        let slot = UPDATE_SEQUENCE_OFFSET + sector * 2;
        let original = [buffer[tail], buffer[tail + 1]];
        buffer[slot..slot + 2].copy_from_slice(&original);
        buffer[tail..tail + 2].copy_from_slice(&usn);
    }

    Ok(buffer)
}
