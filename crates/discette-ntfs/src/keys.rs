//! Key and data layouts of the NTFS system view indexes, with their collations
//!
//! | Index | Key | Data | Collation |
//! |-------|-----|------|-----------|
//! | `$Secure:$SII` | [`SecurityId`] | [`SecurityDescriptorEntry`] | ULONG |
//! | `$Secure:$SDH` | [`SecurityHashKey`] | [`SecurityDescriptorEntry`] | SECURITY_HASH |
//! | `$ObjId:$O` | [`ObjectId`] | [`ObjectIdRecord`] | ULONGS |
//! | `$Reparse:$R` | [`RawKey`] | empty | ULONGS |

use crate::index::query::{Collation, IndexQuery};
use binrw::{BinRead, BinResult, BinWrite};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Seek, Write};

/// Security id index in `$Secure`
pub const SECURITY_ID_INDEX: &str = "$SII";

/// Security descriptor hash index in `$Secure`
pub const SECURITY_HASH_INDEX: &str = "$SDH";

/// Object id index in `$Extend\$ObjId`
pub const OBJECT_ID_INDEX: &str = "$O";

/// Reparse point index in `$Extend\$Reparse`
pub const REPARSE_INDEX: &str = "$R";

/// Reference to an MFT record: 48-bit record number, 16-bit sequence number
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[brw(little)]
pub struct FileReference(pub u64);

impl FileReference {
    const RECORD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

    /// Build a reference from its parts; the record number is truncated to 48 bits
    pub const fn new(record_number: u64, sequence_number: u16) -> Self {
        Self((record_number & Self::RECORD_MASK) | ((sequence_number as u64) << 48))
    }

    /// MFT record number
    pub const fn record_number(self) -> u64 {
        self.0 & Self::RECORD_MASK
    }

    /// Reuse counter of the record
    pub const fn sequence_number(self) -> u16 {
        (self.0 >> 48) as u16
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.record_number(), self.sequence_number())
    }
}

/// Key of `$SII`
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[brw(little)]
pub struct SecurityId(pub u32);

/// Key of `$SDH`: descriptor hash, then security id
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct SecurityHashKey {
    /// Hash of the security descriptor
    pub hash: u32,
    /// Security id of the descriptor
    pub id: u32,
}

impl SecurityHashKey {
    /// Query matching every key with `hash`, whatever its id
    pub fn hash_query(hash: u32) -> impl IndexQuery<Self> {
        move |key: &Self| hash.cmp(&key.hash)
    }
}

/// Data of `$SII` and `$SDH`: where a descriptor lives in `$SDS`
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct SecurityDescriptorEntry {
    /// Hash of the security descriptor
    pub hash: u32,
    /// Security id of the descriptor
    pub id: u32,
    /// Byte offset of the descriptor header in `$SDS`
    pub offset: u64,
    /// Size of the descriptor including its header
    pub length: u32,
}

/// Key of `$ObjId:$O`
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct ObjectId(pub [u8; 16]);

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Data of `$ObjId:$O`
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct ObjectIdRecord {
    /// File carrying the object id
    pub file_reference: FileReference,
    /// Volume the object was created on
    pub birth_volume_id: [u8; 16],
    /// Object id at creation
    pub birth_object_id: [u8; 16],
    /// Domain id, unused by current systems
    pub domain_id: [u8; 16],
}

/// Opaque key spanning the whole key area of an entry
///
/// Used for view indexes whose key has no dedicated type, such as `$R`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RawKey(pub Vec<u8>);

impl AsRef<[u8]> for RawKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl BinRead for RawKey {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        // The key decoder sees exactly the key bytes
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl BinWrite for RawKey {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// COLLATION_ULONG: keys compared as one unsigned 32-bit value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UlongCollation;

impl Collation<u32> for UlongCollation {
    fn compare(&self, left: &u32, right: &u32) -> Ordering {
        left.cmp(right)
    }
}

impl Collation<SecurityId> for UlongCollation {
    fn compare(&self, left: &SecurityId, right: &SecurityId) -> Ordering {
        left.0.cmp(&right.0)
    }
}

/// COLLATION_NTOFS_SECURITY_HASH: hash first, then security id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityHashCollation;

impl Collation<SecurityHashKey> for SecurityHashCollation {
    fn compare(&self, left: &SecurityHashKey, right: &SecurityHashKey) -> Ordering {
        left.hash.cmp(&right.hash).then(left.id.cmp(&right.id))
    }
}

/// COLLATION_NTOFS_ULONGS: keys compared as sequences of little-endian u32
///
/// Trailing bytes that do not fill a whole value are ignored; when one key
/// is a prefix of the other the shorter sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UlongsCollation;

impl UlongsCollation {
    fn ulongs(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

impl<K: AsRef<[u8]>> Collation<K> for UlongsCollation {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        Self::ulongs(left.as_ref()).cmp(Self::ulongs(right.as_ref()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::builder::{IndexImageBuilder, NodeSpec};
    use crate::index::entry::encode_le;
    use crate::index::root::CollationRule;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_reference_parts() {
        let reference = FileReference::new(0x1234_5678_9ABC, 7);
        assert_eq!(reference.record_number(), 0x1234_5678_9ABC);
        assert_eq!(reference.sequence_number(), 7);
        assert_eq!(reference.to_string(), format!("{}-7", 0x1234_5678_9ABCu64));

        let bytes = encode_le(&reference).expect("Operation should succeed");
        assert_eq!(bytes, vec![0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12, 0x07, 0x00]);
    }

    #[test]
    fn test_descriptor_entry_size() {
        let bytes = encode_le(&SecurityDescriptorEntry::default()).expect("Operation should succeed");
        assert_eq!(bytes.len(), 20);

        let bytes = encode_le(&ObjectIdRecord::default()).expect("Operation should succeed");
        assert_eq!(bytes.len(), 56);
    }

    #[test]
    fn test_security_hash_collation() {
        let low = SecurityHashKey { hash: 1, id: 900 };
        let high = SecurityHashKey { hash: 2, id: 100 };
        assert_eq!(SecurityHashCollation.compare(&low, &high), Ordering::Less);
        assert_eq!(
            SecurityHashCollation.compare(&SecurityHashKey { hash: 2, id: 50 }, &high),
            Ordering::Less
        );
    }

    #[test]
    fn test_ulongs_collation_is_not_bytewise() {
        // 0x100 sorts after 0xFF, although its first byte is smaller
        let small = ObjectId([0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let large = ObjectId([0x00, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(UlongsCollation.compare(&small, &large), Ordering::Less);
        assert_eq!(small.0.cmp(&large.0), Ordering::Greater);

        let prefix = RawKey(vec![1, 0, 0, 0]);
        let longer = RawKey(vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(UlongsCollation.compare(&prefix, &longer), Ordering::Less);
    }

    #[test]
    fn test_ulong_collation() {
        assert_eq!(
            UlongCollation.compare(&SecurityId(0x100), &SecurityId(0x101)),
            Ordering::Less
        );
        assert_eq!(UlongCollation.compare(&7u32, &7u32), Ordering::Equal);
    }

    fn descriptor(hash: u32, id: u32) -> (SecurityHashKey, SecurityDescriptorEntry) {
        (
            SecurityHashKey { hash, id },
            SecurityDescriptorEntry {
                hash,
                id,
                offset: u64::from(id) * 0x100,
                length: 0x78,
            },
        )
    }

    #[test]
    fn test_sdh_lookup_by_hash_only() {
        let mut records: Vec<_> = (0..60).map(|i| descriptor(i / 3, 0x100 + i)).collect();
        records.sort_by(|a, b| SecurityHashCollation.compare(&a.0, &b.0));

        let image = IndexImageBuilder::new()
            .with_collation_rule(CollationRule::SecurityHash)
            .build(&NodeSpec::bulk_load(records, 4))
            .expect("Operation should succeed");
        let index = image
            .open::<SecurityHashKey, SecurityDescriptorEntry, _>(SecurityHashCollation)
            .expect("Operation should succeed");
        assert_eq!(index.root_header().collation_rule, CollationRule::SecurityHash);

        let ids: Vec<u32> = index
            .find_all(SecurityHashKey::hash_query(7))
            .map(|entry| entry.expect("Operation should succeed").1.id)
            .collect();
        assert_eq!(ids, vec![0x115, 0x116, 0x117]);

        let exact = index
            .get(&SecurityHashKey { hash: 7, id: 0x116 })
            .expect("Operation should succeed");
        assert_eq!(exact.offset, 0x11600);
    }

    #[test]
    fn test_raw_key_round_trip_through_index() {
        // $R keys: reparse tag followed by the file reference
        let key = |tag: u32, record: u64| {
            let mut bytes = tag.to_le_bytes().to_vec();
            bytes.extend(FileReference::new(record, 1).0.to_le_bytes());
            RawKey(bytes)
        };
        let tree = NodeSpec::leaf([
            (key(0xA000_0003, 40), ()),
            (key(0xA000_000C, 12), ()),
            (key(0xA000_000C, 90), ()),
        ]);
        let image = IndexImageBuilder::new()
            .with_collation_rule(CollationRule::Ulongs)
            .build(&tree)
            .expect("Operation should succeed");
        let index = image
            .open::<RawKey, (), _>(UlongsCollation)
            .expect("Operation should succeed");

        assert!(
            index
                .contains_key(&key(0xA000_000C, 90))
                .expect("Operation should succeed")
        );
        assert!(
            !index
                .contains_key(&key(0xA000_000C, 91))
                .expect("Operation should succeed")
        );
        assert_eq!(index.count().expect("Operation should succeed"), 3);
    }
}
