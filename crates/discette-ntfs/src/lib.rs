//! Read-only access to NTFS sorted indexes.
//!
//! NTFS keeps directories and its system tables (`$Secure:$SII`,
//! `$Secure:$SDH`, `$ObjId:$O`, `$Reparse:$R`, ...) in sorted indexes split
//! across a resident root attribute and a stream of fixed-size `INDX` blocks.
//! This crate decodes those structures for any key and data type with a
//! binrw codec and walks them lazily, reading one block at a time.
//!
//! # Example
//!
//! ```rust
//! use discette_ntfs::attribute::MemoryFile;
//! use discette_ntfs::index::{IndexImageBuilder, NodeSpec};
//! use discette_ntfs::keys::{
//!     SECURITY_ID_INDEX, SecurityDescriptorEntry, SecurityId, UlongCollation,
//! };
//! use discette_ntfs::{SortedIndex, VolumeGeometry};
//! use std::io::Cursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let records: Vec<_> = (0x100..0x180)
//!     .map(|id| {
//!         let entry = SecurityDescriptorEntry { id, length: 0x78, ..Default::default() };
//!         (SecurityId(id), entry)
//!     })
//!     .collect();
//! let file: MemoryFile = IndexImageBuilder::new()
//!     .build(&NodeSpec::bulk_load(records, 16))?
//!     .into_file(SECURITY_ID_INDEX);
//!
//! let sii: SortedIndex<SecurityId, SecurityDescriptorEntry, Cursor<Vec<u8>>, _> =
//!     SortedIndex::open(&file, SECURITY_ID_INDEX, VolumeGeometry::default(), UlongCollation)?;
//! assert!(sii.contains_key(&SecurityId(0x120))?);
//! assert_eq!(sii.count()?, 0x80);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // On-disk fields are narrower than usize
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns

pub mod attribute;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod keys;

#[cfg(test)]
pub(crate) mod test_utils;

pub use attribute::{IndexedFile, MemoryFile};
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use geometry::VolumeGeometry;
pub use index::{Collation, IndexQuery, NaturalOrder, SortedIndex};
