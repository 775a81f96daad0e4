//! NTFS sorted index (B+ tree) support
//!
//! An NTFS index keeps its top node resident in the `$INDEX_ROOT` attribute
//! and every lower node in a fixed-size `INDX` block of the non-resident
//! `$INDEX_ALLOCATION` stream. Each node is an ordered list of entries closed
//! by an end-of-node sentinel. An entry may point at a child block holding
//! the keys that sort before it; the sentinel's child holds the keys after
//! the node's last record.
//!
//! # Key Features
//!
//! - **Lazy traversal** - Blocks are read only when a walk reaches them
//! - **Comparator-driven search** - Any [`IndexQuery`] prunes whole subtrees
//! - **Duplicate keys** - Equal keys in a block and its parent are all returned
//! - **Fixup validation** - Torn `INDX` writes are detected, not decoded
//! - **Symmetric builder** - [`IndexImageBuilder`] writes images the reader accepts
//!
//! # Basic Usage
//!
//! ```rust
//! use discette_ntfs::index::{IndexImageBuilder, NodeSpec, NaturalOrder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let records: Vec<(u32, u64)> = (0..500).map(|id| (id, u64::from(id) * 16)).collect();
//! let image = IndexImageBuilder::new().build(&NodeSpec::bulk_load(records, 8))?;
//!
//! let index = image.open::<u32, u64, _>(NaturalOrder)?;
//! assert_eq!(index.get(&42)?, 672);
//!
//! let window: Vec<u32> = index
//!     .range(100..105)
//!     .map(|entry| entry.map(|(key, _)| key))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(window, vec![100, 101, 102, 103, 104]);
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod builder;
pub mod entry;
pub mod flags;
pub mod iter;
pub mod node;
pub mod query;
pub mod root;
pub mod sorted;

pub use block::{IndexBlock, IndexBlockHeader};
pub use builder::{IndexImage, IndexImageBuilder, NodeSpec, RecordSpec};
pub use entry::{IndexEntry, IndexEntryHeader, Vcn};
pub use flags::IndexEntryFlags;
pub use iter::{EntryIter, FindIter};
pub use node::{IndexNode, IndexNodeHeader};
pub use query::{Collation, ExactKey, IndexQuery, KeyRange, NaturalOrder};
pub use root::{CollationRule, IndexRoot, IndexRootHeader};
pub use sorted::SortedIndex;
