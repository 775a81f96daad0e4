//! Shared helpers for unit tests

use crate::index::builder::{IndexImageBuilder, NodeSpec};
use crate::index::query::NaturalOrder;
use crate::index::sorted::SortedIndex;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Allocation stream that remembers the offset of every seek
#[derive(Debug, Clone, Default)]
pub struct RecordingStream {
    inner: Cursor<Vec<u8>>,
    pub seeks: Vec<u64>,
}

impl RecordingStream {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            seeks: Vec::new(),
        }
    }
}

impl Read for RecordingStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for RecordingStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let offset = self.inner.seek(pos)?;
        self.seeks.push(offset);
        Ok(offset)
    }
}

pub type TestIndex = SortedIndex<u32, u32, RecordingStream, NaturalOrder>;

/// Build `tree` with 4 KiB blocks and open it over a recording stream
#[allow(clippy::expect_used)]
pub fn open_tree(tree: &NodeSpec<u32, u32>) -> TestIndex {
    let image = IndexImageBuilder::new()
        .build(tree)
        .expect("Operation should succeed");
    SortedIndex::new(
        &image.root,
        image.allocation.map(RecordingStream::new),
        image.geometry,
        NaturalOrder,
    )
    .expect("Operation should succeed")
}

/// VCNs read so far, assuming 4 KiB blocks on 4 KiB clusters
pub fn vcns_read(index: TestIndex) -> Vec<u64> {
    index
        .into_allocation()
        .map(|stream| stream.seeks.iter().map(|offset| offset / 4096).collect())
        .unwrap_or_default()
}

/// Collect an iterator of results, panicking on the first error
#[allow(clippy::expect_used)]
pub fn collect_ok<T>(iter: impl Iterator<Item = crate::Result<T>>) -> Vec<T> {
    iter.map(|item| item.expect("Operation should succeed"))
        .collect()
}
