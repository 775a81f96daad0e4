//! Lazy in-order traversals over a [`SortedIndex`]
//!
//! Both iterators keep an explicit stack of node frames. The root frame
//! borrows the index's resident node; every child frame owns a node freshly
//! read from the allocation stream and is dropped once exhausted. After the
//! first error an iterator is exhausted.

use crate::error::Result;
use crate::index::entry::IndexEntry;
use crate::index::node::IndexNode;
use crate::index::query::{Collation, IndexQuery};
use crate::index::sorted::SortedIndex;
use binrw::BinRead;
use std::cmp::Ordering;
use std::io::{Read, Seek};
use std::iter::FusedIterator;

enum NodeRef<'a, K, D> {
    Root(&'a IndexNode<K, D>),
    Block(IndexNode<K, D>),
}

impl<K, D> NodeRef<'_, K, D> {
    fn entries(&self) -> &[IndexEntry<K, D>] {
        match self {
            Self::Root(node) => node.entries(),
            Self::Block(node) => node.entries(),
        }
    }
}

struct Frame<'a, K, D, T> {
    node: NodeRef<'a, K, D>,
    next: usize,
    /// Set while the child of `entries[next]` is being visited
    pending: Option<T>,
}

impl<'a, K, D, T> Frame<'a, K, D, T> {
    const fn new(node: NodeRef<'a, K, D>) -> Self {
        Self {
            node,
            next: 0,
            pending: None,
        }
    }
}

/// Iterator over every `(key, data)` pair in ascending order
///
/// Created by [`SortedIndex::entries`].
pub struct EntryIter<'a, K, D, S, C> {
    index: &'a SortedIndex<K, D, S, C>,
    stack: Vec<Frame<'a, K, D, ()>>,
}

impl<'a, K, D, S, C> EntryIter<'a, K, D, S, C> {
    pub(crate) fn new(index: &'a SortedIndex<K, D, S, C>) -> Self {
        Self {
            index,
            stack: vec![Frame::new(NodeRef::Root(index.root()))],
        }
    }
}

impl<K, D, S, C> Iterator for EntryIter<'_, K, D, S, C>
where
    K: for<'b> BinRead<Args<'b> = ()> + Clone,
    D: for<'b> BinRead<Args<'b> = ()> + Clone,
    S: Read + Seek,
    C: Collation<K>,
{
    type Item = Result<(K, D)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.node.entries().get(frame.next) else {
                self.stack.pop();
                continue;
            };

            if let Some(vcn) = entry.child_vcn()
                && frame.pending.is_none()
            {
                frame.pending = Some(());
                match self.index.descend(vcn, depth) {
                    Ok(node) => self.stack.push(Frame::new(NodeRef::Block(node))),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(e));
                    }
                }
                continue;
            }

            frame.next += 1;
            frame.pending = None;
            if let Some((key, data)) = entry.record() {
                return Some(Ok((key.clone(), data.clone())));
            }
        }
    }
}

impl<K, D, S, C> FusedIterator for EntryIter<'_, K, D, S, C>
where
    K: for<'b> BinRead<Args<'b> = ()> + Clone,
    D: for<'b> BinRead<Args<'b> = ()> + Clone,
    S: Read + Seek,
    C: Collation<K>,
{
}

/// What to do with one entry once its child (if any) has been searched
#[derive(Debug, Clone, Copy)]
struct Decision {
    matches: bool,
    keep_iterating: bool,
}

/// Classify an entry against the query; the flag says whether to search its child
fn classify<K, D, Q: IndexQuery<K>>(query: &Q, entry: &IndexEntry<K, D>) -> (Decision, bool) {
    let Some(key) = entry.key() else {
        // The end marker never matches, its child is always eligible
        return (
            Decision {
                matches: false,
                keep_iterating: true,
            },
            true,
        );
    };

    match query.compare_to(key) {
        Ordering::Equal => (
            Decision {
                matches: true,
                keep_iterating: true,
            },
            true,
        ),
        // Key sorts before the target: its subtree holds only smaller keys
        Ordering::Greater => (
            Decision {
                matches: false,
                keep_iterating: true,
            },
            false,
        ),
        // Key is past the target: only its subtree can still match
        Ordering::Less => (
            Decision {
                matches: false,
                keep_iterating: false,
            },
            true,
        ),
    }
}

/// Iterator over the pairs matching an [`IndexQuery`], in ascending order
///
/// Created by [`SortedIndex::find_all`] and [`SortedIndex::range`].
pub struct FindIter<'a, K, D, S, C, Q> {
    index: &'a SortedIndex<K, D, S, C>,
    query: Q,
    stack: Vec<Frame<'a, K, D, Decision>>,
}

impl<'a, K, D, S, C, Q> FindIter<'a, K, D, S, C, Q> {
    pub(crate) fn new(index: &'a SortedIndex<K, D, S, C>, query: Q) -> Self {
        Self {
            index,
            query,
            stack: vec![Frame::new(NodeRef::Root(index.root()))],
        }
    }
}

impl<K, D, S, C, Q> Iterator for FindIter<'_, K, D, S, C, Q>
where
    K: for<'b> BinRead<Args<'b> = ()> + Clone,
    D: for<'b> BinRead<Args<'b> = ()> + Clone,
    S: Read + Seek,
    C: Collation<K>,
    Q: IndexQuery<K>,
{
    type Item = Result<(K, D)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.node.entries().get(frame.next) else {
                self.stack.pop();
                continue;
            };

            let decision = if let Some(decision) = frame.pending.take() {
                decision
            } else {
                let (decision, search_children) = classify(&self.query, entry);
                if let Some(vcn) = entry.child_vcn()
                    && search_children
                {
                    frame.pending = Some(decision);
                    match self.index.descend(vcn, depth) {
                        Ok(node) => self.stack.push(Frame::new(NodeRef::Block(node))),
                        Err(e) => {
                            self.stack.clear();
                            return Some(Err(e));
                        }
                    }
                    continue;
                }
                decision
            };

            frame.next = if decision.keep_iterating {
                frame.next + 1
            } else {
                frame.node.entries().len()
            };

            if decision.matches
                && let Some((key, data)) = entry.record()
            {
                return Some(Ok((key.clone(), data.clone())));
            }
        }
    }
}

impl<K, D, S, C, Q> FusedIterator for FindIter<'_, K, D, S, C, Q>
where
    K: for<'b> BinRead<Args<'b> = ()> + Clone,
    D: for<'b> BinRead<Args<'b> = ()> + Clone,
    S: Read + Seek,
    C: Collation<K>,
    Q: IndexQuery<K>,
{
}
