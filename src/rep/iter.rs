//! The iterator family.
//!
//! Four cursor shapes over one uniform interface, as a closed set of enum
//! variants:
//!
//! | variant     | `next` | `prev` | `seek` | `seek_to_first/last` |
//! |-------------|--------|--------|--------|----------------------|
//! | `Empty`     | no-op  | no-op  | no-op  | no-op                |
//! | `Bucket`    | yes    | resets | within its bucket | resets    |
//! | `Dynamic`   | yes    | resets | re-homes, then within bucket | resets |
//! | `FullOrder` | yes    | yes    | total order | yes            |
//!
//! Bucketed order is not total user-key order, so the prefix-bound cursors
//! deliberately answer `prev`, `seek_to_first`, and `seek_to_last` by
//! resetting to the invalid state rather than returning misleading entries.

use std::marker::PhantomData;
use std::ops::Bound;
use std::ptr;
use std::slice;
use std::sync::Arc;

use crossbeam_skiplist::SkipSet;

use crate::key::EntryComparator;

use super::{Core, Node};

/// A positional cursor over index entries. See the module table for which
/// operations are meaningful per variant.
pub enum HashLinkListIter<'a> {
    /// Permanently invalid. Returned for prefix scans that hit an empty
    /// bucket; cheaper than a degenerate list cursor.
    Empty,
    /// Forward cursor over one bucket, head fixed at construction.
    Bucket(BucketIter<'a>),
    /// Forward cursor that re-homes to the target's bucket on every seek.
    Dynamic(DynamicIter<'a>),
    /// Materialized total-order snapshot over all buckets.
    FullOrder(FullOrderIter<'a>),
}

impl<'a> HashLinkListIter<'a> {
    pub(crate) fn empty() -> Self {
        HashLinkListIter::Empty
    }

    pub(crate) fn bucket(core: &'a Core, head: *mut Node) -> Self {
        HashLinkListIter::Bucket(BucketIter {
            core,
            head,
            node: ptr::null_mut(),
            tmp: Vec::new(),
        })
    }

    pub(crate) fn dynamic(core: &'a Core) -> Self {
        HashLinkListIter::Dynamic(DynamicIter {
            inner: BucketIter {
                core,
                head: ptr::null_mut(),
                node: ptr::null_mut(),
                tmp: Vec::new(),
            },
        })
    }

    pub(crate) fn full_order(core: &'a Core) -> Self {
        HashLinkListIter::FullOrder(FullOrderIter::build(core))
    }

    /// True iff the cursor points at an entry.
    pub fn valid(&self) -> bool {
        match self {
            HashLinkListIter::Empty => false,
            HashLinkListIter::Bucket(it) => it.valid(),
            HashLinkListIter::Dynamic(it) => it.inner.valid(),
            HashLinkListIter::FullOrder(it) => it.valid(),
        }
    }

    /// The entry at the cursor, or `None` when invalid.
    pub fn key(&self) -> Option<&'a [u8]> {
        match self {
            HashLinkListIter::Empty => None,
            HashLinkListIter::Bucket(it) => it.key(),
            HashLinkListIter::Dynamic(it) => it.inner.key(),
            HashLinkListIter::FullOrder(it) => it.key(),
        }
    }

    /// Advance to the next entry. No-op when invalid.
    pub fn next(&mut self) {
        match self {
            HashLinkListIter::Empty => {}
            HashLinkListIter::Bucket(it) => it.next(),
            HashLinkListIter::Dynamic(it) => it.inner.next(),
            HashLinkListIter::FullOrder(it) => it.next(),
        }
    }

    /// Step to the previous entry. Prefix-bound cursors reset to invalid.
    pub fn prev(&mut self) {
        match self {
            HashLinkListIter::Empty => {}
            HashLinkListIter::Bucket(it) => it.reset(),
            HashLinkListIter::Dynamic(it) => it.inner.reset(),
            HashLinkListIter::FullOrder(it) => it.prev(),
        }
    }

    /// Position at the first entry with key ≥ `user_key`.
    ///
    /// `encoded` may carry the already-encoded seek key; otherwise one is
    /// built from `user_key` with the comparator's scratch encoding.
    pub fn seek(&mut self, user_key: &[u8], encoded: Option<&[u8]>) {
        match self {
            HashLinkListIter::Empty => {}
            HashLinkListIter::Bucket(it) => it.seek(user_key, encoded),
            HashLinkListIter::Dynamic(it) => it.seek(user_key, encoded),
            HashLinkListIter::FullOrder(it) => it.seek(user_key, encoded),
        }
    }

    /// Position at the first entry. Prefix-bound cursors reset to invalid.
    pub fn seek_to_first(&mut self) {
        match self {
            HashLinkListIter::Empty => {}
            HashLinkListIter::Bucket(it) => it.reset(),
            HashLinkListIter::Dynamic(it) => it.inner.reset(),
            HashLinkListIter::FullOrder(it) => it.seek_to_first(),
        }
    }

    /// Position at the last entry. Prefix-bound cursors reset to invalid.
    pub fn seek_to_last(&mut self) {
        match self {
            HashLinkListIter::Empty => {}
            HashLinkListIter::Bucket(it) => it.reset(),
            HashLinkListIter::Dynamic(it) => it.inner.reset(),
            HashLinkListIter::FullOrder(it) => it.seek_to_last(),
        }
    }
}

/// Forward cursor over a single bucket's sorted list.
pub struct BucketIter<'a> {
    core: &'a Core,
    head: *mut Node,
    node: *mut Node,
    tmp: Vec<u8>,
}

impl<'a> BucketIter<'a> {
    #[inline]
    fn valid(&self) -> bool {
        !self.node.is_null()
    }

    fn key(&self) -> Option<&'a [u8]> {
        if self.node.is_null() {
            return None;
        }
        Some(unsafe { &*self.node }.entry())
    }

    fn next(&mut self) {
        if !self.node.is_null() {
            // Acquire successor read; concurrent inserts are observed fully
            // initialized or not at all.
            self.node = unsafe { &*self.node }.next();
        }
    }

    fn seek(&mut self, user_key: &[u8], encoded: Option<&[u8]>) {
        let core = self.core;
        let encoded_key: &[u8] = match encoded {
            Some(e) => e,
            None => core.comparator().encode_seek_key(user_key, &mut self.tmp),
        };
        self.node = core.find_ge_in_bucket(self.head, encoded_key);
    }

    /// Bucketed order is not total order; the cursor goes invalid instead
    /// of pretending otherwise. The head stays fixed, so a later `seek`
    /// restores it.
    fn reset(&mut self) {
        self.node = ptr::null_mut();
    }
}

/// Prefix cursor that re-homes on every seek.
pub struct DynamicIter<'a> {
    inner: BucketIter<'a>,
}

impl<'a> DynamicIter<'a> {
    fn seek(&mut self, user_key: &[u8], encoded: Option<&[u8]>) {
        let core = self.inner.core;
        let prefix = core.extractor().transform(user_key);
        self.inner.head = core.head_for_prefix(prefix);
        self.inner.seek(user_key, encoded);
    }
}

/// An entry pointer ordered through the entry comparator, for the
/// materialized full-order list.
struct OrderedEntry {
    ptr: *const u8,
    len: u32,
    comparator: Arc<dyn EntryComparator>,
}

impl OrderedEntry {
    #[inline]
    fn as_slice<'a>(&self) -> &'a [u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len as usize) }
    }
}

impl Clone for OrderedEntry {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
            comparator: self.comparator.clone(),
        }
    }
}

impl PartialEq for OrderedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.comparator
            .compare(self.as_slice(), other.as_slice())
            .is_eq()
    }
}

impl Eq for OrderedEntry {}

impl PartialOrd for OrderedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.comparator.compare(self.as_slice(), other.as_slice())
    }
}

// The pointed-to bytes are arena-backed and immutable; the arena outlives
// the list through the handle borrow on the iterator.
unsafe impl Send for OrderedEntry {}
unsafe impl Sync for OrderedEntry {}

/// Materialized total-order cursor.
///
/// Construction walks every bucket and inserts each visible node into an
/// ordered skip-list keyed by the same comparator; its lifetime is tied to
/// the iterator. The build must be quiescent with respect to the writer.
pub struct FullOrderIter<'a> {
    list: SkipSet<OrderedEntry>,
    current: Option<OrderedEntry>,
    comparator: Arc<dyn EntryComparator>,
    tmp: Vec<u8>,
    _index: PhantomData<&'a Core>,
}

impl<'a> FullOrderIter<'a> {
    fn build(core: &'a Core) -> Self {
        let list = SkipSet::new();
        let comparator = core.comparator().clone();
        for slot in 0..core.bucket_count {
            let mut node = core.bucket_head(slot);
            while !node.is_null() {
                let n = unsafe { &*node };
                let entry = n.entry();
                list.insert(OrderedEntry {
                    ptr: entry.as_ptr(),
                    len: entry.len() as u32,
                    comparator: comparator.clone(),
                });
                node = n.next();
            }
        }
        Self {
            list,
            current: None,
            comparator,
            tmp: Vec::new(),
            _index: PhantomData,
        }
    }

    #[inline]
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> Option<&'a [u8]> {
        self.current.as_ref().map(|e| e.as_slice())
    }

    fn next(&mut self) {
        if let Some(cur) = self.current.take() {
            self.current = self
                .list
                .lower_bound(Bound::Excluded(&cur))
                .map(|e| e.value().clone());
        }
    }

    fn prev(&mut self) {
        if let Some(cur) = self.current.take() {
            self.current = self
                .list
                .upper_bound(Bound::Excluded(&cur))
                .map(|e| e.value().clone());
        }
    }

    fn seek(&mut self, user_key: &[u8], encoded: Option<&[u8]>) {
        let encoded_key: &[u8] = match encoded {
            Some(e) => e,
            None => self.comparator.encode_seek_key(user_key, &mut self.tmp),
        };
        let probe = OrderedEntry {
            ptr: encoded_key.as_ptr(),
            len: encoded_key.len() as u32,
            comparator: self.comparator.clone(),
        };
        self.current = self
            .list
            .lower_bound(Bound::Included(&probe))
            .map(|e| e.value().clone());
    }

    fn seek_to_first(&mut self) {
        self.current = self.list.front().map(|e| e.value().clone());
    }

    fn seek_to_last(&mut self) {
        self.current = self.list.back().map(|e| e.value().clone());
    }
}
