//! The bucketed, sorted, lock-free linked-list index.
//!
//! A fixed-width table of atomic head pointers partitions entries by the
//! hash of their extracted key prefix; each bucket is a singly-linked list
//! kept sorted under the entry comparator. One writer inserts while any
//! number of readers traverse, with no locks on either side:
//!
//! - every publication of a node (as a bucket head or as a successor) is a
//!   release-store;
//! - every read of a head or successor is an acquire-load, so an observed
//!   node is observed fully initialized;
//! - the single-writer rule removes the need for CAS loops entirely.
//!
//! The single-writer rule is enforced at the type level: a
//! [`HashLinkListFactory`] produces one non-clonable [`WriteHandle`] whose
//! `insert` takes `&mut self`, alongside a freely clonable [`ReadHandle`]
//! exposing only non-mutating operations.
//!
//! All storage (nodes, entry bytes, and the bucket table itself) lives in
//! the shared [`Arena`]; nothing is ever unlinked or freed while the index
//! is alive, so the classic lock-free-list reclamation hazards do not arise.

use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crate::arena::Arena;
use crate::error::Result;
use crate::hash::murmur64;
use crate::key::EntryComparator;
use crate::prefix::PrefixExtractor;

mod iter;

pub use iter::HashLinkListIter;

/// A list node. Lives in the arena; never freed individually.
pub(crate) struct Node {
    entry: *const u8,
    entry_len: u32,
    next: AtomicPtr<Node>,
}

impl Node {
    /// The successor link.
    ///
    /// Acquire load, so we observe a fully initialized version of the
    /// returned node.
    #[inline]
    fn next(&self) -> *mut Node {
        self.next.load(Ordering::Acquire)
    }

    /// Publish `x` as the successor.
    ///
    /// Release store, so anybody who reads through this pointer observes a
    /// fully initialized version of the inserted node.
    #[inline]
    fn set_next(&self, x: *mut Node) {
        self.next.store(x, Ordering::Release)
    }

    /// Set the successor of a node that is not yet reachable. A relaxed
    /// store suffices; the barrier comes from the store that publishes the
    /// node itself.
    #[inline]
    fn init_next(&self, x: *mut Node) {
        self.next.store(x, Ordering::Relaxed)
    }

    #[inline]
    fn entry<'a>(&self) -> &'a [u8] {
        // Entry bytes are arena-backed and immutable after publication, so
        // the lifetime is bounded by the arena, not this borrow.
        unsafe { slice::from_raw_parts(self.entry, self.entry_len as usize) }
    }
}

pub(crate) struct Core {
    bucket_count: usize,
    /// Arena-allocated array of `bucket_count` head pointers.
    buckets: NonNull<AtomicPtr<Node>>,
    extractor: PrefixExtractor,
    comparator: Arc<dyn EntryComparator>,
    arena: Arc<Arena>,
}

// The bucket table and all nodes are arena-backed and follow the
// acquire/release link discipline above.
unsafe impl Send for Core {}
unsafe impl Sync for Core {}

impl Core {
    #[inline]
    fn slot(&self, prefix: &[u8]) -> usize {
        (murmur64(prefix, 0) % self.bucket_count as u64) as usize
    }

    #[inline]
    fn bucket(&self, slot: usize) -> &AtomicPtr<Node> {
        debug_assert!(slot < self.bucket_count);
        unsafe { &*self.buckets.as_ptr().add(slot) }
    }

    #[inline]
    pub(crate) fn bucket_head(&self, slot: usize) -> *mut Node {
        self.bucket(slot).load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn head_for_prefix(&self, prefix: &[u8]) -> *mut Node {
        self.bucket_head(self.slot(prefix))
    }

    pub(crate) fn head_for_user_key(&self, user_key: &[u8]) -> *mut Node {
        self.head_for_prefix(self.extractor.transform(user_key))
    }

    /// True iff `key` sorts strictly after `n`'s entry. A null node is
    /// treated as infinite by the callers.
    #[inline]
    fn key_is_after_node(&self, key: &[u8], n: &Node) -> bool {
        self.comparator.compare(n.entry(), key) == std::cmp::Ordering::Less
    }

    fn new_node(&self, entry: &[u8]) -> Result<NonNull<Node>> {
        let stored = self.arena.alloc_bytes(entry)?;
        let raw = self
            .arena
            .alloc(std::mem::size_of::<Node>(), std::mem::align_of::<Node>())?
            .cast::<Node>();
        unsafe {
            raw.as_ptr().write(Node {
                entry: stored.as_ptr() as *const u8,
                entry_len: entry.len() as u32,
                next: AtomicPtr::new(ptr::null_mut()),
            });
        }
        Ok(raw)
    }

    pub(crate) fn insert(&self, entry: &[u8]) -> Result<()> {
        debug_assert!(!self.contains(entry), "duplicate insert");
        let user_key = self.comparator.user_key(entry);
        let prefix = self.extractor.transform(user_key);
        let bucket = self.bucket(self.slot(prefix));
        let head = bucket.load(Ordering::Acquire);

        if head.is_null() {
            let node = self.new_node(entry)?;
            // The node's null successor was a relaxed store; the release
            // store of the head is the publication barrier.
            bucket.store(node.as_ptr(), Ordering::Release);
            return Ok(());
        }

        let mut prev: *mut Node = ptr::null_mut();
        let mut cur = head;
        while !cur.is_null() {
            let cur_ref = unsafe { &*cur };
            let next = cur_ref.next();
            // The list stays sorted; trivially satisfied at the head or a
            // null successor.
            debug_assert!(
                cur == head || next.is_null() || {
                    let next_ref = unsafe { &*next };
                    self.key_is_after_node(next_ref.entry(), cur_ref)
                }
            );
            if self.key_is_after_node(entry, cur_ref) {
                prev = cur;
                cur = next;
            } else {
                break;
            }
        }

        // Duplicate insertion is excluded by precondition.
        debug_assert!(
            cur.is_null()
                || self
                    .comparator
                    .compare(entry, unsafe { &*cur }.entry())
                    .is_ne()
        );

        let node = self.new_node(entry)?;
        let node_ref = unsafe { node.as_ref() };
        // Relaxed suffices; the release store below publishes the node.
        node_ref.init_next(cur);

        if prev.is_null() {
            bucket.store(node.as_ptr(), Ordering::Release);
        } else {
            unsafe { &*prev }.set_next(node.as_ptr());
        }
        Ok(())
    }

    pub(crate) fn contains(&self, entry: &[u8]) -> bool {
        let user_key = self.comparator.user_key(entry);
        let head = self.head_for_user_key(user_key);
        if head.is_null() {
            return false;
        }
        let found = self.find_ge_in_bucket(head, entry);
        !found.is_null() && self.comparator.compare(entry, unsafe { &*found }.entry()).is_eq()
    }

    /// First node in the bucket whose entry compares greater than or equal
    /// to `key`, or null.
    pub(crate) fn find_ge_in_bucket(&self, head: *mut Node, key: &[u8]) -> *mut Node {
        let mut x = head;
        while !x.is_null() {
            let x_ref = unsafe { &*x };
            let next = x_ref.next();
            debug_assert!(
                x == head || next.is_null() || {
                    let next_ref = unsafe { &*next };
                    self.key_is_after_node(next_ref.entry(), x_ref)
                }
            );
            if self.key_is_after_node(key, x_ref) {
                x = next;
            } else {
                break;
            }
        }
        x
    }

    pub(crate) fn comparator(&self) -> &Arc<dyn EntryComparator> {
        &self.comparator
    }

    pub(crate) fn extractor(&self) -> &PrefixExtractor {
        &self.extractor
    }
}

/// Configuration for the index: a prefix extractor and a bucket count.
///
/// The factory exists so the outer write buffer can be reconfigured without
/// reshaping the index type; [`create`](Self::create) binds a comparator and
/// an arena into a fresh, empty index.
#[derive(Clone, Debug)]
pub struct HashLinkListFactory {
    extractor: PrefixExtractor,
    bucket_count: usize,
}

impl HashLinkListFactory {
    /// Create a factory producing indexes with `bucket_count` buckets
    /// partitioned by `extractor`.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_count` is zero.
    pub fn new(extractor: PrefixExtractor, bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "bucket count must be positive");
        Self {
            extractor,
            bucket_count,
        }
    }

    /// The configured prefix extractor.
    pub fn extractor(&self) -> &PrefixExtractor {
        &self.extractor
    }

    /// The configured bucket count.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Build an empty index over `comparator` and `arena`, returning its
    /// write and read handles.
    ///
    /// The bucket table is allocated from `arena`; the only failure is arena
    /// exhaustion.
    pub fn create(
        &self,
        comparator: Arc<dyn EntryComparator>,
        arena: Arc<Arena>,
    ) -> Result<(WriteHandle, ReadHandle)> {
        let buckets = arena
            .alloc(
                self.bucket_count * std::mem::size_of::<AtomicPtr<Node>>(),
                std::mem::align_of::<AtomicPtr<Node>>(),
            )?
            .cast::<AtomicPtr<Node>>();
        // Plain initialization; no reader exists before this returns.
        for i in 0..self.bucket_count {
            unsafe {
                buckets.as_ptr().add(i).write(AtomicPtr::new(ptr::null_mut()));
            }
        }

        let core = Arc::new(Core {
            bucket_count: self.bucket_count,
            buckets,
            extractor: self.extractor.clone(),
            comparator,
            arena,
        });
        Ok((
            WriteHandle { core: core.clone() },
            ReadHandle { core },
        ))
    }
}

/// The writing side of an index. Not clonable; `insert` takes `&mut self`,
/// so exactly one writer exists at a time.
pub struct WriteHandle {
    core: Arc<Core>,
}

impl WriteHandle {
    /// Insert an encoded entry, copying its bytes into the arena.
    ///
    /// The entry must not already be present and its user key must be in the
    /// extractor's domain; both are contract violations checked in debug
    /// builds. The only runtime failure is arena exhaustion.
    pub fn insert(&mut self, entry: &[u8]) -> Result<()> {
        self.core.insert(entry)
    }

    /// Whether an entry comparing equal to `entry` is present.
    pub fn contains(&self, entry: &[u8]) -> bool {
        self.core.contains(entry)
    }

    /// Always zero; memory is accounted by the arena.
    pub fn approximate_memory_usage(&self) -> usize {
        0
    }
}

/// The reading side of an index: clonable, shareable across threads, and
/// strictly non-mutating.
#[derive(Clone)]
pub struct ReadHandle {
    core: Arc<Core>,
}

impl ReadHandle {
    /// Whether an entry comparing equal to `entry` is present.
    ///
    /// A lookup racing the writer may miss an in-flight insert; callers
    /// needing insert-then-read visibility must synchronize externally.
    pub fn contains(&self, entry: &[u8]) -> bool {
        self.core.contains(entry)
    }

    /// The fixed number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.core.bucket_count
    }

    /// Always zero; memory is accounted by the arena.
    pub fn approximate_memory_usage(&self) -> usize {
        0
    }

    /// An iterator over the single bucket `prefix` hashes to, or the empty
    /// iterator if that bucket has no entries.
    ///
    /// Buckets may hold entries of several prefixes that hash-collide;
    /// consumers filter by prefix themselves. The iterator starts invalid;
    /// position it with `seek`.
    pub fn prefix_iter(&self, prefix: &[u8]) -> HashLinkListIter<'_> {
        let head = self.core.head_for_prefix(prefix);
        if head.is_null() {
            HashLinkListIter::empty()
        } else {
            HashLinkListIter::bucket(&self.core, head)
        }
    }

    /// [`prefix_iter`](Self::prefix_iter) for the extracted prefix of
    /// `user_key`.
    pub fn key_prefix_iter(&self, user_key: &[u8]) -> HashLinkListIter<'_> {
        self.prefix_iter(self.core.extractor().transform(user_key))
    }

    /// An iterator that re-homes to the right bucket on every `seek`,
    /// letting one iterator serve many disjoint prefix probes.
    pub fn dynamic_prefix_iter(&self) -> HashLinkListIter<'_> {
        HashLinkListIter::dynamic(&self.core)
    }

    /// A materialized total-order view over all buckets.
    ///
    /// Building walks every bucket into an ordered auxiliary list keyed by
    /// the comparator; the build must not run concurrently with the writer.
    /// The result is a snapshot in ordering, not in data: it supports every
    /// cursor operation, including `prev` and `seek_to_last`.
    pub fn sorted_iter(&self) -> HashLinkListIter<'_> {
        HashLinkListIter::full_order(&self.core)
    }
}

#[cfg(test)]
impl ReadHandle {
    /// Snapshot of the entries in bucket `i`, in list order.
    pub(crate) fn bucket_entries(&self, i: usize) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut node = self.core.bucket_head(i);
        while !node.is_null() {
            let n = unsafe { &*node };
            out.push(n.entry().to_vec());
            node = n.next();
        }
        out
    }
}
