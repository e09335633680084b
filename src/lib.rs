//! # memlink
//!
//! The in-memory write buffer index of a log-structured key-value store: a
//! prefix-partitioned, append-only multiset of byte-encoded entries, built
//! as a fixed-size hash table of sorted lock-free linked lists.
//!
//! ## Features
//!
//! - **Prefix partitioning**: a pluggable [`PrefixExtractor`] (fixed-length,
//!   capped-length, or identity) decides which bucket a key belongs to
//! - **Lock-free reads**: one writer and any number of readers proceed
//!   without locks, synchronized only by acquire/release link publication
//! - **Arena-backed**: nodes, entry bytes, and the bucket table live in a
//!   shared bump [`Arena`]; the index owns nothing and never frees a node
//! - **Iterator family**: per-bucket prefix scans, a re-homing dynamic
//!   prefix cursor, and a materialized total-order snapshot view
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use memlink::encoding::{encode_entry, EntryKind};
//! use memlink::{Arena, BytewiseComparator, HashLinkListFactory, PrefixExtractor};
//!
//! let factory = HashLinkListFactory::new(PrefixExtractor::fixed(4), 1024);
//! let (mut writer, reader) =
//!     factory.create(Arc::new(BytewiseComparator), Arc::new(Arena::new()))?;
//!
//! let mut buf = Vec::new();
//! writer.insert(encode_entry(&mut buf, b"user:1001", 1, EntryKind::Value, b"v1"))?;
//!
//! assert!(reader.contains(encode_entry(&mut buf, b"user:1001", 1, EntryKind::Value, b"v1")));
//!
//! let mut iter = reader.dynamic_prefix_iter();
//! iter.seek(b"user:1001", None);
//! assert!(iter.valid());
//! # Ok::<(), memlink::Error>(())
//! ```
//!
//! ## Concurrency contract
//!
//! The index permits exactly one writer and arbitrarily many readers. The
//! factory hands out a single non-clonable [`WriteHandle`]; readers get a
//! clonable [`ReadHandle`]. A reader racing an insert may or may not see
//! the new entry; callers needing insert-then-read visibility establish it
//! externally (the outer write buffer's sequence publication, typically).
//! The materialized total-order iterator must be built while no writer
//! runs.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod encoding;
pub mod key;
pub mod prefix;
pub mod rep;

mod error;
mod hash;

pub use arena::Arena;
pub use error::{Error, Result};
pub use key::{BytewiseComparator, EntryComparator};
pub use prefix::PrefixExtractor;
pub use rep::{HashLinkListFactory, HashLinkListIter, ReadHandle, WriteHandle};

#[cfg(test)]
mod proptests;
