//! The comparator boundary between the index and the outer write buffer.
//!
//! The index never interprets entry bytes itself; the total order, the
//! user-key region, and seek-key construction all come through
//! [`EntryComparator`]. This is the one seam where calling code may
//! inject behavior; the bundled [`BytewiseComparator`] implements the layout
//! from [`encoding`](crate::encoding).

use std::cmp::Ordering;

use crate::encoding::{
    encode_varint32, entry_internal_key, entry_user_key, pack_trailer, EntryKind, MAX_SEQUENCE,
    TRAILER_LEN,
};

/// Decodes and orders memtable-encoded entries.
///
/// `compare` must define a strict total order that agrees with the outer
/// write buffer's notion of key order; the sorted-bucket invariant of the
/// index rests on it.
pub trait EntryComparator: Send + Sync + 'static {
    /// Three-way comparison of two encoded entries.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// The user-key portion of an encoded entry.
    fn user_key<'e>(&self, entry: &'e [u8]) -> &'e [u8];

    /// Encode a bare user key into the form `compare` understands, using
    /// `buf` as scratch storage.
    ///
    /// The encoded key must sort at-or-before every stored entry carrying
    /// the same user key, so a find-greater-or-equal lands on the first of
    /// them.
    fn encode_seek_key<'b>(&self, user_key: &[u8], buf: &'b mut Vec<u8>) -> &'b [u8];
}

/// Entry order for the bundled encoding: user key ascending bytewise, then
/// trailer descending, so newer sequence numbers come first.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytewiseComparator;

impl BytewiseComparator {
    fn split(entry: &[u8]) -> (&[u8], u64) {
        let ikey = entry_internal_key(entry);
        let (ukey, tail) = ikey.split_at(ikey.len() - TRAILER_LEN);
        (ukey, u64::from_le_bytes(tail.try_into().unwrap()))
    }
}

impl EntryComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let (akey, atrailer) = Self::split(a);
        let (bkey, btrailer) = Self::split(b);
        akey.cmp(bkey).then_with(|| btrailer.cmp(&atrailer))
    }

    fn user_key<'e>(&self, entry: &'e [u8]) -> &'e [u8] {
        entry_user_key(entry)
    }

    fn encode_seek_key<'b>(&self, user_key: &[u8], buf: &'b mut Vec<u8>) -> &'b [u8] {
        buf.clear();
        encode_varint32(buf, (user_key.len() + TRAILER_LEN) as u32);
        buf.extend_from_slice(user_key);
        buf.extend_from_slice(&pack_trailer(MAX_SEQUENCE, EntryKind::Value).to_le_bytes());
        buf
    }
}
