//! Prefix extraction over user keys.
//!
//! A [`PrefixExtractor`] maps a user key to the prefix that decides its
//! bucket. The three variants form a closed set, so they are a plain enum
//! rather than a trait object. The `name` strings are persisted by outer
//! collaborators to validate compatibility with on-disk artifacts; changing
//! them is a breaking format change.

/// Maps user keys to prefixes, with predicates describing its domain, range,
/// and append-stability.
#[derive(Clone, Debug)]
pub enum PrefixExtractor {
    /// The first `len` bytes of the key. Keys shorter than `len` are outside
    /// the domain.
    Fixed {
        /// Prefix length in bytes.
        len: usize,
        /// Persisted identifier, `rocksdb.FixedPrefix.<len>`.
        name: String,
    },
    /// The first `min(len, key_len)` bytes of the key; every key is in the
    /// domain.
    Capped {
        /// Prefix length cap in bytes.
        len: usize,
        /// Persisted identifier, `rocksdb.CappedPrefix.<len>`.
        name: String,
    },
    /// The key itself.
    Noop,
}

impl PrefixExtractor {
    /// Fixed-length prefix of `len` bytes.
    pub fn fixed(len: usize) -> Self {
        PrefixExtractor::Fixed {
            len,
            name: format!("rocksdb.FixedPrefix.{}", len),
        }
    }

    /// Prefix capped at `len` bytes.
    pub fn capped(len: usize) -> Self {
        PrefixExtractor::Capped {
            len,
            name: format!("rocksdb.CappedPrefix.{}", len),
        }
    }

    /// Identity extraction.
    pub fn noop() -> Self {
        PrefixExtractor::Noop
    }

    /// Stable identifier, persisted by collaborators for compatibility
    /// checks.
    pub fn name(&self) -> &str {
        match self {
            PrefixExtractor::Fixed { name, .. } | PrefixExtractor::Capped { name, .. } => name,
            PrefixExtractor::Noop => "rocksdb.Noop",
        }
    }

    /// The prefix of `src`. Borrows from `src`; never allocates.
    ///
    /// Calling this on a key outside [`in_domain`](Self::in_domain) is a
    /// contract violation, checked in debug builds.
    #[inline]
    pub fn transform<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        debug_assert!(self.in_domain(src));
        match *self {
            PrefixExtractor::Fixed { len, .. } => &src[..len],
            PrefixExtractor::Capped { len, .. } => &src[..len.min(src.len())],
            PrefixExtractor::Noop => src,
        }
    }

    /// Whether [`transform`](Self::transform) is defined for `src`.
    #[inline]
    pub fn in_domain(&self, src: &[u8]) -> bool {
        match *self {
            PrefixExtractor::Fixed { len, .. } => src.len() >= len,
            PrefixExtractor::Capped { .. } | PrefixExtractor::Noop => true,
        }
    }

    /// Whether `dst` could have been produced by
    /// [`transform`](Self::transform).
    #[inline]
    pub fn in_range(&self, dst: &[u8]) -> bool {
        match *self {
            PrefixExtractor::Fixed { len, .. } => dst.len() == len,
            PrefixExtractor::Capped { len, .. } => dst.len() <= len,
            PrefixExtractor::Noop => true,
        }
    }

    /// Whether appending any suffix to `prefix` leaves its transform
    /// unchanged.
    #[inline]
    pub fn same_result_when_appended(&self, prefix: &[u8]) -> bool {
        match *self {
            PrefixExtractor::Fixed { len, .. } | PrefixExtractor::Capped { len, .. } => {
                prefix.len() >= len
            }
            PrefixExtractor::Noop => false,
        }
    }
}
