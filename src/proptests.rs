use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::arena::Arena;
use crate::encoding::{encode_entry, EntryKind};
use crate::hash::murmur64;
use crate::key::{BytewiseComparator, EntryComparator};
use crate::prefix::PrefixExtractor;
use crate::rep::{HashLinkListFactory, ReadHandle, WriteHandle};

/// Wrapper for user-key generation with collision-heavy strategies.
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Tiny alphabet, short keys: heavy prefix sharing and bucket
            // collisions.
            prop::collection::vec(97u8..100, 0..6).prop_map(Key),
            // Keys behind a shared stem.
            "[a-c]{1,3}".prop_map(|s| {
                let mut key = b"stem/".to_vec();
                key.extend_from_slice(s.as_bytes());
                Key(key)
            }),
            // Spread-out keys.
            any::<u16>().prop_map(|n| Key(format!("key{:05}", n).into_bytes())),
        ]
        .boxed()
    }
}

/// Actions driven against both the index and the model.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(Key),
    /// Probe a user key at a sequence number that is never allocated, so
    /// membership must come back false.
    ProbeAbsent(Key),
}

#[derive(Debug, Clone)]
enum ExtractorChoice {
    Fixed(usize),
    Capped(usize),
    Noop,
}

impl ExtractorChoice {
    fn build(&self) -> PrefixExtractor {
        match *self {
            ExtractorChoice::Fixed(len) => PrefixExtractor::fixed(len),
            ExtractorChoice::Capped(len) => PrefixExtractor::capped(len),
            ExtractorChoice::Noop => PrefixExtractor::noop(),
        }
    }
}

impl Arbitrary for ExtractorChoice {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            (1usize..=4).prop_map(ExtractorChoice::Fixed),
            (0usize..=4).prop_map(ExtractorChoice::Capped),
            Just(ExtractorChoice::Noop),
        ]
        .boxed()
    }
}

/// Harness executing actions against the index and a `BTreeMap` model
/// ordered the way the bytewise comparator orders entries: user key
/// ascending, sequence descending.
struct Test {
    writer: WriteHandle,
    reader: ReadHandle,
    extractor: PrefixExtractor,
    model: BTreeMap<(Vec<u8>, std::cmp::Reverse<u64>), Vec<u8>>,
    next_seq: u64,
}

impl Test {
    fn new(choice: &ExtractorChoice, bucket_count: usize) -> Self {
        let extractor = choice.build();
        let (writer, reader) = HashLinkListFactory::new(extractor.clone(), bucket_count)
            .create(Arc::new(BytewiseComparator), Arc::new(Arena::new()))
            .unwrap();
        Self {
            writer,
            reader,
            extractor,
            model: BTreeMap::new(),
            next_seq: 1,
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(Key(user_key)) => {
                if !self.extractor.in_domain(&user_key) {
                    return;
                }
                let seq = self.next_seq;
                self.next_seq += 1;
                let mut buf = Vec::new();
                let entry =
                    encode_entry(&mut buf, &user_key, seq, EntryKind::Value, b"").to_vec();
                self.writer.insert(&entry).unwrap();
                assert!(
                    self.reader.contains(&entry),
                    "inserted entry not visible: key={:?} seq={}",
                    user_key,
                    seq
                );
                self.model
                    .insert((user_key, std::cmp::Reverse(seq)), entry);
            }
            Action::ProbeAbsent(Key(user_key)) => {
                if !self.extractor.in_domain(&user_key) {
                    return;
                }
                // Sequence 0 is never handed out by this harness.
                let mut buf = Vec::new();
                let probe = encode_entry(&mut buf, &user_key, 0, EntryKind::Value, b"");
                assert!(
                    !self.reader.contains(probe),
                    "membership for a never-inserted entry: key={:?}",
                    user_key
                );
            }
        }
    }

    fn check_invariants(&self) {
        let cmp = BytewiseComparator;
        let buckets = self.reader.bucket_count();

        let mut total = 0;
        for slot in 0..buckets {
            let chain = self.reader.bucket_entries(slot);
            total += chain.len();

            // Successor chains are strictly increasing under the comparator.
            for pair in chain.windows(2) {
                assert!(
                    cmp.compare(&pair[0], &pair[1]).is_lt(),
                    "bucket {} chain out of order",
                    slot
                );
            }

            // Every entry sits in the bucket its prefix hashes to.
            for entry in &chain {
                let prefix = self.extractor.transform(cmp.user_key(entry));
                let expected = (murmur64(prefix, 0) % buckets as u64) as usize;
                assert_eq!(expected, slot, "entry hashed to the wrong bucket");
            }
        }
        assert_eq!(total, self.model.len(), "entry count mismatch");

        // Membership stays true for everything inserted.
        for entry in self.model.values() {
            assert!(self.reader.contains(entry));
        }

        // The materialized view visits exactly the model, in model order.
        let mut it = self.reader.sorted_iter();
        it.seek_to_first();
        let mut expected = self.model.values();
        while it.valid() {
            assert_eq!(
                it.key(),
                expected.next().map(|e| e.as_slice()),
                "total-order iteration diverged from the model"
            );
            it.next();
        }
        assert_eq!(expected.next(), None, "total-order iteration ended early");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_index_vs_model(
        choice in any::<ExtractorChoice>(),
        bucket_count in 1usize..=8,
        actions in prop::collection::vec(any::<Action>(), 1..64),
    ) {
        let mut test = Test::new(&choice, bucket_count);
        for action in actions {
            test.execute(action);
        }
        test.check_invariants();
    }

    #[test]
    fn proptest_capped_idempotent_at_cap(
        key in prop::collection::vec(any::<u8>(), 0..16),
        suffix in prop::collection::vec(any::<u8>(), 0..8),
        cap in 1usize..8,
    ) {
        let t = PrefixExtractor::capped(cap);
        let p = t.transform(&key).to_vec();
        if p.len() == cap {
            let mut appended = p.clone();
            appended.extend_from_slice(&suffix);
            prop_assert_eq!(t.transform(&appended), &p[..]);
        }
    }

    #[test]
    fn proptest_fixed_range_of_transform(
        key in prop::collection::vec(any::<u8>(), 0..16),
        len in 1usize..8,
    ) {
        let t = PrefixExtractor::fixed(len);
        if t.in_domain(&key) {
            prop_assert!(t.in_range(t.transform(&key)));
        }
    }
}
