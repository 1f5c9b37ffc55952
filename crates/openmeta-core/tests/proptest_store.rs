//! Property-based tests for the arena and the store index.

use openmeta_core::{
    ByteArena, Entry, EntryOrigin, MetaKey, MetaKeyView, MetaStore, MetaValue,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Spans handed out by the arena survive arbitrary later growth.
    #[test]
    fn arena_spans_are_stable(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..32)
    ) {
        let mut arena = ByteArena::new();
        let mut spans = Vec::new();
        for chunk in &chunks {
            spans.push((arena.append(chunk).unwrap(), chunk.clone()));
        }
        for (span, expected) in &spans {
            prop_assert_eq!(arena.span(*span), expected.as_slice());
        }
    }

    /// `find_all` returns exactly the entries inserted under a key, in
    /// insertion order, and finalize is idempotent.
    #[test]
    fn find_all_is_complete_and_ordered(
        tags in prop::collection::vec((0u16..8, 0u16..8), 1..64)
    ) {
        let mut store = MetaStore::new();
        let block = store.add_block(Default::default()).unwrap();
        let tokens = ["ifd0", "ifd1", "exififd", "gpsifd", "interopifd", "subifd0", "subifd1", "mk0"];

        for (i, &(token_index, tag)) in tags.iter().enumerate() {
            let ifd = store.arena_mut().append_str(tokens[token_index as usize]).unwrap();
            store.add_entry(Entry {
                key: MetaKey::ExifTag { ifd, tag },
                value: MetaValue::u32(i as u32),
                origin: EntryOrigin::in_block(block, i as u32),
                flags: Default::default(),
            });
        }
        store.finalize();

        for &(token_index, tag) in &tags {
            let view = MetaKeyView::ExifTag { ifd: tokens[token_index as usize], tag };
            let hits = store.find_all(&view).to_vec();
            let expected: Vec<usize> = tags
                .iter()
                .enumerate()
                .filter(|(_, &candidate)| candidate == (token_index, tag))
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(hits.len(), expected.len());
            for (hit, index) in hits.iter().zip(&expected) {
                prop_assert_eq!(hit.index(), *index);
            }
        }

        // Second finalize changes nothing.
        let view = MetaKeyView::ExifTag { ifd: tokens[tags[0].0 as usize], tag: tags[0].1 };
        let before = store.find_all(&view).to_vec();
        store.finalize();
        prop_assert_eq!(store.find_all(&view), before.as_slice());
    }
}
