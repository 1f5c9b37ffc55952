//! Property-based tests over the whole read pipeline.

use openmeta::{
    decode_exr_header, decode_iptc_iim, decode_jumbf_payload, decode_xmp_packet, simple_meta_read,
    ContainerBlockRef, EntryFlags, ExifDecodeOptions, ExifIfdRef, ExrDecodeOptions,
    IptcIimDecodeOptions, JumbfDecodeOptions, MetaStore, PayloadOptions, XmpDecodeOptions,
};
use proptest::prelude::*;

fn read(file: &[u8]) -> MetaStore {
    let mut store = MetaStore::new();
    let mut blocks = vec![ContainerBlockRef::default(); 32];
    let mut ifds = vec![ExifIfdRef::default(); 16];
    let mut payload = vec![0u8; 4096];
    let mut parts = vec![0u32; 32];
    let _ = simple_meta_read(
        file,
        &mut store,
        &mut blocks,
        &mut ifds,
        &mut payload,
        &mut parts,
        &ExifDecodeOptions::default(),
        &PayloadOptions::new(),
    );
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The whole pipeline should not panic on arbitrary bytes.
    #[test]
    fn simple_meta_read_no_panic(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let _ = read(&data);
    }

    /// With common container magics prepended, deeper paths still hold.
    #[test]
    fn simple_meta_read_with_magics_no_panic(tail in prop::collection::vec(any::<u8>(), 0..1024)) {
        for prefix in [
            &[0xFF, 0xD8][..],
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A][..],
            b"II\x2A\x00",
            b"GIF89a",
            b"RIFF\x20\x00\x00\x00WEBP",
            &20000630u32.to_le_bytes(),
        ] {
            let mut data = prefix.to_vec();
            data.extend_from_slice(&tail);
            let _ = read(&data);
        }
    }

    /// Reading the same bytes twice into fresh stores yields the same
    /// entry count in the same order.
    #[test]
    fn repeated_reads_are_identical(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let first = read(&data);
        let second = read(&data);
        prop_assert_eq!(first.entry_count(), second.entry_count());
        for (a, b) in first.entries().iter().zip(second.entries()) {
            prop_assert_eq!(first.key_view(&a.key), second.key_view(&b.key));
        }
    }

    /// Individual decoders should not panic on arbitrary bytes.
    #[test]
    fn leaf_decoders_no_panic(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut store = MetaStore::new();
        let _ = decode_xmp_packet(&data, &mut store, EntryFlags::default(), &XmpDecodeOptions::default());
        let _ = decode_iptc_iim(&data, &mut store, EntryFlags::default(), &IptcIimDecodeOptions::default());
        let _ = decode_exr_header(&data, &mut store, EntryFlags::default(), &ExrDecodeOptions::default());
        let _ = decode_jumbf_payload(&data, &mut store, EntryFlags::default(), &JumbfDecodeOptions::default());
    }
}
