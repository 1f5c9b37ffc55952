//! Property-based tests: scanners and the reassembler must never panic or
//! read out of bounds, whatever the input.

use openmeta_scan::{
    extract_payload, scan_auto, scan_bmff, scan_gif, scan_jp2, scan_jpeg, scan_jxl, scan_png,
    scan_tiff, scan_webp, ContainerBlockRef, PayloadOptions,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Auto-detection should not panic on arbitrary data.
    #[test]
    fn scan_auto_no_panic(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut blocks = [ContainerBlockRef::default(); 16];
        let _ = scan_auto(&data, &mut blocks);
    }

    /// Every per-format scanner should not panic on arbitrary data.
    #[test]
    fn format_scanners_no_panic(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut blocks = [ContainerBlockRef::default(); 16];
        let _ = scan_jpeg(&data, &mut blocks);
        let _ = scan_png(&data, &mut blocks);
        let _ = scan_webp(&data, &mut blocks);
        let _ = scan_gif(&data, &mut blocks);
        let _ = scan_tiff(&data, &mut blocks);
        let _ = scan_jp2(&data, &mut blocks);
        let _ = scan_jxl(&data, &mut blocks);
        let _ = scan_bmff(&data, &mut blocks);
    }

    /// Scanners with a valid magic prefix exercise deeper paths.
    #[test]
    fn jpeg_with_magic_no_panic(tail in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut data = vec![0xFF, 0xD8, 0xFF];
        data.extend(tail);
        let mut blocks = [ContainerBlockRef::default(); 16];
        let _ = scan_jpeg(&data, &mut blocks);
    }

    #[test]
    fn tiff_with_magic_no_panic(tail in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut data = b"II\x2A\x00".to_vec();
        data.extend(tail);
        let mut blocks = [ContainerBlockRef::default(); 16];
        let _ = scan_tiff(&data, &mut blocks);
    }

    /// Extraction over scanner-produced blocks stays in bounds for any
    /// input and any (possibly zero-sized) scratch.
    #[test]
    fn extract_over_scanned_blocks_no_panic(
        data in prop::collection::vec(any::<u8>(), 0..2048),
        out_len in 0usize..64,
    ) {
        let mut blocks = [ContainerBlockRef::default(); 16];
        let scan = scan_auto(&data, &mut blocks);
        let mut out = vec![0u8; out_len];
        let mut parts = [0u32; 16];
        for i in 0..scan.written {
            let _ = extract_payload(&data, &blocks[..scan.written as usize], i, &mut out, &mut parts, &PayloadOptions::new());
        }
    }

    /// Extraction with adversarial block refs (not scanner output) must
    /// still be bounds-safe.
    #[test]
    fn extract_with_arbitrary_block_no_panic(
        data in prop::collection::vec(any::<u8>(), 0..256),
        data_offset in any::<u64>(),
        data_size in any::<u64>(),
        chunking_raw in 0u8..8,
    ) {
        use openmeta_scan::BlockChunking;
        let chunking = match chunking_raw {
            0 => BlockChunking::None,
            1 => BlockChunking::JpegApp2SeqTotal,
            2 => BlockChunking::JpegXmpExtendedGuidOffset,
            3 => BlockChunking::GifSubBlocks,
            4 => BlockChunking::BmffExifTiffOffsetU32Be,
            5 => BlockChunking::BrobU32BeRealTypePrefix,
            6 => BlockChunking::Jp2UuidPayload,
            _ => BlockChunking::PsIrB8Bim,
        };
        let block = ContainerBlockRef {
            chunking,
            data_offset,
            data_size,
            ..Default::default()
        };
        let mut out = [0u8; 32];
        let mut parts = [0u32; 4];
        let _ = extract_payload(
            &data,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut parts,
            &PayloadOptions::new(),
        );
    }
}
