//! High-level read helper: scan, reassemble, dispatch.

use openmeta_core::{EntryFlags, MetaStore, Status};
use openmeta_exif::{
    decode_crw_ciff, decode_exif_tiff, CiffDecodeResult, ExifDecodeOptions, ExifDecodeResult,
    ExifIfdRef,
};
use openmeta_exr::{decode_exr_header, ExrDecodeOptions, ExrDecodeResult};
use openmeta_icc::{decode_icc_profile, IccDecodeOptions, IccDecodeResult};
use openmeta_iptc::{decode_iptc_iim, IptcIimDecodeOptions, IptcIimDecodeResult};
use openmeta_irb::{decode_photoshop_irb, PhotoshopIrbDecodeOptions, PhotoshopIrbDecodeResult};
use openmeta_jumbf::{decode_jumbf_payload, JumbfDecodeOptions, JumbfDecodeResult};
use openmeta_scan::{
    extract_payload, is_secondary_part, scan_auto, ContainerBlockKind, ContainerBlockRef,
    PayloadOptions, PayloadResult, ScanResult,
};
use openmeta_xmp::{decode_xmp_packet, XmpDecodeOptions, XmpDecodeResult};

/// Aggregated result of [`simple_meta_read`]: one status record per
/// decoder family. Counters accumulate across all blocks of a family; the
/// family status is the monotonic merge of the per-block statuses.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct SimpleMetaResult {
    pub scan: ScanResult,
    pub payload: PayloadResult,
    pub exif: ExifDecodeResult,
    pub xmp: XmpDecodeResult,
    pub icc: IccDecodeResult,
    pub iptc: IptcIimDecodeResult,
    pub irb: PhotoshopIrbDecodeResult,
    pub exr: ExrDecodeResult,
    pub jumbf: JumbfDecodeResult,
    pub ciff: CiffDecodeResult,
}

fn merge_exif(total: &mut ExifDecodeResult, part: ExifDecodeResult) {
    total.status.absorb(part.status);
    total.ifds_written += part.ifds_written;
    total.ifds_needed += part.ifds_needed;
    total.entries_decoded += part.entries_decoded;
}

fn merge_payload(total: &mut PayloadResult, part: PayloadResult) {
    total.status.absorb(part.status);
    total.written = total.written.max(part.written);
    total.needed = total.needed.max(part.needed);
}

const EXR_MAGIC_LE: [u8; 4] = 20000630u32.to_le_bytes();

fn is_bare_tiff(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let version = match (bytes[0], bytes[1]) {
        (0x49, 0x49) => u16::from_le_bytes([bytes[2], bytes[3]]),
        (0x4D, 0x4D) => u16::from_be_bytes([bytes[2], bytes[3]]),
        _ => return false,
    };
    version == 42 || version == 43
}

fn is_bare_exr(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == EXR_MAGIC_LE
}

fn is_bare_crw(bytes: &[u8]) -> bool {
    bytes.len() >= 14
        && matches!((bytes[0], bytes[1]), (0x49, 0x49) | (0x4D, 0x4D))
        && &bytes[6..14] == b"HEAPCCDR"
}

fn is_bare_jumbf(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && &bytes[4..8] == b"jumb"
}

/// Strip the u32-BE TIFF-offset prefix of a decompressed BMFF Exif
/// payload.
fn strip_exif_offset_prefix(payload: &[u8]) -> Option<&[u8]> {
    if payload.len() < 4 {
        return None;
    }
    let offset = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    if offset >= payload.len() {
        return None;
    }
    Some(&payload[offset..])
}

/// Scan a file and decode every supported metadata payload into `store`.
///
/// All scratch is caller-provided: `out_blocks` receives scanner output,
/// `out_ifds` decoded IFD refs, `payload` reassembled payload bytes and
/// `parts_scratch` multi-part index bookkeeping. When a result reports
/// `OutputTruncated`, re-provision the corresponding scratch using the
/// `needed` counter and call again.
///
/// The store is re-finalized before returning, so lookups work
/// immediately.
#[allow(clippy::too_many_arguments)]
pub fn simple_meta_read(
    file_bytes: &[u8],
    store: &mut MetaStore,
    out_blocks: &mut [ContainerBlockRef],
    out_ifds: &mut [ExifIfdRef],
    payload: &mut [u8],
    parts_scratch: &mut [u32],
    exif_options: &ExifDecodeOptions,
    payload_options: &PayloadOptions,
) -> SimpleMetaResult {
    let mut result = SimpleMetaResult {
        scan: scan_auto(file_bytes, out_blocks),
        ..Default::default()
    };

    let blocks: &[ContainerBlockRef] = &out_blocks[..result.scan.written as usize];
    let mut exif_block_seen = false;

    for index in 0..blocks.len() {
        let block = blocks[index];
        let decodable = matches!(
            block.kind,
            ContainerBlockKind::Exif
                | ContainerBlockKind::Xmp
                | ContainerBlockKind::XmpExtended
                | ContainerBlockKind::Icc
                | ContainerBlockKind::IptcIim
                | ContainerBlockKind::PhotoshopIrB
                | ContainerBlockKind::Jumbf
                | ContainerBlockKind::CompressedMetadata
        );
        if !decodable {
            continue;
        }
        // Multi-part streams are extracted once, at their first part.
        if is_secondary_part(blocks, index) {
            continue;
        }
        if block.kind == ContainerBlockKind::Exif {
            exif_block_seen = true;
        }

        let extracted = extract_payload(
            file_bytes,
            blocks,
            index as u32,
            payload,
            parts_scratch,
            payload_options,
        );
        merge_payload(&mut result.payload, extracted);
        if extracted.status != Status::Ok {
            // Unsupported (missing codec), truncated or malformed payloads
            // are skipped; other blocks may still decode.
            continue;
        }
        let bytes = &payload[..extracted.written as usize];

        match block.kind {
            ContainerBlockKind::Exif => {
                merge_exif(
                    &mut result.exif,
                    decode_exif_tiff(bytes, store, out_ifds, exif_options),
                );
            }
            ContainerBlockKind::Xmp | ContainerBlockKind::XmpExtended => {
                let xmp = decode_xmp_packet(
                    bytes,
                    store,
                    EntryFlags::default(),
                    &XmpDecodeOptions::default(),
                );
                result.xmp.status.absorb(xmp.status);
                result.xmp.entries_decoded += xmp.entries_decoded;
            }
            ContainerBlockKind::Icc => {
                let icc = decode_icc_profile(bytes, store, &IccDecodeOptions::default());
                result.icc.status.absorb(icc.status);
                result.icc.entries_decoded += icc.entries_decoded;
            }
            ContainerBlockKind::IptcIim => {
                let iptc = decode_iptc_iim(
                    bytes,
                    store,
                    EntryFlags::default(),
                    &IptcIimDecodeOptions::default(),
                );
                result.iptc.status.absorb(iptc.status);
                result.iptc.entries_decoded += iptc.entries_decoded;
            }
            ContainerBlockKind::PhotoshopIrB => {
                let irb =
                    decode_photoshop_irb(bytes, store, &PhotoshopIrbDecodeOptions::default());
                result.irb.status.absorb(irb.status);
                result.irb.resources_decoded += irb.resources_decoded;
                result.irb.entries_decoded += irb.entries_decoded;
                result.irb.iptc_entries_decoded += irb.iptc_entries_decoded;
            }
            ContainerBlockKind::Jumbf => {
                let jumbf = decode_jumbf_payload(
                    bytes,
                    store,
                    EntryFlags::default(),
                    &JumbfDecodeOptions::default(),
                );
                result.jumbf.status.absorb(jumbf.status);
                result.jumbf.boxes_decoded += jumbf.boxes_decoded;
                result.jumbf.cbor_items += jumbf.cbor_items;
                result.jumbf.entries_decoded += jumbf.entries_decoded;
            }
            ContainerBlockKind::CompressedMetadata => {
                // The real box type only became known after decompression.
                match &block.aux_u32.to_be_bytes() {
                    b"Exif" => {
                        exif_block_seen = true;
                        if let Some(tiff) = strip_exif_offset_prefix(bytes) {
                            merge_exif(
                                &mut result.exif,
                                decode_exif_tiff(tiff, store, out_ifds, exif_options),
                            );
                        } else {
                            result.exif.status.absorb(Status::Malformed);
                        }
                    }
                    b"xml " => {
                        let xmp = decode_xmp_packet(
                            bytes,
                            store,
                            EntryFlags::default(),
                            &XmpDecodeOptions::default(),
                        );
                        result.xmp.status.absorb(xmp.status);
                        result.xmp.entries_decoded += xmp.entries_decoded;
                    }
                    b"jumb" => {
                        let jumbf = decode_jumbf_payload(
                            bytes,
                            store,
                            EntryFlags::default(),
                            &JumbfDecodeOptions::default(),
                        );
                        result.jumbf.status.absorb(jumbf.status);
                        result.jumbf.boxes_decoded += jumbf.boxes_decoded;
                        result.jumbf.cbor_items += jumbf.cbor_items;
                        result.jumbf.entries_decoded += jumbf.entries_decoded;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Bare-format fallbacks: formats whose whole file is the stream.
    if is_bare_tiff(file_bytes) && !exif_block_seen {
        merge_exif(
            &mut result.exif,
            decode_exif_tiff(file_bytes, store, out_ifds, exif_options),
        );
    }
    if is_bare_exr(file_bytes) {
        result.exr = decode_exr_header(
            file_bytes,
            store,
            EntryFlags::default(),
            &ExrDecodeOptions::default(),
        );
    }
    if is_bare_crw(file_bytes) {
        result.ciff = decode_crw_ciff(file_bytes, store, &exif_options.limits);
    }
    if result.scan.status == Status::Unsupported && is_bare_jumbf(file_bytes) {
        result.jumbf = decode_jumbf_payload(
            file_bytes,
            store,
            EntryFlags::default(),
            &JumbfDecodeOptions::default(),
        );
    }

    store.finalize();
    result
}
