//! JPEG marker-segment scanner.
//!
//! JPEG files are a sequence of `0xFF`-prefixed marker segments:
//! - SOI (0xFFD8) - Start of Image
//! - APP1 (0xFFE1) - EXIF, XMP, or extended XMP
//! - APP2 (0xFFE2) - ICC profile chunks, MPF
//! - APP13 (0xFFED) - Photoshop IRB
//! - COM (0xFFFE) - comment
//! - SOS (0xFFDA) / EOI (0xFFD9) - end of the metadata region
//!
//! Multi-segment payloads (ICC seq/total, extended XMP) are emitted one
//! block per segment; the payload reassembler stitches them back together.

use openmeta_core::Status;

use crate::block::{
    fnv1a_64, match_at, u16be, u32be, u8_at, BlockChunking, BlockSink, ContainerBlockKind,
    ContainerBlockRef, ContainerFormat, ScanResult,
};

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXT_PREFIX: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const ICC_PREFIX: &[u8] = b"ICC_PROFILE\0";
const MPF_PREFIX: &[u8] = b"MPF\0";
const PHOTOSHOP_PREFIX: &[u8] = b"Photoshop 3.0\0";

/// Scan a JPEG byte stream for metadata-bearing segments.
pub fn scan_jpeg(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 2 {
        return sink.fail(Status::Malformed);
    }
    if bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return sink.fail(Status::Unsupported);
    }

    let mut offset = 2usize;
    while offset + 2 <= bytes.len() {
        if bytes[offset] != 0xFF {
            return sink.fail(Status::Malformed);
        }
        // Fill bytes: any number of 0xFF may precede the marker id.
        while offset < bytes.len() && bytes[offset] == 0xFF {
            offset += 1;
        }
        if offset >= bytes.len() {
            break;
        }
        let marker_off = offset - 1;
        let marker = 0xFF00u16 | u16::from(bytes[offset]);
        offset += 1;

        if marker == 0xFFD9 {
            break;
        }
        if marker == 0xFFDA {
            // Start of Scan: metadata lives before the compressed stream.
            break;
        }
        if (0xFFD0..=0xFFD7).contains(&marker) || marker == 0xFF01 {
            continue;
        }

        let Some(seg_len) = u16be(bytes, offset) else {
            return sink.fail(Status::Malformed);
        };
        if seg_len < 2 {
            return sink.fail(Status::Malformed);
        }
        let payload_off = offset + 2;
        let payload_size = (seg_len - 2) as usize;
        let outer_size = 2 + seg_len as usize;
        if payload_off + payload_size > bytes.len() {
            return sink.fail(Status::Malformed);
        }

        let base = ContainerBlockRef {
            format: ContainerFormat::Jpeg,
            outer_offset: marker_off as u64,
            outer_size: outer_size as u64,
            id: u32::from(marker),
            ..Default::default()
        };

        match marker {
            0xFFE1 => {
                if payload_size >= EXIF_PREFIX.len() && match_at(bytes, payload_off, EXIF_PREFIX) {
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::Exif,
                        data_offset: (payload_off + EXIF_PREFIX.len()) as u64,
                        data_size: (payload_size - EXIF_PREFIX.len()) as u64,
                        ..base
                    });
                } else if match_at(bytes, payload_off, XMP_PREFIX) {
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::Xmp,
                        data_offset: (payload_off + XMP_PREFIX.len()) as u64,
                        data_size: (payload_size - XMP_PREFIX.len()) as u64,
                        ..base
                    });
                } else if match_at(bytes, payload_off, XMP_EXT_PREFIX) {
                    // signature (35) + guid (32) + full_len (4) + offset (4) + data
                    if payload_size >= XMP_EXT_PREFIX.len() + 32 + 8 {
                        let guid_off = payload_off + XMP_EXT_PREFIX.len();
                        let full_off = guid_off + 32;
                        if let (Some(full_len), Some(part_off)) =
                            (u32be(bytes, full_off), u32be(bytes, full_off + 4))
                        {
                            sink.emit(ContainerBlockRef {
                                kind: ContainerBlockKind::XmpExtended,
                                chunking: BlockChunking::JpegXmpExtendedGuidOffset,
                                data_offset: (full_off + 8) as u64,
                                data_size: (payload_size - (XMP_EXT_PREFIX.len() + 32 + 8)) as u64,
                                logical_offset: u64::from(part_off),
                                logical_size: u64::from(full_len),
                                // Stable per GUID.
                                group: fnv1a_64(&bytes[guid_off..guid_off + 32]),
                                ..base
                            });
                        }
                    }
                }
            }
            0xFFE2 => {
                if match_at(bytes, payload_off, ICC_PREFIX) {
                    if payload_size >= ICC_PREFIX.len() + 2 {
                        let seq = u8_at(bytes, payload_off + 12).unwrap_or(0);
                        let total = u8_at(bytes, payload_off + 13).unwrap_or(0);
                        sink.emit(ContainerBlockRef {
                            kind: ContainerBlockKind::Icc,
                            chunking: BlockChunking::JpegApp2SeqTotal,
                            data_offset: (payload_off + 14) as u64,
                            data_size: (payload_size - 14) as u64,
                            part_index: u32::from(seq.saturating_sub(1)),
                            part_count: u32::from(total),
                            ..base
                        });
                    }
                } else if match_at(bytes, payload_off, MPF_PREFIX) {
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::Mpf,
                        data_offset: (payload_off + MPF_PREFIX.len()) as u64,
                        data_size: (payload_size - MPF_PREFIX.len()) as u64,
                        ..base
                    });
                }
            }
            0xFFED => {
                if match_at(bytes, payload_off, PHOTOSHOP_PREFIX) {
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::PhotoshopIrB,
                        chunking: BlockChunking::PsIrB8Bim,
                        data_offset: (payload_off + PHOTOSHOP_PREFIX.len()) as u64,
                        data_size: (payload_size - PHOTOSHOP_PREFIX.len()) as u64,
                        ..base
                    });
                }
            }
            0xFFFE => {
                sink.emit(ContainerBlockRef {
                    kind: ContainerBlockKind::Comment,
                    data_offset: payload_off as u64,
                    data_size: payload_size as u64,
                    ..base
                });
            }
            _ => {}
        }

        offset = payload_off + payload_size;
    }

    sink.result
}
