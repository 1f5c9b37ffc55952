//! GIF extension scanner.
//!
//! After the logical screen descriptor (and optional global color table),
//! the stream is a sequence of blocks introduced by `0x21` (extension),
//! `0x2C` (image descriptor) or `0x3B` (trailer). Application extensions
//! (`0x21 0xFF`) with an 11-byte id of `XMP DataXMP` or `ICCRGBG1012`
//! carry metadata in the data sub-block chain that follows.

use openmeta_core::Status;

use crate::block::{
    match_at, u8_at, BlockChunking, BlockSink, ContainerBlockKind, ContainerBlockRef,
    ContainerFormat, ScanResult,
};

/// Scan a GIF byte stream for XMP/ICC application extensions.
pub fn scan_gif(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 13 {
        return sink.fail(Status::Malformed);
    }
    if !match_at(bytes, 0, b"GIF87a") && !match_at(bytes, 0, b"GIF89a") {
        return sink.fail(Status::Unsupported);
    }

    // Logical screen descriptor: 7 bytes after the signature.
    let mut offset = 6usize;
    let Some(packed) = u8_at(bytes, offset + 4) else {
        return sink.fail(Status::Malformed);
    };
    offset += 7;

    if packed & 0x80 != 0 {
        let gct_bytes = 3usize << ((packed & 0x07) + 1);
        if offset + gct_bytes > bytes.len() {
            return sink.fail(Status::Malformed);
        }
        offset += gct_bytes;
    }

    while offset < bytes.len() {
        match bytes[offset] {
            0x3B => break, // trailer
            0x21 => {
                let Some(label) = u8_at(bytes, offset + 1) else {
                    return sink.fail(Status::Malformed);
                };
                if label == 0xFF {
                    // Application extension: block size must be 11.
                    let Some(app_block_size) = u8_at(bytes, offset + 2) else {
                        return sink.fail(Status::Malformed);
                    };
                    if app_block_size != 11 {
                        match skip_sub_blocks(bytes, offset + 3 + app_block_size as usize) {
                            Some(next) => offset = next,
                            None => return sink.fail(Status::Malformed),
                        }
                        continue;
                    }
                    let app_id_off = offset + 3;
                    if app_id_off + 11 > bytes.len() {
                        return sink.fail(Status::Malformed);
                    }
                    let is_xmp = match_at(bytes, app_id_off, b"XMP DataXMP");
                    let is_icc = match_at(bytes, app_id_off, b"ICCRGBG1012");

                    let data_off = app_id_off + 11;
                    let Some(ext_end) = skip_sub_blocks(bytes, data_off) else {
                        return sink.fail(Status::Malformed);
                    };

                    if is_xmp || is_icc {
                        sink.emit(ContainerBlockRef {
                            format: ContainerFormat::Gif,
                            kind: if is_xmp {
                                ContainerBlockKind::Xmp
                            } else {
                                ContainerBlockKind::Icc
                            },
                            chunking: BlockChunking::GifSubBlocks,
                            outer_offset: offset as u64,
                            outer_size: (ext_end - offset) as u64,
                            data_offset: data_off as u64,
                            data_size: (ext_end - data_off) as u64,
                            id: 0x21FF, // extension introducer + app label
                            ..Default::default()
                        });
                    }

                    offset = ext_end;
                } else {
                    // Other extension: introducer, label, sub-block chain.
                    match skip_sub_blocks(bytes, offset + 2) {
                        Some(next) => offset = next,
                        None => return sink.fail(Status::Malformed),
                    }
                }
            }
            0x2C => {
                // Image descriptor + optional local color table + pixel data.
                if offset + 10 > bytes.len() {
                    return sink.fail(Status::Malformed);
                }
                let img_packed = bytes[offset + 9];
                offset += 10;
                if img_packed & 0x80 != 0 {
                    let lct_bytes = 3usize << ((img_packed & 0x07) + 1);
                    if offset + lct_bytes > bytes.len() {
                        return sink.fail(Status::Malformed);
                    }
                    offset += lct_bytes;
                }
                if offset + 1 > bytes.len() {
                    return sink.fail(Status::Malformed);
                }
                offset += 1; // LZW minimum code size
                match skip_sub_blocks(bytes, offset) {
                    Some(next) => offset = next,
                    None => return sink.fail(Status::Malformed),
                }
            }
            _ => return sink.fail(Status::Malformed),
        }
    }

    sink.result
}

/// Walk a `len,byte*` sub-block chain starting at `offset`; returns the
/// offset just past the zero terminator.
fn skip_sub_blocks(bytes: &[u8], mut offset: usize) -> Option<usize> {
    while offset < bytes.len() {
        let len = bytes[offset] as usize;
        offset += 1;
        if len == 0 {
            return Some(offset);
        }
        if offset.checked_add(len)? > bytes.len() {
            return None;
        }
        offset += len;
    }
    Some(offset)
}
