//! PNG chunk scanner.
//!
//! Chunks are `length(4) type(4) data crc(4)`. Metadata lives in:
//! - `eXIf` - raw EXIF/TIFF stream
//! - `iCCP` - profile name, compression method, deflate-compressed profile
//! - `iTXt` with keyword `XML:com.adobe.xmp` - XMP (optionally deflated)
//! - `zTXt` / `tEXt` - generic text records
//!
//! Scanning stops at `IEND`.

use openmeta_core::Status;

use crate::block::{
    fourcc, match_at, u32be, u8_at, BlockChunking, BlockCompression, BlockSink,
    ContainerBlockKind, ContainerBlockRef, ContainerFormat, ScanResult,
};

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// Scan a PNG byte stream for metadata-bearing chunks.
pub fn scan_png(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < PNG_SIGNATURE.len() {
        return sink.fail(Status::Malformed);
    }
    if !match_at(bytes, 0, &PNG_SIGNATURE) {
        return sink.fail(Status::Unsupported);
    }

    let mut offset = PNG_SIGNATURE.len();
    while offset + 12 <= bytes.len() {
        let chunk_off = offset;
        let (Some(len), Some(chunk_type)) = (u32be(bytes, offset), u32be(bytes, offset + 4))
        else {
            return sink.fail(Status::Malformed);
        };
        let data_off = offset + 8;
        let data_size = len as usize;
        let Some(crc_end) = data_off
            .checked_add(data_size)
            .and_then(|crc| crc.checked_add(4))
        else {
            return sink.fail(Status::Malformed);
        };
        if crc_end > bytes.len() {
            return sink.fail(Status::Malformed);
        }
        let chunk_size = 12 + data_size;
        let data_end = data_off + data_size;

        let base = ContainerBlockRef {
            format: ContainerFormat::Png,
            outer_offset: chunk_off as u64,
            outer_size: chunk_size as u64,
            id: chunk_type,
            ..Default::default()
        };

        if chunk_type == fourcc(b"eXIf") {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Exif,
                data_offset: data_off as u64,
                data_size: data_size as u64,
                ..base
            });
        } else if chunk_type == fourcc(b"iCCP") {
            // profile_name\0 + compression_method + compressed_profile
            if let Some(name_end) = find_nul(bytes, data_off, data_end) {
                if name_end + 2 <= data_end {
                    let profile_off = name_end + 2;
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::Icc,
                        compression: BlockCompression::Deflate,
                        data_offset: profile_off as u64,
                        data_size: (data_end - profile_off) as u64,
                        ..base
                    });
                }
            }
        } else if chunk_type == fourcc(b"iTXt") {
            // keyword\0 + comp_flag + comp_method + lang\0 + translated\0 + text
            if let Some(block) = parse_itxt(bytes, data_off, data_end, base) {
                sink.emit(block);
            }
        } else if chunk_type == fourcc(b"zTXt") {
            // keyword\0 + comp_method + compressed_text
            if let Some(name_end) = find_nul(bytes, data_off, data_end) {
                if name_end + 2 <= data_end {
                    let text_off = name_end + 2;
                    sink.emit(ContainerBlockRef {
                        kind: ContainerBlockKind::Text,
                        compression: BlockCompression::Deflate,
                        data_offset: text_off as u64,
                        data_size: (data_end - text_off) as u64,
                        ..base
                    });
                }
            }
        } else if chunk_type == fourcc(b"tEXt") {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Text,
                data_offset: data_off as u64,
                data_size: data_size as u64,
                ..base
            });
        }

        offset += chunk_size;
        if chunk_type == fourcc(b"IEND") {
            break;
        }
    }

    sink.result
}

/// Offset of the first NUL in `[start, end)`, if any.
fn find_nul(bytes: &[u8], start: usize, end: usize) -> Option<usize> {
    (start..end.min(bytes.len())).find(|&i| bytes[i] == 0)
}

fn parse_itxt(
    bytes: &[u8],
    data_off: usize,
    data_end: usize,
    base: ContainerBlockRef,
) -> Option<ContainerBlockRef> {
    let keyword_end = find_nul(bytes, data_off, data_end)?;
    if keyword_end + 3 > data_end {
        return None;
    }
    let is_xmp = keyword_end - data_off == XMP_KEYWORD.len() && match_at(bytes, data_off, XMP_KEYWORD);
    if !is_xmp {
        return None;
    }

    let comp_flag = u8_at(bytes, keyword_end + 1)?;
    let lang_end = find_nul(bytes, keyword_end + 3, data_end)?;
    let translated_end = find_nul(bytes, lang_end + 1, data_end)?;
    let text_off = translated_end + 1;
    if text_off > data_end {
        return None;
    }

    Some(ContainerBlockRef {
        kind: ContainerBlockKind::Xmp,
        compression: if comp_flag != 0 {
            BlockCompression::Deflate
        } else {
            BlockCompression::None
        },
        data_offset: text_off as u64,
        data_size: (data_end - text_off) as u64,
        ..base
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0; 4]); // crc, unchecked
        out
    }

    fn png(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        for c in chunks {
            data.extend_from_slice(c);
        }
        data.extend_from_slice(&chunk(b"IEND", &[]));
        data
    }

    #[test]
    fn finds_exif_chunk() {
        let data = png(&[chunk(b"eXIf", b"II\x2A\x00\x08\x00\x00\x00")]);
        let mut blocks = [ContainerBlockRef::default(); 4];
        let result = scan_png(&data, &mut blocks);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, 1);
        assert_eq!(blocks[0].kind, ContainerBlockKind::Exif);
        assert_eq!(blocks[0].data_size, 8);
    }

    #[test]
    fn finds_compressed_iccp() {
        let mut payload = b"sRGB\0".to_vec();
        payload.push(0); // compression method
        payload.extend_from_slice(&[0x78, 0x9C]); // zlib header bytes
        let data = png(&[chunk(b"iCCP", &payload)]);
        let mut blocks = [ContainerBlockRef::default(); 4];
        let result = scan_png(&data, &mut blocks);
        assert_eq!(result.written, 1);
        assert_eq!(blocks[0].kind, ContainerBlockKind::Icc);
        assert_eq!(blocks[0].compression, BlockCompression::Deflate);
        assert_eq!(blocks[0].data_size, 2);
    }

    #[test]
    fn finds_xmp_itxt_only_for_the_xmp_keyword() {
        let mut xmp = b"XML:com.adobe.xmp\0".to_vec();
        xmp.extend_from_slice(&[0, 0]); // flag, method
        xmp.extend_from_slice(b"\0\0<x:xmpmeta/>");
        let mut other = b"Title\0".to_vec();
        other.extend_from_slice(&[0, 0, 0, 0]);
        let data = png(&[chunk(b"iTXt", &xmp), chunk(b"iTXt", &other)]);
        let mut blocks = [ContainerBlockRef::default(); 4];
        let result = scan_png(&data, &mut blocks);
        assert_eq!(result.written, 1);
        assert_eq!(blocks[0].kind, ContainerBlockKind::Xmp);
        assert_eq!(blocks[0].compression, BlockCompression::None);
    }

    #[test]
    fn chunk_overrunning_file_is_malformed() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&0xFFFF_u32.to_be_bytes());
        data.extend_from_slice(b"eXIf");
        data.extend_from_slice(&[0; 8]);
        let mut blocks = [ContainerBlockRef::default(); 1];
        assert_eq!(scan_png(&data, &mut blocks).status, Status::Malformed);
    }
}
