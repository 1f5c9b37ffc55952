//! WebP (RIFF) chunk scanner.
//!
//! Sub-chunks are `fourcc(4) size(4, little-endian) data`, padded to even
//! size. Metadata chunks: `EXIF`, `XMP ` and `ICCP`.

use openmeta_core::Status;

use crate::block::{
    fourcc, match_at, u32be, u32le, BlockSink, ContainerBlockKind, ContainerBlockRef,
    ContainerFormat, ScanResult,
};

const EXIF_PREAMBLE: &[u8] = b"Exif\0\0";

/// Scan a WebP byte stream for metadata chunks.
pub fn scan_webp(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 12 {
        return sink.fail(Status::Malformed);
    }
    if !match_at(bytes, 0, b"RIFF") || !match_at(bytes, 8, b"WEBP") {
        return sink.fail(Status::Unsupported);
    }

    let Some(riff_size) = u32le(bytes, 4) else {
        return sink.fail(Status::Malformed);
    };
    let file_end = ((riff_size as usize).saturating_add(8)).min(bytes.len());

    let mut offset = 12usize;
    while offset + 8 <= file_end {
        let chunk_off = offset;
        let (Some(chunk_type), Some(size)) = (u32be(bytes, offset), u32le(bytes, offset + 4))
        else {
            return sink.fail(Status::Malformed);
        };
        let data_off = offset + 8;
        let data_size = size as usize;
        let Some(end) = data_off.checked_add(data_size) else {
            return sink.fail(Status::Malformed);
        };
        if end > file_end {
            return sink.fail(Status::Malformed);
        }
        // RIFF pads chunks to even length.
        let next = if data_size % 2 == 1 { end + 1 } else { end };

        let base = ContainerBlockRef {
            format: ContainerFormat::Webp,
            outer_offset: chunk_off as u64,
            outer_size: (next - chunk_off) as u64,
            data_offset: data_off as u64,
            data_size: data_size as u64,
            id: chunk_type,
            ..Default::default()
        };

        if chunk_type == fourcc(b"EXIF") {
            let mut block = ContainerBlockRef {
                kind: ContainerBlockKind::Exif,
                ..base
            };
            // Some writers keep the JPEG-style preamble inside the chunk.
            if block.data_size >= EXIF_PREAMBLE.len() as u64
                && match_at(bytes, data_off, EXIF_PREAMBLE)
            {
                block.data_offset += EXIF_PREAMBLE.len() as u64;
                block.data_size -= EXIF_PREAMBLE.len() as u64;
            }
            sink.emit(block);
        } else if chunk_type == fourcc(b"XMP ") {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Xmp,
                ..base
            });
        } else if chunk_type == fourcc(b"ICCP") {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Icc,
                ..base
            });
        }

        offset = next;
    }

    sink.result
}
