//! Payload reassembly and decompression.
//!
//! A scanned block is only a reference; `extract_payload` turns it into the
//! logical byte stream: gathering the other parts of multi-segment streams,
//! concatenating GIF sub-blocks, stripping BMFF TIFF-offset prefixes and
//! inflating deflate/Brotli payloads. The caller provides the output buffer
//! and retries with `needed` bytes on `OutputTruncated`.

use std::io::Read;

use openmeta_core::Status;

use crate::block::{u32be, BlockChunking, BlockCompression, ContainerBlockRef};

/// Resource limits applied during payload extraction.
#[derive(Debug, Clone, Copy)]
pub struct PayloadLimits {
    pub max_parts: u32,
    pub max_output_bytes: u64,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_parts: 1 << 14,
            max_output_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Options for payload extraction.
#[derive(Debug, Clone, Copy)]
pub struct PayloadOptions {
    /// When false, compressed payloads are surfaced as `Unsupported`
    /// instead of being inflated.
    pub decompress: bool,
    pub limits: PayloadLimits,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            decompress: true,
            limits: PayloadLimits::default(),
        }
    }
}

impl PayloadOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of one extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct PayloadResult {
    pub status: Status,
    /// Bytes written into the caller's buffer.
    pub written: u64,
    /// Logical payload size; re-provision to at least this on
    /// `OutputTruncated`.
    pub needed: u64,
}

impl PayloadResult {
    fn fail(status: Status) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

fn validate_range(file_bytes: &[u8], offset: u64, size: u64) -> bool {
    let len = file_bytes.len() as u64;
    offset <= len && size <= len - offset
}

fn block_src<'a>(file_bytes: &'a [u8], block: &ContainerBlockRef) -> Option<&'a [u8]> {
    if !validate_range(file_bytes, block.data_offset, block.data_size) {
        return None;
    }
    Some(&file_bytes[block.data_offset as usize..(block.data_offset + block.data_size) as usize])
}

/// Copy `src` into `out` at `dst_off`, clamped to the output buffer;
/// `written` counts only bytes that landed.
fn copy_bytes(out: &mut [u8], dst_off: u64, src: &[u8], written: &mut u64) {
    let out_len = out.len() as u64;
    if dst_off >= out_len {
        return;
    }
    let room = (out_len - dst_off) as usize;
    let n = src.len().min(room);
    if n == 0 {
        return;
    }
    out[dst_off as usize..dst_off as usize + n].copy_from_slice(&src[..n]);
    *written += n as u64;
}

fn extract_gif_sub_blocks(src: &[u8], out: &mut [u8], options: &PayloadOptions) -> PayloadResult {
    let mut result = PayloadResult::default();
    let max_out = options.limits.max_output_bytes;

    let mut pos = 0usize;
    while pos < src.len() {
        let len = src[pos] as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len > src.len() - pos {
            return PayloadResult::fail(Status::Malformed);
        }

        result.needed += len as u64;
        if max_out != 0 && result.needed > max_out {
            result.status = Status::LimitExceeded;
            return result;
        }

        copy_bytes(out, result.written, &src[pos..pos + len], &mut result.written);
        pos += len;
    }

    if result.written < result.needed {
        result.status = Status::OutputTruncated;
    }
    result
}

/// Inflate a compressed stream into `out`, then keep decompressing into a
/// discard block so `needed` reports the full logical size.
fn decompress_stream<R: Read>(mut reader: R, out: &mut [u8], max_out: u64) -> PayloadResult {
    let mut result = PayloadResult::default();
    let mut discard = [0u8; 32 * 1024];
    let mut written = 0usize;

    loop {
        let dst: &mut [u8] = if written < out.len() {
            &mut out[written..]
        } else {
            &mut discard
        };
        match reader.read(dst) {
            Ok(0) => break,
            Ok(n) => {
                result.needed += n as u64;
                if written < out.len() {
                    written += n;
                }
                if max_out != 0 && result.needed > max_out {
                    result.written = written as u64;
                    result.status = Status::LimitExceeded;
                    return result;
                }
            }
            Err(_) => {
                result.written = written as u64;
                result.status = Status::Malformed;
                return result;
            }
        }
    }

    result.written = written as u64;
    if result.written < result.needed {
        result.status = Status::OutputTruncated;
    }
    result
}

fn inflate_deflate(src: &[u8], out: &mut [u8], options: &PayloadOptions) -> PayloadResult {
    decompress_stream(
        flate2::read::ZlibDecoder::new(src),
        out,
        options.limits.max_output_bytes,
    )
}

#[cfg(feature = "brotli")]
fn inflate_brotli(src: &[u8], out: &mut [u8], options: &PayloadOptions) -> PayloadResult {
    decompress_stream(
        brotli::Decompressor::new(src, 4096),
        out,
        options.limits.max_output_bytes,
    )
}

#[cfg(not(feature = "brotli"))]
fn inflate_brotli(_src: &[u8], _out: &mut [u8], _options: &PayloadOptions) -> PayloadResult {
    PayloadResult::fail(Status::Unsupported)
}

/// Strip the u32-BE TIFF-offset prefix: returns the skip count.
fn tiff_offset_prefix(src: &[u8]) -> Result<usize, Status> {
    let Some(offset) = u32be(src, 0) else {
        return Err(Status::Malformed);
    };
    let offset = offset as usize;
    if offset >= src.len() {
        return Err(Status::Malformed);
    }
    Ok(offset)
}

fn extract_single_block(
    file_bytes: &[u8],
    block: &ContainerBlockRef,
    out: &mut [u8],
    options: &PayloadOptions,
) -> PayloadResult {
    let Some(mut src) = block_src(file_bytes, block) else {
        return PayloadResult::fail(Status::Malformed);
    };

    if block.chunking == BlockChunking::GifSubBlocks {
        return extract_gif_sub_blocks(src, out, options);
    }

    if block.chunking == BlockChunking::BmffExifTiffOffsetU32Be {
        match tiff_offset_prefix(src) {
            Ok(skip) => src = &src[skip..],
            Err(status) => return PayloadResult::fail(status),
        }
    }

    // With decompress off, raw compressed bytes are still surfaced so
    // callers can route them elsewhere.
    if !options.decompress || block.compression == BlockCompression::None {
        let needed = src.len() as u64;
        let max_out = options.limits.max_output_bytes;
        if max_out != 0 && needed > max_out {
            return PayloadResult {
                status: Status::LimitExceeded,
                written: 0,
                needed,
            };
        }
        let mut written = 0u64;
        copy_bytes(out, 0, src, &mut written);
        return PayloadResult {
            status: if written < needed {
                Status::OutputTruncated
            } else {
                Status::Ok
            },
            written,
            needed,
        };
    }

    match block.compression {
        BlockCompression::Deflate => inflate_deflate(src, out, options),
        BlockCompression::Brotli => inflate_brotli(src, out, options),
        BlockCompression::None => PayloadResult::fail(Status::Unsupported),
    }
}

fn matches_jpeg_icc(seed: &ContainerBlockRef, candidate: &ContainerBlockRef) -> bool {
    candidate.format == seed.format
        && candidate.kind == seed.kind
        && candidate.chunking == BlockChunking::JpegApp2SeqTotal
        && (seed.part_count == 0
            || candidate.part_count == 0
            || candidate.part_count == seed.part_count)
}

fn matches_jpeg_xmp_ext(seed: &ContainerBlockRef, candidate: &ContainerBlockRef) -> bool {
    candidate.format == seed.format
        && candidate.kind == seed.kind
        && candidate.chunking == BlockChunking::JpegXmpExtendedGuidOffset
        && candidate.group == seed.group
        && (seed.logical_size == 0
            || candidate.logical_size == 0
            || candidate.logical_size == seed.logical_size)
}

fn matches_multipart(seed: &ContainerBlockRef, candidate: &ContainerBlockRef) -> bool {
    candidate.format == seed.format
        && candidate.kind == seed.kind
        && candidate.group == seed.group
        && candidate.id == seed.id
        && (seed.part_count == 0
            || candidate.part_count == 0
            || candidate.part_count == seed.part_count)
}

/// True when `blocks[index]` belongs to a multi-part stream whose earlier
/// parts appear before it; used by orchestrators to extract each logical
/// stream exactly once.
pub fn is_secondary_part(blocks: &[ContainerBlockRef], index: usize) -> bool {
    let Some(seed) = blocks.get(index) else {
        return false;
    };
    let matcher: fn(&ContainerBlockRef, &ContainerBlockRef) -> bool =
        match seed.chunking {
            BlockChunking::JpegApp2SeqTotal => matches_jpeg_icc,
            BlockChunking::JpegXmpExtendedGuidOffset => matches_jpeg_xmp_ext,
            _ if seed.part_count > 1 => matches_multipart,
            _ => return false,
        };
    blocks[..index].iter().any(|earlier| matcher(seed, earlier))
}

fn extract_concat_parts(
    file_bytes: &[u8],
    blocks: &[ContainerBlockRef],
    parts: &[u32],
    skip: u64,
    out: &mut [u8],
    options: &PayloadOptions,
) -> PayloadResult {
    let mut result = PayloadResult::default();

    let mut total = 0u64;
    for &index in parts {
        let block = &blocks[index as usize];
        if !validate_range(file_bytes, block.data_offset, block.data_size) {
            return PayloadResult::fail(Status::Malformed);
        }
        total += block.data_size;
    }
    if skip > total {
        return PayloadResult::fail(Status::Malformed);
    }
    result.needed = total - skip;
    let max_out = options.limits.max_output_bytes;
    if max_out != 0 && result.needed > max_out {
        result.status = Status::LimitExceeded;
        return result;
    }

    let mut logical = 0u64;
    for &index in parts {
        let block = &blocks[index as usize];
        let src = &file_bytes
            [block.data_offset as usize..(block.data_offset + block.data_size) as usize];
        let end = logical + src.len() as u64;
        if end > skip {
            let begin = skip.saturating_sub(logical) as usize;
            copy_bytes(
                out,
                logical + begin as u64 - skip,
                &src[begin..],
                &mut result.written,
            );
        }
        logical = end;
    }

    if result.written < result.needed {
        result.status = Status::OutputTruncated;
    }
    result
}

fn extract_offset_parts(
    file_bytes: &[u8],
    blocks: &[ContainerBlockRef],
    parts: &[u32],
    logical_size: u64,
    skip: u64,
    out: &mut [u8],
    options: &PayloadOptions,
) -> PayloadResult {
    let mut result = PayloadResult::default();

    if logical_size == 0 || skip > logical_size {
        return PayloadResult::fail(Status::Malformed);
    }
    result.needed = logical_size - skip;
    let max_out = options.limits.max_output_bytes;
    if max_out != 0 && result.needed > max_out {
        result.status = Status::LimitExceeded;
        return result;
    }

    let mut expected = 0u64;
    for &index in parts {
        let block = &blocks[index as usize];
        if !validate_range(file_bytes, block.data_offset, block.data_size) {
            return PayloadResult::fail(Status::Malformed);
        }
        // Parts must tile [0, logical_size) exactly: no gaps, no overlap.
        if block.logical_offset != expected {
            return PayloadResult::fail(Status::Malformed);
        }
        if block.data_size > logical_size - expected {
            return PayloadResult::fail(Status::Malformed);
        }

        let src = &file_bytes
            [block.data_offset as usize..(block.data_offset + block.data_size) as usize];
        let end = expected + src.len() as u64;
        if end > skip {
            let begin = skip.saturating_sub(expected) as usize;
            copy_bytes(
                out,
                expected + begin as u64 - skip,
                &src[begin..],
                &mut result.written,
            );
        }
        expected = end;
    }

    if expected != logical_size {
        return PayloadResult::fail(Status::Malformed);
    }

    if result.written < result.needed {
        result.status = Status::OutputTruncated;
    }
    result
}

/// Read the TIFF-offset prefix of a reassembled multi-part stream from its
/// first part.
fn multipart_prefix_skip(
    file_bytes: &[u8],
    blocks: &[ContainerBlockRef],
    parts: &[u32],
    total: u64,
) -> Result<u64, Status> {
    let first = &blocks[parts[0] as usize];
    if !validate_range(file_bytes, first.data_offset, first.data_size) || first.data_size < 4 {
        return Err(Status::Malformed);
    }
    let src = &file_bytes[first.data_offset as usize..(first.data_offset + 4) as usize];
    let skip = u64::from(u32be(src, 0).unwrap_or(0));
    if skip >= total {
        return Err(Status::Malformed);
    }
    Ok(skip)
}

/// Extract the logical payload of `blocks[seed_index]`.
///
/// Single-part blocks copy (or decompress) directly; multi-part streams
/// gather matching parts through `scratch_indices`. `out` is never grown;
/// on `OutputTruncated` the caller re-provisions `needed` bytes and calls
/// again.
pub fn extract_payload(
    file_bytes: &[u8],
    blocks: &[ContainerBlockRef],
    seed_index: u32,
    out: &mut [u8],
    scratch_indices: &mut [u32],
    options: &PayloadOptions,
) -> PayloadResult {
    let Some(seed) = blocks.get(seed_index as usize) else {
        return PayloadResult::fail(Status::Malformed);
    };

    if seed.chunking == BlockChunking::GifSubBlocks {
        return extract_single_block(file_bytes, seed, out, options);
    }

    let multipart_chunking = matches!(
        seed.chunking,
        BlockChunking::JpegApp2SeqTotal | BlockChunking::JpegXmpExtendedGuidOffset
    );
    if seed.part_count <= 1 && !multipart_chunking {
        return extract_single_block(file_bytes, seed, out, options);
    }

    // Gather the indices of all parts of the seed's logical stream.
    let mut count = 0usize;
    for (i, candidate) in blocks.iter().enumerate() {
        let is_match = match seed.chunking {
            BlockChunking::JpegApp2SeqTotal => matches_jpeg_icc(seed, candidate),
            BlockChunking::JpegXmpExtendedGuidOffset => matches_jpeg_xmp_ext(seed, candidate),
            _ => seed.part_count > 1 && matches_multipart(seed, candidate),
        };
        if !is_match {
            continue;
        }
        if count >= options.limits.max_parts as usize || count >= scratch_indices.len() {
            return PayloadResult {
                status: Status::LimitExceeded,
                written: 0,
                needed: (count + 1) as u64,
            };
        }
        scratch_indices[count] = i as u32;
        count += 1;
    }
    if count == 0 {
        return PayloadResult::fail(Status::Malformed);
    }
    let parts = &mut scratch_indices[..count];

    match seed.chunking {
        BlockChunking::JpegApp2SeqTotal => {
            parts.sort_unstable_by_key(|&i| blocks[i as usize].part_index);
            let expected_total = if seed.part_count != 0 {
                seed.part_count
            } else {
                count as u32
            };
            if expected_total == 0 || expected_total > options.limits.max_parts {
                return PayloadResult::fail(Status::LimitExceeded);
            }
            if count as u32 != expected_total {
                return PayloadResult::fail(Status::Malformed);
            }
            for (i, &part) in parts.iter().enumerate() {
                if blocks[part as usize].part_index != i as u32 {
                    return PayloadResult::fail(Status::Malformed);
                }
            }
            extract_concat_parts(file_bytes, blocks, parts, 0, out, options)
        }
        BlockChunking::JpegXmpExtendedGuidOffset => {
            parts.sort_unstable_by_key(|&i| blocks[i as usize].logical_offset);
            let mut logical_size = seed.logical_size;
            if logical_size == 0 {
                logical_size = parts
                    .iter()
                    .map(|&i| {
                        let b = &blocks[i as usize];
                        b.logical_offset + b.data_size
                    })
                    .max()
                    .unwrap_or(0);
            }
            extract_offset_parts(file_bytes, blocks, parts, logical_size, 0, out, options)
        }
        _ => {
            parts.sort_unstable_by_key(|&i| blocks[i as usize].part_index);
            let any_offsets = parts
                .iter()
                .any(|&i| blocks[i as usize].logical_offset != 0);

            if any_offsets {
                parts.sort_unstable_by_key(|&i| blocks[i as usize].logical_offset);
                let mut logical_size = 0u64;
                let mut max_end = 0u64;
                for &i in parts.iter() {
                    let b = &blocks[i as usize];
                    if b.logical_size != 0 {
                        logical_size = b.logical_size;
                    }
                    max_end = max_end.max(b.logical_offset + b.data_size);
                }
                if logical_size == 0 {
                    logical_size = max_end;
                }
                let skip = if seed.chunking == BlockChunking::BmffExifTiffOffsetU32Be {
                    match multipart_prefix_skip(file_bytes, blocks, parts, logical_size) {
                        Ok(skip) => skip,
                        Err(status) => return PayloadResult::fail(status),
                    }
                } else {
                    0
                };
                extract_offset_parts(file_bytes, blocks, parts, logical_size, skip, out, options)
            } else {
                let expected_total = if seed.part_count != 0 {
                    seed.part_count
                } else {
                    count as u32
                };
                if expected_total == 0 || expected_total > options.limits.max_parts {
                    return PayloadResult::fail(Status::LimitExceeded);
                }
                if count as u32 != expected_total {
                    return PayloadResult::fail(Status::Malformed);
                }
                for (i, &part) in parts.iter().enumerate() {
                    if blocks[part as usize].part_index != i as u32 {
                        return PayloadResult::fail(Status::Malformed);
                    }
                }
                let total: u64 = parts
                    .iter()
                    .map(|&i| blocks[i as usize].data_size)
                    .sum();
                let skip = if seed.chunking == BlockChunking::BmffExifTiffOffsetU32Be {
                    match multipart_prefix_skip(file_bytes, blocks, parts, total) {
                        Ok(skip) => skip,
                        Err(status) => return PayloadResult::fail(status),
                    }
                } else {
                    0
                };
                extract_concat_parts(file_bytes, blocks, parts, skip, out, options)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ContainerBlockKind, ContainerFormat};

    fn icc_part(data_offset: u64, data_size: u64, index: u32, count: u32) -> ContainerBlockRef {
        ContainerBlockRef {
            format: ContainerFormat::Jpeg,
            kind: ContainerBlockKind::Icc,
            chunking: BlockChunking::JpegApp2SeqTotal,
            data_offset,
            data_size,
            part_index: index,
            part_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn seq_total_concatenates_in_order() {
        let file = b"....CD..AB";
        // Parts appear out of order in the block list.
        let blocks = [icc_part(4, 2, 1, 2), icc_part(8, 2, 0, 2)];
        let mut out = [0u8; 8];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, 4);
        assert_eq!(result.needed, 4);
        assert_eq!(&out[..4], b"ABCD");
    }

    #[test]
    fn seq_total_small_output_truncates() {
        let file = b"ABCD";
        let blocks = [icc_part(0, 2, 0, 2), icc_part(2, 2, 1, 2)];
        let mut out = [0u8; 3];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::OutputTruncated);
        assert_eq!(result.written, 3);
        assert_eq!(result.needed, 4);
        assert_eq!(&out, b"ABC");
    }

    #[test]
    fn seq_total_missing_part_is_malformed() {
        let file = b"AB";
        let blocks = [icc_part(0, 2, 0, 2)];
        let mut out = [0u8; 8];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn seq_total_duplicate_index_is_malformed() {
        let file = b"ABCD";
        let blocks = [icc_part(0, 2, 0, 2), icc_part(2, 2, 0, 2)];
        let mut out = [0u8; 8];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::Malformed);
    }

    fn xmp_ext_part(
        data_offset: u64,
        data_size: u64,
        logical_offset: u64,
        logical_size: u64,
    ) -> ContainerBlockRef {
        ContainerBlockRef {
            format: ContainerFormat::Jpeg,
            kind: ContainerBlockKind::XmpExtended,
            chunking: BlockChunking::JpegXmpExtendedGuidOffset,
            data_offset,
            data_size,
            logical_offset,
            logical_size,
            group: 0x1234,
            ..Default::default()
        }
    }

    #[test]
    fn extended_xmp_places_parts_by_offset() {
        let file = b"DEFABC";
        let blocks = [xmp_ext_part(0, 3, 3, 6), xmp_ext_part(3, 3, 0, 6)];
        let mut out = [0u8; 6];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, 6);
        assert_eq!(&out, b"ABCDEF");
    }

    #[test]
    fn offset_gap_is_malformed() {
        let file = b"DEFABC";
        let blocks = [xmp_ext_part(0, 2, 3, 6), xmp_ext_part(3, 3, 0, 6)];
        let mut out = [0u8; 6];
        let mut scratch = [0u32; 8];
        let result =
            extract_payload(file, &blocks, 0, &mut out, &mut scratch, &PayloadOptions::new());
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn gif_sub_blocks_concatenate() {
        let file = b"\x02AB\x03CDE\x00trailing";
        let block = ContainerBlockRef {
            format: ContainerFormat::Gif,
            kind: ContainerBlockKind::Icc,
            chunking: BlockChunking::GifSubBlocks,
            data_offset: 0,
            data_size: file.len() as u64,
            ..Default::default()
        };
        let mut out = [0u8; 8];
        let mut scratch = [0u32; 4];
        let result = extract_payload(
            file,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &PayloadOptions::new(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.needed, 5);
        assert_eq!(&out[..5], b"ABCDE");
    }

    #[test]
    fn single_uncompressed_copies_exactly() {
        let file = b"0123456789";
        let block = ContainerBlockRef {
            data_offset: 2,
            data_size: 5,
            ..Default::default()
        };
        let mut out = [0u8; 5];
        let mut scratch = [0u32; 1];
        let mut options = PayloadOptions::new();
        options.decompress = false;
        let result = extract_payload(
            file,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &options,
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, block.data_size);
        assert_eq!(&out, b"23456");
    }

    #[test]
    fn deflate_round_trip() {
        use std::io::Write as _;
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"inflate me please").unwrap();
        let compressed = encoder.finish().unwrap();

        let block = ContainerBlockRef {
            compression: BlockCompression::Deflate,
            data_offset: 0,
            data_size: compressed.len() as u64,
            ..Default::default()
        };
        let mut out = [0u8; 64];
        let mut scratch = [0u32; 1];
        let result = extract_payload(
            &compressed,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &PayloadOptions::new(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.needed, 17);
        assert_eq!(&out[..17], b"inflate me please");
    }

    #[test]
    fn deflate_needed_is_reported_when_output_small() {
        use std::io::Write as _;
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&[7u8; 100]).unwrap();
        let compressed = encoder.finish().unwrap();

        let block = ContainerBlockRef {
            compression: BlockCompression::Deflate,
            data_offset: 0,
            data_size: compressed.len() as u64,
            ..Default::default()
        };
        let mut out = [0u8; 10];
        let mut scratch = [0u32; 1];
        let result = extract_payload(
            &compressed,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &PayloadOptions::new(),
        );
        assert_eq!(result.status, Status::OutputTruncated);
        assert_eq!(result.written, 10);
        assert_eq!(result.needed, 100);
    }

    #[test]
    fn garbage_deflate_is_malformed() {
        let garbage = [0xAAu8; 16];
        let block = ContainerBlockRef {
            compression: BlockCompression::Deflate,
            data_offset: 0,
            data_size: garbage.len() as u64,
            ..Default::default()
        };
        let mut out = [0u8; 16];
        let mut scratch = [0u32; 1];
        let result = extract_payload(
            &garbage,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &PayloadOptions::new(),
        );
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn bmff_tiff_offset_prefix_is_stripped() {
        // 4-byte prefix (=4) then the TIFF stream.
        let mut file = 4u32.to_be_bytes().to_vec();
        file.extend_from_slice(b"II\x2A\x00");
        let block = ContainerBlockRef {
            kind: ContainerBlockKind::Exif,
            chunking: BlockChunking::BmffExifTiffOffsetU32Be,
            data_offset: 0,
            data_size: file.len() as u64,
            ..Default::default()
        };
        let mut out = [0u8; 8];
        let mut scratch = [0u32; 1];
        let result = extract_payload(
            &file,
            std::slice::from_ref(&block),
            0,
            &mut out,
            &mut scratch,
            &PayloadOptions::new(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.needed, 4);
        assert_eq!(&out[..4], b"II\x2A\x00");
    }

    #[test]
    fn secondary_parts_are_detected() {
        let blocks = [icc_part(0, 2, 0, 2), icc_part(2, 2, 1, 2)];
        assert!(!is_secondary_part(&blocks, 0));
        assert!(is_secondary_part(&blocks, 1));
    }
}
