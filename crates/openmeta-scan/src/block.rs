//! Scanner output model: discovered metadata block references.

use openmeta_core::Status;

/// Container format a block was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum ContainerFormat {
    #[default]
    Unknown,
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
    Jp2,
    Jxl,
    /// ISO-BMFF (HEIF/AVIF/CR3).
    Bmff,
}

/// What kind of metadata a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum ContainerBlockKind {
    #[default]
    Unknown,
    Exif,
    Xmp,
    /// JPEG extended XMP (multi-segment, GUID-grouped).
    XmpExtended,
    Icc,
    IptcIim,
    PhotoshopIrB,
    MakerNote,
    Mpf,
    Comment,
    Text,
    Jumbf,
    /// Compressed box whose real type is only known after decompression
    /// (JXL `brob`).
    CompressedMetadata,
}

/// Compression applied to the block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum BlockCompression {
    #[default]
    None,
    Deflate,
    Brotli,
}

/// How the payload reassembler must interpret the block's data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum BlockChunking {
    /// One contiguous region; no reassembly.
    #[default]
    None,
    /// JPEG APP2 seq/total part table; all parts must be present, sorted by
    /// `part_index`, numbering exactly `0..part_count`.
    JpegApp2SeqTotal,
    /// Parts share `group` (GUID hash) and a total `logical_size`; each part
    /// carries `logical_offset`.
    JpegXmpExtendedGuidOffset,
    /// Data region is a `len,byte*` sub-block chain terminated by a zero
    /// length; payloads concatenate.
    GifSubBlocks,
    /// First four bytes of the logical payload are a big-endian offset at
    /// which the actual TIFF stream begins.
    BmffExifTiffOffsetU32Be,
    /// Brotli-compressed; the first four bytes named the decompressed box
    /// type (already consumed by the scanner into `aux_u32`).
    BrobU32BeRealTypePrefix,
    /// JP2 uuid box payload; decoder-specific framing.
    Jp2UuidPayload,
    /// Photoshop 8BIM resource stream; decoder-specific framing.
    PsIrB8Bim,
}

/// One discovered metadata block.
///
/// `outer_*` covers the enclosing container framing; `data_*` the payload
/// bytes. Multi-part logical streams carry `part_index`/`part_count` and,
/// for offset-addressed parts, `logical_offset`/`logical_size`; `group`
/// correlates parts of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[must_use]
pub struct ContainerBlockRef {
    pub format: ContainerFormat,
    pub kind: ContainerBlockKind,
    pub compression: BlockCompression,
    pub chunking: BlockChunking,
    pub outer_offset: u64,
    pub outer_size: u64,
    pub data_offset: u64,
    pub data_size: u64,
    /// Container-specific id (JPEG marker, PNG/BMFF fourcc, TIFF tag, item id).
    pub id: u32,
    pub part_index: u32,
    pub part_count: u32,
    pub logical_offset: u64,
    pub logical_size: u64,
    pub group: u64,
    /// Container-specific auxiliary value (colr method, brob real type,
    /// TIFF-offset prefix).
    pub aux_u32: u32,
}

/// Result of a scan call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct ScanResult {
    pub status: Status,
    /// Blocks recorded into the caller's scratch.
    pub written: u32,
    /// Blocks discovered; retry with at least this much scratch when
    /// `status` is `OutputTruncated`.
    pub needed: u32,
}

/// Fixed-capacity emission sink over caller scratch.
pub(crate) struct BlockSink<'a> {
    out: &'a mut [ContainerBlockRef],
    pub result: ScanResult,
}

impl<'a> BlockSink<'a> {
    pub fn new(out: &'a mut [ContainerBlockRef]) -> Self {
        Self {
            out,
            result: ScanResult::default(),
        }
    }

    pub fn emit(&mut self, block: ContainerBlockRef) {
        self.result.needed += 1;
        if (self.result.written as usize) < self.out.len() {
            self.out[self.result.written as usize] = block;
            self.result.written += 1;
        } else {
            self.result.status.absorb(Status::OutputTruncated);
        }
    }

    pub fn fail(mut self, status: Status) -> ScanResult {
        self.result.status.absorb(status);
        self.result
    }
}

pub(crate) const fn fourcc(s: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*s)
}

pub(crate) fn window(bytes: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    bytes.get(offset..end)
}

pub(crate) fn match_at(bytes: &[u8], offset: usize, pattern: &[u8]) -> bool {
    window(bytes, offset, pattern.len()).is_some_and(|w| w == pattern)
}

pub(crate) fn u8_at(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

pub(crate) fn u16be(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(window(bytes, offset, 2)?.try_into().ok()?))
}

pub(crate) fn u32be(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(window(bytes, offset, 4)?.try_into().ok()?))
}

pub(crate) fn u32le(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(window(bytes, offset, 4)?.try_into().ok()?))
}

pub(crate) fn u64be(bytes: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_be_bytes(window(bytes, offset, 8)?.try_into().ok()?))
}

/// FNV-1a 64 over `data`; used to fold extended-XMP GUIDs into `group`.
pub(crate) fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in data {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
