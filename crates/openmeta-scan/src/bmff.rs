//! ISO-BMFF box scanners: JP2, JXL and HEIF/AVIF/CR3.
//!
//! All three share the box framing `size(4) type(4) [largesize(8)]`; a size
//! of 1 switches to the 64-bit largesize, a size of 0 extends the box to
//! the end of its parent.
//!
//! - JP2 carries metadata in `uuid` boxes (well-known UUIDs for EXIF, XMP
//!   and IPTC) and ICC in `colr` boxes with method 2/3.
//! - JXL carries `Exif`, `xml ` and Brotli-compressed `brob` boxes.
//! - HEIF/AVIF/CR3 describe metadata as items: `iinf`/`infe` give item
//!   types, `iloc` the extents, `idat` optional inline bytes. Multi-extent
//!   items are emitted as multi-part refs.

use openmeta_core::Status;

use crate::block::{
    fourcc, match_at, u16be, u32be, u64be, u8_at, window, BlockChunking, BlockCompression,
    BlockSink, ContainerBlockKind, ContainerBlockRef, ContainerFormat, ScanResult,
};

pub(crate) const JP2_SIGNATURE_TAIL: [u8; 4] = [0x0D, 0x0A, 0x87, 0x0A];

const JP2_UUID_EXIF: [u8; 16] = [
    0x4a, 0x70, 0x67, 0x54, 0x69, 0x66, 0x66, 0x45, 0x78, 0x69, 0x66, 0x2d, 0x3e, 0x4a, 0x50,
    0x32,
];
const JP2_UUID_IPTC: [u8; 16] = [
    0x33, 0xc7, 0xa4, 0xd2, 0xb8, 0x1d, 0x47, 0x23, 0xa0, 0xba, 0xf1, 0xa3, 0xe0, 0x97, 0xad,
    0x38,
];
const JP2_UUID_XMP: [u8; 16] = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf,
    0xac,
];
/// Canon CR3 vendor metadata uuid; its children are `CMT1..CMT4` TIFF streams.
const CR3_UUID_CANON: [u8; 16] = [
    0x85, 0xc0, 0xb6, 0x87, 0x82, 0x0f, 0x11, 0xe0, 0x81, 0x11, 0xf4, 0xce, 0x46, 0x2b, 0x6a,
    0x48,
];

/// Brand identifiers accepted in a HEIF/AVIF/CR3 `ftyp` box.
const BMFF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"mif1", b"msf1", b"avif", b"avis", b"crx ",
];

const EXIF_PREAMBLE: &[u8] = b"Exif\0\0";

/// One parsed box header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BmffBox {
    pub offset: usize,
    pub size: usize,
    pub header_size: usize,
    pub box_type: u32,
    pub uuid: Option<[u8; 16]>,
}

impl BmffBox {
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_size
    }

    pub fn payload_size(&self) -> usize {
        self.size - self.header_size
    }
}

/// Parse a box header at `offset`, bounded by `parent_end`.
pub(crate) fn parse_bmff_box(bytes: &[u8], offset: usize, parent_end: usize) -> Option<BmffBox> {
    let parent_end = parent_end.min(bytes.len());
    if offset.checked_add(8)? > parent_end {
        return None;
    }
    let size32 = u32be(bytes, offset)? as usize;
    let box_type = u32be(bytes, offset + 4)?;

    let (mut header_size, box_size) = match size32 {
        1 => (16usize, u64be(bytes, offset + 8)?.try_into().ok()?),
        0 => (8usize, parent_end - offset),
        n => (8usize, n),
    };

    if box_size < header_size {
        return None;
    }
    if offset.checked_add(box_size)? > parent_end {
        return None;
    }

    let mut uuid = None;
    if box_type == fourcc(b"uuid") {
        if header_size + 16 > box_size {
            return None;
        }
        let raw = window(bytes, offset + header_size, 16)?;
        uuid = Some(raw.try_into().ok()?);
        header_size += 16;
    }

    Some(BmffBox {
        offset,
        size: box_size,
        header_size,
        box_type,
        uuid,
    })
}

fn emit_jp2_box(bytes: &[u8], bmff_box: &BmffBox, sink: &mut BlockSink<'_>) {
    let payload_off = bmff_box.payload_offset();
    let payload_size = bmff_box.payload_size();

    let base = ContainerBlockRef {
        format: ContainerFormat::Jp2,
        outer_offset: bmff_box.offset as u64,
        outer_size: bmff_box.size as u64,
        data_offset: payload_off as u64,
        data_size: payload_size as u64,
        id: bmff_box.box_type,
        ..Default::default()
    };

    if let Some(uuid) = bmff_box.uuid {
        let mut block = ContainerBlockRef {
            chunking: BlockChunking::Jp2UuidPayload,
            ..base
        };
        if uuid == JP2_UUID_EXIF {
            block.kind = ContainerBlockKind::Exif;
            if block.data_size >= EXIF_PREAMBLE.len() as u64
                && match_at(bytes, payload_off, EXIF_PREAMBLE)
            {
                block.data_offset += EXIF_PREAMBLE.len() as u64;
                block.data_size -= EXIF_PREAMBLE.len() as u64;
            }
            sink.emit(block);
        } else if uuid == JP2_UUID_XMP {
            block.kind = ContainerBlockKind::Xmp;
            sink.emit(block);
        } else if uuid == JP2_UUID_IPTC {
            block.kind = ContainerBlockKind::IptcIim;
            sink.emit(block);
        }
        return;
    }

    if bmff_box.box_type == fourcc(b"colr") && payload_size >= 3 {
        let method = u8_at(bytes, payload_off).unwrap_or(0);
        // Method 2 = restricted ICC, 3 = full ICC.
        if method == 2 || method == 3 {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Icc,
                data_offset: (payload_off + 3) as u64,
                data_size: (payload_size - 3) as u64,
                aux_u32: u32::from(method),
                ..base
            });
        }
    }
}

/// Scan a JP2 codestream wrapper for EXIF/XMP/IPTC uuid boxes and ICC.
pub fn scan_jp2(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 12 {
        return sink.fail(Status::Malformed);
    }
    if u32be(bytes, 0) != Some(12)
        || u32be(bytes, 4) != Some(fourcc(b"jP  "))
        || !match_at(bytes, 8, &JP2_SIGNATURE_TAIL)
    {
        return sink.fail(Status::Unsupported);
    }

    let mut offset = 0usize;
    while offset < bytes.len() {
        let Some(bmff_box) = parse_bmff_box(bytes, offset, bytes.len()) else {
            return sink.fail(Status::Malformed);
        };

        emit_jp2_box(bytes, &bmff_box, &mut sink);

        // jp2h holds child boxes (ihdr/colr/...); scan them for ICC.
        if bmff_box.box_type == fourcc(b"jp2h") {
            let mut child_off = bmff_box.payload_offset();
            let child_end = bmff_box.offset + bmff_box.size;
            while child_off < child_end {
                let Some(child) = parse_bmff_box(bytes, child_off, child_end) else {
                    break;
                };
                emit_jp2_box(bytes, &child, &mut sink);
                if child.size == 0 {
                    break;
                }
                child_off += child.size;
            }
        }

        if bmff_box.size == 0 {
            break;
        }
        offset += bmff_box.size;
    }

    sink.result
}

/// Scan a JXL container for `Exif`, `xml ` and `brob` boxes.
pub fn scan_jxl(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 12 {
        return sink.fail(Status::Malformed);
    }
    if u32be(bytes, 0) != Some(12)
        || u32be(bytes, 4) != Some(fourcc(b"JXL "))
        || !match_at(bytes, 8, &JP2_SIGNATURE_TAIL)
    {
        return sink.fail(Status::Unsupported);
    }

    let mut offset = 0usize;
    while offset < bytes.len() {
        let Some(bmff_box) = parse_bmff_box(bytes, offset, bytes.len()) else {
            return sink.fail(Status::Malformed);
        };

        let payload_off = bmff_box.payload_offset();
        let payload_size = bmff_box.payload_size();
        let base = ContainerBlockRef {
            format: ContainerFormat::Jxl,
            outer_offset: bmff_box.offset as u64,
            outer_size: bmff_box.size as u64,
            data_offset: payload_off as u64,
            data_size: payload_size as u64,
            id: bmff_box.box_type,
            ..Default::default()
        };

        if bmff_box.box_type == fourcc(b"Exif") {
            // Payload is a u32-BE TIFF offset followed by the EXIF stream;
            // the reassembler strips the prefix.
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Exif,
                chunking: BlockChunking::BmffExifTiffOffsetU32Be,
                aux_u32: u32be(bytes, payload_off).unwrap_or(0),
                ..base
            });
        } else if bmff_box.box_type == fourcc(b"xml ") {
            sink.emit(ContainerBlockRef {
                kind: ContainerBlockKind::Xmp,
                ..base
            });
        } else if bmff_box.box_type == fourcc(b"brob") && payload_size >= 4 {
            if let Some(real_type) = u32be(bytes, payload_off) {
                sink.emit(ContainerBlockRef {
                    kind: ContainerBlockKind::CompressedMetadata,
                    compression: BlockCompression::Brotli,
                    chunking: BlockChunking::BrobU32BeRealTypePrefix,
                    data_offset: (payload_off + 4) as u64,
                    data_size: (payload_size - 4) as u64,
                    aux_u32: real_type,
                    ..base
                });
            }
        }

        if bmff_box.size == 0 {
            break;
        }
        offset += bmff_box.size;
    }

    sink.result
}

/// Item info gathered from `iinf`/`infe`.
#[derive(Debug, Clone, Copy, Default)]
struct ItemInfo {
    item_id: u32,
    item_type: u32,
    /// For `mime` items: true when the content type names XML.
    mime_is_xml: bool,
}

#[derive(Debug, Clone, Default)]
struct ItemLocation {
    item_id: u32,
    construction_method: u8,
    base_offset: u64,
    /// `(offset, length)` pairs as stored in iloc.
    extents: Vec<(u64, u64)>,
}

#[derive(Debug, Default)]
struct MetaState {
    items: Vec<ItemInfo>,
    locations: Vec<ItemLocation>,
    idat_offset: Option<usize>,
    idat_size: usize,
}

const MAX_BMFF_ITEMS: usize = 4096;
const MAX_BMFF_EXTENTS: usize = 256;
const MAX_BMFF_DEPTH: u32 = 16;

fn parse_infe(bytes: &[u8], payload_off: usize, payload_end: usize, state: &mut MetaState) {
    let Some(version) = u8_at(bytes, payload_off) else {
        return;
    };
    if version < 2 {
        return;
    }
    let mut pos = payload_off + 4;
    let item_id = if version == 2 {
        let Some(id) = u16be(bytes, pos) else { return };
        pos += 2;
        u32::from(id)
    } else {
        let Some(id) = u32be(bytes, pos) else { return };
        pos += 4;
        id
    };
    pos += 2; // item_protection_index
    let Some(item_type) = u32be(bytes, pos) else {
        return;
    };
    pos += 4;

    let mut info = ItemInfo {
        item_id,
        item_type,
        mime_is_xml: false,
    };
    if item_type == fourcc(b"mime") {
        // item_name\0 then content_type\0
        let mut cursor = pos;
        while cursor < payload_end && u8_at(bytes, cursor) != Some(0) {
            cursor += 1;
        }
        let content_start = cursor + 1;
        let mut content_end = content_start;
        while content_end < payload_end && u8_at(bytes, content_end) != Some(0) {
            content_end += 1;
        }
        if let Some(content) = bytes.get(content_start..content_end) {
            let lower: Vec<u8> = content.iter().map(u8::to_ascii_lowercase).collect();
            info.mime_is_xml = lower.windows(3).any(|w| w == b"xml");
        }
    }

    if state.items.len() < MAX_BMFF_ITEMS {
        state.items.push(info);
    }
}

fn parse_iinf(bytes: &[u8], meta_box: &BmffBox, state: &mut MetaState) {
    let payload_off = meta_box.payload_offset();
    let payload_end = meta_box.offset + meta_box.size;
    let Some(version) = u8_at(bytes, payload_off) else {
        return;
    };
    let mut pos = payload_off + 4;
    if version == 0 {
        pos += 2;
    } else {
        pos += 4;
    }

    while pos < payload_end {
        let Some(child) = parse_bmff_box(bytes, pos, payload_end) else {
            break;
        };
        if child.box_type == fourcc(b"infe") {
            parse_infe(bytes, child.payload_offset(), child.offset + child.size, state);
        }
        if child.size == 0 {
            break;
        }
        pos += child.size;
    }
}

/// Read an unsigned integer of 0/4/8 bytes (iloc field sizes).
fn read_sized(bytes: &[u8], pos: &mut usize, size: u8) -> Option<u64> {
    match size {
        0 => Some(0),
        4 => {
            let v = u32be(bytes, *pos)?;
            *pos += 4;
            Some(u64::from(v))
        }
        8 => {
            let v = u64be(bytes, *pos)?;
            *pos += 8;
            Some(v)
        }
        _ => None,
    }
}

fn parse_iloc(bytes: &[u8], iloc_box: &BmffBox, state: &mut MetaState) {
    let payload_off = iloc_box.payload_offset();
    let Some(version) = u8_at(bytes, payload_off) else {
        return;
    };
    if version > 2 {
        return;
    }
    let mut pos = payload_off + 4;

    let Some(sizes) = u8_at(bytes, pos) else { return };
    let offset_size = sizes >> 4;
    let length_size = sizes & 0x0F;
    let Some(sizes2) = u8_at(bytes, pos + 1) else { return };
    let base_offset_size = sizes2 >> 4;
    let index_size = if version > 0 { sizes2 & 0x0F } else { 0 };
    pos += 2;

    let item_count = if version < 2 {
        let Some(n) = u16be(bytes, pos) else { return };
        pos += 2;
        usize::from(n)
    } else {
        let Some(n) = u32be(bytes, pos) else { return };
        pos += 4;
        n as usize
    };

    for _ in 0..item_count.min(MAX_BMFF_ITEMS) {
        let item_id = if version < 2 {
            let Some(id) = u16be(bytes, pos) else { return };
            pos += 2;
            u32::from(id)
        } else {
            let Some(id) = u32be(bytes, pos) else { return };
            pos += 4;
            id
        };

        let mut construction_method = 0u8;
        if version > 0 {
            let Some(cm) = u16be(bytes, pos) else { return };
            construction_method = (cm & 0x0F) as u8;
            pos += 2;
        }
        pos += 2; // data_reference_index
        let Some(base_offset) = read_sized(bytes, &mut pos, base_offset_size) else {
            return;
        };
        let Some(extent_count) = u16be(bytes, pos) else { return };
        pos += 2;
        if usize::from(extent_count) > MAX_BMFF_EXTENTS {
            // Cannot skip unparsed extents reliably; drop the rest of the box.
            return;
        }

        let mut location = ItemLocation {
            item_id,
            construction_method,
            base_offset,
            extents: Vec::new(),
        };
        for _ in 0..usize::from(extent_count) {
            if version > 0 && index_size > 0 {
                if read_sized(bytes, &mut pos, index_size).is_none() {
                    return;
                }
            }
            let Some(extent_offset) = read_sized(bytes, &mut pos, offset_size) else {
                return;
            };
            let Some(extent_length) = read_sized(bytes, &mut pos, length_size) else {
                return;
            };
            location.extents.push((extent_offset, extent_length));
        }
        if state.locations.len() < MAX_BMFF_ITEMS {
            state.locations.push(location);
        }
    }
}

fn scan_meta_box(bytes: &[u8], meta_box: &BmffBox, state: &mut MetaState) {
    // meta is a full box: skip version/flags.
    let mut pos = meta_box.payload_offset() + 4;
    let meta_end = meta_box.offset + meta_box.size;

    while pos < meta_end {
        let Some(child) = parse_bmff_box(bytes, pos, meta_end) else {
            break;
        };
        if child.box_type == fourcc(b"iinf") {
            parse_iinf(bytes, &child, state);
        } else if child.box_type == fourcc(b"iloc") {
            parse_iloc(bytes, &child, state);
        } else if child.box_type == fourcc(b"idat") {
            state.idat_offset = Some(child.payload_offset());
            state.idat_size = child.payload_size();
        }
        if child.size == 0 {
            break;
        }
        pos += child.size;
    }
}

fn emit_item_blocks(bytes: &[u8], state: &MetaState, sink: &mut BlockSink<'_>) {
    for info in &state.items {
        let kind = if info.item_type == fourcc(b"Exif") {
            ContainerBlockKind::Exif
        } else if info.item_type == fourcc(b"jumb") {
            ContainerBlockKind::Jumbf
        } else if info.item_type == fourcc(b"mime") && info.mime_is_xml {
            ContainerBlockKind::Xmp
        } else {
            continue;
        };

        let Some(location) = state.locations.iter().find(|l| l.item_id == info.item_id) else {
            continue;
        };
        if location.extents.is_empty() {
            continue;
        }

        // Resolve extents to absolute file offsets.
        let resolve = |extent_offset: u64| -> Option<u64> {
            match location.construction_method {
                0 => location.base_offset.checked_add(extent_offset),
                1 => {
                    let idat = state.idat_offset? as u64;
                    let rel = location.base_offset.checked_add(extent_offset)?;
                    if rel >= state.idat_size as u64 {
                        return None;
                    }
                    idat.checked_add(rel)
                }
                _ => None,
            }
        };

        let total: u64 = location.extents.iter().map(|&(_, len)| len).sum();
        let part_count = location.extents.len() as u32;
        let mut logical_offset = 0u64;

        for (index, &(extent_offset, extent_length)) in location.extents.iter().enumerate() {
            let this_logical_offset = logical_offset;
            logical_offset += extent_length;
            let Some(abs) = resolve(extent_offset) else {
                continue;
            };
            let chunking = if kind == ContainerBlockKind::Exif {
                BlockChunking::BmffExifTiffOffsetU32Be
            } else {
                BlockChunking::None
            };
            sink.emit(ContainerBlockRef {
                format: ContainerFormat::Bmff,
                kind,
                chunking,
                outer_offset: abs,
                outer_size: extent_length,
                data_offset: abs,
                data_size: extent_length,
                id: info.item_id,
                part_index: index as u32,
                part_count,
                logical_offset: this_logical_offset,
                logical_size: total,
                group: u64::from(info.item_id),
                ..Default::default()
            });
        }
    }
}

fn scan_bmff_children(
    bytes: &[u8],
    begin: usize,
    end: usize,
    depth: u32,
    state: &mut MetaState,
    sink: &mut BlockSink<'_>,
) {
    if depth > MAX_BMFF_DEPTH {
        return;
    }
    let mut offset = begin;
    while offset < end {
        let Some(bmff_box) = parse_bmff_box(bytes, offset, end) else {
            break;
        };

        if bmff_box.box_type == fourcc(b"meta") {
            scan_meta_box(bytes, &bmff_box, state);
        } else if bmff_box.box_type == fourcc(b"moov") {
            scan_bmff_children(
                bytes,
                bmff_box.payload_offset(),
                bmff_box.offset + bmff_box.size,
                depth + 1,
                state,
                sink,
            );
        } else if bmff_box.uuid == Some(CR3_UUID_CANON) {
            emit_cr3_cmt_boxes(bytes, &bmff_box, sink);
        }

        if bmff_box.size == 0 {
            break;
        }
        offset += bmff_box.size;
    }
}

/// Canon CR3 keeps its TIFF metadata in `CMT1..CMT4` children of the vendor
/// uuid box; each payload is a bare TIFF stream.
fn emit_cr3_cmt_boxes(bytes: &[u8], uuid_box: &BmffBox, sink: &mut BlockSink<'_>) {
    let mut pos = uuid_box.payload_offset();
    let end = uuid_box.offset + uuid_box.size;
    while pos < end {
        let Some(child) = parse_bmff_box(bytes, pos, end) else {
            break;
        };
        let name = child.box_type.to_be_bytes();
        if name[0] == b'C' && name[1] == b'M' && name[2] == b'T' {
            sink.emit(ContainerBlockRef {
                format: ContainerFormat::Bmff,
                kind: ContainerBlockKind::Exif,
                outer_offset: child.offset as u64,
                outer_size: child.size as u64,
                data_offset: child.payload_offset() as u64,
                data_size: child.payload_size() as u64,
                id: child.box_type,
                ..Default::default()
            });
        }
        if child.size == 0 {
            break;
        }
        pos += child.size;
    }
}

/// True when `bytes` starts with an `ftyp` box carrying a known brand.
pub(crate) fn is_bmff(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || !match_at(bytes, 4, b"ftyp") {
        return false;
    }
    let brand = &bytes[8..12];
    BMFF_BRANDS.iter().any(|b| brand == *b)
}

/// Scan a HEIF/AVIF/CR3 file for metadata items.
pub fn scan_bmff(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    if bytes.len() < 12 {
        return sink.fail(Status::Malformed);
    }
    if !is_bmff(bytes) {
        return sink.fail(Status::Unsupported);
    }

    let mut state = MetaState::default();
    scan_bmff_children(bytes, 0, bytes.len(), 0, &mut state, &mut sink);
    emit_item_blocks(bytes, &state, &mut sink);

    sink.result
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn full_box(box_type: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![version, 0, 0, 0];
        payload.extend_from_slice(body);
        make_box(box_type, &payload)
    }

    #[test]
    fn parses_largesize_boxes() {
        let mut data = 1u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&24u64.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);
        let parsed = parse_bmff_box(&data, 0, data.len()).unwrap();
        assert_eq!(parsed.size, 24);
        assert_eq!(parsed.header_size, 16);
        assert_eq!(parsed.payload_size(), 8);
    }

    #[test]
    fn jp2_uuid_exif_block() {
        let mut payload = JP2_UUID_EXIF.to_vec();
        payload.extend_from_slice(b"Exif\0\0");
        payload.extend_from_slice(b"II\x2A\x00\x08\x00\x00\x00");
        let mut data = make_box(b"jP  ", &JP2_SIGNATURE_TAIL);
        data.extend_from_slice(&make_box(b"uuid", &payload));

        let mut blocks = [ContainerBlockRef::default(); 4];
        let result = scan_jp2(&data, &mut blocks);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, 1);
        assert_eq!(blocks[0].kind, ContainerBlockKind::Exif);
        // Exif\0\0 preamble is stripped at scan time for JP2 uuid payloads.
        assert_eq!(blocks[0].data_size, 8);
    }

    #[test]
    fn jxl_brob_block_carries_real_type() {
        let mut data = make_box(b"JXL ", &JP2_SIGNATURE_TAIL);
        let mut brob = b"xml ".to_vec();
        brob.extend_from_slice(&[0x0B, 0x01, 0x80]); // arbitrary brotli bytes
        data.extend_from_slice(&make_box(b"brob", &brob));

        let mut blocks = [ContainerBlockRef::default(); 4];
        let result = scan_jxl(&data, &mut blocks);
        assert_eq!(result.written, 1);
        assert_eq!(blocks[0].kind, ContainerBlockKind::CompressedMetadata);
        assert_eq!(blocks[0].compression, BlockCompression::Brotli);
        assert_eq!(blocks[0].aux_u32, fourcc(b"xml "));
        assert_eq!(blocks[0].data_size, 3);
    }

    /// HEIC with one Exif item split over two idat extents (construction
    /// method 1).
    #[test]
    fn heif_multi_extent_exif_item() {
        // idat payload: u32be TIFF offset (4) + "II*\0" + IFD0 offset 8 + empty IFD.
        let mut idat_payload = 4u32.to_be_bytes().to_vec();
        idat_payload.extend_from_slice(b"II\x2A\x00");
        idat_payload.extend_from_slice(&8u32.to_le_bytes());
        idat_payload.extend_from_slice(&0u16.to_le_bytes()); // zero entries
        idat_payload.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        assert_eq!(idat_payload.len(), 18);

        let infe = {
            let mut body = 1u16.to_be_bytes().to_vec(); // item_id
            body.extend_from_slice(&0u16.to_be_bytes()); // protection
            body.extend_from_slice(b"Exif");
            body.extend_from_slice(b"\0");
            full_box(b"infe", 2, &body)
        };
        let iinf = {
            let mut body = 1u16.to_be_bytes().to_vec(); // entry_count
            body.extend_from_slice(&infe);
            full_box(b"iinf", 0, &body)
        };
        let iloc = {
            let mut body = vec![0x44, 0x00]; // offset_size=4, length_size=4, base=0, index=0
            body.extend_from_slice(&1u16.to_be_bytes()); // item_count
            body.extend_from_slice(&1u16.to_be_bytes()); // item_id
            body.extend_from_slice(&1u16.to_be_bytes()); // construction_method = 1 (idat)
            body.extend_from_slice(&0u16.to_be_bytes()); // data_reference_index
            body.extend_from_slice(&2u16.to_be_bytes()); // extent_count
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&12u32.to_be_bytes());
            body.extend_from_slice(&12u32.to_be_bytes());
            body.extend_from_slice(&6u32.to_be_bytes());
            full_box(b"iloc", 1, &body)
        };
        let idat = make_box(b"idat", &idat_payload);

        let mut meta_body = iinf;
        meta_body.extend_from_slice(&iloc);
        meta_body.extend_from_slice(&idat);
        let meta = full_box(b"meta", 0, &meta_body);

        let mut ftyp_payload = b"heic".to_vec();
        ftyp_payload.extend_from_slice(&0u32.to_be_bytes());
        let mut data = make_box(b"ftyp", &ftyp_payload);
        data.extend_from_slice(&meta);

        let mut blocks = [ContainerBlockRef::default(); 8];
        let result = scan_bmff(&data, &mut blocks);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.written, 2);
        assert_eq!(blocks[0].kind, ContainerBlockKind::Exif);
        assert_eq!(blocks[0].part_count, 2);
        assert_eq!(blocks[0].logical_offset, 0);
        assert_eq!(blocks[0].data_size, 12);
        assert_eq!(blocks[1].part_index, 1);
        assert_eq!(blocks[1].logical_offset, 12);
        assert_eq!(blocks[1].logical_size, 18);
        assert_eq!(blocks[0].chunking, BlockChunking::BmffExifTiffOffsetU32Be);
    }

    #[test]
    fn non_bmff_is_unsupported() {
        let mut blocks = [ContainerBlockRef::default(); 1];
        assert_eq!(
            scan_bmff(b"RIFF....WEBPVP8 ", &mut blocks).status,
            Status::Unsupported
        );
    }
}
