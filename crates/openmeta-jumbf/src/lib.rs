//! JUMBF (JPEG Universal Metadata Box Format) decoder.
//!
//! A JUMBF payload is a BMFF box stream. The decoder walks it recursively
//! and emits structural `JumbfField` entries under synthesized
//! `box.<i>[.<i>]*` paths (`.type`, `.size`, `.payload_size`, `.offset`),
//! decodes `cbor` box payloads into path-keyed `JumbfCborKey` entries, and
//! projects C2PA indicators out of the decoded keys (`c2pa.detected`,
//! `c2pa.semantic.*`).

mod c2pa;
mod cbor;

use openmeta_core::{
    BlockId, BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status,
    TextEncoding, WireFamily, WireType,
};

/// Resource limits for JUMBF/C2PA decode.
#[derive(Debug, Clone, Copy)]
pub struct JumbfDecodeLimits {
    /// Maximum input bytes to accept (0 = unlimited).
    pub max_input_bytes: u64,
    pub max_box_depth: u32,
    pub max_boxes: u32,
    pub max_entries: u32,
    pub max_cbor_depth: u32,
    pub max_cbor_items: u32,
    pub max_cbor_key_bytes: u32,
    pub max_cbor_text_bytes: u32,
    pub max_cbor_bytes_bytes: u32,
}

impl Default for JumbfDecodeLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 64 * 1024 * 1024,
            max_box_depth: 32,
            max_boxes: 1 << 16,
            max_entries: 200_000,
            max_cbor_depth: 64,
            max_cbor_items: 200_000,
            max_cbor_key_bytes: 1024,
            max_cbor_text_bytes: 8 * 1024 * 1024,
            max_cbor_bytes_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy)]
pub struct JumbfDecodeOptions {
    /// Traverse `cbor` boxes and emit decoded key/value entries.
    pub decode_cbor: bool,
    /// Emit `c2pa.detected` (and the semantic projection) when C2PA-like
    /// payload is seen.
    pub detect_c2pa: bool,
    pub limits: JumbfDecodeLimits,
}

impl Default for JumbfDecodeOptions {
    fn default() -> Self {
        Self {
            decode_cbor: true,
            detect_c2pa: true,
            limits: JumbfDecodeLimits::default(),
        }
    }
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct JumbfDecodeResult {
    pub status: Status,
    pub boxes_decoded: u32,
    pub cbor_items: u32,
    pub entries_decoded: u32,
}

pub(crate) fn u16be(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(offset..offset + 2)?.try_into().ok()?))
}

pub(crate) fn u32be(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

pub(crate) fn u64be(bytes: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(offset..offset + 8)?.try_into().ok()?))
}

const fn fourcc(s: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*s)
}

#[derive(Debug, Clone, Copy)]
struct BmffBox {
    offset: usize,
    size: usize,
    header_size: usize,
    box_type: u32,
}

fn parse_bmff_box(bytes: &[u8], offset: usize, parent_end: usize) -> Option<BmffBox> {
    let parent_end = parent_end.min(bytes.len());
    if offset.checked_add(8)? > parent_end {
        return None;
    }
    let size32 = u32be(bytes, offset)? as usize;
    let box_type = u32be(bytes, offset + 4)?;
    let (header_size, box_size) = match size32 {
        1 => (16usize, u64be(bytes, offset + 8)?.try_into().ok()?),
        0 => (8usize, parent_end - offset),
        n => (8usize, n),
    };
    if box_size < header_size || offset.checked_add(box_size)? > parent_end {
        return None;
    }
    Some(BmffBox {
        offset,
        size: box_size,
        header_size,
        box_type,
    })
}

fn looks_like_bmff_sequence(bytes: &[u8], begin: usize, end: usize) -> bool {
    begin < end && parse_bmff_box(bytes, begin, end).is_some()
}

fn fourcc_to_text(value: u32) -> String {
    let raw = value.to_be_bytes();
    if raw.iter().all(|&b| (0x20..0x7F).contains(&b)) {
        raw.iter().map(|&b| b as char).collect()
    } else {
        format!("0x{value:08X}")
    }
}

/// Case-insensitive ASCII search within the first `window` bytes.
fn ascii_icase_contains(haystack: &[u8], needle: &str, window: usize) -> bool {
    let limit = haystack.len().min(window);
    let needle = needle.as_bytes();
    if needle.is_empty() || limit < needle.len() {
        return false;
    }
    haystack[..limit]
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

pub(crate) struct DecodeContext<'a> {
    store: &'a mut MetaStore,
    block: BlockId,
    flags: EntryFlags,
    options: &'a JumbfDecodeOptions,
    result: JumbfDecodeResult,
    order_in_block: u32,
    c2pa_emitted: bool,
}

impl DecodeContext<'_> {
    fn has_entry_room(&mut self) -> bool {
        if self.options.limits.max_entries != 0
            && self.result.entries_decoded >= self.options.limits.max_entries
        {
            self.result.status.absorb(Status::LimitExceeded);
            return false;
        }
        true
    }

    fn add_entry(&mut self, key: MetaKey, value: MetaValue, flags: EntryFlags) {
        self.store.add_entry(Entry {
            key,
            value,
            origin: EntryOrigin {
                block: self.block,
                order_in_block: self.order_in_block,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count: 1,
                wire_type_name: None,
            },
            flags: self.flags | flags,
        });
        self.order_in_block += 1;
        self.result.entries_decoded += 1;
    }

    fn emit_field_u64(&mut self, field: &str, value: u64, flags: EntryFlags) -> bool {
        if !self.has_entry_room() {
            return false;
        }
        let Ok(span) = self.store.arena_mut().append_str(field) else {
            self.result.status.absorb(Status::LimitExceeded);
            return false;
        };
        self.add_entry(MetaKey::JumbfField { field: span }, MetaValue::u64(value), flags);
        true
    }

    fn emit_field_u8(&mut self, field: &str, value: u8, flags: EntryFlags) -> bool {
        if !self.has_entry_room() {
            return false;
        }
        let Ok(span) = self.store.arena_mut().append_str(field) else {
            self.result.status.absorb(Status::LimitExceeded);
            return false;
        };
        self.add_entry(MetaKey::JumbfField { field: span }, MetaValue::u8(value), flags);
        true
    }

    fn emit_field_text(&mut self, field: &str, text: &str, flags: EntryFlags) -> bool {
        if !self.has_entry_room() {
            return false;
        }
        let (Ok(span), Ok(value)) = (
            self.store.arena_mut().append_str(field),
            MetaValue::text(self.store.arena_mut(), text, TextEncoding::Utf8),
        ) else {
            self.result.status.absorb(Status::LimitExceeded);
            return false;
        };
        self.add_entry(MetaKey::JumbfField { field: span }, value, flags);
        true
    }

    pub(crate) fn emit_cbor_value(&mut self, key: &str, value: MetaValue) -> bool {
        if !self.has_entry_room() {
            return false;
        }
        let Ok(span) = self.store.arena_mut().append_str(key) else {
            self.result.status.absorb(Status::LimitExceeded);
            return false;
        };
        self.add_entry(MetaKey::JumbfCborKey { key: span }, value, EntryFlags::default());
        true
    }

    /// Emit the `c2pa.detected` marker (once per payload).
    fn append_c2pa_marker(&mut self, marker_path: &str) -> bool {
        if self.c2pa_emitted {
            return true;
        }
        if !self.emit_field_u8("c2pa.detected", 1, EntryFlags::DERIVED) {
            return false;
        }
        if !marker_path.is_empty()
            && !self.emit_field_text("c2pa.marker_path", marker_path, EntryFlags::DERIVED)
        {
            return false;
        }
        self.c2pa_emitted = true;
        true
    }
}

fn child_path(parent: &str, child_index: u32) -> String {
    if parent.is_empty() {
        format!("box.{child_index}")
    } else {
        format!("{parent}.{child_index}")
    }
}

fn decode_jumbf_boxes(
    ctx: &mut DecodeContext<'_>,
    bytes: &[u8],
    begin: usize,
    end: usize,
    depth: u32,
    parent_path: &str,
) -> bool {
    let max_depth = ctx.options.limits.max_box_depth;
    if max_depth != 0 && depth > max_depth {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    }

    let mut offset = begin;
    let mut child_index = 0u32;
    while offset < end {
        let Some(bmff_box) = parse_bmff_box(bytes, offset, end) else {
            return false;
        };

        ctx.result.boxes_decoded += 1;
        let max_boxes = ctx.options.limits.max_boxes;
        if max_boxes != 0 && ctx.result.boxes_decoded > max_boxes {
            ctx.result.status.absorb(Status::LimitExceeded);
            return false;
        }

        let box_path = child_path(parent_path, child_index);
        child_index += 1;

        let payload_off = bmff_box.offset + bmff_box.header_size;
        let payload_end = bmff_box.offset + bmff_box.size;
        let payload = &bytes[payload_off..payload_end];

        if !ctx.emit_field_text(
            &format!("{box_path}.type"),
            &fourcc_to_text(bmff_box.box_type),
            EntryFlags::DERIVED,
        ) {
            return false;
        }
        if !ctx.emit_field_u64(&format!("{box_path}.size"), bmff_box.size as u64, EntryFlags::DERIVED)
        {
            return false;
        }
        if !ctx.emit_field_u64(
            &format!("{box_path}.payload_size"),
            payload.len() as u64,
            EntryFlags::DERIVED,
        ) {
            return false;
        }
        if !ctx.emit_field_u64(
            &format!("{box_path}.offset"),
            bmff_box.offset as u64,
            EntryFlags::DERIVED,
        ) {
            return false;
        }

        if ctx.options.detect_c2pa {
            if bmff_box.box_type == fourcc(b"c2pa") {
                if !ctx.append_c2pa_marker(&box_path) {
                    return false;
                }
            } else if bmff_box.box_type == fourcc(b"jumd")
                && ascii_icase_contains(payload, "c2pa", 4096)
                && !ctx.append_c2pa_marker(&box_path)
            {
                return false;
            }
        }

        if ctx.options.decode_cbor && bmff_box.box_type == fourcc(b"cbor") {
            let cbor_prefix = format!("{box_path}.cbor");
            if !cbor::decode_cbor_payload(ctx, payload, &cbor_prefix) {
                return false;
            }
        }

        if looks_like_bmff_sequence(bytes, payload_off, payload_end)
            && !decode_jumbf_boxes(ctx, bytes, payload_off, payload_end, depth + 1, &box_path)
        {
            return false;
        }

        if bmff_box.size == 0 {
            break;
        }
        offset += bmff_box.size;
    }
    true
}

/// Decode a JUMBF/C2PA payload, appending entries into `store`.
///
/// `flags` is merged into every emitted entry.
pub fn decode_jumbf_payload(
    bytes: &[u8],
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &JumbfDecodeOptions,
) -> JumbfDecodeResult {
    let mut failed = JumbfDecodeResult {
        status: Status::Unsupported,
        ..Default::default()
    };

    let max_in = options.limits.max_input_bytes;
    if max_in != 0 && bytes.len() as u64 > max_in {
        failed.status = Status::LimitExceeded;
        return failed;
    }
    if !looks_like_bmff_sequence(bytes, 0, bytes.len()) {
        return failed;
    }

    let block = match store.add_block(BlockInfo::default()) {
        Ok(block) => block,
        Err(_) => {
            failed.status = Status::LimitExceeded;
            return failed;
        }
    };

    let mut ctx = DecodeContext {
        store,
        block,
        flags,
        options,
        result: JumbfDecodeResult::default(),
        order_in_block: 0,
        c2pa_emitted: false,
    };

    if !decode_jumbf_boxes(&mut ctx, bytes, 0, bytes.len(), 0, "") {
        if ctx.result.status == Status::Ok {
            ctx.result.status = Status::Malformed;
        }
        return ctx.result;
    }

    if options.detect_c2pa && !c2pa::append_semantic_fields(&mut ctx) {
        if ctx.result.status == Status::Ok {
            ctx.result.status = Status::Malformed;
        }
    }

    ctx.result
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKeyView;

    pub(crate) fn make_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn decode(bytes: &[u8]) -> (MetaStore, JumbfDecodeResult) {
        let mut store = MetaStore::new();
        let result = decode_jumbf_payload(
            bytes,
            &mut store,
            EntryFlags::default(),
            &JumbfDecodeOptions::default(),
        );
        store.finalize();
        (store, result)
    }

    fn field_u64(store: &MetaStore, field: &str) -> Option<u64> {
        let id = store.find_first(&MetaKeyView::JumbfField { field })?;
        store.entry(id).value.as_u64()
    }

    fn field_text(store: &MetaStore, field: &str) -> Option<String> {
        let id = store.find_first(&MetaKeyView::JumbfField { field })?;
        store
            .entry(id)
            .value
            .as_text(store.arena())
            .map(str::to_owned)
    }

    /// The seed scenario: a jumb superbox holding a jumd description with a
    /// C2PA label and one cbor box with `{"a": 1}`.
    #[test]
    fn c2pa_jumbf_with_cbor_map() {
        let jumd = make_box(b"jumd", b"c2pa\0");
        let cbor = make_box(b"cbor", &[0xA1, 0x61, 0x61, 0x01]);
        let mut superbox_payload = jumd;
        superbox_payload.extend_from_slice(&cbor);
        let jumb = make_box(b"jumb", &superbox_payload);

        let (store, result) = decode(&jumb);
        assert_eq!(result.status, Status::Ok);
        assert!(result.boxes_decoded >= 3);

        assert_eq!(field_u64(&store, "c2pa.detected"), Some(1));
        assert_eq!(field_text(&store, "box.0.type").as_deref(), Some("jumb"));
        assert_eq!(field_text(&store, "box.0.0.type").as_deref(), Some("jumd"));
        assert_eq!(field_text(&store, "box.0.1.type").as_deref(), Some("cbor"));

        let key_id = store
            .find_first(&MetaKeyView::JumbfCborKey { key: "box.0.1.cbor.a" })
            .unwrap();
        assert_eq!(store.entry(key_id).value.as_u64(), Some(1));

        // Semantic projection fields ride along.
        assert_eq!(field_u64(&store, "c2pa.semantic.cbor_key_count"), Some(1));
    }

    #[test]
    fn box_fields_describe_structure() {
        let data = make_box(b"test", &[0xAA; 4]);
        let (store, result) = decode(&data);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(field_u64(&store, "box.0.size"), Some(12));
        assert_eq!(field_u64(&store, "box.0.payload_size"), Some(4));
        assert_eq!(field_u64(&store, "box.0.offset"), Some(0));
    }

    #[test]
    fn non_printable_type_is_hex() {
        let data = make_box(&[0x01, 0x02, 0x03, 0x04], &[]);
        let (store, _) = decode(&data);
        assert_eq!(field_text(&store, "box.0.type").as_deref(), Some("0x01020304"));
    }

    #[test]
    fn non_bmff_is_unsupported() {
        let (_, result) = decode(b"ab");
        assert_eq!(result.status, Status::Unsupported);
    }

    #[test]
    fn cbor_decode_can_be_disabled() {
        let cbor = make_box(b"cbor", &[0xA1, 0x61, 0x61, 0x01]);
        let mut store = MetaStore::new();
        let options = JumbfDecodeOptions {
            decode_cbor: false,
            ..Default::default()
        };
        let result = decode_jumbf_payload(&cbor, &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.cbor_items, 0);
        store.finalize();
        assert!(store
            .find_first(&MetaKeyView::JumbfCborKey { key: "box.0.cbor.a" })
            .is_none());
    }

    #[test]
    fn box_count_limit() {
        let mut data = Vec::new();
        for _ in 0..8 {
            data.extend_from_slice(&make_box(b"free", &[]));
        }
        let mut options = JumbfDecodeOptions::default();
        options.limits.max_boxes = 3;
        let mut store = MetaStore::new();
        let result = decode_jumbf_payload(&data, &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::LimitExceeded);
    }

    #[test]
    fn truncated_sibling_box_is_malformed() {
        let mut data = make_box(b"jumd", b"x\0");
        // A second box claiming 256 bytes with only 8 present.
        data.extend_from_slice(&256u32.to_be_bytes());
        data.extend_from_slice(b"cbor");
        let (_, result) = decode(&data);
        assert_eq!(result.status, Status::Malformed);
    }
}
