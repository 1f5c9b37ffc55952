//! PrintIM (Print Image Matching) subtable decoder.
//!
//! PrintIM rides on IFD0 tag 0xC4A5 as an UNDEFINED payload:
//!
//! ```text
//! "PrintIM\0" version[4] reserved:u16 count:u16 (tag:u16 value:u32)*
//! ```
//!
//! Integers use the enclosing TIFF's byte order. Each record becomes a
//! `PrintImField` entry named `0x%04x`; the version string is emitted under
//! the `version` field. All entries are marked derived.

use openmeta_core::{
    BlockInfo, ByteOrder, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status,
    TextEncoding, WireFamily, WireType,
};

use crate::ExifDecodeResult;

const PRINTIM_MAGIC: &[u8] = b"PrintIM\0";
const HEADER_LEN: usize = 16;
const RECORD_LEN: usize = 6;
const MAX_RECORDS: u16 = 1024;

pub(crate) fn decode_printim(
    raw: &[u8],
    order: ByteOrder,
    store: &mut MetaStore,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < HEADER_LEN || &raw[..PRINTIM_MAGIC.len()] != PRINTIM_MAGIC {
        return;
    }
    let version = &raw[8..12];
    let Ok(count) = order.read_u16_at(raw, 14) else {
        result.status.absorb(Status::Malformed);
        return;
    };
    if count > MAX_RECORDS {
        result.status.absorb(Status::LimitExceeded);
        return;
    }
    if HEADER_LEN + usize::from(count) * RECORD_LEN > raw.len() {
        result.status.absorb(Status::Malformed);
        return;
    }

    let Ok(block) = store.add_block(BlockInfo::default()) else {
        result.status.absorb(Status::LimitExceeded);
        return;
    };

    let mut order_in_block = 0u32;

    if version.iter().all(|b| b.is_ascii_graphic()) {
        let Ok(text) = std::str::from_utf8(version) else {
            return;
        };
        let Ok(value) = MetaValue::text(store.arena_mut(), text, TextEncoding::Ascii) else {
            result.status.absorb(Status::LimitExceeded);
            return;
        };
        if !emit_field(store, block, &mut order_in_block, "version", value, 4, result) {
            result.status.absorb(Status::LimitExceeded);
            return;
        }
    }

    for i in 0..usize::from(count) {
        let record_off = HEADER_LEN + i * RECORD_LEN;
        let (Ok(tag), Ok(value)) = (
            order.read_u16_at(raw, record_off),
            order.read_u32_at(raw, record_off + 2),
        ) else {
            result.status.absorb(Status::Malformed);
            return;
        };
        let field = format!("0x{tag:04x}");
        if !emit_field(
            store,
            block,
            &mut order_in_block,
            &field,
            MetaValue::u32(value),
            1,
            result,
        ) {
            result.status.absorb(Status::LimitExceeded);
            return;
        }
    }
}

fn emit_field(
    store: &mut MetaStore,
    block: openmeta_core::BlockId,
    order_in_block: &mut u32,
    field: &str,
    value: MetaValue,
    wire_count: u32,
    result: &mut ExifDecodeResult,
) -> bool {
    let Ok(field_span) = store.arena_mut().append_str(field) else {
        return false;
    };
    store.add_entry(Entry {
        key: MetaKey::PrintImField { field: field_span },
        value,
        origin: EntryOrigin {
            block,
            order_in_block: *order_in_block,
            wire_type: WireType::new(WireFamily::Other, 0),
            wire_count,
            wire_type_name: None,
        },
        flags: EntryFlags::DERIVED,
    });
    *order_in_block += 1;
    result.entries_decoded += 1;
    true
}
