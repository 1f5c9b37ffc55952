//! Canon CRW (CIFF) heap decoder.
//!
//! A CRW file is `byte_order(2) heap_offset(4) "HEAPCCDR"` followed by a
//! heap. Each heap ends with a u32 pointing at its directory: a u16 record
//! count then 10-byte records `{tag:u16 size:u32 offset:u32}`. Tag bits
//! encode the storage location (0xC000: 0x0000 = value in heap, 0x4000 =
//! value in the record itself) and data type (0x3800; 0x2800/0x3000 mark
//! sub-heaps, which recurse).
//!
//! CIFF is vendor-specific; fields surface as `ExifTag` entries under
//! synthetic `ciff_*` IFD tokens so downstream consumers need no extra key
//! kind.

use openmeta_core::{
    BlockId, BlockInfo, ByteOrder, ByteSpan, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore,
    MetaValue, Status, TextEncoding, WireFamily, WireType,
};

use crate::ExifDecodeLimits;

const CIFF_MAGIC: &[u8] = b"HEAPCCDR";
const MAX_CIFF_DEPTH: u32 = 32;

const TAG_CANON_MAKE_MODEL: u16 = 0x080A;
const DIR_CAMERA_OBJECT: u16 = 0x2807;
const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;

/// Result of a CRW/CIFF decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct CiffDecodeResult {
    pub status: Status,
    pub directories_decoded: u32,
    pub entries_decoded: u32,
}

fn ciff_tag_id(tag: u16) -> u16 {
    tag & 0x3FFF
}

fn ciff_type_bits(tag: u16) -> u16 {
    tag & 0x3800
}

fn ciff_loc_bits(tag: u16) -> u16 {
    tag & 0xC000
}

fn ciff_is_directory(tag: u16) -> bool {
    matches!(ciff_type_bits(tag), 0x2800 | 0x3000)
}

/// Parse the directory id out of a `ciff_XXXX_n` token.
fn parse_dir_id(token: &str) -> Option<u16> {
    let hex = token.strip_prefix("ciff_")?.get(..4)?;
    u16::from_str_radix(hex, 16).ok()
}

struct CiffContext<'a> {
    order: ByteOrder,
    store: &'a mut MetaStore,
    limits: &'a ExifDecodeLimits,
    result: CiffDecodeResult,
    dir_index: u32,
}

impl CiffContext<'_> {
    fn read_u16(&self, bytes: &[u8], offset: usize) -> Option<u16> {
        self.order.read_u16_at(bytes, offset).ok()
    }

    fn read_u32(&self, bytes: &[u8], offset: usize) -> Option<u32> {
        self.order.read_u32_at(bytes, offset).ok()
    }
}

fn decode_value(
    ctx: &mut CiffContext<'_>,
    tag: u16,
    raw: &[u8],
) -> MetaValue {
    let fallback = |ctx: &mut CiffContext<'_>, raw: &[u8]| {
        match MetaValue::bytes(ctx.store.arena_mut(), raw) {
            Ok(v) => v,
            Err(_) => {
                ctx.result.status.absorb(Status::LimitExceeded);
                MetaValue::Empty
            }
        }
    };

    match ciff_type_bits(tag) {
        0x0000 => {
            // unsigned byte
            if raw.len() == 1 {
                MetaValue::u8(raw[0])
            } else {
                fallback(ctx, raw)
            }
        }
        0x0800 => {
            // ASCII, NUL-terminated
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let text = &raw[..end];
            if text.is_ascii() {
                match std::str::from_utf8(text) {
                    Ok(text) => {
                        match MetaValue::text(ctx.store.arena_mut(), text, TextEncoding::Ascii) {
                            Ok(v) => v,
                            Err(_) => {
                                ctx.result.status.absorb(Status::LimitExceeded);
                                MetaValue::Empty
                            }
                        }
                    }
                    Err(_) => fallback(ctx, raw),
                }
            } else {
                fallback(ctx, raw)
            }
        }
        0x1000 => {
            // unsigned short
            let mut values = Vec::with_capacity(raw.len() / 2);
            for i in (0..raw.len().saturating_sub(1)).step_by(2) {
                if let Some(v) = ctx.read_u16(raw, i) {
                    values.push(v);
                }
            }
            if values.len() == 1 {
                MetaValue::u16(values[0])
            } else {
                match MetaValue::u16_array(ctx.store.arena_mut(), &values) {
                    Ok(v) => v,
                    Err(_) => {
                        ctx.result.status.absorb(Status::LimitExceeded);
                        MetaValue::Empty
                    }
                }
            }
        }
        0x1800 => {
            // unsigned long
            let mut values = Vec::with_capacity(raw.len() / 4);
            for i in (0..raw.len().saturating_sub(3)).step_by(4) {
                if let Some(v) = ctx.read_u32(raw, i) {
                    values.push(v);
                }
            }
            if values.len() == 1 {
                MetaValue::u32(values[0])
            } else {
                match MetaValue::u32_array(ctx.store.arena_mut(), &values) {
                    Ok(v) => v,
                    Err(_) => {
                        ctx.result.status.absorb(Status::LimitExceeded);
                        MetaValue::Empty
                    }
                }
            }
        }
        _ => fallback(ctx, raw),
    }
}

/// Canon stores make and model as two NUL-terminated strings in one record;
/// surface them additionally under the standard TIFF tag ids.
fn add_make_model_entries(
    ctx: &mut CiffContext<'_>,
    token: &str,
    ifd_span: ByteSpan,
    block: BlockId,
    order_in_block: u32,
    raw: &[u8],
) {
    if parse_dir_id(token) != Some(DIR_CAMERA_OBJECT) {
        return;
    }

    let make_end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if make_end == 0 {
        return;
    }
    let model_start = make_end + 1;
    let model_end = raw
        .iter()
        .skip(model_start)
        .position(|&b| b == 0)
        .map(|n| model_start + n)
        .unwrap_or(raw.len());

    for (tag, range) in [
        (TAG_MAKE, 0..make_end),
        (TAG_MODEL, model_start..model_end.max(model_start)),
    ] {
        let text = &raw[range];
        if text.is_empty() || !text.is_ascii() {
            continue;
        }
        let Ok(text) = std::str::from_utf8(text) else {
            continue;
        };
        let Ok(value) = MetaValue::text(ctx.store.arena_mut(), text, TextEncoding::Ascii) else {
            ctx.result.status.absorb(Status::LimitExceeded);
            return;
        };
        if ctx.result.entries_decoded >= ctx.limits.max_total_entries {
            ctx.result.status.absorb(Status::LimitExceeded);
            return;
        }
        ctx.store.add_entry(Entry {
            key: MetaKey::ExifTag {
                ifd: ifd_span,
                tag,
            },
            value,
            origin: EntryOrigin {
                block,
                order_in_block,
                wire_type: WireType::new(WireFamily::Other, TAG_CANON_MAKE_MODEL),
                wire_count: value.count(),
                wire_type_name: None,
            },
            flags: EntryFlags::DERIVED,
        });
        ctx.result.entries_decoded += 1;
    }
}

fn decode_directory(ctx: &mut CiffContext<'_>, dir_bytes: &[u8], token: &str, depth: u32) -> bool {
    if dir_bytes.len() < 6 {
        ctx.result.status.absorb(Status::Malformed);
        return false;
    }
    if depth > MAX_CIFF_DEPTH {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    }
    if ctx.result.directories_decoded >= ctx.limits.max_ifds {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    }

    let Some(entry_off) = ctx.read_u32(dir_bytes, dir_bytes.len() - 4) else {
        ctx.result.status.absorb(Status::Malformed);
        return false;
    };
    let entry_off = entry_off as usize;
    if entry_off > dir_bytes.len().saturating_sub(2) {
        ctx.result.status.absorb(Status::Malformed);
        return false;
    }
    let Some(entry_count) = ctx.read_u16(dir_bytes, entry_off) else {
        ctx.result.status.absorb(Status::Malformed);
        return false;
    };
    let entries_start = entry_off + 2;
    if entries_start + usize::from(entry_count) * 10 > dir_bytes.len() {
        ctx.result.status.absorb(Status::Malformed);
        return false;
    }

    let Ok(block) = ctx.store.add_block(BlockInfo::default()) else {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    };
    let Ok(ifd_span) = ctx.store.arena_mut().append_str(token) else {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    };
    ctx.result.directories_decoded += 1;

    let mut any = false;
    for i in 0..usize::from(entry_count) {
        let eoff = entries_start + i * 10;
        let Some(tag) = ctx.read_u16(dir_bytes, eoff) else {
            ctx.result.status.absorb(Status::Malformed);
            break;
        };

        let (value_off, value_len) = match ciff_loc_bits(tag) {
            0x4000 => (eoff + 2, 8), // value lives in the record
            0x0000 => {
                let (Some(size), Some(off)) = (
                    ctx.read_u32(dir_bytes, eoff + 2),
                    ctx.read_u32(dir_bytes, eoff + 6),
                ) else {
                    ctx.result.status.absorb(Status::Malformed);
                    break;
                };
                (off as usize, size as usize)
            }
            _ => {
                ctx.result.status.absorb(Status::Malformed);
                continue;
            }
        };

        let Some(end) = value_off.checked_add(value_len) else {
            ctx.result.status.absorb(Status::Malformed);
            continue;
        };
        if end > dir_bytes.len() {
            ctx.result.status.absorb(Status::Malformed);
            continue;
        }
        let raw = &dir_bytes[value_off..end];

        if ciff_is_directory(tag) {
            let index = ctx.dir_index;
            ctx.dir_index += 1;
            let child_token = format!("ciff_{:04X}_{}", ciff_tag_id(tag), index);
            decode_directory(ctx, raw, &child_token, depth + 1);
            any = true;
            continue;
        }

        if ctx.result.entries_decoded >= ctx.limits.max_total_entries {
            ctx.result.status.absorb(Status::LimitExceeded);
            break;
        }

        let mut flags = EntryFlags::default();
        let value = if value_len as u64 > ctx.limits.max_value_bytes {
            flags |= EntryFlags::TRUNCATED;
            ctx.result.status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        } else {
            decode_value(ctx, tag, raw)
        };

        ctx.store.add_entry(Entry {
            key: MetaKey::ExifTag {
                ifd: ifd_span,
                tag: ciff_tag_id(tag),
            },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire_type: WireType::new(WireFamily::Other, tag),
                wire_count: value_len.min(u32::MAX as usize) as u32,
                wire_type_name: None,
            },
            flags,
        });
        ctx.result.entries_decoded += 1;

        if value_len as u64 <= ctx.limits.max_value_bytes
            && ciff_tag_id(tag) == TAG_CANON_MAKE_MODEL
        {
            add_make_model_entries(ctx, token, ifd_span, block, i as u32, raw);
        }
        any = true;
    }

    any
}

/// Decode a CRW/CIFF file, appending `ExifTag`-shaped entries under
/// `ciff_*` IFD tokens.
pub fn decode_crw_ciff(
    file_bytes: &[u8],
    store: &mut MetaStore,
    limits: &ExifDecodeLimits,
) -> CiffDecodeResult {
    let mut result = CiffDecodeResult {
        status: Status::Unsupported,
        ..Default::default()
    };

    if file_bytes.len() < 14 {
        return result;
    }
    let order = match (file_bytes[0], file_bytes[1]) {
        (0x49, 0x49) => ByteOrder::LittleEndian,
        (0x4D, 0x4D) => ByteOrder::BigEndian,
        _ => return result,
    };
    if &file_bytes[6..14] != CIFF_MAGIC {
        return result;
    }

    let root_off = match order.read_u32_at(file_bytes, 2) {
        Ok(off) => off as usize,
        Err(_) => {
            result.status = Status::Malformed;
            return result;
        }
    };
    if root_off < 14 || root_off > file_bytes.len() {
        result.status = Status::Malformed;
        return result;
    }

    let mut ctx = CiffContext {
        order,
        store,
        limits,
        result: CiffDecodeResult::default(),
        dir_index: 0,
    };
    let any = decode_directory(&mut ctx, &file_bytes[root_off..], "ciff_root", 0);
    let mut out = ctx.result;
    if !any && out.status == Status::Ok {
        out.status = Status::Malformed;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKeyView;

    /// Build a minimal CRW: header + heap with one ASCII record and the
    /// directory at the heap tail.
    fn crw_with_ascii_record(tag: u16, payload: &[u8]) -> Vec<u8> {
        let heap_start = 14usize;
        let mut heap = payload.to_vec();
        let dir_off = heap.len();
        heap.extend_from_slice(&1u16.to_le_bytes()); // record count
        heap.extend_from_slice(&tag.to_le_bytes());
        heap.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        heap.extend_from_slice(&0u32.to_le_bytes()); // offset within heap
        heap.extend_from_slice(&(dir_off as u32).to_le_bytes());

        let mut file = b"II".to_vec();
        file.extend_from_slice(&(heap_start as u32).to_le_bytes());
        file.extend_from_slice(CIFF_MAGIC);
        file.extend_from_slice(&heap);
        file
    }

    #[test]
    fn decodes_ascii_record() {
        // 0x0805 = asciiString type bits (0x0800) | id 5.
        let file = crw_with_ascii_record(0x0805, b"hello ciff\0");
        let mut store = MetaStore::new();
        let result = decode_crw_ciff(&file, &mut store, &ExifDecodeLimits::default());
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.directories_decoded, 1);
        assert_eq!(result.entries_decoded, 1);

        store.finalize();
        let id = store
            .find_first(&MetaKeyView::ExifTag {
                ifd: "ciff_root",
                tag: 0x0805,
            })
            .unwrap();
        assert_eq!(store.entry(id).value.as_text(store.arena()), Some("hello ciff"));
    }

    #[test]
    fn non_crw_is_unsupported() {
        let mut store = MetaStore::new();
        let result = decode_crw_ciff(
            b"II\x1A\x00\x00\x00NOTCCDR!rest",
            &mut store,
            &ExifDecodeLimits::default(),
        );
        assert_eq!(result.status, Status::Unsupported);
    }

    #[test]
    fn directory_offset_past_heap_is_malformed() {
        let mut file = crw_with_ascii_record(0x0805, b"x\0");
        let tail = file.len() - 4;
        file[tail..].copy_from_slice(&0xFFFF_u32.to_le_bytes());
        let mut store = MetaStore::new();
        let result = decode_crw_ciff(&file, &mut store, &ExifDecodeLimits::default());
        assert_eq!(result.status, Status::Malformed);
    }
}
