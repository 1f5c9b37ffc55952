//! ICC profile decoder.
//!
//! An ICC profile is a 128-byte header (`acsp` magic at offset 36)
//! followed by a tag table: `tag_count:u32be` then 12-byte entries
//! `(signature, offset, size)`. The decoder emits one `IccHeaderField`
//! entry per fixed header field (keyed by byte offset) and one `IccTag`
//! entry per table entry, carrying the raw tag bytes.
//!
//! A declared profile size that disagrees with the buffer length is
//! tolerated: fields are still emitted, the result is flagged malformed.

use openmeta_core::{
    BlockId, BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status,
    WireFamily, WireType,
};

/// Resource limits for ICC decode.
#[derive(Debug, Clone, Copy)]
pub struct IccDecodeLimits {
    pub max_tags: u32,
    pub max_tag_bytes: u32,
    pub max_total_tag_bytes: u64,
}

impl Default for IccDecodeLimits {
    fn default() -> Self {
        Self {
            max_tags: 4096,
            max_tag_bytes: 16 * 1024 * 1024,
            max_total_tag_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy, Default)]
pub struct IccDecodeOptions {
    pub limits: IccDecodeLimits,
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct IccDecodeResult {
    pub status: Status,
    pub entries_decoded: u32,
}

const HEADER_LEN: usize = 128;
const ACSP_OFFSET: usize = 36;

fn u16be(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(offset..offset + 2)?.try_into().ok()?))
}

fn u32be(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

struct HeaderEmitter<'a> {
    store: &'a mut MetaStore,
    block: BlockId,
    order: u32,
    status: Status,
    entries: u32,
}

impl HeaderEmitter<'_> {
    fn emit(&mut self, offset: u32, value: MetaValue, wire_count: u32) {
        self.store.add_entry(Entry {
            key: MetaKey::IccHeaderField { offset },
            value,
            origin: EntryOrigin {
                block: self.block,
                order_in_block: self.order,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count,
                wire_type_name: None,
            },
            flags: EntryFlags::default(),
        });
        self.order += 1;
        self.entries += 1;
    }

    fn emit_bytes(&mut self, icc: &[u8], offset: usize, len: usize) {
        match MetaValue::bytes(self.store.arena_mut(), &icc[offset..offset + len]) {
            Ok(value) => self.emit(offset as u32, value, len as u32),
            Err(_) => self.status.absorb(Status::LimitExceeded),
        }
    }

    fn emit_u32(&mut self, offset: usize, value: u32) {
        self.emit(offset as u32, MetaValue::u32(value), 1);
    }
}

/// Decode an ICC profile, appending header-field and tag entries.
pub fn decode_icc_profile(
    icc_bytes: &[u8],
    store: &mut MetaStore,
    options: &IccDecodeOptions,
) -> IccDecodeResult {
    let mut result = IccDecodeResult::default();

    // Header (128) + tag count (4).
    if icc_bytes.len() < HEADER_LEN + 4 {
        result.status = Status::Unsupported;
        return result;
    }
    if &icc_bytes[ACSP_OFFSET..ACSP_OFFSET + 4] != b"acsp" {
        result.status = Status::Unsupported;
        return result;
    }

    let Some(declared_size) = u32be(icc_bytes, 0) else {
        result.status = Status::Malformed;
        return result;
    };
    if declared_size != 0 && declared_size as usize != icc_bytes.len() {
        // Keep going, but flag the profile.
        result.status.absorb(Status::Malformed);
    }

    let Ok(block) = store.add_block(BlockInfo::default()) else {
        result.status.absorb(Status::LimitExceeded);
        return result;
    };

    let mut emitter = HeaderEmitter {
        store,
        block,
        order: 0,
        status: result.status,
        entries: 0,
    };

    emitter.emit_u32(0, declared_size);
    emitter.emit_bytes(icc_bytes, 4, 4); // preferred CMM
    match u32be(icc_bytes, 8) {
        Some(version) => emitter.emit_u32(8, version),
        None => emitter.status.absorb(Status::Malformed),
    }
    emitter.emit_bytes(icc_bytes, 12, 4); // profile class
    emitter.emit_bytes(icc_bytes, 16, 4); // data color space
    emitter.emit_bytes(icc_bytes, 20, 4); // PCS

    // Creation date/time: six u16 fields.
    let mut date_time = [0u16; 6];
    let mut date_ok = true;
    for (i, part) in date_time.iter_mut().enumerate() {
        match u16be(icc_bytes, 24 + i * 2) {
            Some(v) => *part = v,
            None => date_ok = false,
        }
    }
    if date_ok {
        match MetaValue::u16_array(emitter.store.arena_mut(), &date_time) {
            Ok(value) => emitter.emit(24, value, 6),
            Err(_) => emitter.status.absorb(Status::LimitExceeded),
        }
    } else {
        emitter.emit_bytes(icc_bytes, 24, 12);
        emitter.status.absorb(Status::Malformed);
    }

    emitter.emit_bytes(icc_bytes, 36, 4); // "acsp"
    emitter.emit_bytes(icc_bytes, 40, 4); // platform
    emitter.emit_bytes(icc_bytes, 44, 4); // flags
    emitter.emit_bytes(icc_bytes, 48, 4); // device manufacturer
    emitter.emit_bytes(icc_bytes, 52, 4); // device model
    emitter.emit_bytes(icc_bytes, 56, 8); // device attributes
    emitter.emit_bytes(icc_bytes, 64, 4); // rendering intent
    emitter.emit_bytes(icc_bytes, 68, 12); // PCS illuminant
    emitter.emit_bytes(icc_bytes, 80, 4); // creator
    emitter.emit_bytes(icc_bytes, 84, 16); // profile id

    result.status = emitter.status;
    result.entries_decoded = emitter.entries;
    let mut order = emitter.order;

    // Tag table.
    let Some(tag_count) = u32be(icc_bytes, HEADER_LEN) else {
        result.status.absorb(Status::Malformed);
        return result;
    };
    if tag_count > options.limits.max_tags {
        result.status.absorb(Status::LimitExceeded);
        return result;
    }
    let table_bytes = 4u64 + u64::from(tag_count) * 12;
    if HEADER_LEN as u64 + table_bytes > icc_bytes.len() as u64 {
        result.status.absorb(Status::Malformed);
        return result;
    }

    let mut total_tag_bytes = 0u64;
    for i in 0..tag_count {
        let entry_off = HEADER_LEN + 4 + (i as usize) * 12;
        let (Some(signature), Some(offset), Some(size)) = (
            u32be(icc_bytes, entry_off),
            u32be(icc_bytes, entry_off + 4),
            u32be(icc_bytes, entry_off + 8),
        ) else {
            result.status.absorb(Status::Malformed);
            continue;
        };

        if size > options.limits.max_tag_bytes {
            result.status.absorb(Status::LimitExceeded);
            continue;
        }
        total_tag_bytes += u64::from(size);
        if options.limits.max_total_tag_bytes != 0
            && total_tag_bytes > options.limits.max_total_tag_bytes
        {
            result.status.absorb(Status::LimitExceeded);
            continue;
        }

        let end = u64::from(offset) + u64::from(size);
        if end > icc_bytes.len() as u64 {
            result.status.absorb(Status::Malformed);
            continue;
        }
        let tag_bytes = &icc_bytes[offset as usize..end as usize];

        let Ok(value) = MetaValue::bytes(store.arena_mut(), tag_bytes) else {
            result.status.absorb(Status::LimitExceeded);
            continue;
        };
        store.add_entry(Entry {
            key: MetaKey::IccTag { signature },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: order,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count: size,
                wire_type_name: None,
            },
            flags: EntryFlags::default(),
        });
        result.entries_decoded += 1;
        order += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKeyView;

    /// Minimal profile: header + `desc` tag holding 4 payload bytes.
    fn minimal_profile() -> Vec<u8> {
        let tag_payload = b"mluc";
        let total = HEADER_LEN + 4 + 12 + tag_payload.len();
        let mut icc = vec![0u8; HEADER_LEN];
        icc[0..4].copy_from_slice(&(total as u32).to_be_bytes());
        icc[4..8].copy_from_slice(b"ADBE");
        icc[8..12].copy_from_slice(&0x0420_0000u32.to_be_bytes()); // v4.2
        icc[12..16].copy_from_slice(b"mntr");
        icc[16..20].copy_from_slice(b"RGB ");
        icc[20..24].copy_from_slice(b"XYZ ");
        icc[24..26].copy_from_slice(&2024u16.to_be_bytes());
        icc[36..40].copy_from_slice(b"acsp");
        icc.extend_from_slice(&1u32.to_be_bytes()); // tag count
        icc.extend_from_slice(b"desc");
        icc.extend_from_slice(&((HEADER_LEN + 16) as u32).to_be_bytes());
        icc.extend_from_slice(&(tag_payload.len() as u32).to_be_bytes());
        icc.extend_from_slice(tag_payload);
        icc
    }

    #[test]
    fn decodes_header_fields_and_tags() {
        let icc = minimal_profile();
        let mut store = MetaStore::new();
        let result = decode_icc_profile(&icc, &mut store, &IccDecodeOptions::default());
        assert_eq!(result.status, Status::Ok);
        store.finalize();

        let size_id = store
            .find_first(&MetaKeyView::IccHeaderField { offset: 0 })
            .unwrap();
        assert_eq!(store.entry(size_id).value.as_u64(), Some(icc.len() as u64));

        let desc_id = store
            .find_first(&MetaKeyView::IccTag {
                signature: u32::from_be_bytes(*b"desc"),
            })
            .unwrap();
        match store.entry(desc_id).value {
            MetaValue::Bytes(span) => assert_eq!(store.arena().span(span), b"mluc"),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn size_mismatch_still_emits_but_flags_malformed() {
        let mut icc = minimal_profile();
        icc[0..4].copy_from_slice(&9999u32.to_be_bytes());
        let mut store = MetaStore::new();
        let result = decode_icc_profile(&icc, &mut store, &IccDecodeOptions::default());
        assert_eq!(result.status, Status::Malformed);
        assert!(result.entries_decoded > 16);
    }

    #[test]
    fn missing_acsp_is_unsupported() {
        let mut icc = minimal_profile();
        icc[36..40].copy_from_slice(b"xxxx");
        let mut store = MetaStore::new();
        let result = decode_icc_profile(&icc, &mut store, &IccDecodeOptions::default());
        assert_eq!(result.status, Status::Unsupported);
        assert_eq!(result.entries_decoded, 0);
    }

    #[test]
    fn tag_out_of_range_is_malformed() {
        let mut icc = minimal_profile();
        // Point the tag data way past the end.
        let entry_off = HEADER_LEN + 4 + 4;
        icc[entry_off..entry_off + 4].copy_from_slice(&0xFFFFu32.to_be_bytes());
        let mut store = MetaStore::new();
        let result = decode_icc_profile(&icc, &mut store, &IccDecodeOptions::default());
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn tag_count_limit() {
        let mut icc = minimal_profile();
        icc[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut store = MetaStore::new();
        let result = decode_icc_profile(&icc, &mut store, &IccDecodeOptions::default());
        assert_eq!(result.status, Status::LimitExceeded);
    }
}
