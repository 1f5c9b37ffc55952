//! IPTC-IIM dataset stream decoder.
//!
//! Each dataset is framed as:
//!
//! ```text
//! 0x1C record dataset length payload
//! ```
//!
//! The length field is two bytes big-endian when the top bit is clear;
//! otherwise the low 15 bits give the byte count N (1..=4) of an extended
//! big-endian length that follows. Every dataset becomes an
//! `IptcDataset { record, dataset }` entry carrying the raw payload bytes.

use openmeta_core::{
    BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status, WireFamily,
    WireType,
};

/// Resource limits for IPTC-IIM decode.
#[derive(Debug, Clone, Copy)]
pub struct IptcIimDecodeLimits {
    pub max_datasets: u32,
    pub max_dataset_bytes: u64,
    /// Caps both the input stream and the accumulated payload bytes
    /// (0 = unlimited).
    pub max_total_bytes: u64,
}

impl Default for IptcIimDecodeLimits {
    fn default() -> Self {
        Self {
            max_datasets: 65536,
            max_dataset_bytes: 16 * 1024 * 1024,
            max_total_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy, Default)]
pub struct IptcIimDecodeOptions {
    pub limits: IptcIimDecodeLimits,
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct IptcIimDecodeResult {
    pub status: Status,
    pub entries_decoded: u32,
}

const DATASET_MARKER: u8 = 0x1C;

fn read_u16be(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(offset..offset + 2)?.try_into().ok()?))
}

/// Decode the variable-width length field at `offset`; returns
/// `(value_len, header_len)`.
fn read_dataset_length(bytes: &[u8], offset: usize) -> Option<(u64, usize)> {
    let base = read_u16be(bytes, offset)?;
    if base & 0x8000 == 0 {
        return Some((u64::from(base), 2));
    }
    let n = usize::from(base & 0x7FFF);
    if n == 0 || n > 4 {
        return None;
    }
    let ext = bytes.get(offset + 2..offset + 2 + n)?;
    let mut value = 0u64;
    for &b in ext {
        value = (value << 8) | u64::from(b);
    }
    Some((value, 2 + n))
}

/// Decode an IPTC-IIM dataset stream, appending entries into `store`.
///
/// `flags` is merged into every emitted entry (used when the stream was
/// itself extracted from another structure, e.g. a Photoshop IRB).
pub fn decode_iptc_iim(
    iptc_bytes: &[u8],
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &IptcIimDecodeOptions,
) -> IptcIimDecodeResult {
    let mut result = IptcIimDecodeResult::default();

    if iptc_bytes.first() != Some(&DATASET_MARKER) {
        result.status = Status::Unsupported;
        return result;
    }
    let max_total = options.limits.max_total_bytes;
    if max_total != 0 && iptc_bytes.len() as u64 > max_total {
        result.status = Status::LimitExceeded;
        return result;
    }

    let Ok(block) = store.add_block(BlockInfo::default()) else {
        result.status = Status::LimitExceeded;
        return result;
    };

    let mut total_value_bytes = 0u64;
    let mut pos = 0usize;
    let mut order = 0u32;
    while pos < iptc_bytes.len() {
        if order >= options.limits.max_datasets {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }

        // Marker + record + dataset + length(2+) => at least 5 bytes.
        if pos + 5 > iptc_bytes.len() || iptc_bytes[pos] != DATASET_MARKER {
            result.status.absorb(Status::Malformed);
            return result;
        }
        let record = iptc_bytes[pos + 1];
        let dataset = iptc_bytes[pos + 2];

        let Some((value_len, header_len)) = read_dataset_length(iptc_bytes, pos + 3) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        if value_len > options.limits.max_dataset_bytes {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }

        let value_off = pos + 3 + header_len;
        if value_off as u64 + value_len > iptc_bytes.len() as u64 {
            result.status.absorb(Status::Malformed);
            return result;
        }

        total_value_bytes += value_len;
        if max_total != 0 && total_value_bytes > max_total {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }

        let payload = &iptc_bytes[value_off..value_off + value_len as usize];
        let Ok(value) = MetaValue::bytes(store.arena_mut(), payload) else {
            result.status.absorb(Status::LimitExceeded);
            return result;
        };
        store.add_entry(Entry {
            key: MetaKey::IptcDataset { record, dataset },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: order,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count: value_len as u32,
                wire_type_name: None,
            },
            flags,
        });
        result.entries_decoded += 1;
        order += 1;
        pos = value_off + value_len as usize;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKeyView;

    fn dataset(record: u8, tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![DATASET_MARKER, record, tag];
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_datasets_in_order() {
        let mut stream = dataset(2, 0x19, b"keyword-one");
        stream.extend_from_slice(&dataset(2, 0x19, b"keyword-two"));
        stream.extend_from_slice(&dataset(2, 0x50, b"Jane Doe"));

        let mut store = MetaStore::new();
        let result = decode_iptc_iim(
            &stream,
            &mut store,
            EntryFlags::default(),
            &IptcIimDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.entries_decoded, 3);

        store.finalize();
        let keywords = store.find_all(&MetaKeyView::IptcDataset { record: 2, dataset: 0x19 });
        assert_eq!(keywords.len(), 2);
        match store.entry(keywords[0]).value {
            MetaValue::Bytes(span) => assert_eq!(store.arena().span(span), b"keyword-one"),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn extended_length_is_decoded() {
        // Length field 0x8002 => two extended length bytes follow.
        let payload = b"extended";
        let mut stream = vec![DATASET_MARKER, 2, 0x78];
        stream.extend_from_slice(&0x8002u16.to_be_bytes());
        stream.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        stream.extend_from_slice(payload);

        let mut store = MetaStore::new();
        let result = decode_iptc_iim(
            &stream,
            &mut store,
            EntryFlags::default(),
            &IptcIimDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.entries_decoded, 1);
    }

    #[test]
    fn extended_length_with_bad_width_is_malformed() {
        let mut stream = vec![DATASET_MARKER, 2, 0x78];
        stream.extend_from_slice(&0x8005u16.to_be_bytes()); // N=5 invalid
        stream.extend_from_slice(&[0; 8]);
        let mut store = MetaStore::new();
        let result = decode_iptc_iim(
            &stream,
            &mut store,
            EntryFlags::default(),
            &IptcIimDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let mut stream = vec![DATASET_MARKER, 2, 0x78];
        stream.extend_from_slice(&100u16.to_be_bytes());
        stream.extend_from_slice(b"short");
        let mut store = MetaStore::new();
        let result = decode_iptc_iim(
            &stream,
            &mut store,
            EntryFlags::default(),
            &IptcIimDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn non_iptc_is_unsupported() {
        let mut store = MetaStore::new();
        let result = decode_iptc_iim(
            b"\x00\x01\x02",
            &mut store,
            EntryFlags::default(),
            &IptcIimDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Unsupported);
    }

    #[test]
    fn dataset_count_limit() {
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend_from_slice(&dataset(2, 0x19, b"k"));
        }
        let mut options = IptcIimDecodeOptions::default();
        options.limits.max_datasets = 2;
        let mut store = MetaStore::new();
        let result = decode_iptc_iim(&stream, &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::LimitExceeded);
        assert_eq!(result.entries_decoded, 2);
    }
}
