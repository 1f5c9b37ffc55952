//! Photoshop image-resource-block decoder.
//!
//! An IRB stream is a sequence of resources:
//!
//! ```text
//! "8BIM" id:u16 pascal_name(padded to even) length:u32 data (padded to even)
//! ```
//!
//! Each resource becomes a `PhotoshopIrb { resource_id }` entry carrying
//! the raw data. Resource 0x0404 holds an IPTC-IIM stream; with
//! `decode_iptc_iim` enabled its datasets are decoded too and marked
//! derived.

use openmeta_core::{
    BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status, WireFamily,
    WireType,
};
use openmeta_iptc::IptcIimDecodeOptions;

/// Resource limits for IRB decode.
#[derive(Debug, Clone, Copy)]
pub struct PhotoshopIrbDecodeLimits {
    pub max_resources: u32,
    pub max_resource_len: u64,
    /// Caps both the input stream and the accumulated payload bytes
    /// (0 = unlimited).
    pub max_total_bytes: u64,
}

impl Default for PhotoshopIrbDecodeLimits {
    fn default() -> Self {
        Self {
            max_resources: 65536,
            max_resource_len: 16 * 1024 * 1024,
            max_total_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy)]
pub struct PhotoshopIrbDecodeOptions {
    /// Recursively decode resource 0x0404 as IPTC-IIM.
    pub decode_iptc_iim: bool,
    pub iptc: IptcIimDecodeOptions,
    pub limits: PhotoshopIrbDecodeLimits,
}

impl Default for PhotoshopIrbDecodeOptions {
    fn default() -> Self {
        Self {
            decode_iptc_iim: true,
            iptc: IptcIimDecodeOptions::default(),
            limits: PhotoshopIrbDecodeLimits::default(),
        }
    }
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct PhotoshopIrbDecodeResult {
    pub status: Status,
    pub resources_decoded: u32,
    pub entries_decoded: u32,
    pub iptc_entries_decoded: u32,
}

const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const RESOURCE_IPTC_NAA: u16 = 0x0404;

fn read_u16be(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(offset..offset + 2)?.try_into().ok()?))
}

fn read_u32be(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

fn pad2(n: usize) -> usize {
    (n + 1) & !1
}

/// Decode a Photoshop IRB stream, appending entries into `store`.
pub fn decode_photoshop_irb(
    irb_bytes: &[u8],
    store: &mut MetaStore,
    options: &PhotoshopIrbDecodeOptions,
) -> PhotoshopIrbDecodeResult {
    let mut result = PhotoshopIrbDecodeResult::default();

    if !irb_bytes.starts_with(RESOURCE_SIGNATURE) {
        result.status = Status::Unsupported;
        return result;
    }
    let max_total = options.limits.max_total_bytes;
    if max_total != 0 && irb_bytes.len() as u64 > max_total {
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
    while pos < irb_bytes.len() {
        if order >= options.limits.max_resources {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }
        if pos + 4 > irb_bytes.len() {
            break;
        }
        if &irb_bytes[pos..pos + 4] != RESOURCE_SIGNATURE {
            // Some writers pad the tail with zeros; anything else is broken.
            if irb_bytes[pos..].iter().all(|&b| b == 0) {
                break;
            }
            result.status.absorb(Status::Malformed);
            return result;
        }
        pos += 4;

        let Some(resource_id) = read_u16be(irb_bytes, pos) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        pos += 2;

        let Some(&name_len) = irb_bytes.get(pos) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        let name_total = pad2(1 + usize::from(name_len));
        if pos + name_total > irb_bytes.len() {
            result.status.absorb(Status::Malformed);
            return result;
        }
        pos += name_total;

        let Some(data_len) = read_u32be(irb_bytes, pos) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        pos += 4;

        let data_len = data_len as usize;
        if data_len as u64 > options.limits.max_resource_len {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }
        let padded = pad2(data_len);
        let Some(end) = pos.checked_add(padded) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        if end > irb_bytes.len() {
            result.status.absorb(Status::Malformed);
            return result;
        }

        total_value_bytes += data_len as u64;
        if max_total != 0 && total_value_bytes > max_total {
            result.status.absorb(Status::LimitExceeded);
            return result;
        }

        let payload = &irb_bytes[pos..pos + data_len];
        let Ok(value) = MetaValue::bytes(store.arena_mut(), payload) else {
            result.status.absorb(Status::LimitExceeded);
            return result;
        };
        store.add_entry(Entry {
            key: MetaKey::PhotoshopIrb { resource_id },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: order,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count: data_len as u32,
                wire_type_name: None,
            },
            flags: EntryFlags::default(),
        });
        result.resources_decoded += 1;
        result.entries_decoded += 1;

        // IPTC/NAA resource: datasets surface as derived entries.
        if options.decode_iptc_iim && resource_id == RESOURCE_IPTC_NAA {
            let iptc = openmeta_iptc::decode_iptc_iim(
                payload,
                store,
                EntryFlags::DERIVED,
                &options.iptc,
            );
            if iptc.status == Status::Ok {
                result.iptc_entries_decoded += iptc.entries_decoded;
            }
        }

        order += 1;
        pos += padded;
    }

    result
}
