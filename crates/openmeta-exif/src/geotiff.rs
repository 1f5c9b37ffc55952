//! GeoTIFF key-directory decoder.
//!
//! The GeoKeyDirectory tag (0x87AF, SHORT) holds a 4-SHORT header
//! `{version, revision, minor, key_count}` followed by one 4-SHORT record
//! per key: `{key_id, tiff_tag_location, count, value_offset}`. Keys with a
//! location of 0 carry their value inline in `value_offset`; others point
//! into the double/ASCII parameter tags and are preserved as the raw
//! triple.

use openmeta_core::{
    BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status, WireFamily,
    WireType,
};

use crate::cursor::TiffCursor;
use crate::ExifDecodeResult;

const MAX_GEO_KEYS: u64 = 4096;

pub(crate) fn decode_geo_key_directory(
    cursor: &TiffCursor<'_>,
    value_off: u64,
    count: u64,
    store: &mut MetaStore,
    result: &mut ExifDecodeResult,
) {
    // Directory must be a whole number of 4-SHORT records incl. the header.
    if count < 4 || count % 4 != 0 {
        result.status.absorb(Status::Malformed);
        return;
    }
    let Some(key_count) = cursor.read_u16(value_off + 6) else {
        result.status.absorb(Status::Malformed);
        return;
    };
    let key_count = u64::from(key_count);
    if key_count > MAX_GEO_KEYS {
        result.status.absorb(Status::LimitExceeded);
        return;
    }
    if key_count + 1 > count / 4 {
        result.status.absorb(Status::Malformed);
        return;
    }

    let Ok(block) = store.add_block(BlockInfo::default()) else {
        result.status.absorb(Status::LimitExceeded);
        return;
    };

    for i in 0..key_count {
        let record_off = value_off + (i + 1) * 8;
        let (Some(key_id), Some(location), Some(value_count), Some(value_offset)) = (
            cursor.read_u16(record_off),
            cursor.read_u16(record_off + 2),
            cursor.read_u16(record_off + 4),
            cursor.read_u16(record_off + 6),
        ) else {
            result.status.absorb(Status::Malformed);
            return;
        };

        let value = if location == 0 {
            MetaValue::u16(value_offset)
        } else {
            match MetaValue::u16_array(
                store.arena_mut(),
                &[location, value_count, value_offset],
            ) {
                Ok(v) => v,
                Err(_) => {
                    result.status.absorb(Status::LimitExceeded);
                    return;
                }
            }
        };

        store.add_entry(Entry {
            key: MetaKey::GeotiffKey { key: key_id },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire_type: WireType::new(WireFamily::Tiff, 3),
                wire_count: value_count.max(1).into(),
                wire_type_name: None,
            },
            flags: EntryFlags::DERIVED,
        });
        result.entries_decoded += 1;
    }
}
