//! OpenEXR header attribute decoder.
//!
//! An EXR file opens with magic `20000630` (little-endian) and a
//! version/flags word (version 2; valid flag bits: tiled, long names,
//! non-image, multipart). The header is a run of attribute records
//!
//! ```text
//! name\0 type\0 size:u32le value[size]
//! ```
//!
//! terminated by a single `\0`. Multipart files chain several headers; a
//! second consecutive `\0` ends the file. Each attribute becomes an
//! `ExrAttribute { part_index, name }` entry; known attribute types decode
//! to typed values, everything else is preserved as raw bytes (optionally
//! with the raw type-name string on the entry origin).

use openmeta_core::{
    BlockId, BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status,
    TextEncoding, WireFamily, WireType,
};

const EXR_MAGIC: u32 = 20000630;
const VERSION_MASK: u32 = 0x0000_00FF;
const SUPPORTED_VERSION: u32 = 2;
const FLAG_TILED: u32 = 0x0000_0200;
const FLAG_LONG_NAMES: u32 = 0x0000_0400;
const FLAG_NON_IMAGE: u32 = 0x0000_0800;
const FLAG_MULTIPART: u32 = 0x0000_1000;
const VALID_FLAGS: u32 = FLAG_TILED | FLAG_LONG_NAMES | FLAG_NON_IMAGE | FLAG_MULTIPART;

/// Wire code recorded for attribute types outside the known table.
pub const EXR_TYPE_OPAQUE: u16 = 31;

/// Known EXR attribute type names and their wire codes.
static EXR_TYPE_CODES: phf::Map<&'static str, u16> = phf::phf_map! {
    "box2i" => 1u16,
    "box2f" => 2u16,
    "bytes" => 3u16,
    "chlist" => 4u16,
    "chromaticities" => 5u16,
    "compression" => 6u16,
    "double" => 7u16,
    "envmap" => 8u16,
    "float" => 9u16,
    "floatvector" => 10u16,
    "int" => 11u16,
    "keycode" => 12u16,
    "lineOrder" => 13u16,
    "m33f" => 14u16,
    "m33d" => 15u16,
    "m44f" => 16u16,
    "m44d" => 17u16,
    "preview" => 18u16,
    "rational" => 19u16,
    "string" => 20u16,
    "stringvector" => 21u16,
    "tiledesc" => 22u16,
    "timecode" => 23u16,
    "v2i" => 24u16,
    "v2f" => 25u16,
    "v2d" => 26u16,
    "v3i" => 27u16,
    "v3f" => 28u16,
    "v3d" => 29u16,
    "deepImageState" => 30u16,
};

/// Resource limits for EXR header decode.
#[derive(Debug, Clone, Copy)]
pub struct ExrDecodeLimits {
    pub max_parts: u32,
    pub max_attributes_per_part: u32,
    pub max_attributes: u32,
    pub max_name_bytes: u32,
    pub max_type_name_bytes: u32,
    pub max_attribute_bytes: u32,
    pub max_total_attribute_bytes: u64,
}

impl Default for ExrDecodeLimits {
    fn default() -> Self {
        Self {
            max_parts: 64,
            max_attributes_per_part: 1 << 16,
            max_attributes: 200_000,
            max_name_bytes: 1024,
            max_type_name_bytes: 1024,
            max_attribute_bytes: 8 * 1024 * 1024,
            max_total_attribute_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy)]
pub struct ExrDecodeOptions {
    /// Decode known scalar/vector attribute types into typed values;
    /// unknown and complex types are always preserved as raw bytes.
    pub decode_known_types: bool,
    /// Record the raw type-name string of unknown types on the entry
    /// origin. Costs arena bytes, keeps diagnostics.
    pub preserve_unknown_type_name: bool,
    pub limits: ExrDecodeLimits,
}

impl Default for ExrDecodeOptions {
    fn default() -> Self {
        Self {
            decode_known_types: true,
            preserve_unknown_type_name: true,
            limits: ExrDecodeLimits::default(),
        }
    }
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct ExrDecodeResult {
    pub status: Status,
    pub parts_decoded: u32,
    pub entries_decoded: u32,
}

fn u32le(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

fn u64le(bytes: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(offset..offset + 8)?.try_into().ok()?))
}

fn i32le(bytes: &[u8], offset: usize) -> Option<i32> {
    u32le(bytes, offset).map(|v| v as i32)
}

enum CstrError {
    Malformed,
    LimitExceeded,
}

/// Read a NUL-terminated string whose first byte has already been
/// consumed.
fn read_cstr_with_first(
    bytes: &[u8],
    pos: &mut usize,
    first: u8,
    max_bytes: u32,
) -> Result<String, CstrError> {
    let mut out = String::new();
    out.push(first as char);
    loop {
        if max_bytes != 0 && out.len() as u32 > max_bytes {
            return Err(CstrError::LimitExceeded);
        }
        let Some(&b) = bytes.get(*pos) else {
            return Err(CstrError::Malformed);
        };
        *pos += 1;
        if b == 0 {
            return Ok(out);
        }
        out.push(b as char);
    }
}

fn read_cstr(bytes: &[u8], pos: &mut usize, max_bytes: u32) -> Result<String, CstrError> {
    let Some(&first) = bytes.get(*pos) else {
        return Err(CstrError::Malformed);
    };
    if first == 0 {
        return Err(CstrError::Malformed);
    }
    *pos += 1;
    read_cstr_with_first(bytes, pos, first, max_bytes)
}

fn classify_text(bytes: &[u8]) -> TextEncoding {
    if bytes.is_empty() {
        return TextEncoding::Utf8;
    }
    if bytes.is_ascii() {
        return TextEncoding::Ascii;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return TextEncoding::Utf8;
    }
    TextEncoding::Unknown
}

fn raw_bytes_value(store: &mut MetaStore, raw: &[u8], status: &mut Status) -> MetaValue {
    match MetaValue::bytes(store.arena_mut(), raw) {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    }
}

fn decode_i32_array(store: &mut MetaStore, raw: &[u8], n: usize, status: &mut Status) -> Option<MetaValue> {
    if raw.len() != n * 4 {
        return None;
    }
    let values: Vec<i32> = (0..n).filter_map(|i| i32le(raw, i * 4)).collect();
    if values.len() != n {
        return None;
    }
    Some(match MetaValue::i32_array(store.arena_mut(), &values) {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    })
}

fn decode_f32_bits_array(store: &mut MetaStore, raw: &[u8], status: &mut Status) -> Option<MetaValue> {
    if raw.len() % 4 != 0 {
        return None;
    }
    let bits: Vec<u32> = raw.chunks_exact(4).filter_map(|c| u32le(c, 0)).collect();
    Some(match MetaValue::f32_bits_array(store.arena_mut(), &bits) {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    })
}

fn decode_f64_bits_array(store: &mut MetaStore, raw: &[u8], status: &mut Status) -> Option<MetaValue> {
    if raw.len() % 8 != 0 {
        return None;
    }
    let bits: Vec<u64> = raw.chunks_exact(8).filter_map(|c| u64le(c, 0)).collect();
    Some(match MetaValue::f64_bits_array(store.arena_mut(), &bits) {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    })
}

/// Decode a known attribute type into a typed value, or fall back to raw
/// bytes.
fn decode_exr_value(
    type_name: &str,
    raw: &[u8],
    store: &mut MetaStore,
    decode_known_types: bool,
    status: &mut Status,
) -> MetaValue {
    if !decode_known_types {
        return raw_bytes_value(store, raw, status);
    }

    match type_name {
        "int" if raw.len() == 4 => {
            if let Some(v) = i32le(raw, 0) {
                return MetaValue::i32(v);
            }
        }
        "float" if raw.len() == 4 => {
            if let Some(bits) = u32le(raw, 0) {
                return MetaValue::f32_bits(bits);
            }
        }
        "double" if raw.len() == 8 => {
            if let Some(bits) = u64le(raw, 0) {
                return MetaValue::f64_bits(bits);
            }
        }
        "compression" | "envmap" | "lineOrder" | "deepImageState" if raw.len() == 1 => {
            return MetaValue::u8(raw[0]);
        }
        "string" if !raw.contains(&0) => {
            let encoding = classify_text(raw);
            return match MetaValue::text_bytes(store.arena_mut(), raw, encoding) {
                Ok(v) => v,
                Err(_) => {
                    status.absorb(Status::LimitExceeded);
                    MetaValue::Empty
                }
            };
        }
        "rational" if raw.len() == 8 => {
            if let (Some(num), Some(den)) = (i32le(raw, 0), u32le(raw, 4)) {
                if den <= i32::MAX as u32 {
                    return MetaValue::srational(num, den as i32);
                }
            }
        }
        "box2i" => {
            if let Some(v) = decode_i32_array(store, raw, 4, status) {
                return v;
            }
        }
        "v2i" => {
            if let Some(v) = decode_i32_array(store, raw, 2, status) {
                return v;
            }
        }
        "v3i" => {
            if let Some(v) = decode_i32_array(store, raw, 3, status) {
                return v;
            }
        }
        "keycode" => {
            if let Some(v) = decode_i32_array(store, raw, 7, status) {
                return v;
            }
        }
        "box2f" | "v2f" | "v3f" | "m33f" | "m44f" | "chromaticities" | "floatvector" => {
            if let Some(v) = decode_f32_bits_array(store, raw, status) {
                return v;
            }
        }
        "v2d" | "v3d" | "m33d" | "m44d" => {
            if let Some(v) = decode_f64_bits_array(store, raw, status) {
                return v;
            }
        }
        "timecode" if raw.len() == 8 => {
            let values: Vec<u32> = raw.chunks_exact(4).filter_map(|c| u32le(c, 0)).collect();
            match MetaValue::u32_array(store.arena_mut(), &values) {
                Ok(v) => return v,
                Err(_) => {
                    status.absorb(Status::LimitExceeded);
                    return MetaValue::Empty;
                }
            }
        }
        "tiledesc" if raw.len() == 9 => {
            match MetaValue::u8_array(store.arena_mut(), raw) {
                Ok(v) => return v,
                Err(_) => {
                    status.absorb(Status::LimitExceeded);
                    return MetaValue::Empty;
                }
            }
        }
        _ => {}
    }

    raw_bytes_value(store, raw, status)
}

struct DecodeState {
    part_index: u32,
    block: BlockId,
    order_in_block: u32,
    part_attr_count: u32,
    total_attr_count: u32,
    total_attr_bytes: u64,
}

/// Parse one attribute record whose first name byte was already consumed.
#[allow(clippy::too_many_arguments)]
fn parse_attribute(
    bytes: &[u8],
    pos: &mut usize,
    first_name_char: u8,
    state: &mut DecodeState,
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &ExrDecodeOptions,
    result: &mut ExrDecodeResult,
) -> Status {
    let limits = &options.limits;
    if limits.max_attributes_per_part != 0 && state.part_attr_count >= limits.max_attributes_per_part
    {
        return Status::LimitExceeded;
    }
    if limits.max_attributes != 0 && state.total_attr_count >= limits.max_attributes {
        return Status::LimitExceeded;
    }

    let name = match read_cstr_with_first(bytes, pos, first_name_char, limits.max_name_bytes) {
        Ok(name) => name,
        Err(CstrError::Malformed) => return Status::Malformed,
        Err(CstrError::LimitExceeded) => return Status::LimitExceeded,
    };
    let type_name = match read_cstr(bytes, pos, limits.max_type_name_bytes) {
        Ok(type_name) => type_name,
        Err(CstrError::Malformed) => return Status::Malformed,
        Err(CstrError::LimitExceeded) => return Status::LimitExceeded,
    };

    let Some(attribute_size) = u32le(bytes, *pos) else {
        return Status::Malformed;
    };
    *pos += 4;

    if limits.max_attribute_bytes != 0 && attribute_size > limits.max_attribute_bytes {
        return Status::LimitExceeded;
    }
    let Some(end) = pos.checked_add(attribute_size as usize) else {
        return Status::Malformed;
    };
    if end > bytes.len() {
        return Status::Malformed;
    }
    let next_total = state.total_attr_bytes + u64::from(attribute_size);
    if limits.max_total_attribute_bytes != 0 && next_total > limits.max_total_attribute_bytes {
        return Status::LimitExceeded;
    }

    let value_bytes = &bytes[*pos..end];
    *pos = end;

    let mut status = Status::Ok;
    let value = decode_exr_value(
        &type_name,
        value_bytes,
        store,
        options.decode_known_types,
        &mut status,
    );

    let type_code = EXR_TYPE_CODES.get(type_name.as_str()).copied();
    let wire_type_name = if type_code.is_none() && options.preserve_unknown_type_name {
        store.arena_mut().append_str(&type_name).ok()
    } else {
        None
    };

    let Ok(name_span) = store.arena_mut().append_str(&name) else {
        return Status::LimitExceeded;
    };
    store.add_entry(Entry {
        key: MetaKey::ExrAttribute {
            part_index: state.part_index,
            name: name_span,
        },
        value,
        origin: EntryOrigin {
            block: state.block,
            order_in_block: state.order_in_block,
            wire_type: WireType::new(WireFamily::Other, type_code.unwrap_or(EXR_TYPE_OPAQUE)),
            wire_count: attribute_size,
            wire_type_name,
        },
        flags,
    });

    state.order_in_block += 1;
    state.part_attr_count += 1;
    state.total_attr_count += 1;
    state.total_attr_bytes = next_total;
    result.entries_decoded += 1;
    status
}

/// Decode OpenEXR header attributes, appending entries into `store`.
pub fn decode_exr_header(
    exr_bytes: &[u8],
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &ExrDecodeOptions,
) -> ExrDecodeResult {
    let mut result = ExrDecodeResult {
        status: Status::Unsupported,
        ..Default::default()
    };

    let (Some(magic), Some(version_and_flags)) = (u32le(exr_bytes, 0), u32le(exr_bytes, 4)) else {
        return result;
    };
    if magic != EXR_MAGIC {
        return result;
    }
    if version_and_flags & VERSION_MASK != SUPPORTED_VERSION {
        return result;
    }
    let flag_bits = version_and_flags & !VERSION_MASK;
    if flag_bits & !VALID_FLAGS != 0 {
        result.status = Status::Malformed;
        return result;
    }
    if options.limits.max_parts == 0 {
        result.status = Status::LimitExceeded;
        return result;
    }

    result.status = Status::Ok;
    let multipart = flag_bits & FLAG_MULTIPART != 0;

    let Ok(block) = store.add_block(BlockInfo::default()) else {
        result.status = Status::LimitExceeded;
        return result;
    };
    let mut state = DecodeState {
        part_index: 0,
        block,
        order_in_block: 0,
        part_attr_count: 0,
        total_attr_count: 0,
        total_attr_bytes: 0,
    };
    result.parts_decoded = 1;

    let mut pos = 8usize;
    loop {
        let Some(&first) = exr_bytes.get(pos) else {
            result.status.absorb(Status::Malformed);
            return result;
        };
        pos += 1;

        if first == 0 {
            if !multipart {
                return result;
            }
            // A second consecutive NUL ends a multipart file; otherwise the
            // byte begins the next part's first attribute name.
            let Some(&next) = exr_bytes.get(pos) else {
                result.status.absorb(Status::Malformed);
                return result;
            };
            pos += 1;
            if next == 0 {
                return result;
            }

            state.part_index += 1;
            if state.part_index >= options.limits.max_parts {
                result.status.absorb(Status::LimitExceeded);
                return result;
            }
            state.block = match store.add_block(BlockInfo::default()) {
                Ok(block) => block,
                Err(_) => {
                    result.status.absorb(Status::LimitExceeded);
                    return result;
                }
            };
            result.parts_decoded = state.part_index + 1;
            state.order_in_block = 0;
            state.part_attr_count = 0;

            let status = parse_attribute(
                exr_bytes, &mut pos, next, &mut state, store, flags, options, &mut result,
            );
            if !status.is_ok() {
                result.status.absorb(status);
                return result;
            }
            continue;
        }

        let status = parse_attribute(
            exr_bytes, &mut pos, first, &mut state, store, flags, options, &mut result,
        );
        if !status.is_ok() {
            result.status.absorb(status);
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::{MetaElementType, MetaKeyView, ScalarValue};

    fn attribute(name: &str, type_name: &str, value: &[u8]) -> Vec<u8> {
        let mut out = name.as_bytes().to_vec();
        out.push(0);
        out.extend_from_slice(type_name.as_bytes());
        out.push(0);
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn exr(flags: u32, body: &[u8]) -> Vec<u8> {
        let mut out = EXR_MAGIC.to_le_bytes().to_vec();
        out.extend_from_slice(&(SUPPORTED_VERSION | flags).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn decode(bytes: &[u8]) -> (MetaStore, ExrDecodeResult) {
        let mut store = MetaStore::new();
        let result = decode_exr_header(
            bytes,
            &mut store,
            EntryFlags::default(),
            &ExrDecodeOptions::default(),
        );
        store.finalize();
        (store, result)
    }

    #[test]
    fn decodes_typed_attributes() {
        let mut body = attribute("compression", "compression", &[3]);
        body.extend_from_slice(&attribute("pixelAspectRatio", "float", &1.0f32.to_le_bytes()));
        body.extend_from_slice(&attribute(
            "dataWindow",
            "box2i",
            &[0u8, 0, 0, 0, 0, 0, 0, 0, 0x3F, 0, 0, 0, 0x1F, 0, 0, 0],
        ));
        body.extend_from_slice(&attribute("owner", "string", b"weta"));
        body.push(0); // end of header

        let (store, result) = decode(&exr(0, &body));
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.parts_decoded, 1);
        assert_eq!(result.entries_decoded, 4);

        let compression = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "compression" })
            .unwrap();
        assert_eq!(store.entry(compression).value.as_u64(), Some(3));
        assert_eq!(store.entry(compression).origin.wire_type.code, 6);

        let aspect = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "pixelAspectRatio" })
            .unwrap();
        match store.entry(aspect).value {
            MetaValue::Scalar(ScalarValue::F32Bits(bits)) => {
                assert_eq!(f32::from_bits(bits), 1.0);
            }
            other => panic!("expected f32 bits, got {other:?}"),
        }

        let window = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "dataWindow" })
            .unwrap();
        match store.entry(window).value {
            MetaValue::Array { elem_type, count, .. } => {
                assert_eq!(elem_type, MetaElementType::I32);
                assert_eq!(count, 4);
            }
            other => panic!("expected i32 array, got {other:?}"),
        }

        let owner = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "owner" })
            .unwrap();
        assert_eq!(store.entry(owner).value.as_text(store.arena()), Some("weta"));
    }

    #[test]
    fn multipart_headers_get_part_indices() {
        let mut body = attribute("name", "string", b"left");
        body.push(0); // end of part 0
        body.extend_from_slice(&attribute("name", "string", b"right"));
        body.push(0); // end of part 1
        body.push(0); // end of file

        let (store, result) = decode(&exr(FLAG_MULTIPART, &body));
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.parts_decoded, 2);

        assert!(store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "name" })
            .is_some());
        let right = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 1, name: "name" })
            .unwrap();
        assert_eq!(store.entry(right).value.as_text(store.arena()), Some("right"));
        // Each part decodes under its own block.
        assert_eq!(store.entry(right).origin.order_in_block, 0);
    }

    #[test]
    fn unknown_flag_bit_is_malformed() {
        let body = [0u8];
        let (_, result) = decode(&exr(0x0000_2000, &body));
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn unknown_type_preserves_type_name() {
        let mut body = attribute("custom", "myType", &[1, 2, 3]);
        body.push(0);

        let (store, result) = decode(&exr(0, &body));
        assert_eq!(result.status, Status::Ok);
        let id = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "custom" })
            .unwrap();
        let entry = store.entry(id);
        assert_eq!(entry.origin.wire_type.code, EXR_TYPE_OPAQUE);
        let name_span = entry.origin.wire_type_name.unwrap();
        assert_eq!(store.arena().text(name_span), "myType");
        assert!(matches!(entry.value, MetaValue::Bytes(_)));
    }

    #[test]
    fn truncated_attribute_is_malformed() {
        let mut body = b"name\0string\0".to_vec();
        body.extend_from_slice(&100u32.to_le_bytes()); // value overruns
        body.extend_from_slice(b"tiny");
        let (_, result) = decode(&exr(0, &body));
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let body = attribute("owner", "string", b"weta");
        // No trailing NUL at all.
        let (_, result) = decode(&exr(0, &body));
        assert_eq!(result.status, Status::Malformed);
    }

    #[test]
    fn non_exr_is_unsupported() {
        let (_, result) = decode(b"GIF89a whatever");
        assert_eq!(result.status, Status::Unsupported);
    }

    #[test]
    fn attribute_count_limit() {
        let mut body = Vec::new();
        for i in 0..4 {
            body.extend_from_slice(&attribute(&format!("a{i}"), "int", &1i32.to_le_bytes()));
        }
        body.push(0);

        let mut options = ExrDecodeOptions::default();
        options.limits.max_attributes = 2;
        let mut store = MetaStore::new();
        let result = decode_exr_header(&exr(0, &body), &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::LimitExceeded);
        assert_eq!(result.entries_decoded, 2);
    }

    #[test]
    fn rational_decodes_when_denominator_fits() {
        let mut value = 3i32.to_le_bytes().to_vec();
        value.extend_from_slice(&2u32.to_le_bytes());
        let mut body = attribute("framesPerSecond", "rational", &value);
        body.push(0);

        let (store, result) = decode(&exr(0, &body));
        assert_eq!(result.status, Status::Ok);
        let id = store
            .find_first(&MetaKeyView::ExrAttribute { part_index: 0, name: "framesPerSecond" })
            .unwrap();
        match store.entry(id).value {
            MetaValue::Scalar(ScalarValue::SRational(r)) => {
                assert_eq!((r.num, r.den), (3, 2));
            }
            other => panic!("expected rational, got {other:?}"),
        }
    }
}
