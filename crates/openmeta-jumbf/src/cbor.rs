//! Bounded CBOR (RFC 8949) walker.
//!
//! Decodes a `cbor` box payload into path-keyed leaf entries. Map keys
//! become path segments (`<prefix>.<key>`), array elements append `[n]`,
//! tags emit `<path>.@tag` and continue with the tagged item. Depth, item
//! count and string sizes are bounded by the decoder limits.

use openmeta_core::{MetaValue, Status, TextEncoding};

use crate::{u16be, u32be, u64be, DecodeContext};

#[derive(Debug, Clone, Copy, Default)]
struct CborHead {
    major: u8,
    addl: u8,
    arg: u64,
    indefinite: bool,
}

/// Read one CBOR head (initial byte + argument).
fn read_head(bytes: &[u8], pos: &mut usize) -> Option<CborHead> {
    let ib = *bytes.get(*pos)?;
    *pos += 1;
    let mut head = CborHead {
        major: ib >> 5,
        addl: ib & 0x1F,
        ..Default::default()
    };

    match head.addl {
        0..=23 => {
            head.arg = u64::from(head.addl);
        }
        24 => {
            head.arg = u64::from(*bytes.get(*pos)?);
            *pos += 1;
        }
        25 => {
            head.arg = u64::from(u16be(bytes, *pos)?);
            *pos += 2;
        }
        26 => {
            head.arg = u64::from(u32be(bytes, *pos)?);
            *pos += 4;
        }
        27 => {
            head.arg = u64be(bytes, *pos)?;
            *pos += 8;
        }
        31 => {
            head.indefinite = true;
            // The break marker (0xFF) is not a data item; callers of
            // indefinite containers consume it themselves.
            if head.major == 7 {
                return None;
            }
        }
        _ => return None, // reserved additional-info values
    }
    Some(head)
}

fn item_budget_take(ctx: &mut DecodeContext<'_>) -> bool {
    ctx.result.cbor_items += 1;
    let max_items = ctx.options.limits.max_cbor_items;
    if max_items != 0 && ctx.result.cbor_items > max_items {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    }
    true
}

fn depth_ok(ctx: &mut DecodeContext<'_>, depth: u32) -> bool {
    let max_depth = ctx.options.limits.max_cbor_depth;
    if max_depth != 0 && depth > max_depth {
        ctx.result.status.absorb(Status::LimitExceeded);
        return false;
    }
    true
}

fn peek_break(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos) == Some(&0xFF)
}

fn consume_break(bytes: &[u8], pos: &mut usize) -> bool {
    if peek_break(bytes, *pos) {
        *pos += 1;
        true
    } else {
        false
    }
}

fn take_chunk<'a>(bytes: &'a [u8], pos: &mut usize, len: u64) -> Option<&'a [u8]> {
    let len = usize::try_from(len).ok()?;
    let end = pos.checked_add(len)?;
    let chunk = bytes.get(*pos..end)?;
    *pos = end;
    Some(chunk)
}

/// Read a byte- or text-string payload, concatenating indefinite-length
/// chunks of the same major type.
fn read_string_payload(
    ctx: &mut DecodeContext<'_>,
    bytes: &[u8],
    pos: &mut usize,
    head: CborHead,
) -> Option<Vec<u8>> {
    let max_total = if head.major == 2 {
        ctx.options.limits.max_cbor_bytes_bytes
    } else {
        ctx.options.limits.max_cbor_text_bytes
    };

    let mut out = Vec::new();
    let mut push = |ctx: &mut DecodeContext<'_>, out: &mut Vec<u8>, chunk: &[u8]| {
        if max_total != 0 && out.len() + chunk.len() > max_total as usize {
            ctx.result.status.absorb(Status::LimitExceeded);
            return false;
        }
        out.extend_from_slice(chunk);
        true
    };

    if !head.indefinite {
        let chunk = take_chunk(bytes, pos, head.arg)?;
        if !push(ctx, &mut out, chunk) {
            return None;
        }
        return Some(out);
    }

    loop {
        if consume_break(bytes, pos) {
            return Some(out);
        }
        let chunk_head = read_head(bytes, pos)?;
        if !item_budget_take(ctx) {
            return None;
        }
        // Chunks must be definite strings of the same major type.
        if chunk_head.major != head.major || chunk_head.indefinite {
            return None;
        }
        let chunk = take_chunk(bytes, pos, chunk_head.arg)?;
        if !push(ctx, &mut out, chunk) {
            return None;
        }
    }
}

/// Map non-path bytes to `_`, bounding the segment length.
fn sanitize_path_segment(bytes: &[u8], max_output_bytes: u32) -> String {
    if bytes.is_empty() {
        return "_".to_owned();
    }
    let limit = if max_output_bytes != 0 && bytes.len() > max_output_bytes as usize {
        max_output_bytes as usize
    } else {
        bytes.len()
    };
    let out: String = bytes[..limit]
        .iter()
        .map(|&c| {
            if c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.') {
                c as char
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "_".to_owned()
    } else {
        out
    }
}

fn major_suffix(major: u8) -> &'static str {
    match major {
        0 => "u",
        1 => "n",
        2 => "bytes",
        3 => "text",
        4 => "arr",
        5 => "map",
        6 => "tag",
        _ => "simple",
    }
}

/// Consume one item without emitting entries (composite map keys).
fn skip_item_from_head(
    ctx: &mut DecodeContext<'_>,
    bytes: &[u8],
    pos: &mut usize,
    depth: u32,
    head: CborHead,
) -> bool {
    if !depth_ok(ctx, depth) {
        return false;
    }
    match head.major {
        0 | 1 => true,
        2 | 3 => read_string_payload(ctx, bytes, pos, head).is_some(),
        4 => {
            let mut index = 0u64;
            loop {
                if head.indefinite && consume_break(bytes, pos) {
                    return true;
                }
                if !head.indefinite && index >= head.arg {
                    return true;
                }
                if !skip_item(ctx, bytes, pos, depth + 1) {
                    return false;
                }
                index += 1;
            }
        }
        5 => {
            let mut index = 0u64;
            loop {
                if head.indefinite && consume_break(bytes, pos) {
                    return true;
                }
                if !head.indefinite && index >= head.arg {
                    return true;
                }
                if !skip_item(ctx, bytes, pos, depth + 1)
                    || !skip_item(ctx, bytes, pos, depth + 1)
                {
                    return false;
                }
                index += 1;
            }
        }
        6 => !head.indefinite && skip_item(ctx, bytes, pos, depth + 1),
        _ => !head.indefinite,
    }
}

fn skip_item(ctx: &mut DecodeContext<'_>, bytes: &[u8], pos: &mut usize, depth: u32) -> bool {
    let Some(head) = read_head(bytes, pos) else {
        return false;
    };
    if !item_budget_take(ctx) {
        return false;
    }
    skip_item_from_head(ctx, bytes, pos, depth, head)
}

/// Decode one map key into a path segment.
fn parse_key(
    ctx: &mut DecodeContext<'_>,
    bytes: &[u8],
    pos: &mut usize,
    depth: u32,
    map_index: u32,
) -> Option<String> {
    if !depth_ok(ctx, depth) {
        return None;
    }
    let head = read_head(bytes, pos)?;
    if !item_budget_take(ctx) {
        return None;
    }

    match head.major {
        3 => {
            let text = read_string_payload(ctx, bytes, pos, head)?;
            Some(sanitize_path_segment(&text, ctx.options.limits.max_cbor_key_bytes))
        }
        0 => Some(head.arg.to_string()),
        1 => Some(format!("n{}", head.arg)),
        7 => {
            if head.indefinite {
                return None;
            }
            Some(
                match head.addl {
                    20 => "false",
                    21 => "true",
                    22 => "null",
                    23 => "undefined",
                    _ => "simple",
                }
                .to_owned(),
            )
        }
        _ => {
            // Composite key: skip its content, synthesize a segment.
            if !skip_item_from_head(ctx, bytes, pos, depth + 1, head) {
                return None;
            }
            Some(format!("k{map_index}_{}", major_suffix(head.major)))
        }
    }
}

/// Expand an IEEE-754 half-precision value to single-precision bits.
fn half_to_f32_bits(half_bits: u16) -> u32 {
    let sign = u32::from(half_bits & 0x8000) << 16;
    let mut exp = u32::from((half_bits >> 10) & 0x1F);
    let mut frac = u32::from(half_bits & 0x03FF);

    if exp == 0 {
        if frac == 0 {
            return sign;
        }
        // Subnormal: renormalize.
        let mut shift = 0i32;
        while frac & 0x0400 == 0 {
            frac <<= 1;
            shift += 1;
        }
        frac &= 0x03FF;
        exp = (127 - 15 - shift + 1) as u32;
        return sign | (exp << 23) | (frac << 13);
    }
    if exp == 31 {
        return sign | 0x7F80_0000 | (frac << 13);
    }
    exp += 127 - 15;
    sign | (exp << 23) | (frac << 13)
}

/// Decode one item, emitting leaves under `path`.
pub(crate) fn parse_item(
    ctx: &mut DecodeContext<'_>,
    bytes: &[u8],
    pos: &mut usize,
    depth: u32,
    path: &str,
) -> bool {
    if !depth_ok(ctx, depth) {
        return false;
    }
    let Some(head) = read_head(bytes, pos) else {
        return false;
    };
    if !item_budget_take(ctx) {
        return false;
    }

    match head.major {
        0 => ctx.emit_cbor_value(path, MetaValue::u64(head.arg)),
        1 => {
            if head.arg >= i64::MAX as u64 {
                // Out of i64 range; preserve the mathematical value as text.
                let rendered = format!("-(1+{})", head.arg);
                let Ok(value) =
                    MetaValue::text(ctx.store.arena_mut(), &rendered, TextEncoding::Ascii)
                else {
                    ctx.result.status.absorb(Status::LimitExceeded);
                    return false;
                };
                return ctx.emit_cbor_value(path, value);
            }
            ctx.emit_cbor_value(path, MetaValue::i64(-1 - head.arg as i64))
        }
        2 => {
            let Some(data) = read_string_payload(ctx, bytes, pos, head) else {
                return false;
            };
            let Ok(value) = MetaValue::bytes(ctx.store.arena_mut(), &data) else {
                ctx.result.status.absorb(Status::LimitExceeded);
                return false;
            };
            ctx.emit_cbor_value(path, value)
        }
        3 => {
            let Some(data) = read_string_payload(ctx, bytes, pos, head) else {
                return false;
            };
            let value = if std::str::from_utf8(&data).is_ok() {
                MetaValue::text_bytes(ctx.store.arena_mut(), &data, TextEncoding::Utf8)
            } else {
                MetaValue::bytes(ctx.store.arena_mut(), &data)
            };
            let Ok(value) = value else {
                ctx.result.status.absorb(Status::LimitExceeded);
                return false;
            };
            ctx.emit_cbor_value(path, value)
        }
        4 => {
            let mut index = 0u64;
            loop {
                if head.indefinite && consume_break(bytes, pos) {
                    return true;
                }
                if !head.indefinite && index >= head.arg {
                    return true;
                }
                let child_path = format!("{path}[{index}]");
                if !parse_item(ctx, bytes, pos, depth + 1, &child_path) {
                    return false;
                }
                index += 1;
            }
        }
        5 => {
            let mut map_index = 0u64;
            loop {
                if head.indefinite && consume_break(bytes, pos) {
                    return true;
                }
                if !head.indefinite && map_index >= head.arg {
                    return true;
                }
                let Some(segment) = parse_key(ctx, bytes, pos, depth + 1, map_index as u32)
                else {
                    return false;
                };
                let child_path = if path.is_empty() {
                    segment
                } else {
                    format!("{path}.{segment}")
                };
                if !parse_item(ctx, bytes, pos, depth + 1, &child_path) {
                    return false;
                }
                map_index += 1;
            }
        }
        6 => {
            if head.indefinite {
                return false;
            }
            if !ctx.emit_cbor_value(&format!("{path}.@tag"), MetaValue::u64(head.arg)) {
                return false;
            }
            parse_item(ctx, bytes, pos, depth + 1, path)
        }
        _ => {
            // Major 7: simple values and floats.
            if head.indefinite {
                return false;
            }
            match head.addl {
                0..=19 => ctx.emit_cbor_value(path, MetaValue::u8(head.addl)),
                20 => ctx.emit_cbor_value(path, MetaValue::u8(0)),
                21 => ctx.emit_cbor_value(path, MetaValue::u8(1)),
                22 | 23 => {
                    let rendered = if head.addl == 22 { "null" } else { "undefined" };
                    let Ok(value) =
                        MetaValue::text(ctx.store.arena_mut(), rendered, TextEncoding::Ascii)
                    else {
                        ctx.result.status.absorb(Status::LimitExceeded);
                        return false;
                    };
                    ctx.emit_cbor_value(path, value)
                }
                24 => ctx.emit_cbor_value(path, MetaValue::u8((head.arg & 0xFF) as u8)),
                25 => ctx.emit_cbor_value(
                    path,
                    MetaValue::f32_bits(half_to_f32_bits((head.arg & 0xFFFF) as u16)),
                ),
                26 => ctx.emit_cbor_value(path, MetaValue::f32_bits(head.arg as u32)),
                27 => ctx.emit_cbor_value(path, MetaValue::f64_bits(head.arg)),
                other => {
                    let rendered = format!("simple({other})");
                    let Ok(value) =
                        MetaValue::text(ctx.store.arena_mut(), &rendered, TextEncoding::Ascii)
                    else {
                        ctx.result.status.absorb(Status::LimitExceeded);
                        return false;
                    };
                    ctx.emit_cbor_value(path, value)
                }
            }
        }
    }
}

/// Decode a whole `cbor` box payload: a sequence of top-level items.
pub(crate) fn decode_cbor_payload(
    ctx: &mut DecodeContext<'_>,
    payload: &[u8],
    path_prefix: &str,
) -> bool {
    let mut pos = 0usize;
    while pos < payload.len() {
        if !parse_item(ctx, payload, &mut pos, 0, path_prefix) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_float_expansion() {
        assert_eq!(f32::from_bits(half_to_f32_bits(0x3C00)), 1.0);
        assert_eq!(f32::from_bits(half_to_f32_bits(0xC000)), -2.0);
        assert_eq!(f32::from_bits(half_to_f32_bits(0x0000)), 0.0);
        assert!(f32::from_bits(half_to_f32_bits(0x7C00)).is_infinite());
        assert!(f32::from_bits(half_to_f32_bits(0x7E00)).is_nan());
        // Smallest positive subnormal: 2^-24.
        assert_eq!(f32::from_bits(half_to_f32_bits(0x0001)), 5.960_464_5e-8);
    }

    #[test]
    fn sanitizes_segments() {
        assert_eq!(sanitize_path_segment(b"claim_generator", 0), "claim_generator");
        assert_eq!(sanitize_path_segment(b"a b/c", 0), "a_b_c");
        assert_eq!(sanitize_path_segment(b"", 0), "_");
        assert_eq!(sanitize_path_segment(b"abcdef", 3), "abc");
    }
}
