//! EXIF/TIFF IFD-tree decoder.
//!
//! Walks a TIFF or BigTIFF stream (typically the payload of an EXIF block)
//! and appends one [`Entry`] per tag into a [`MetaStore`], keyed by
//! `ExifTag { ifd, tag }` where `ifd` is a token naming the producing
//! directory (`ifd0`, `ifd1`, `exififd`, `gpsifd`, `interopifd`,
//! `subifd0`, ...).
//!
//! Pointer tags (ExifIFD 0x8769, GPSInfo 0x8825, Interop 0xA005, SubIFDs
//! 0x014A) are followed through a priority queue with a bounded visited
//! set. A narrow exception lets the same offset be decoded once as
//! `gpsifd` and once as `interopifd`: malformed files alias these two
//! pointers, and widely-deployed readers report both groups.

mod ciff;
mod cursor;
mod geotiff;
mod printim;

pub use ciff::{decode_crw_ciff, CiffDecodeResult};

use openmeta_core::{
    ByteSpan, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status, TextEncoding,
    WireFamily, WireType,
};
use openmeta_core::{BlockId, BlockInfo};

use cursor::TiffCursor;

/// Which directory chain a decoded IFD belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum ExifIfdKind {
    #[default]
    Ifd,
    ExifIfd,
    GpsIfd,
    InteropIfd,
    SubIfd,
}

/// Where a decoded IFD came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct ExifIfdRef {
    pub kind: ExifIfdKind,
    /// Chain index for `Ifd`/`SubIfd`; otherwise 0.
    pub index: u32,
    /// Offset of the IFD within the TIFF stream.
    pub offset: u64,
    pub block: BlockId,
}

/// Resource limits for EXIF/TIFF decode.
#[derive(Debug, Clone, Copy)]
pub struct ExifDecodeLimits {
    pub max_ifds: u32,
    pub max_entries_per_ifd: u32,
    pub max_total_entries: u32,
    pub max_value_bytes: u64,
}

impl Default for ExifDecodeLimits {
    fn default() -> Self {
        Self {
            max_ifds: 128,
            max_entries_per_ifd: 4096,
            max_total_entries: 200_000,
            max_value_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy)]
pub struct ExifDecodeOptions {
    /// When false, the four pointer tags are followed but not emitted as
    /// entries.
    pub include_pointer_tags: bool,
    /// Decode PrintIM (0xC4A5) payloads into `PrintImField` entries.
    pub decode_printim: bool,
    /// Decode the GeoTIFF key directory (0x87AF) into `GeotiffKey` entries.
    pub decode_geotiff: bool,
    pub limits: ExifDecodeLimits,
}

impl Default for ExifDecodeOptions {
    fn default() -> Self {
        Self {
            include_pointer_tags: true,
            decode_printim: true,
            decode_geotiff: true,
            limits: ExifDecodeLimits::default(),
        }
    }
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct ExifDecodeResult {
    pub status: Status,
    /// IFD refs recorded into the caller's scratch.
    pub ifds_written: u32,
    /// IFDs discovered; retry with larger scratch when `OutputTruncated`.
    pub ifds_needed: u32,
    pub entries_decoded: u32,
}

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_INTEROP_IFD: u16 = 0xA005;
const TAG_SUB_IFDS: u16 = 0x014A;
const TAG_PRINT_IM: u16 = 0xC4A5;
const TAG_GEO_KEY_DIRECTORY: u16 = 0x87AF;

const MAX_PENDING_IFDS: usize = 256;
const MAX_VISITED_IFDS: usize = 256;
const MAX_SUB_IFD_POINTERS: u64 = 32;

#[derive(Debug, Clone, Copy, Default)]
struct IfdTask {
    kind: ExifIfdKind,
    index: u32,
    offset: u64,
}

struct IfdSink<'a> {
    out: &'a mut [ExifIfdRef],
    result: ExifDecodeResult,
}

impl IfdSink<'_> {
    fn emit(&mut self, ifd_ref: ExifIfdRef) {
        self.result.ifds_needed += 1;
        if (self.result.ifds_written as usize) < self.out.len() {
            self.out[self.result.ifds_written as usize] = ifd_ref;
            self.result.ifds_written += 1;
        } else {
            self.result.status.absorb(Status::OutputTruncated);
        }
    }
}

fn ifd_kind_bit(kind: ExifIfdKind) -> u8 {
    match kind {
        ExifIfdKind::Ifd => 1 << 0,
        ExifIfdKind::ExifIfd => 1 << 1,
        ExifIfdKind::GpsIfd => 1 << 2,
        ExifIfdKind::InteropIfd => 1 << 3,
        ExifIfdKind::SubIfd => 1 << 4,
    }
}

/// Permit a second decode pass for the GPS/Interop pair: some malformed
/// files point both tags at the same IFD and established readers report
/// both groups.
fn allow_revisit(kind: ExifIfdKind, existing_mask: u8) -> bool {
    let gps = ifd_kind_bit(ExifIfdKind::GpsIfd);
    let interop = ifd_kind_bit(ExifIfdKind::InteropIfd);
    match kind {
        ExifIfdKind::GpsIfd => existing_mask == interop,
        ExifIfdKind::InteropIfd => existing_mask == gps,
        _ => false,
    }
}

/// Structured sub-directories win over the generic IFD chain when offsets
/// collide in malformed files; ties break toward the lower file offset.
fn ifd_priority(kind: ExifIfdKind) -> u8 {
    match kind {
        ExifIfdKind::ExifIfd => 5,
        ExifIfdKind::InteropIfd => 4,
        ExifIfdKind::GpsIfd => 3,
        ExifIfdKind::SubIfd => 2,
        ExifIfdKind::Ifd => 1,
    }
}

fn select_next_task(tasks: &[IfdTask]) -> usize {
    let mut best = 0usize;
    for (i, task) in tasks.iter().enumerate() {
        let better = ifd_priority(task.kind) > ifd_priority(tasks[best].kind)
            || (ifd_priority(task.kind) == ifd_priority(tasks[best].kind)
                && task.offset < tasks[best].offset);
        if i != 0 && better {
            best = i;
        }
    }
    best
}

fn ifd_token(kind: ExifIfdKind, index: u32) -> String {
    match kind {
        ExifIfdKind::Ifd => format!("ifd{index}"),
        ExifIfdKind::ExifIfd => "exififd".to_owned(),
        ExifIfdKind::GpsIfd => "gpsifd".to_owned(),
        ExifIfdKind::InteropIfd => "interopifd".to_owned(),
        ExifIfdKind::SubIfd => format!("subifd{index}"),
    }
}

/// Decode ASCII/UTF-8 value bytes: trailing NUL is stripped; an interior
/// NUL demotes the value to raw bytes.
fn decode_text_value(
    store: &mut MetaStore,
    raw: &[u8],
    encoding: TextEncoding,
    status: &mut Status,
) -> MetaValue {
    let trimmed = match raw.last() {
        Some(0) => &raw[..raw.len() - 1],
        _ => raw,
    };
    if trimmed.contains(&0) {
        return match MetaValue::bytes(store.arena_mut(), raw) {
            Ok(v) => v,
            Err(_) => {
                status.absorb(Status::LimitExceeded);
                MetaValue::Empty
            }
        };
    }
    match MetaValue::text_bytes(store.arena_mut(), trimmed, encoding) {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    }
}

fn arena_value(result: openmeta_core::Result<MetaValue>, status: &mut Status) -> MetaValue {
    match result {
        Ok(v) => v,
        Err(_) => {
            status.absorb(Status::LimitExceeded);
            MetaValue::Empty
        }
    }
}

/// Decode one tag value into a typed [`MetaValue`].
fn decode_tiff_value(
    cursor: &TiffCursor<'_>,
    field_type: u16,
    count: u64,
    value_off: u64,
    value_bytes: u64,
    store: &mut MetaStore,
    limits: &ExifDecodeLimits,
    status: &mut Status,
) -> MetaValue {
    if value_bytes > limits.max_value_bytes {
        status.absorb(Status::LimitExceeded);
        return MetaValue::Empty;
    }
    if count > u64::from(u32::MAX) {
        status.absorb(Status::LimitExceeded);
        return MetaValue::Empty;
    }
    let n = count as usize;
    let raw = match cursor.slice(value_off, value_bytes) {
        Some(raw) => raw,
        None => {
            status.absorb(Status::Malformed);
            return MetaValue::Empty;
        }
    };

    macro_rules! read_elems {
        ($width:literal, $reader:ident) => {{
            let mut values = Vec::with_capacity(n);
            for i in 0..n {
                match cursor.$reader(value_off + (i as u64) * $width) {
                    Some(v) => values.push(v),
                    None => {
                        status.absorb(Status::Malformed);
                        break;
                    }
                }
            }
            values
        }};
    }

    match field_type {
        1 => {
            // BYTE
            if n == 1 {
                MetaValue::u8(raw[0])
            } else {
                arena_value(MetaValue::u8_array(store.arena_mut(), raw), status)
            }
        }
        6 => {
            // SBYTE
            if n == 1 {
                MetaValue::i8(raw[0] as i8)
            } else {
                let values: Vec<i8> = raw.iter().map(|&b| b as i8).collect();
                arena_value(MetaValue::i8_array(store.arena_mut(), &values), status)
            }
        }
        2 => decode_text_value(store, raw, TextEncoding::Ascii, status),
        129 => decode_text_value(store, raw, TextEncoding::Utf8, status),
        3 => {
            // SHORT
            if n == 1 {
                match cursor.read_u16(value_off) {
                    Some(v) => MetaValue::u16(v),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values = read_elems!(2, read_u16);
                arena_value(MetaValue::u16_array(store.arena_mut(), &values), status)
            }
        }
        8 => {
            // SSHORT
            if n == 1 {
                match cursor.read_u16(value_off) {
                    Some(v) => MetaValue::i16(v as i16),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values: Vec<i16> =
                    read_elems!(2, read_u16).into_iter().map(|v| v as i16).collect();
                arena_value(MetaValue::i16_array(store.arena_mut(), &values), status)
            }
        }
        4 | 13 => {
            // LONG, IFD
            if n == 1 {
                match cursor.read_u32(value_off) {
                    Some(v) => MetaValue::u32(v),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values = read_elems!(4, read_u32);
                arena_value(MetaValue::u32_array(store.arena_mut(), &values), status)
            }
        }
        9 => {
            // SLONG
            if n == 1 {
                match cursor.read_u32(value_off) {
                    Some(v) => MetaValue::i32(v as i32),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values: Vec<i32> =
                    read_elems!(4, read_u32).into_iter().map(|v| v as i32).collect();
                arena_value(MetaValue::i32_array(store.arena_mut(), &values), status)
            }
        }
        5 | 10 => {
            // RATIONAL / SRATIONAL: (num, den) pairs of u32/i32.
            let signed = field_type == 10;
            if n == 1 {
                match (cursor.read_u32(value_off), cursor.read_u32(value_off + 4)) {
                    (Some(num), Some(den)) => {
                        if signed {
                            MetaValue::srational(num as i32, den as i32)
                        } else {
                            MetaValue::urational(num, den)
                        }
                    }
                    _ => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                // Pairs are stored as consecutive native-endian u32s.
                let mut values = Vec::with_capacity(n * 2);
                for i in 0..n {
                    let base = value_off + (i as u64) * 8;
                    match (cursor.read_u32(base), cursor.read_u32(base + 4)) {
                        (Some(num), Some(den)) => {
                            values.push(num);
                            values.push(den);
                        }
                        _ => {
                            status.absorb(Status::Malformed);
                            break;
                        }
                    }
                }
                let array = arena_value(MetaValue::u32_array(store.arena_mut(), &values), status);
                match array {
                    MetaValue::Array { data, .. } => MetaValue::Array {
                        elem_type: if signed {
                            openmeta_core::MetaElementType::SRational
                        } else {
                            openmeta_core::MetaElementType::URational
                        },
                        count: (values.len() / 2) as u32,
                        data,
                    },
                    other => other,
                }
            }
        }
        11 => {
            // FLOAT: bits preserved.
            if n == 1 {
                match cursor.read_u32(value_off) {
                    Some(bits) => MetaValue::f32_bits(bits),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let bits = read_elems!(4, read_u32);
                arena_value(MetaValue::f32_bits_array(store.arena_mut(), &bits), status)
            }
        }
        12 => {
            // DOUBLE: bits preserved.
            if n == 1 {
                match cursor.read_u64(value_off) {
                    Some(bits) => MetaValue::f64_bits(bits),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let bits = read_elems!(8, read_u64);
                arena_value(MetaValue::f64_bits_array(store.arena_mut(), &bits), status)
            }
        }
        16 | 18 => {
            // LONG8, IFD8
            if n == 1 {
                match cursor.read_u64(value_off) {
                    Some(v) => MetaValue::u64(v),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values = read_elems!(8, read_u64);
                arena_value(MetaValue::u64_array(store.arena_mut(), &values), status)
            }
        }
        17 => {
            // SLONG8
            if n == 1 {
                match cursor.read_u64(value_off) {
                    Some(v) => MetaValue::i64(v as i64),
                    None => {
                        status.absorb(Status::Malformed);
                        MetaValue::Empty
                    }
                }
            } else {
                let values: Vec<i64> =
                    read_elems!(8, read_u64).into_iter().map(|v| v as i64).collect();
                arena_value(MetaValue::i64_array(store.arena_mut(), &values), status)
            }
        }
        _ => {
            // UNDEFINED and anything else with a known size: raw bytes.
            arena_value(MetaValue::bytes(store.arena_mut(), raw), status)
        }
    }
}

struct PendingState {
    stack: Vec<IfdTask>,
    next_sub_ifd_index: u32,
}

impl PendingState {
    fn push(&mut self, task: IfdTask, limits: &ExifDecodeLimits, status: &mut Status) {
        if task.offset == 0 {
            return;
        }
        if self.stack.len() >= MAX_PENDING_IFDS || self.stack.len() as u32 >= limits.max_ifds {
            status.absorb(Status::LimitExceeded);
            return;
        }
        self.stack.push(task);
    }
}

/// Follow ExifIFD/GPS/Interop/SubIFDs pointer values.
fn follow_ifd_pointers(
    cursor: &TiffCursor<'_>,
    tag: u16,
    field_type: u16,
    count: u64,
    value_off: u64,
    pending: &mut PendingState,
    limits: &ExifDecodeLimits,
    status: &mut Status,
) {
    if !matches!(tag, TAG_EXIF_IFD | TAG_GPS_IFD | TAG_INTEROP_IFD | TAG_SUB_IFDS) {
        return;
    }
    let unit = cursor::tiff_type_size(field_type);
    if unit != 4 && unit != 8 {
        return;
    }
    let read_ptr = |off: u64| -> Option<u64> {
        if unit == 8 {
            cursor.read_u64(off)
        } else {
            cursor.read_u32(off).map(u64::from)
        }
    };

    if tag == TAG_SUB_IFDS {
        for i in 0..count.min(MAX_SUB_IFD_POINTERS) {
            let Some(ptr) = read_ptr(value_off + i * unit) else {
                return;
            };
            let index = pending.next_sub_ifd_index;
            pending.next_sub_ifd_index += 1;
            pending.push(
                IfdTask {
                    kind: ExifIfdKind::SubIfd,
                    index,
                    offset: ptr,
                },
                limits,
                status,
            );
        }
        return;
    }

    let Some(ptr) = read_ptr(value_off) else {
        return;
    };
    let kind = match tag {
        TAG_EXIF_IFD => ExifIfdKind::ExifIfd,
        TAG_GPS_IFD => ExifIfdKind::GpsIfd,
        _ => ExifIfdKind::InteropIfd,
    };
    pending.push(
        IfdTask {
            kind,
            index: 0,
            offset: ptr,
        },
        limits,
        status,
    );
}

/// Decode a TIFF/BigTIFF stream, appending entries into `store` and IFD
/// refs into `out_ifds`.
pub fn decode_exif_tiff(
    tiff_bytes: &[u8],
    store: &mut MetaStore,
    out_ifds: &mut [ExifIfdRef],
    options: &ExifDecodeOptions,
) -> ExifDecodeResult {
    let mut sink = IfdSink {
        out: out_ifds,
        result: ExifDecodeResult::default(),
    };

    let cursor = match TiffCursor::parse(tiff_bytes) {
        Ok(cursor) => cursor,
        Err(status) => {
            sink.result.status = status;
            return sink.result;
        }
    };

    let mut pending = PendingState {
        stack: Vec::with_capacity(16),
        next_sub_ifd_index: 0,
    };
    let mut visited: Vec<(u64, u8)> = Vec::with_capacity(16);

    if cursor.first_ifd != 0 {
        pending.stack.push(IfdTask {
            kind: ExifIfdKind::Ifd,
            index: 0,
            offset: cursor.first_ifd,
        });
    }

    while !pending.stack.is_empty() {
        let next = select_next_task(&pending.stack);
        let task = pending.stack.swap_remove(next);

        if task.offset == 0 || task.offset >= tiff_bytes.len() as u64 {
            continue;
        }

        // Visited set keyed by (offset, kind mask), with the GPS/Interop
        // aliasing exception.
        let kind_bit = ifd_kind_bit(task.kind);
        match visited.iter_mut().find(|(off, _)| *off == task.offset) {
            Some((_, mask)) => {
                if *mask & kind_bit != 0 {
                    continue;
                }
                if !allow_revisit(task.kind, *mask) {
                    continue;
                }
                *mask |= kind_bit;
            }
            None => {
                if visited.len() >= MAX_VISITED_IFDS {
                    sink.result.status.absorb(Status::LimitExceeded);
                    break;
                }
                visited.push((task.offset, kind_bit));
            }
        }

        if sink.result.ifds_needed >= options.limits.max_ifds {
            sink.result.status.absorb(Status::LimitExceeded);
            break;
        }

        // Entry count and the next-IFD pointer of the chain.
        let (entry_count, entries_off, entry_size) = if cursor.bigtiff {
            match cursor.read_u64(task.offset) {
                Some(n) => (n, task.offset + 8, 20u64),
                None => {
                    sink.result.status.absorb(Status::Malformed);
                    continue;
                }
            }
        } else {
            match cursor.read_u16(task.offset) {
                Some(n) => (u64::from(n), task.offset + 2, 12u64),
                None => {
                    sink.result.status.absorb(Status::Malformed);
                    continue;
                }
            }
        };

        let next_pos = entry_count
            .checked_mul(entry_size)
            .and_then(|table| entries_off.checked_add(table));
        let Some(next_pos) = next_pos else {
            sink.result.status.absorb(Status::Malformed);
            continue;
        };

        if task.kind == ExifIfdKind::Ifd {
            let next_width = if cursor.bigtiff { 8u64 } else { 4u64 };
            if next_pos
                .checked_add(next_width)
                .is_some_and(|end| end <= tiff_bytes.len() as u64)
            {
                let next_ifd = if cursor.bigtiff {
                    cursor.read_u64(next_pos).unwrap_or(0)
                } else {
                    u64::from(cursor.read_u32(next_pos).unwrap_or(0))
                };
                if next_ifd != 0 {
                    pending.push(
                        IfdTask {
                            kind: ExifIfdKind::Ifd,
                            index: task.index + 1,
                            offset: next_ifd,
                        },
                        &options.limits,
                        &mut sink.result.status,
                    );
                }
            } else {
                // Truncated next-IFD pointer field; decode entries anyway.
                sink.result.status.absorb(Status::Malformed);
            }
        }

        if entry_count > u64::from(options.limits.max_entries_per_ifd) {
            sink.result.status.absorb(Status::LimitExceeded);
            continue;
        }
        if next_pos > tiff_bytes.len() as u64 {
            sink.result.status.absorb(Status::Malformed);
            continue;
        }
        if u64::from(sink.result.entries_decoded) + entry_count
            > u64::from(options.limits.max_total_entries)
        {
            sink.result.status.absorb(Status::LimitExceeded);
            continue;
        }

        let block = match store.add_block(BlockInfo::default()) {
            Ok(block) => block,
            Err(_) => {
                sink.result.status.absorb(Status::LimitExceeded);
                break;
            }
        };
        sink.emit(ExifIfdRef {
            kind: task.kind,
            index: task.index,
            offset: task.offset,
            block,
        });

        let token = ifd_token(task.kind, task.index);
        let ifd_span = match store.arena_mut().append_str(&token) {
            Ok(span) => span,
            Err(_) => {
                sink.result.status.absorb(Status::LimitExceeded);
                break;
            }
        };

        decode_ifd_entries(
            &cursor,
            entry_count,
            entries_off,
            entry_size,
            block,
            ifd_span,
            store,
            &mut pending,
            options,
            &mut sink,
        );
    }

    sink.result
}

#[allow(clippy::too_many_arguments)]
fn decode_ifd_entries(
    cursor: &TiffCursor<'_>,
    entry_count: u64,
    entries_off: u64,
    entry_size: u64,
    block: BlockId,
    ifd_span: ByteSpan,
    store: &mut MetaStore,
    pending: &mut PendingState,
    options: &ExifDecodeOptions,
    sink: &mut IfdSink<'_>,
) {
    for i in 0..entry_count {
        let eoff = entries_off + i * entry_size;

        let (Some(tag), Some(field_type)) = (cursor.read_u16(eoff), cursor.read_u16(eoff + 2))
        else {
            sink.result.status.absorb(Status::Malformed);
            continue;
        };

        let (count, value_or_off, value_field_off) = if cursor.bigtiff {
            match (cursor.read_u64(eoff + 4), cursor.read_u64(eoff + 12)) {
                (Some(c), Some(v)) => (c, v, eoff + 12),
                _ => {
                    sink.result.status.absorb(Status::Malformed);
                    continue;
                }
            }
        } else {
            match (cursor.read_u32(eoff + 4), cursor.read_u32(eoff + 8)) {
                (Some(c), Some(v)) => (u64::from(c), u64::from(v), eoff + 8),
                _ => {
                    sink.result.status.absorb(Status::Malformed);
                    continue;
                }
            }
        };

        let unit = cursor::tiff_type_size(field_type);
        if unit == 0 {
            continue;
        }
        if count > u64::MAX / unit {
            sink.result.status.absorb(Status::Malformed);
            continue;
        }
        let value_bytes = count * unit;

        let inline_cap = if cursor.bigtiff { 8 } else { 4 };
        let value_off = if value_bytes <= inline_cap {
            value_field_off
        } else {
            value_or_off
        };
        if value_off.checked_add(value_bytes).is_none()
            || value_off + value_bytes > cursor.len() as u64
        {
            sink.result.status.absorb(Status::Malformed);
            continue;
        }

        follow_ifd_pointers(
            cursor,
            tag,
            field_type,
            count,
            value_off,
            pending,
            &options.limits,
            &mut sink.result.status,
        );

        if count > u64::from(u32::MAX) {
            sink.result.status.absorb(Status::LimitExceeded);
            continue;
        }

        let value = decode_tiff_value(
            cursor,
            field_type,
            count,
            value_off,
            value_bytes,
            store,
            &options.limits,
            &mut sink.result.status,
        );

        let is_pointer_tag =
            matches!(tag, TAG_EXIF_IFD | TAG_GPS_IFD | TAG_INTEROP_IFD | TAG_SUB_IFDS);
        if options.include_pointer_tags || !is_pointer_tag {
            store.add_entry(Entry {
                key: MetaKey::ExifTag {
                    ifd: ifd_span,
                    tag,
                },
                value,
                origin: EntryOrigin {
                    block,
                    order_in_block: i as u32,
                    wire_type: WireType::new(WireFamily::Tiff, field_type),
                    wire_count: count as u32,
                    wire_type_name: None,
                },
                flags: EntryFlags::default(),
            });
            sink.result.entries_decoded += 1;
        }

        // Derived subtables riding on IFD0 tags.
        if options.decode_printim && tag == TAG_PRINT_IM && field_type == 7 {
            if let Some(raw) = cursor.slice(value_off, value_bytes) {
                printim::decode_printim(raw, cursor.order, store, &mut sink.result);
            }
        }
        if options.decode_geotiff && tag == TAG_GEO_KEY_DIRECTORY && field_type == 3 {
            geotiff::decode_geo_key_directory(cursor, value_off, count, store, &mut sink.result);
        }
    }
}
