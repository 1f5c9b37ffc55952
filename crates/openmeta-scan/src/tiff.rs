//! TIFF/BigTIFF container scanner.
//!
//! Walks the IFD chain (with a bounded visited set) looking for tags whose
//! values embed other metadata streams: XMP (0x02BC), IPTC-IIM (0x83BB),
//! Photoshop IRB (0x8649), ICC (0x8773) and MakerNote (0x927C). Tag values
//! themselves are decoded elsewhere; the scanner only emits block refs
//! pointing at the value bytes.

use openmeta_core::{ByteOrder, Status};

use crate::block::{
    BlockChunking, BlockSink, ContainerBlockKind, ContainerBlockRef, ContainerFormat, ScanResult,
};

const MAX_SCAN_IFDS: usize = 64;
const MAX_SCAN_ENTRIES: u64 = 0x10000;

#[derive(Clone, Copy)]
pub(crate) struct TiffHeader {
    pub order: ByteOrder,
    pub bigtiff: bool,
    pub first_ifd: u64,
}

/// Parse the TIFF header: byte order marker, 42/43 magic and the first IFD
/// offset. BigTIFF additionally requires `off_size == 8` and a zero
/// reserved field.
pub(crate) fn parse_tiff_header(bytes: &[u8]) -> Result<TiffHeader, Status> {
    if bytes.len() < 8 {
        return Err(Status::Malformed);
    }
    let order = match (bytes[0], bytes[1]) {
        (0x49, 0x49) => ByteOrder::LittleEndian,
        (0x4D, 0x4D) => ByteOrder::BigEndian,
        _ => return Err(Status::Unsupported),
    };
    let version = order.read_u16_at(bytes, 2).map_err(|_| Status::Malformed)?;
    let bigtiff = match version {
        42 => false,
        43 => true,
        _ => return Err(Status::Unsupported),
    };

    let first_ifd = if bigtiff {
        if bytes.len() < 16 {
            return Err(Status::Malformed);
        }
        let off_size = order.read_u16_at(bytes, 4).map_err(|_| Status::Malformed)?;
        let reserved = order.read_u16_at(bytes, 6).map_err(|_| Status::Malformed)?;
        if off_size != 8 || reserved != 0 {
            return Err(Status::Malformed);
        }
        order.read_u64_at(bytes, 8).map_err(|_| Status::Malformed)?
    } else {
        u64::from(order.read_u32_at(bytes, 4).map_err(|_| Status::Malformed)?)
    };

    Ok(TiffHeader {
        order,
        bigtiff,
        first_ifd,
    })
}

/// Byte size of one element of a TIFF field type; 0 for unknown types.
pub(crate) fn tiff_type_size(field_type: u16) -> u64 {
    match field_type {
        1 | 2 | 6 | 7 | 129 => 1, // BYTE, ASCII, SBYTE, UNDEFINED, UTF-8
        3 | 8 => 2,               // SHORT, SSHORT
        4 | 9 | 11 | 13 => 4,     // LONG, SLONG, FLOAT, IFD
        5 | 10 | 12 => 8,         // RATIONAL, SRATIONAL, DOUBLE
        16 | 17 | 18 => 8,        // LONG8, SLONG8, IFD8
        _ => 0,
    }
}

/// Scan a TIFF/BigTIFF stream for embedded metadata blocks.
pub fn scan_tiff(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);

    let header = match parse_tiff_header(bytes) {
        Ok(header) => header,
        Err(status) => return sink.fail(status),
    };
    let order = header.order;
    let (entry_size, count_size) = if header.bigtiff { (20u64, 8u64) } else { (12u64, 2u64) };

    let mut stack = [0u64; MAX_SCAN_IFDS];
    let mut visited = [0u64; MAX_SCAN_IFDS];
    let mut stack_len = 0usize;
    let mut visited_len = 0usize;

    let mut push = |stack: &mut [u64; MAX_SCAN_IFDS], stack_len: &mut usize, off: u64| {
        if off != 0 && *stack_len < MAX_SCAN_IFDS {
            stack[*stack_len] = off;
            *stack_len += 1;
        }
    };
    push(&mut stack, &mut stack_len, header.first_ifd);

    while stack_len > 0 {
        stack_len -= 1;
        let ifd_off = stack[stack_len];
        if ifd_off == 0 || ifd_off >= bytes.len() as u64 {
            continue;
        }
        if visited[..visited_len].contains(&ifd_off) {
            continue;
        }
        if visited_len < MAX_SCAN_IFDS {
            visited[visited_len] = ifd_off;
            visited_len += 1;
        } else {
            break;
        }

        let entry_count = if header.bigtiff {
            match order.read_u64_at(bytes, ifd_off as usize) {
                Ok(n) => n,
                Err(_) => continue,
            }
        } else {
            match order.read_u16_at(bytes, ifd_off as usize) {
                Ok(n) => u64::from(n),
                Err(_) => continue,
            }
        };
        if entry_count > MAX_SCAN_ENTRIES {
            continue;
        }

        let entries_off = ifd_off + count_size;
        let next_pos = entries_off + entry_count * entry_size;
        if next_pos + if header.bigtiff { 8 } else { 4 } <= bytes.len() as u64 {
            let next = if header.bigtiff {
                order.read_u64_at(bytes, next_pos as usize).unwrap_or(0)
            } else {
                u64::from(order.read_u32_at(bytes, next_pos as usize).unwrap_or(0))
            };
            push(&mut stack, &mut stack_len, next);
        }
        if next_pos > bytes.len() as u64 {
            continue;
        }

        for i in 0..entry_count {
            let eoff = (entries_off + i * entry_size) as usize;
            let (Ok(tag), Ok(field_type)) =
                (order.read_u16_at(bytes, eoff), order.read_u16_at(bytes, eoff + 2))
            else {
                continue;
            };

            let (count, value_or_off, value_field_off) = if header.bigtiff {
                let (Ok(c), Ok(v)) =
                    (order.read_u64_at(bytes, eoff + 4), order.read_u64_at(bytes, eoff + 12))
                else {
                    continue;
                };
                (c, v, eoff as u64 + 12)
            } else {
                let (Ok(c), Ok(v)) =
                    (order.read_u32_at(bytes, eoff + 4), order.read_u32_at(bytes, eoff + 8))
                else {
                    continue;
                };
                (u64::from(c), u64::from(v), eoff as u64 + 8)
            };

            let unit = tiff_type_size(field_type);
            if unit == 0 || count > u64::MAX / unit {
                continue;
            }
            let value_bytes = count * unit;

            let inline_cap = if header.bigtiff { 8 } else { 4 };
            let value_off = if value_bytes <= inline_cap {
                value_field_off
            } else {
                value_or_off
            };
            if value_off.checked_add(value_bytes).is_none()
                || value_off + value_bytes > bytes.len() as u64
            {
                continue;
            }

            // Follow IFD pointer tags. Pointers are LONG/IFD (4 bytes) or
            // LONG8/IFD8 (8 bytes); other field types are ignored.
            if matches!(tag, 0x8769 | 0x8825 | 0xA005 | 0x014A) && (unit == 4 || unit == 8) {
                let read_ptr = |off: u64| -> u64 {
                    if unit == 8 {
                        order.read_u64_at(bytes, off as usize).unwrap_or(0)
                    } else {
                        u64::from(order.read_u32_at(bytes, off as usize).unwrap_or(0))
                    }
                };
                if tag == 0x014A && count > 1 {
                    for j in 0..count.min(32) {
                        push(&mut stack, &mut stack_len, read_ptr(value_off + j * unit));
                    }
                } else {
                    push(&mut stack, &mut stack_len, read_ptr(value_off));
                }
            }

            let kind_and_chunking = match tag {
                0x02BC => Some((ContainerBlockKind::Xmp, BlockChunking::None)),
                0x83BB => Some((ContainerBlockKind::IptcIim, BlockChunking::None)),
                0x8649 => Some((ContainerBlockKind::PhotoshopIrB, BlockChunking::PsIrB8Bim)),
                0x8773 => Some((ContainerBlockKind::Icc, BlockChunking::None)),
                0x927C => Some((ContainerBlockKind::MakerNote, BlockChunking::None)),
                _ => None,
            };
            if let Some((kind, chunking)) = kind_and_chunking {
                sink.emit(ContainerBlockRef {
                    format: ContainerFormat::Tiff,
                    kind,
                    chunking,
                    outer_offset: value_off,
                    outer_size: value_bytes,
                    data_offset: value_off,
                    data_size: value_bytes,
                    id: u32::from(tag),
                    ..Default::default()
                });
            }
        }
    }

    sink.result
}
