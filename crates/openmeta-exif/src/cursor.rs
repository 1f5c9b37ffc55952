//! Bounded reader over a TIFF stream.

use openmeta_core::{ByteOrder, Status};

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

/// Parsed TIFF header plus bounded reads in its byte order.
pub(crate) struct TiffCursor<'a> {
    bytes: &'a [u8],
    pub order: ByteOrder,
    pub bigtiff: bool,
    pub first_ifd: u64,
}

impl<'a> TiffCursor<'a> {
    /// Validate the TIFF/BigTIFF header.
    ///
    /// BigTIFF (version 43) requires an offset size of 8 and a zero
    /// reserved field; anything else is malformed.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Status> {
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

        Ok(Self {
            bytes,
            order,
            bigtiff,
            first_ifd,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn read_u16(&self, offset: u64) -> Option<u16> {
        let offset = usize::try_from(offset).ok()?;
        self.order.read_u16_at(self.bytes, offset).ok()
    }

    pub fn read_u32(&self, offset: u64) -> Option<u32> {
        let offset = usize::try_from(offset).ok()?;
        self.order.read_u32_at(self.bytes, offset).ok()
    }

    pub fn read_u64(&self, offset: u64) -> Option<u64> {
        let offset = usize::try_from(offset).ok()?;
        self.order.read_u64_at(self.bytes, offset).ok()
    }

    /// Borrow `size` bytes at `offset`, bounds-checked.
    pub fn slice(&self, offset: u64, size: u64) -> Option<&'a [u8]> {
        let offset = usize::try_from(offset).ok()?;
        let size = usize::try_from(size).ok()?;
        let end = offset.checked_add(size)?;
        self.bytes.get(offset..end)
    }
}
