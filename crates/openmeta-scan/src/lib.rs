//! Container scanning and payload reassembly.
//!
//! The scanner locates metadata blocks (EXIF, XMP, ICC, IPTC, Photoshop
//! IRB, JUMBF, ...) inside image containers and emits [`ContainerBlockRef`]
//! records into caller-provided scratch; [`extract_payload`] then rebuilds
//! the logical payload bytes, reassembling multi-part streams and
//! decompressing deflate/Brotli blocks.
//!
//! # Supported containers
//!
//! | Prefix | Scanner |
//! |--------|---------|
//! | `FF D8` | [`scan_jpeg`] |
//! | 8-byte PNG signature | [`scan_png`] |
//! | `RIFF....WEBP` | [`scan_webp`] |
//! | `GIF87a`/`GIF89a` | [`scan_gif`] |
//! | `II`/`MM` + 42/43 | [`scan_tiff`] |
//! | 12-byte `jP  `/`JXL ` signature box | [`scan_jp2`] / [`scan_jxl`] |
//! | `ftyp` box (HEIF/AVIF/CR3) | [`scan_bmff`] |
//!
//! # Example
//!
//! ```
//! use openmeta_scan::{scan_auto, ContainerBlockRef};
//!
//! let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
//! let mut blocks = [ContainerBlockRef::default(); 16];
//! let result = scan_auto(&jpeg, &mut blocks);
//! assert_eq!(result.needed, 0);
//! ```

mod block;
mod bmff;
mod gif;
mod jpeg;
mod payload;
mod png;
mod tiff;
mod webp;

pub use block::{
    BlockChunking, BlockCompression, ContainerBlockKind, ContainerBlockRef, ContainerFormat,
    ScanResult,
};
pub use bmff::{scan_bmff, scan_jp2, scan_jxl};
pub use gif::scan_gif;
pub use jpeg::scan_jpeg;
pub use payload::{
    extract_payload, is_secondary_part, PayloadLimits, PayloadOptions, PayloadResult,
};
pub use png::scan_png;
pub use tiff::scan_tiff;
pub use webp::scan_webp;

use block::{match_at, u32be, fourcc};
use openmeta_core::Status;

/// Detect the container format by prefix and dispatch to its scanner.
pub fn scan_auto(bytes: &[u8], out: &mut [ContainerBlockRef]) -> ScanResult {
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        return scan_jpeg(bytes, out);
    }
    if match_at(bytes, 0, &png::PNG_SIGNATURE) {
        return scan_png(bytes, out);
    }
    if bytes.len() >= 12 && match_at(bytes, 0, b"RIFF") && match_at(bytes, 8, b"WEBP") {
        return scan_webp(bytes, out);
    }
    if match_at(bytes, 0, b"GIF87a") || match_at(bytes, 0, b"GIF89a") {
        return scan_gif(bytes, out);
    }
    if bytes.len() >= 4 {
        // TIFF classic and BigTIFF share the byte-order prefix.
        let le = bytes[0] == 0x49 && bytes[1] == 0x49;
        let be = bytes[0] == 0x4D && bytes[1] == 0x4D;
        if le || be {
            let version = if le {
                u16::from_le_bytes([bytes[2], bytes[3]])
            } else {
                u16::from_be_bytes([bytes[2], bytes[3]])
            };
            if version == 42 || version == 43 {
                return scan_tiff(bytes, out);
            }
        }
    }
    if bytes.len() >= 12
        && u32be(bytes, 0) == Some(12)
        && match_at(bytes, 8, &bmff::JP2_SIGNATURE_TAIL)
    {
        if u32be(bytes, 4) == Some(fourcc(b"jP  ")) {
            return scan_jp2(bytes, out);
        }
        if u32be(bytes, 4) == Some(fourcc(b"JXL ")) {
            return scan_jxl(bytes, out);
        }
    }
    if bmff::is_bmff(bytes) {
        return scan_bmff(bytes, out);
    }

    ScanResult {
        status: Status::Unsupported,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_prefix() {
        let mut blocks = [ContainerBlockRef::default(); 4];

        let jpeg = [0xFF, 0xD8, 0xFF, 0xD9];
        assert_eq!(scan_auto(&jpeg, &mut blocks).status, Status::Ok);

        let tiff = b"MM\x00\x2A\x00\x00\x00\x08\x00\x00\x00\x00";
        assert_eq!(scan_auto(tiff, &mut blocks).status, Status::Ok);

        assert_eq!(
            scan_auto(b"not an image at all", &mut blocks).status,
            Status::Unsupported
        );
    }

    #[test]
    fn scanning_twice_is_deterministic() {
        let mut data = vec![0xFF, 0xD8];
        let mut seg = vec![0xFF, 0xFE];
        seg.extend_from_slice(&7u16.to_be_bytes());
        seg.extend_from_slice(b"hello");
        data.extend_from_slice(&seg);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let mut first = [ContainerBlockRef::default(); 4];
        let mut second = [ContainerBlockRef::default(); 4];
        let r1 = scan_auto(&data, &mut first);
        let r2 = scan_auto(&data, &mut second);
        assert_eq!(r1, r2);
        assert_eq!(first, second);
    }
}
