//! Image-file metadata reader.
//!
//! Reads metadata from untrusted image bytes into a uniform in-memory
//! catalog: the container scanner locates metadata blocks (EXIF, XMP, ICC,
//! IPTC-IIM, Photoshop IRB, JUMBF/C2PA, OpenEXR headers) across JPEG, PNG,
//! WebP, GIF, TIFF, JP2, JXL and ISO-BMFF files; the payload reassembler
//! rebuilds fragmented/compressed streams; and the per-format decoders
//! append typed entries into a [`MetaStore`].
//!
//! # Example
//!
//! ```
//! use openmeta::{
//!     simple_meta_read, ContainerBlockRef, ExifDecodeOptions, ExifIfdRef, MetaKeyView,
//!     MetaStore, PayloadOptions,
//! };
//!
//! let file = std::fs::read("tests/data/sample.jpg").unwrap_or_default();
//! # let file: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xD9];
//! let mut store = MetaStore::new();
//! let mut blocks = vec![ContainerBlockRef::default(); 64];
//! let mut ifds = vec![ExifIfdRef::default(); 16];
//! let mut payload = vec![0u8; 1 << 20];
//! let mut parts = vec![0u32; 64];
//!
//! let result = simple_meta_read(
//!     &file,
//!     &mut store,
//!     &mut blocks,
//!     &mut ifds,
//!     &mut payload,
//!     &mut parts,
//!     &ExifDecodeOptions::default(),
//!     &PayloadOptions::new(),
//! );
//!
//! for id in store.find_all(&MetaKeyView::ExifTag { ifd: "ifd0", tag: 0x010F }) {
//!     let entry = store.entry(*id);
//!     println!("Make: {:?}", entry.value.as_text(store.arena()));
//! }
//! # let _ = result;
//! ```

mod simple;

pub use openmeta_core::{
    console, BlockId, BlockInfo, ByteArena, ByteOrder, ByteSpan, Entry, EntryFlags, EntryId,
    EntryOrigin, MetaElementType, MetaKey, MetaKeyView, MetaStore, MetaValue, SRational,
    ScalarValue, Status, StoreLimits, TextEncoding, URational, WireFamily, WireType,
};
pub use openmeta_exif::{
    decode_crw_ciff, decode_exif_tiff, CiffDecodeResult, ExifDecodeLimits, ExifDecodeOptions,
    ExifDecodeResult, ExifIfdKind, ExifIfdRef,
};
pub use openmeta_exr::{
    decode_exr_header, ExrDecodeLimits, ExrDecodeOptions, ExrDecodeResult,
};
pub use openmeta_icc::{decode_icc_profile, IccDecodeLimits, IccDecodeOptions, IccDecodeResult};
pub use openmeta_iptc::{
    decode_iptc_iim, IptcIimDecodeLimits, IptcIimDecodeOptions, IptcIimDecodeResult,
};
pub use openmeta_irb::{
    decode_photoshop_irb, PhotoshopIrbDecodeLimits, PhotoshopIrbDecodeOptions,
    PhotoshopIrbDecodeResult,
};
pub use openmeta_jumbf::{
    decode_jumbf_payload, JumbfDecodeLimits, JumbfDecodeOptions, JumbfDecodeResult,
};
pub use openmeta_scan::{
    extract_payload, scan_auto, scan_bmff, scan_gif, scan_jp2, scan_jpeg, scan_jxl, scan_png,
    scan_tiff, scan_webp, BlockChunking, BlockCompression, ContainerBlockKind, ContainerBlockRef,
    ContainerFormat, PayloadLimits, PayloadOptions, PayloadResult, ScanResult,
};
pub use openmeta_xmp::{decode_xmp_packet, XmpDecodeLimits, XmpDecodeOptions, XmpDecodeResult};

pub use simple::{simple_meta_read, SimpleMetaResult};
