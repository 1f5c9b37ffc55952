//! Tagged metadata keys.
//!
//! Every decoded fact is filed under a [`MetaKey`]: a kind plus
//! kind-specific fields. String fields live in the store's arena as
//! [`ByteSpan`]s; [`MetaKeyView`] is the borrowed form used for lookup.

use crate::{ByteArena, ByteSpan};

/// Stored key of an [`Entry`](crate::Entry). String fields are arena spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MetaKey {
    /// TIFF/EXIF tag within a named IFD (`ifd0`, `exififd`, `gpsifd`, ...).
    ExifTag { ifd: ByteSpan, tag: u16 },
    /// IPTC-IIM record/dataset pair.
    IptcDataset { record: u8, dataset: u8 },
    /// XMP property: schema namespace URI plus `/`-separated property path.
    XmpProperty { schema_ns: ByteSpan, property_path: ByteSpan },
    /// ICC profile header field at a fixed byte offset.
    IccHeaderField { offset: u32 },
    /// ICC tag-table entry signature.
    IccTag { signature: u32 },
    /// Photoshop image resource id.
    PhotoshopIrb { resource_id: u16 },
    /// OpenEXR header attribute (part index + attribute name).
    ExrAttribute { part_index: u32, name: ByteSpan },
    /// JUMBF structural field path (`box.0.type`, `c2pa.detected`, ...).
    JumbfField { field: ByteSpan },
    /// Path of a decoded CBOR leaf inside a JUMBF `cbor` box.
    JumbfCborKey { key: ByteSpan },
    /// PrintIM subtable field.
    PrintImField { field: ByteSpan },
    /// GeoTIFF key-directory key id.
    GeotiffKey { key: u16 },
}

/// Borrowed key form used for lookups and assertions.
///
/// Two views match when their kinds match and all kind-specific fields are
/// equal; string fields compare by byte content, case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MetaKeyView<'a> {
    ExifTag { ifd: &'a str, tag: u16 },
    IptcDataset { record: u8, dataset: u8 },
    XmpProperty { schema_ns: &'a str, property_path: &'a str },
    IccHeaderField { offset: u32 },
    IccTag { signature: u32 },
    PhotoshopIrb { resource_id: u16 },
    ExrAttribute { part_index: u32, name: &'a str },
    JumbfField { field: &'a str },
    JumbfCborKey { key: &'a str },
    PrintImField { field: &'a str },
    GeotiffKey { key: u16 },
}

impl MetaKey {
    /// Resolve arena spans into the borrowed view form.
    pub fn view<'a>(&self, arena: &'a ByteArena) -> MetaKeyView<'a> {
        match *self {
            MetaKey::ExifTag { ifd, tag } => MetaKeyView::ExifTag { ifd: arena.text(ifd), tag },
            MetaKey::IptcDataset { record, dataset } => {
                MetaKeyView::IptcDataset { record, dataset }
            }
            MetaKey::XmpProperty { schema_ns, property_path } => MetaKeyView::XmpProperty {
                schema_ns: arena.text(schema_ns),
                property_path: arena.text(property_path),
            },
            MetaKey::IccHeaderField { offset } => MetaKeyView::IccHeaderField { offset },
            MetaKey::IccTag { signature } => MetaKeyView::IccTag { signature },
            MetaKey::PhotoshopIrb { resource_id } => MetaKeyView::PhotoshopIrb { resource_id },
            MetaKey::ExrAttribute { part_index, name } => {
                MetaKeyView::ExrAttribute { part_index, name: arena.text(name) }
            }
            MetaKey::JumbfField { field } => MetaKeyView::JumbfField { field: arena.text(field) },
            MetaKey::JumbfCborKey { key } => MetaKeyView::JumbfCborKey { key: arena.text(key) },
            MetaKey::PrintImField { field } => {
                MetaKeyView::PrintImField { field: arena.text(field) }
            }
            MetaKey::GeotiffKey { key } => MetaKeyView::GeotiffKey { key },
        }
    }
}

impl MetaKeyView<'_> {
    /// Append a canonical, collision-free byte encoding of the key.
    ///
    /// Used as the bucket key of the store index. String fields are
    /// length-prefixed so adjacent fields cannot alias.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        fn put_str(out: &mut Vec<u8>, s: &str) {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        match *self {
            MetaKeyView::ExifTag { ifd, tag } => {
                out.push(0);
                put_str(out, ifd);
                out.extend_from_slice(&tag.to_le_bytes());
            }
            MetaKeyView::IptcDataset { record, dataset } => {
                out.push(1);
                out.push(record);
                out.push(dataset);
            }
            MetaKeyView::XmpProperty { schema_ns, property_path } => {
                out.push(2);
                put_str(out, schema_ns);
                put_str(out, property_path);
            }
            MetaKeyView::IccHeaderField { offset } => {
                out.push(3);
                out.extend_from_slice(&offset.to_le_bytes());
            }
            MetaKeyView::IccTag { signature } => {
                out.push(4);
                out.extend_from_slice(&signature.to_le_bytes());
            }
            MetaKeyView::PhotoshopIrb { resource_id } => {
                out.push(5);
                out.extend_from_slice(&resource_id.to_le_bytes());
            }
            MetaKeyView::ExrAttribute { part_index, name } => {
                out.push(6);
                out.extend_from_slice(&part_index.to_le_bytes());
                put_str(out, name);
            }
            MetaKeyView::JumbfField { field } => {
                out.push(7);
                put_str(out, field);
            }
            MetaKeyView::JumbfCborKey { key } => {
                out.push(8);
                put_str(out, key);
            }
            MetaKeyView::PrintImField { field } => {
                out.push(9);
                put_str(out, field);
            }
            MetaKeyView::GeotiffKey { key } => {
                out.push(10);
                out.extend_from_slice(&key.to_le_bytes());
            }
        }
    }

    /// Canonical encoding as an owned buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        self.encode_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_resolves_spans() {
        let mut arena = ByteArena::new();
        let ifd = arena.append_str("exififd").unwrap();
        let key = MetaKey::ExifTag { ifd, tag: 0x9003 };
        assert_eq!(
            key.view(&arena),
            MetaKeyView::ExifTag { ifd: "exififd", tag: 0x9003 }
        );
    }

    #[test]
    fn encoding_distinguishes_kinds_and_fields() {
        let a = MetaKeyView::IccHeaderField { offset: 8 }.encode();
        let b = MetaKeyView::IccTag { signature: 8 }.encode();
        let c = MetaKeyView::IccHeaderField { offset: 12 }.encode();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, MetaKeyView::IccHeaderField { offset: 8 }.encode());
    }

    #[test]
    fn encoding_string_fields_are_length_prefixed() {
        let a = MetaKeyView::XmpProperty { schema_ns: "ab", property_path: "c" }.encode();
        let b = MetaKeyView::XmpProperty { schema_ns: "a", property_path: "bc" }.encode();
        assert_ne!(a, b);
    }
}
