//! XMP (RDF/XML) packet decoder.
//!
//! Walks an XMP packet with a namespace-aware streaming XML reader and
//! emits one `XmpProperty { schema_ns, property_path }` entry per decoded
//! value:
//!
//! - child elements of `rdf:Description` contribute `/local-name` path
//!   segments; the root property element's namespace URI becomes the
//!   entry's schema namespace
//! - `rdf:Seq`/`rdf:Bag`/`rdf:Alt` items append 1-based `[N]` indices
//! - `rdf:resource` attributes become the property value directly
//! - attributes on `rdf:Description` are emitted as top-level properties
//!   (optional)
//!
//! The packet wrapper (`<?xpacket ... ?>`), NUL padding and a UTF-16
//! encoding are tolerated by the front-end.

mod parser;

use openmeta_core::{EntryFlags, MetaStore, Status};

/// Resource limits applied during XMP decode.
#[derive(Debug, Clone, Copy)]
pub struct XmpDecodeLimits {
    pub max_depth: u32,
    pub max_properties: u32,
    /// Caps the input packet size (0 = unlimited).
    pub max_input_bytes: u64,
    /// Max bytes per decoded property path.
    pub max_path_bytes: u32,
    /// Max text bytes per decoded value.
    pub max_value_bytes: u32,
    /// Max total text bytes across all values (0 = unlimited).
    pub max_total_value_bytes: u64,
}

impl Default for XmpDecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_properties: 200_000,
            max_input_bytes: 64 * 1024 * 1024,
            max_path_bytes: 1024,
            max_value_bytes: 8 * 1024 * 1024,
            max_total_value_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Decoder options.
#[derive(Debug, Clone, Copy)]
pub struct XmpDecodeOptions {
    /// Decode attributes on `rdf:Description` as top-level properties.
    pub decode_description_attributes: bool,
    pub limits: XmpDecodeLimits,
}

impl Default for XmpDecodeOptions {
    fn default() -> Self {
        Self {
            decode_description_attributes: true,
            limits: XmpDecodeLimits::default(),
        }
    }
}

/// Result of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct XmpDecodeResult {
    pub status: Status,
    pub entries_decoded: u32,
}

/// Convert a UTF-16 packet (with BOM) to UTF-8.
fn utf16_to_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 {
        return None;
    }
    let le = match (bytes[0], bytes[1]) {
        (0xFF, 0xFE) => true,
        (0xFE, 0xFF) => false,
        _ => return None,
    };
    let units: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .map(|pair| {
            if le {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

/// Tolerant packet front-end: trims NUL padding, skips a leading MIME-type
/// prefix terminated by a NUL, and converts UTF-16 packets to UTF-8.
fn normalize_packet(xmp_bytes: &[u8]) -> Option<std::borrow::Cow<'_, [u8]>> {
    let mut bytes = xmp_bytes;
    while let Some((&0, rest)) = bytes.split_last().map(|(last, rest)| (last, rest)) {
        bytes = rest;
    }
    if bytes.is_empty() {
        return None;
    }

    if bytes[0] != b'<' && !bytes.starts_with(&[0xFF, 0xFE]) && !bytes.starts_with(&[0xFE, 0xFF])
    {
        // Some writers prefix the packet with a NUL-terminated MIME type.
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            let rest = &bytes[nul + 1..];
            if rest.contains(&b'<') {
                bytes = rest;
            }
        }
    }

    if let Some(utf8) = utf16_to_utf8(bytes) {
        return Some(std::borrow::Cow::Owned(utf8.into_bytes()));
    }
    Some(std::borrow::Cow::Borrowed(bytes))
}

/// Decode an XMP packet, appending properties into `store`.
///
/// `flags` is merged into every emitted entry (used for derived packets,
/// e.g. extended XMP).
pub fn decode_xmp_packet(
    xmp_bytes: &[u8],
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &XmpDecodeOptions,
) -> XmpDecodeResult {
    let mut result = XmpDecodeResult::default();

    let max_in = options.limits.max_input_bytes;
    if max_in != 0 && xmp_bytes.len() as u64 > max_in {
        result.status = Status::LimitExceeded;
        return result;
    }

    let Some(bytes) = normalize_packet(xmp_bytes) else {
        result.status = Status::Unsupported;
        return result;
    };
    if !bytes.contains(&b'<') {
        result.status = Status::Unsupported;
        return result;
    }

    parser::parse_packet(&bytes, store, flags, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKeyView;

    const XMP_NS: &str = "http://ns.adobe.com/xap/1.0/";
    const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
    const MM_NS: &str = "http://ns.adobe.com/xap/1.0/mm/";

    fn packet(body: &str) -> String {
        format!(
            r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:xmpMM="http://ns.adobe.com/xap/1.0/mm/"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
{body}
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#
        )
    }

    fn decode(xml: &str) -> (MetaStore, XmpDecodeResult) {
        let mut store = MetaStore::new();
        let result = decode_xmp_packet(
            xml.as_bytes(),
            &mut store,
            EntryFlags::default(),
            &XmpDecodeOptions::default(),
        );
        store.finalize();
        (store, result)
    }

    fn property(store: &MetaStore, ns: &str, path: &str) -> Option<String> {
        let id = store.find_first(&MetaKeyView::XmpProperty {
            schema_ns: ns,
            property_path: path,
        })?;
        store
            .entry(id)
            .value
            .as_text(store.arena())
            .map(str::to_owned)
    }

    #[test]
    fn simple_properties_and_arrays() {
        let xml = packet(
            r#"   <xmp:CreatorTool>OpenMeta</xmp:CreatorTool>
   <dc:creator><rdf:Seq><rdf:li>John</rdf:li><rdf:li>Jane</rdf:li></rdf:Seq></dc:creator>
   <xmp:Rating> 5 </xmp:Rating>
   <xmpMM:InstanceID rdf:resource="uuid:123"/>"#,
        );
        let (store, result) = decode(&xml);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(property(&store, XMP_NS, "CreatorTool").as_deref(), Some("OpenMeta"));
        assert_eq!(property(&store, DC_NS, "creator[1]").as_deref(), Some("John"));
        assert_eq!(property(&store, DC_NS, "creator[2]").as_deref(), Some("Jane"));
        assert_eq!(property(&store, XMP_NS, "Rating").as_deref(), Some("5"));
        assert_eq!(property(&store, MM_NS, "InstanceID").as_deref(), Some("uuid:123"));
        assert_eq!(result.entries_decoded, 5);
    }

    #[test]
    fn nested_structures_extend_the_path() {
        let xml = packet(
            r#"<xmp:Settings><xmp:Contrast>12</xmp:Contrast></xmp:Settings>"#,
        );
        let (store, result) = decode(&xml);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(
            property(&store, XMP_NS, "Settings/Contrast").as_deref(),
            Some("12")
        );
    }

    #[test]
    fn description_attributes_are_emitted() {
        let xml = packet("").replace(
            "rdf:about=\"\"",
            "rdf:about=\"\" xmp:CreatorTool=\"AttrTool\"",
        );
        let (store, result) = decode(&xml);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(property(&store, XMP_NS, "CreatorTool").as_deref(), Some("AttrTool"));
    }

    #[test]
    fn description_attributes_can_be_disabled() {
        let xml = packet("").replace(
            "rdf:about=\"\"",
            "rdf:about=\"\" xmp:CreatorTool=\"AttrTool\"",
        );
        let mut store = MetaStore::new();
        let options = XmpDecodeOptions {
            decode_description_attributes: false,
            ..Default::default()
        };
        let result =
            decode_xmp_packet(xml.as_bytes(), &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.entries_decoded, 0);
    }

    #[test]
    fn empty_leaves_emit_empty_text() {
        let xml = packet(r#"<dc:source></dc:source>"#);
        let (store, result) = decode(&xml);
        assert_eq!(result.status, Status::Ok);
        assert_eq!(property(&store, DC_NS, "source").as_deref(), Some(""));
    }

    #[test]
    fn duplicate_properties_are_preserved_in_order() {
        let xml = packet(
            r#"<dc:source>first</dc:source><dc:source>second</dc:source>"#,
        );
        let (store, _) = decode(&xml);
        let hits = store.find_all(&MetaKeyView::XmpProperty {
            schema_ns: DC_NS,
            property_path: "source",
        });
        assert_eq!(hits.len(), 2);
        assert_eq!(
            store.entry(hits[0]).value.as_text(store.arena()),
            Some("first")
        );
        assert_eq!(
            store.entry(hits[1]).value.as_text(store.arena()),
            Some("second")
        );
    }

    #[test]
    fn nul_padding_is_trimmed() {
        let mut bytes = packet(r#"<xmp:Rating>3</xmp:Rating>"#).into_bytes();
        bytes.extend_from_slice(&[0u8; 32]);
        let mut store = MetaStore::new();
        let result = decode_xmp_packet(
            &bytes,
            &mut store,
            EntryFlags::default(),
            &XmpDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.entries_decoded, 1);
    }

    #[test]
    fn utf16_packet_is_decoded() {
        let xml = packet(r#"<xmp:Rating>4</xmp:Rating>"#);
        let mut bytes = vec![0xFF, 0xFE];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let mut store = MetaStore::new();
        let result = decode_xmp_packet(
            &bytes,
            &mut store,
            EntryFlags::default(),
            &XmpDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.entries_decoded, 1);
    }

    #[test]
    fn property_count_limit_halts_parsing() {
        let xml = packet(
            r#"<dc:a>1</dc:a><dc:b>2</dc:b><dc:c>3</dc:c><dc:d>4</dc:d>"#,
        );
        let mut store = MetaStore::new();
        let mut options = XmpDecodeOptions::default();
        options.limits.max_properties = 2;
        let result =
            decode_xmp_packet(xml.as_bytes(), &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::LimitExceeded);
        assert_eq!(result.entries_decoded, 2);
    }

    #[test]
    fn path_budget_halts_parsing() {
        let xml = packet(
            r#"<xmp:Settings><xmp:Advanced><xmp:Contrast>1</xmp:Contrast></xmp:Advanced></xmp:Settings>"#,
        );
        let mut store = MetaStore::new();
        let mut options = XmpDecodeOptions::default();
        options.limits.max_path_bytes = 12;
        let result =
            decode_xmp_packet(xml.as_bytes(), &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::LimitExceeded);
        store.finalize();
        // Nothing longer than the budget was ever emitted.
        for entry in store.entries() {
            if let openmeta_core::MetaKey::XmpProperty { property_path, .. } = entry.key {
                assert!(property_path.size <= 12);
            }
        }
    }

    #[test]
    fn value_clipping_sets_truncated() {
        let xml = packet(r#"<dc:description>abcdefghij</dc:description>"#);
        let mut store = MetaStore::new();
        let mut options = XmpDecodeOptions::default();
        options.limits.max_value_bytes = 4;
        let result =
            decode_xmp_packet(xml.as_bytes(), &mut store, EntryFlags::default(), &options);
        assert_eq!(result.status, Status::OutputTruncated);
        store.finalize();
        let hits = store.find_all(&MetaKeyView::XmpProperty {
            schema_ns: DC_NS,
            property_path: "description",
        });
        assert_eq!(hits.len(), 1);
        assert!(store.entry(hits[0]).flags.contains(EntryFlags::TRUNCATED));
        assert_eq!(
            store.entry(hits[0]).value.as_text(store.arena()),
            Some("abcd")
        );
    }

    #[test]
    fn non_xml_is_unsupported() {
        let mut store = MetaStore::new();
        let result = decode_xmp_packet(
            b"just some text",
            &mut store,
            EntryFlags::default(),
            &XmpDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Unsupported);
    }

    #[test]
    fn broken_xml_is_malformed() {
        let mut store = MetaStore::new();
        let result = decode_xmp_packet(
            b"<rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'><rdf:Description",
            &mut store,
            EntryFlags::default(),
            &XmpDecodeOptions::default(),
        );
        assert_eq!(result.status, Status::Malformed);
    }
}
