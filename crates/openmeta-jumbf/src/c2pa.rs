//! C2PA semantic projection.
//!
//! Runs after the CBOR walk: scans the emitted `JumbfCborKey` paths for
//! provenance-shaped segments (`manifest(s)`, `claim(s)`, `assertion(s)`,
//! `signature(s)`) and emits derived `c2pa.semantic.*` summary fields.
//! Keeping this as a projection leaves the CBOR walker format-agnostic.

use openmeta_core::{EntryFlags, MetaKey, MetaValue};

use crate::DecodeContext;

fn is_path_separator(c: u8) -> bool {
    matches!(c, b'.' | b'[' | b']' | b'@')
}

/// True when `segment` appears in `key` bounded by path separators.
fn key_has_segment(key: &str, segment: &str) -> bool {
    if key.is_empty() || segment.is_empty() {
        return false;
    }
    let key_bytes = key.as_bytes();
    let mut search_from = 0usize;
    while let Some(found) = key[search_from..].find(segment) {
        let start = search_from + found;
        let end = start + segment.len();
        let left_ok = start == 0 || is_path_separator(key_bytes[start - 1]);
        let right_ok = end >= key.len() || is_path_separator(key_bytes[end]);
        if left_ok && right_ok {
            return true;
        }
        search_from = start + 1;
    }
    false
}

fn all_ascii_printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x20..0x7F).contains(&b))
}

#[derive(Default)]
struct Projection {
    cbor_key_count: u64,
    assertion_key_hits: u64,
    has_manifest: bool,
    has_claim: bool,
    has_assertions: bool,
    has_signature: bool,
    claim_generator: Option<String>,
}

/// Scan this payload's CBOR keys and emit the summary fields.
pub(crate) fn append_semantic_fields(ctx: &mut DecodeContext<'_>) -> bool {
    let mut projection = Projection::default();

    for entry in ctx.store.entries() {
        if entry.origin.block != ctx.block {
            continue;
        }
        let MetaKey::JumbfCborKey { key } = entry.key else {
            continue;
        };
        projection.cbor_key_count += 1;

        let key = ctx.store.arena().text(key);
        if key_has_segment(key, "manifest") || key_has_segment(key, "manifests") {
            projection.has_manifest = true;
        }
        if key_has_segment(key, "claim") || key_has_segment(key, "claims") {
            projection.has_claim = true;
        }
        if key_has_segment(key, "assertion") || key_has_segment(key, "assertions") {
            projection.has_assertions = true;
            projection.assertion_key_hits += 1;
        }
        if key_has_segment(key, "signature") || key_has_segment(key, "signatures") {
            projection.has_signature = true;
        }
        if projection.claim_generator.is_none() && key_has_segment(key, "claim_generator") {
            if let MetaValue::Text { data, .. } = entry.value {
                let raw = ctx.store.arena().span(data);
                if all_ascii_printable(raw) {
                    projection.claim_generator =
                        std::str::from_utf8(raw).ok().map(str::to_owned);
                }
            }
        }
    }

    if projection.cbor_key_count == 0 {
        return true;
    }

    let any_indicator = projection.has_manifest
        || projection.has_claim
        || projection.has_assertions
        || projection.has_signature;
    if any_indicator && !ctx.append_c2pa_marker("cbor.semantic") {
        return false;
    }

    if !ctx.emit_field_u64(
        "c2pa.semantic.cbor_key_count",
        projection.cbor_key_count,
        EntryFlags::DERIVED,
    ) {
        return false;
    }
    for (field, present) in [
        ("c2pa.semantic.manifest_present", projection.has_manifest),
        ("c2pa.semantic.claim_present", projection.has_claim),
        ("c2pa.semantic.assertion_present", projection.has_assertions),
        ("c2pa.semantic.signature_present", projection.has_signature),
    ] {
        if !ctx.emit_field_u8(field, u8::from(present), EntryFlags::DERIVED) {
            return false;
        }
    }
    if !ctx.emit_field_u64(
        "c2pa.semantic.assertion_key_hits",
        projection.assertion_key_hits,
        EntryFlags::DERIVED,
    ) {
        return false;
    }
    if let Some(generator) = &projection.claim_generator {
        if !ctx.emit_field_text(
            "c2pa.semantic.claim_generator",
            generator,
            EntryFlags::DERIVED,
        ) {
            return false;
        }
    }

    true
}
