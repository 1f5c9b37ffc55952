//! RDF/XML walk over a normalized packet.

use openmeta_core::{
    BlockId, BlockInfo, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, Status,
    TextEncoding, WireFamily, WireType,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::{XmpDecodeOptions, XmpDecodeResult};

const RDF_NS: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const XML_NS: &[u8] = b"http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Default)]
struct Frame {
    is_description: bool,
    is_array_container: bool,
    is_li: bool,
    is_nonrdf: bool,
    contributed_to_path: bool,
    had_child_element: bool,
    emitted_resource_val: bool,
    text_truncated: bool,
    path_len_before: usize,
    /// 1-based item counter for Seq/Bag/Alt containers.
    li_counter: u32,
    text: String,
}

struct Ctx<'a> {
    store: &'a mut MetaStore,
    block: BlockId,
    flags: EntryFlags,
    options: &'a XmpDecodeOptions,
    result: XmpDecodeResult,
    halted: bool,

    description_depth: u32,
    total_value_bytes: u64,
    order_in_block: u32,
    path: String,
    root_schema_ns: String,
    stack: Vec<Frame>,
}

impl Ctx<'_> {
    fn stop(&mut self, status: Status) {
        self.result.status.absorb(status);
        self.halted = true;
    }

    fn path_append_segment(&mut self, segment: &str) -> bool {
        if segment.is_empty() {
            return true;
        }
        let max_path = self.options.limits.max_path_bytes as usize;
        let slash = usize::from(!self.path.is_empty());
        if max_path != 0 && self.path.len() + slash + segment.len() > max_path {
            self.stop(Status::LimitExceeded);
            return false;
        }
        if slash == 1 {
            self.path.push('/');
        }
        self.path.push_str(segment);
        true
    }

    fn path_append_index(&mut self, index: u32) -> bool {
        let rendered = format!("[{index}]");
        let max_path = self.options.limits.max_path_bytes as usize;
        if max_path != 0 && self.path.len() + rendered.len() > max_path {
            self.stop(Status::LimitExceeded);
            return false;
        }
        self.path.push_str(&rendered);
        true
    }

    fn emit_property(&mut self, schema_ns: &str, path: &str, text: &str, truncated: bool) {
        if schema_ns.is_empty() || path.is_empty() {
            return;
        }
        if self.result.entries_decoded >= self.options.limits.max_properties {
            self.stop(Status::LimitExceeded);
            return;
        }

        let (Ok(ns_span), Ok(path_span)) = (
            self.store.arena_mut().append_str(schema_ns),
            self.store.arena_mut().append_str(path),
        ) else {
            self.stop(Status::LimitExceeded);
            return;
        };
        let Ok(value) = MetaValue::text(self.store.arena_mut(), text, TextEncoding::Utf8) else {
            self.stop(Status::LimitExceeded);
            return;
        };

        let mut flags = self.flags;
        if truncated {
            flags |= EntryFlags::TRUNCATED;
        }
        self.store.add_entry(Entry {
            key: MetaKey::XmpProperty {
                schema_ns: ns_span,
                property_path: path_span,
            },
            value,
            origin: EntryOrigin {
                block: self.block,
                order_in_block: self.order_in_block,
                wire_type: WireType::new(WireFamily::Other, 0),
                wire_count: text.len() as u32,
                wire_type_name: None,
            },
            flags,
        });
        self.order_in_block += 1;
        self.result.entries_decoded += 1;
    }

    /// Accumulate leaf text into the top frame, clipping at the value
    /// limits.
    fn push_text(&mut self, text: &str) {
        let Some(frame) = self.stack.last() else {
            return;
        };
        if self.description_depth == 0 || self.path.is_empty() {
            return;
        }
        if (!frame.is_li && !frame.is_nonrdf) || frame.emitted_resource_val {
            return;
        }

        let max_value = self.options.limits.max_value_bytes as usize;
        let have = frame.text.len();
        let want = text.len();
        let take = if max_value == 0 {
            want
        } else if have < max_value {
            want.min(max_value - have)
        } else {
            0
        };
        let clipped = take < want;

        if clipped {
            self.result.status.absorb(Status::OutputTruncated);
        }
        if take == 0 {
            if clipped {
                if let Some(frame) = self.stack.last_mut() {
                    frame.text_truncated = true;
                }
            }
            return;
        }

        let max_total = self.options.limits.max_total_value_bytes;
        if max_total != 0 && self.total_value_bytes + take as u64 > max_total {
            self.stop(Status::LimitExceeded);
            return;
        }
        self.total_value_bytes += take as u64;

        // Clip on a char boundary at or below the byte budget.
        let mut end = take;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.text.push_str(&text[..end]);
            if clipped {
                frame.text_truncated = true;
            }
        }
    }
}

/// Handle a start (or self-closing) element.
fn handle_start(ctx: &mut Ctx<'_>, reader: &NsReader<&[u8]>, e: &BytesStart<'_>) {
    if ctx.stack.len() >= ctx.options.limits.max_depth as usize {
        ctx.stop(Status::LimitExceeded);
        return;
    }

    if let Some(parent) = ctx.stack.last_mut() {
        parent.had_child_element = true;
    }

    let (ns_result, local) = reader.resolve_element(e.name());
    let ns: &[u8] = match &ns_result {
        ResolveResult::Bound(ns) => ns.as_ref(),
        _ => b"",
    };
    let local = local.as_ref().to_vec();

    let is_rdf = ns == RDF_NS;
    let is_xml = ns == XML_NS;
    let mut frame = Frame {
        is_description: is_rdf && local == b"Description",
        is_array_container: is_rdf && matches!(local.as_slice(), b"Seq" | b"Bag" | b"Alt"),
        is_li: is_rdf && local == b"li",
        is_nonrdf: !is_rdf && !is_xml,
        path_len_before: ctx.path.len(),
        ..Default::default()
    };

    if frame.is_description {
        ctx.description_depth += 1;
    }

    // A non-RDF element inside rdf:Description contributes a path segment.
    if ctx.description_depth > 0 && frame.is_nonrdf {
        if ctx.path.is_empty() {
            ctx.root_schema_ns = String::from_utf8_lossy(ns).into_owned();
        }
        let segment = String::from_utf8_lossy(&local).into_owned();
        if !ctx.path_append_segment(&segment) {
            return;
        }
        frame.contributed_to_path = true;

        // rdf:resource carries the value directly.
        for attr in e.attributes().flatten() {
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (attr_ns, attr_local) = reader.resolve_attribute(attr.key);
            let bound_rdf = matches!(&attr_ns, ResolveResult::Bound(ns) if ns.as_ref() == RDF_NS);
            if bound_rdf && attr_local.as_ref() == b"resource" {
                let value = attr.unescape_value().unwrap_or_default();
                let schema_ns = ctx.root_schema_ns.clone();
                let path = ctx.path.clone();
                ctx.emit_property(&schema_ns, &path, value.trim(), false);
                frame.emitted_resource_val = true;
                break;
            }
        }
    }

    // Array items append a 1-based index to the current path.
    if ctx.description_depth > 0 && frame.is_li && !ctx.path.is_empty() {
        let mut overflow = false;
        let mut index = None;
        if let Some(container) = ctx
            .stack
            .iter_mut()
            .rev()
            .find(|frame| frame.is_array_container)
        {
            if container.li_counter == u32::MAX {
                overflow = true;
            } else {
                container.li_counter += 1;
                index = Some(container.li_counter);
            }
        }
        if overflow {
            ctx.stop(Status::LimitExceeded);
            return;
        }
        if let Some(index) = index {
            frame.path_len_before = ctx.path.len();
            frame.contributed_to_path = true;
            if !ctx.path_append_index(index) {
                return;
            }
        }
    }

    let is_description = frame.is_description;
    ctx.stack.push(frame);

    // Attributes on rdf:Description become top-level properties.
    if is_description && ctx.description_depth > 0 && ctx.options.decode_description_attributes {
        for attr in e.attributes().flatten() {
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (attr_ns, attr_local) = reader.resolve_attribute(attr.key);
            let uri: &[u8] = match &attr_ns {
                ResolveResult::Bound(ns) => ns.as_ref(),
                _ => continue,
            };
            if uri.is_empty() || uri == RDF_NS || uri == XML_NS {
                continue;
            }
            let local = String::from_utf8_lossy(attr_local.as_ref()).into_owned();
            let uri = String::from_utf8_lossy(uri).into_owned();
            let value = attr.unescape_value().unwrap_or_default();
            ctx.emit_property(&uri, &local, value.trim(), false);
            if ctx.halted {
                return;
            }
        }
    }
}

fn handle_end(ctx: &mut Ctx<'_>) {
    let Some(frame) = ctx.stack.pop() else {
        ctx.stop(Status::Malformed);
        return;
    };

    // Leaf emission: elements and list items with no child elements.
    if ctx.description_depth > 0
        && !ctx.path.is_empty()
        && !frame.emitted_resource_val
        && !frame.had_child_element
        && (frame.is_li || frame.is_nonrdf)
    {
        let trimmed = frame.text.trim();
        let schema_ns = ctx.root_schema_ns.clone();
        let path = ctx.path.clone();
        ctx.emit_property(&schema_ns, &path, trimmed, frame.text_truncated);
    }

    if frame.contributed_to_path {
        if frame.path_len_before <= ctx.path.len() {
            ctx.path.truncate(frame.path_len_before);
        } else {
            ctx.stop(Status::Malformed);
            return;
        }
        if ctx.path.is_empty() {
            ctx.root_schema_ns.clear();
        }
    }

    if frame.is_description {
        if ctx.description_depth == 0 {
            ctx.stop(Status::Malformed);
            return;
        }
        ctx.description_depth -= 1;
    }
}

pub(crate) fn parse_packet(
    bytes: &[u8],
    store: &mut MetaStore,
    flags: EntryFlags,
    options: &XmpDecodeOptions,
) -> XmpDecodeResult {
    let block = match store.add_block(BlockInfo::default()) {
        Ok(block) => block,
        Err(_) => {
            return XmpDecodeResult {
                status: Status::LimitExceeded,
                entries_decoded: 0,
            }
        }
    };

    let mut ctx = Ctx {
        store,
        block,
        flags,
        options,
        result: XmpDecodeResult::default(),
        halted: false,
        description_depth: 0,
        total_value_bytes: 0,
        order_in_block: 0,
        path: String::new(),
        root_schema_ns: String::new(),
        stack: Vec::with_capacity(16),
    };

    let mut reader = NsReader::from_reader(bytes);
    let mut seen_element = false;

    loop {
        if ctx.halted {
            break;
        }
        match reader.read_resolved_event() {
            Ok((_, Event::Eof)) => break,
            Ok((_, Event::Start(e))) => {
                seen_element = true;
                handle_start(&mut ctx, &reader, &e);
            }
            Ok((_, Event::Empty(e))) => {
                seen_element = true;
                handle_start(&mut ctx, &reader, &e);
                if !ctx.halted {
                    handle_end(&mut ctx);
                }
            }
            Ok((_, Event::End(_))) => handle_end(&mut ctx),
            Ok((_, Event::Text(e))) => {
                if let Ok(text) = e.decode() {
                    ctx.push_text(&text);
                }
            }
            Ok((_, Event::CData(e))) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                ctx.push_text(&raw);
            }
            Ok(_) => {} // declarations, PIs, comments, doctypes
            Err(_) => {
                let status = if seen_element {
                    Status::Malformed
                } else {
                    Status::Unsupported
                };
                ctx.result.status.absorb(status);
                break;
            }
        }
    }

    ctx.result
}
