//! Decoded entries and their provenance.

use crate::store::BlockId;
use crate::{ByteSpan, MetaKey, MetaValue};

/// Wire-level family of the type code recorded in [`WireType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum WireFamily {
    /// No meaningful wire type (synthesized entries).
    #[default]
    None,
    /// TIFF field types (1 = BYTE, 2 = ASCII, ...).
    Tiff,
    /// Format-private code spaces (EXR attribute types, CIFF records, ...).
    Other,
}

/// Type of the value as it appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct WireType {
    pub family: WireFamily,
    pub code: u16,
}

impl WireType {
    pub const fn new(family: WireFamily, code: u16) -> Self {
        Self { family, code }
    }
}

bitflags::bitflags! {
    /// Per-entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u8 {
        /// Entry was synthesized from another entry, not read directly.
        const DERIVED = 1 << 0;
        /// The value was clipped by a configured limit.
        const TRUNCATED = 1 << 1;
    }
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct EntryOrigin {
    /// The block (IFD, profile, packet, ...) that produced the entry.
    pub block: BlockId,
    /// 0-based index of the entry within its block at emission time.
    pub order_in_block: u32,
    /// Wire type of the raw value.
    pub wire_type: WireType,
    /// Element count as declared on the wire.
    pub wire_count: u32,
    /// Raw type-name string for formats with textual types (OpenEXR).
    pub wire_type_name: Option<ByteSpan>,
}

impl EntryOrigin {
    /// Origin with just block and order; wire fields default to none.
    pub fn in_block(block: BlockId, order_in_block: u32) -> Self {
        Self {
            block,
            order_in_block,
            wire_type: WireType::default(),
            wire_count: 0,
            wire_type_name: None,
        }
    }
}

/// One decoded fact: key, value, provenance, flags.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct Entry {
    pub key: MetaKey,
    pub value: MetaValue,
    pub origin: EntryOrigin,
    pub flags: EntryFlags,
}

impl Entry {
    /// Entry with default flags and no wire-type information.
    pub fn new(key: MetaKey, value: MetaValue, block: BlockId, order_in_block: u32) -> Self {
        Self {
            key,
            value,
            origin: EntryOrigin::in_block(block, order_in_block),
            flags: EntryFlags::default(),
        }
    }
}
