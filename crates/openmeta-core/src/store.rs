//! Append-only metadata store.
//!
//! The store is the single mutable resource of a decode run: decoders append
//! blocks and entries, the caller finalizes once, then looks entries up by
//! key. Nothing is removed or reordered; `EntryId`/`BlockId` are dense
//! indices in insertion order.

use std::collections::HashMap;

use crate::{ByteArena, Entry, Error, MetaKey, MetaKeyView, Result};

/// Dense id of a block within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct BlockId(u32);

impl BlockId {
    /// Sentinel id used before an origin is attached to a real block.
    pub const INVALID: BlockId = BlockId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId::INVALID
    }
}

/// Dense id of an entry within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct EntryId(u32);

impl EntryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Administrative description of a source region (an IFD, a profile, a
/// packet). Opaque for now; the id itself is what entries attribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockInfo {}

/// Caps on store growth, bounding hostile inputs.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub max_blocks: u32,
    pub max_entries: u32,
    pub max_arena_bytes: u32,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_blocks: 1 << 20,
            max_entries: 1 << 24,
            max_arena_bytes: u32::MAX,
        }
    }
}

#[derive(Debug, Default)]
struct StoreIndex {
    by_key: HashMap<Vec<u8>, Vec<EntryId>>,
    by_block: HashMap<BlockId, Vec<EntryId>>,
}

/// Append-only store of decoded entries, blocks and arena bytes.
#[derive(Debug)]
pub struct MetaStore {
    arena: ByteArena,
    entries: Vec<Entry>,
    blocks: Vec<BlockInfo>,
    limits: StoreLimits,
    index: Option<StoreIndex>,
}

impl Default for MetaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            arena: ByteArena::with_limit(limits.max_arena_bytes),
            entries: Vec::new(),
            blocks: Vec::new(),
            limits,
            index: None,
        }
    }

    /// The arena backing all spans held by this store.
    pub fn arena(&self) -> &ByteArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ByteArena {
        &mut self.arena
    }

    /// Register a new block. Ids are dense and monotonic.
    pub fn add_block(&mut self, info: BlockInfo) -> Result<BlockId> {
        if self.blocks.len() as u32 >= self.limits.max_blocks {
            return Err(Error::BlockLimitReached(self.limits.max_blocks));
        }
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(info);
        Ok(id)
    }

    /// Append an entry; insertion order is stable.
    pub fn add_entry(&mut self, entry: Entry) -> EntryId {
        debug_assert!((self.entries.len() as u32) < self.limits.max_entries);
        let id = EntryId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    pub fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Resolve a stored key into its borrowed view.
    pub fn key_view(&self, key: &MetaKey) -> MetaKeyView<'_> {
        key.view(&self.arena)
    }

    /// Build the lookup indexes; must run before `find_all`. Idempotent:
    /// repeated calls over unchanged contents produce identical lookups,
    /// and a call after further appends reindexes everything.
    pub fn finalize(&mut self) {
        let mut index = StoreIndex::default();
        for (i, entry) in self.entries.iter().enumerate() {
            let id = EntryId(i as u32);
            let encoded = entry.key.view(&self.arena).encode();
            index.by_key.entry(encoded).or_default().push(id);
            index.by_block.entry(entry.origin.block).or_default().push(id);
        }
        self.index = Some(index);
    }

    pub fn is_finalized(&self) -> bool {
        self.index.is_some()
    }

    /// All entries matching `key`, in insertion order.
    ///
    /// Buckets are keyed by a canonical collision-free encoding, so no
    /// post-filtering is needed. Empty before `finalize`.
    pub fn find_all(&self, key: &MetaKeyView<'_>) -> &[EntryId] {
        self.index
            .as_ref()
            .and_then(|index| index.by_key.get(&key.encode()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First entry matching `key`, if any.
    pub fn find_first(&self, key: &MetaKeyView<'_>) -> Option<EntryId> {
        self.find_all(key).first().copied()
    }

    /// Entries attributed to `block`, in insertion order. Empty before
    /// `finalize`.
    pub fn entries_in_block(&self, block: BlockId) -> &[EntryId] {
        self.index
            .as_ref()
            .and_then(|index| index.by_block.get(&block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryOrigin, MetaValue};

    fn exif_entry(store: &mut MetaStore, block: BlockId, ifd: &str, tag: u16, order: u32) {
        let ifd = store.arena_mut().append_str(ifd).unwrap();
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd, tag },
            value: MetaValue::u32(u32::from(tag)),
            origin: EntryOrigin::in_block(block, order),
            flags: Default::default(),
        });
    }

    #[test]
    fn find_all_preserves_insertion_order() {
        let mut store = MetaStore::new();
        let block = store.add_block(BlockInfo::default()).unwrap();
        exif_entry(&mut store, block, "ifd0", 0x0110, 0);
        exif_entry(&mut store, block, "ifd0", 0x010F, 1);
        exif_entry(&mut store, block, "ifd0", 0x0110, 2);
        store.finalize();

        let view = MetaKeyView::ExifTag { ifd: "ifd0", tag: 0x0110 };
        let hits = store.find_all(&view);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index(), 0);
        assert_eq!(hits[1].index(), 2);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut store = MetaStore::new();
        let block = store.add_block(BlockInfo::default()).unwrap();
        exif_entry(&mut store, block, "gpsifd", 0x0002, 0);
        store.finalize();
        let view = MetaKeyView::ExifTag { ifd: "gpsifd", tag: 0x0002 };
        let first = store.find_all(&view).to_vec();
        store.finalize();
        assert_eq!(store.find_all(&view), first.as_slice());
    }

    #[test]
    fn keys_compare_by_content_not_span() {
        let mut store = MetaStore::new();
        let block = store.add_block(BlockInfo::default()).unwrap();
        // Two entries with equal ifd text in distinct arena spans.
        exif_entry(&mut store, block, "exififd", 0x9003, 0);
        exif_entry(&mut store, block, "exififd", 0x9003, 1);
        store.finalize();
        let view = MetaKeyView::ExifTag { ifd: "exififd", tag: 0x9003 };
        assert_eq!(store.find_all(&view).len(), 2);
    }

    #[test]
    fn entries_in_block_groups_by_block() {
        let mut store = MetaStore::new();
        let a = store.add_block(BlockInfo::default()).unwrap();
        let b = store.add_block(BlockInfo::default()).unwrap();
        exif_entry(&mut store, a, "ifd0", 1, 0);
        exif_entry(&mut store, b, "ifd1", 2, 0);
        exif_entry(&mut store, a, "ifd0", 3, 1);
        store.finalize();
        assert_eq!(store.entries_in_block(a).len(), 2);
        assert_eq!(store.entries_in_block(b).len(), 1);
    }

    #[test]
    fn block_limit_is_enforced() {
        let mut store = MetaStore::with_limits(StoreLimits {
            max_blocks: 1,
            ..Default::default()
        });
        assert!(store.add_block(BlockInfo::default()).is_ok());
        assert!(store.add_block(BlockInfo::default()).is_err());
    }
}
