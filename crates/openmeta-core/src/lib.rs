//! Core types for metadata extraction.
//!
//! This crate provides the shared primitives the scanner and decoders build
//! on:
//!
//! - [`ByteOrder`] - Big/little endian byte order handling with bounded reads
//! - [`MetaStore`] - Append-only store of decoded entries plus a byte arena
//! - [`MetaKey`]/[`MetaValue`] - Tagged keys and typed values
//! - [`Status`] - The five-rank decode status lattice shared by all decoders
//!
//! # Example
//!
//! ```
//! use openmeta_core::{Entry, EntryOrigin, MetaKey, MetaKeyView, MetaStore, MetaValue};
//!
//! let mut store = MetaStore::new();
//! let block = store.add_block(Default::default()).unwrap();
//! let ifd = store.arena_mut().append_str("ifd0").unwrap();
//!
//! store.add_entry(Entry {
//!     key: MetaKey::ExifTag { ifd, tag: 0x010F },
//!     value: MetaValue::u16(1),
//!     origin: EntryOrigin::in_block(block, 0),
//!     flags: Default::default(),
//! });
//!
//! store.finalize();
//! let hits = store.find_all(&MetaKeyView::ExifTag { ifd: "ifd0", tag: 0x010F });
//! assert_eq!(hits.len(), 1);
//! ```

mod arena;
mod byte_order;
pub mod console;
mod entry;
mod error;
mod key;
mod status;
mod store;
mod value;

pub use arena::{ByteArena, ByteSpan};
pub use byte_order::ByteOrder;
pub use entry::{Entry, EntryFlags, EntryOrigin, WireFamily, WireType};
pub use error::{Error, Result};
pub use key::{MetaKey, MetaKeyView};
pub use status::Status;
pub use store::{BlockId, BlockInfo, EntryId, MetaStore, StoreLimits};
pub use value::{
    MetaElementType, MetaValue, SRational, ScalarValue, TextEncoding, URational,
};
