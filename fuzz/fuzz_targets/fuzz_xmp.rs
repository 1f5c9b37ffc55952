#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::{EntryFlags, MetaStore, XmpDecodeOptions};

fuzz_target!(|data: &[u8]| {
    // Fuzz the RDF/XML walk with arbitrary data.
    let mut store = MetaStore::new();
    let _ = openmeta::decode_xmp_packet(
        data,
        &mut store,
        EntryFlags::default(),
        &XmpDecodeOptions::default(),
    );
});
