#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::{EntryFlags, JumbfDecodeOptions, MetaStore};

fuzz_target!(|data: &[u8]| {
    // Fuzz the JUMBF box walk and the CBOR decoder behind it.
    let mut store = MetaStore::new();
    let _ = openmeta::decode_jumbf_payload(
        data,
        &mut store,
        EntryFlags::default(),
        &JumbfDecodeOptions::default(),
    );
});
