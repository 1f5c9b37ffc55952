#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::{ContainerBlockRef, ExifDecodeOptions, ExifIfdRef, MetaStore, PayloadOptions};

fuzz_target!(|data: &[u8]| {
    // Fuzz the whole pipeline: scan, reassemble, dispatch, finalize.
    let mut store = MetaStore::new();
    let mut blocks = [ContainerBlockRef::default(); 32];
    let mut ifds = [ExifIfdRef::default(); 16];
    let mut payload = [0u8; 4096];
    let mut parts = [0u32; 32];
    let _ = openmeta::simple_meta_read(
        data,
        &mut store,
        &mut blocks,
        &mut ifds,
        &mut payload,
        &mut parts,
        &ExifDecodeOptions::default(),
        &PayloadOptions::new(),
    );
});
