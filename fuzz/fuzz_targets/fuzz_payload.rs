#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::{ContainerBlockRef, PayloadOptions};

fuzz_target!(|data: &[u8]| {
    // Scan, then extract every discovered block.
    let mut blocks = [ContainerBlockRef::default(); 32];
    let scan = openmeta::scan_auto(data, &mut blocks);
    let mut out = [0u8; 4096];
    let mut parts = [0u32; 32];
    for i in 0..scan.written {
        let _ = openmeta::extract_payload(
            data,
            &blocks[..scan.written as usize],
            i,
            &mut out,
            &mut parts,
            &PayloadOptions::new(),
        );
    }
});
