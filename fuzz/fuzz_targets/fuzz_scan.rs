#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::ContainerBlockRef;

fuzz_target!(|data: &[u8]| {
    // Fuzz container detection and every scanner behind it.
    let mut blocks = [ContainerBlockRef::default(); 32];
    let _ = openmeta::scan_auto(data, &mut blocks);
});
