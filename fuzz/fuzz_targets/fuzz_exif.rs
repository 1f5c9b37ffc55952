#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta::{ExifDecodeOptions, ExifIfdRef, MetaStore};

fuzz_target!(|data: &[u8]| {
    // Fuzz the TIFF/BigTIFF IFD walk with arbitrary data.
    let mut store = MetaStore::new();
    let mut ifds = [ExifIfdRef::default(); 16];
    let _ = openmeta::decode_exif_tiff(data, &mut store, &mut ifds, &ExifDecodeOptions::default());
});
