#![no_main]

use libfuzzer_sys::fuzz_target;
use plyio::{Budget, LoadOptions, SaveOptions};

fuzz_target!(|data: &[u8]| {
    // We are only interested in panics or worse. Most inputs are not valid
    // PLY files, so errors are fine. The budget keeps a header with huge row
    // counts from exhausting the fuzzer's memory.
    let budget = Budget::new(64 * 1024 * 1024);
    let opts = LoadOptions::new().save_comments(true).allow_any_version(true);

    if let Ok(scene) = plyio::load_with(data, &opts, &budget) {
        // Whatever was loaded must be writable again.
        let _ = plyio::save_to_vec(&scene, &SaveOptions::new());
    }
});
