#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::{PatchFormat, PatchOptions, PatchStatus, patch_with_options};

fuzz_target!(|data: &[u8]| {
    // Decoders must never panic, whatever the patch holds.
    let opts = PatchOptions {
        max_output_size: Some(16 << 20),
        ..Default::default()
    };
    let split = data.first().map_or(0, |&b| usize::from(b)).min(data.len());
    let (source, body) = data.split_at(split);

    for format in PatchFormat::ALL {
        let mut patch = format.magic().to_vec();
        patch.extend_from_slice(body);
        for strict in [false, true] {
            let opts = PatchOptions { strict, ..opts.clone() };
            let out = patch_with_options(source, &patch, format, &opts);
            if !matches!(out.status, PatchStatus::Success | PatchStatus::ChecksumMismatch) {
                assert!(out.data.is_empty());
            }
        }
    }
});
