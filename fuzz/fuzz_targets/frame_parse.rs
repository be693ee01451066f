#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frame parsing must never panic, with or without a configured header.
    let _ = hsmsim_core::frame::parse(data, b"");
    let _ = hsmsim_core::frame::parse(data, b"SSSS");
});
