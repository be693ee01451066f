#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First two bytes select the command, the rest is the payload; the
    // grammar must be total over arbitrary bytes.
    if let [a, b, payload @ ..] = data {
        let _ = hsmsim_core::command::parse_request([*a, *b], payload);
    }
});
