#![no_main]
use libfuzzer_sys::fuzz_target;
use sipha_atn::atn::{deserialize, AtnDeserializationOptions};

fuzz_target!(|data: &[u8]| {
    let units: Vec<u16> = data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    for generate_rule_bypass_transitions in [false, true] {
        let options = AtnDeserializationOptions {
            verify_atn: true,
            generate_rule_bypass_transitions,
        };
        let _ = deserialize(&units, &options);
    }
});
