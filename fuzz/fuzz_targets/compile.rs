#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Option<jsv::Draft>, &[u8])| {
    let (draft, bytes) = input;
    if let Ok(schema) = serde_json::from_slice::<serde_json::Value>(bytes) {
        let _ = jsv::compile(&schema, draft);
    }
});
