#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (jsv::Draft, &[u8], &[u8])| {
    let (draft, schema, instance) = input;

    // Only schemas that compile are interesting here.
    let validator = match serde_json::from_slice::<serde_json::Value>(schema)
        .ok()
        .and_then(|schema| jsv::compile(&schema, Some(draft)).ok())
    {
        Some(validator) => validator,
        None => return,
    };

    let instance = match serde_json::from_slice::<serde_json::Value>(instance)
        .ok()
        .and_then(|instance| jsv::to_value(&instance).ok())
    {
        Some(instance) => instance,
        None => return,
    };

    let valid = validator.is_valid(&instance);
    assert_eq!(valid, validator.validate(&instance).next().is_none());
});
