//! Laws every compiled validator obeys, checked on generated schemas and
//! instances.

use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_instance() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-20i64..20).prop_map(|n| json!(n)),
        (-20.0f64..20.0).prop_map(|f| json!(f)),
        "[ab]{0,3}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[ab]{1,2}", inner, 0..4)
                .prop_map(|members| Value::Object(members.into_iter().collect())),
        ]
    })
}

/// Objects keyed by keyword names, with arbitrary (often ill-shaped) arguments.
fn arb_document() -> impl Strategy<Value = Value> {
    let keyword = prop::sample::select(vec![
        "$id", "$ref", "type", "enum", "const", "minimum", "exclusiveMaximum", "multipleOf",
        "maxLength", "pattern", "format", "items", "additionalItems", "contains", "uniqueItems",
        "properties", "patternProperties", "additionalProperties", "required", "dependencies",
        "propertyNames", "allOf", "anyOf", "oneOf", "not", "if", "then", "else", "definitions",
    ]);
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-3i64..5).prop_map(|n| json!(n)),
        (-3.0f64..5.0).prop_map(|f| json!(f)),
        prop::sample::select(vec!["", "#", "a", "string", "^a", "[", "#/definitions/a", "ipv4"])
            .prop_map(|s| Value::String(s.to_owned())),
    ];

    leaf.prop_recursive(4, 32, 4, move |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![keyword.clone().prop_map(str::to_owned), Just("a".to_owned())],
                inner,
                0..4
            )
            .prop_map(|members| Value::Object(members.into_iter().collect())),
        ]
    })
}

fn arb_type() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("null"),
        Just("boolean"),
        Just("integer"),
        Just("number"),
        Just("string"),
        Just("array"),
        Just("object"),
    ]
}

fn arb_schema() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        arb_type().prop_map(|t| json!({ "type": t })),
        (-10i64..10).prop_map(|n| json!({ "minimum": n })),
        (-10i64..10).prop_map(|n| json!({ "maximum": n })),
        (-10i64..10).prop_map(|n| json!({ "exclusiveMinimum": n })),
        (1u64..5).prop_map(|n| json!({ "multipleOf": n })),
        (0u64..4).prop_map(|n| json!({ "minLength": n })),
        (0u64..4).prop_map(|n| json!({ "maxLength": n })),
        Just(json!({"pattern": "^a"})),
        (0u64..3).prop_map(|n| json!({ "minItems": n })),
        Just(json!({"uniqueItems": true})),
        Just(json!({"required": ["a"]})),
        (0u64..3).prop_map(|n| json!({ "maxProperties": n })),
        arb_instance().prop_map(|value| json!({ "const": value })),
        prop::collection::vec(arb_instance(), 1..3).prop_map(|values| json!({ "enum": values })),
    ];

    let tree = leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| json!({ "items": s })),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| json!({ "items": [a], "additionalItems": b })),
            inner.clone().prop_map(|s| json!({ "contains": s })),
            inner.clone().prop_map(|s| json!({ "properties": {"a": s} })),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| json!({ "properties": {"a": a}, "additionalProperties": b })),
            inner.clone().prop_map(|s| json!({ "patternProperties": {"^b": s} })),
            inner.clone().prop_map(|s| json!({ "propertyNames": s })),
            inner.clone().prop_map(|s| json!({ "dependencies": {"a": s, "b": ["a"]} })),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| json!({ "allOf": [a, b] })),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| json!({ "anyOf": [a, b] })),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| json!({ "oneOf": [a, b] })),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(c, t, e)| json!({ "if": c, "then": t, "else": e })),
            inner.prop_map(|s| json!({ "not": {"not": s} })),
        ]
    });

    // Pointers resolve from the document root, so only the root refers to
    // its definitions.
    prop_oneof![
        tree.clone(),
        tree.prop_map(|s| json!({ "definitions": {"d": s}, "$ref": "#/definitions/d" })),
    ]
}

proptest! {
    #[test]
    fn is_valid_agrees_with_validate(schema in arb_schema(), instance in arb_instance()) {
        let validator = jsv::compile(&schema, None).unwrap();
        let instance = jsv::to_value(&instance).unwrap();

        let errors: Vec<_> = validator.validate(&instance).collect();
        prop_assert_eq!(validator.is_valid(&instance), errors.is_empty());
    }

    #[test]
    fn recompiling_gives_the_same_errors(schema in arb_schema(), instance in arb_instance()) {
        let first = jsv::compile(&schema, None).unwrap();
        let second = jsv::compile(&schema, None).unwrap();
        let instance = jsv::to_value(&instance).unwrap();

        let first: Vec<_> = first.validate(&instance).collect();
        let second: Vec<_> = second.validate(&instance).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn trivial_schemas(instance in arb_instance()) {
        let instance = jsv::to_value(&instance).unwrap();

        let accept = jsv::compile(&json!(true), None).unwrap();
        prop_assert!(accept.is_valid(&instance));
        let accept_all = jsv::compile(&json!({}), None).unwrap();
        prop_assert!(accept_all.validate(&instance).next().is_none());

        let reject = jsv::compile(&json!(false), None).unwrap();
        let errors: Vec<_> = reject.validate(&instance).collect();
        prop_assert_eq!(1, errors.len());
        prop_assert_eq!("false", errors[0].keyword);
        prop_assert_eq!("", errors[0].instance_pointer());
    }

    #[test]
    fn bounds_include_their_boundary(n in any::<i64>(), f in -1.0e9f64..1.0e9) {
        for bound in [json!(n), json!(f)].iter() {
            let at = jsv::to_value(bound).unwrap();

            let minimum = jsv::compile(&json!({ "minimum": bound }), None).unwrap();
            prop_assert!(minimum.is_valid(&at));
            let maximum = jsv::compile(&json!({ "maximum": bound }), None).unwrap();
            prop_assert!(maximum.is_valid(&at));

            let exclusive_minimum = jsv::compile(&json!({ "exclusiveMinimum": bound }), None).unwrap();
            prop_assert!(!exclusive_minimum.is_valid(&at));
            let exclusive_maximum = jsv::compile(&json!({ "exclusiveMaximum": bound }), None).unwrap();
            prop_assert!(!exclusive_maximum.is_valid(&at));
        }
    }

    #[test]
    fn bounds_exclude_their_neighbours(m in (i64::MIN + 1)..i64::MAX) {
        let below = jsv::to_value(&(m - 1)).unwrap();
        let above = jsv::to_value(&(m + 1)).unwrap();

        let minimum = jsv::compile(&json!({ "minimum": m }), None).unwrap();
        prop_assert!(!minimum.is_valid(&below));
        prop_assert!(minimum.is_valid(&above));

        let maximum = jsv::compile(&json!({ "maximum": m }), None).unwrap();
        prop_assert!(!maximum.is_valid(&above));
        prop_assert!(maximum.is_valid(&below));
    }

    #[test]
    fn arbitrary_documents_never_panic(schema in arb_document(), instance in arb_instance()) {
        if let Ok(validator) = jsv::compile(&schema, None) {
            let instance = jsv::to_value(&instance).unwrap();
            let valid = validator.is_valid(&instance);
            prop_assert_eq!(valid, validator.validate(&instance).next().is_none());
        }
    }
}
