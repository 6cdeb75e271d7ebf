//! Purpose: Lock parser contract expectations with corpus + differential coverage.
//! Exports: Integration tests only.
//! Role: Catch semantic drift between the hand-written parser and a serde_json baseline.
//! Invariants: Differential checks assert parity on valid payloads only; leniency divergences are pinned separately.
//! Invariants: Number comparisons go through f64, so shape differences don't mask value drift.

use bindjson::{parse_str, JsonOptions, Value};

fn parse_ours(input: &str) -> Result<Value, String> {
    parse_str(input, &JsonOptions::new())
        .map_err(|err| err.to_string())
        .and_then(|parsed| parsed.value.ok_or_else(|| "empty".to_string()))
}

fn parse_baseline(input: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(input).map_err(|err| err.to_string())
}

fn to_baseline(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(flag) => serde_json::Value::Bool(*flag),
        Value::I32(n) => serde_json::Value::from(*n),
        Value::I64(n) => serde_json::Value::from(*n),
        Value::Decimal(n) => serde_json::Value::from(n.to_f64()),
        Value::F64(n) => serde_json::Value::from(*n),
        Value::Str(text) => serde_json::Value::String(text.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_baseline).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, child)| (key.to_string(), to_baseline(child)))
                .collect(),
        ),
    }
}

fn canonical(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Number(n) => serde_json::Value::from(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonical).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), canonical(child)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn assert_parity(input: &str) {
    let ours = parse_ours(input).unwrap_or_else(|err| panic!("ours failed on {input}: {err}"));
    let baseline =
        parse_baseline(input).unwrap_or_else(|err| panic!("baseline failed on {input}: {err}"));
    assert_eq!(
        canonical(&to_baseline(&ours)),
        canonical(&baseline),
        "value mismatch for {input}"
    );
}

#[test]
fn corpus_valid_payloads_match_the_baseline() {
    let corpus = [
        r#"{"a":1,"b":"ok"}"#,
        r#"[1,2,3,{"x":true}]"#,
        r#"{"nested":{"arr":[{"k":"v"}]}}"#,
        r#"{"unicode":"☃"}"#,
        r#"{"pair":"😀"}"#,
        r#"{"esc":"a\tb\nc\"d\\e\/f"}"#,
        r#"[-1, 0, 2147483648, 10.5, 1e5, 1.5e-3]"#,
        r#"{"empty_obj":{},"empty_arr":[],"null":null,"t":true,"f":false}"#,
        "  [ 1 , 2 ]  ",
        r#""plain string""#,
    ];
    for case in corpus {
        assert_parity(case);
    }
}

#[test]
fn corpus_duplicate_keys_keep_the_last_value() {
    assert_parity(r#"{"a":1,"a":2}"#);
    let ours = parse_ours(r#"{"a":1,"a":2}"#).unwrap();
    let map = ours.as_object().expect("object");
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("a"), Some(&Value::I32(2)));
}

#[test]
fn corpus_malformed_payloads_are_rejected_by_both() {
    let corpus = [r#"{"a":}"#, r#"{"a" 1}"#, r#""unterminated"#, "@", r#"{"a":"\u00ZZ"}"#];
    for case in corpus {
        assert!(parse_ours(case).is_err(), "ours accepted {case}");
        assert!(parse_baseline(case).is_err(), "baseline accepted {case}");
    }
}

#[test]
fn corpus_deep_nesting_exceeds_the_baseline_recursion_limit() {
    let depth = 256usize;
    let mut payload = String::with_capacity(depth * 2 + 1);
    for _ in 0..depth {
        payload.push('[');
    }
    payload.push('0');
    for _ in 0..depth {
        payload.push(']');
    }
    assert!(
        parse_ours(&payload).is_ok(),
        "hand-written parser unexpectedly rejected deep nesting"
    );
    assert!(
        parse_baseline(&payload).is_err(),
        "baseline unexpectedly accepted deep nesting beyond its recursion limit"
    );
}

#[test]
fn leniency_divergences_are_intentional() {
    // Stray commas, case-insensitive literals, and the JS date construct
    // are accepted here and rejected by the strict baseline.
    let lenient = [r#"{"a":1,,"b":2}"#, "TRUE", "new Date(0)"];
    for case in lenient {
        assert!(parse_ours(case).is_ok(), "ours rejected {case}");
        assert!(parse_baseline(case).is_err(), "baseline accepted {case}");
    }
}

#[test]
fn large_integers_fall_back_to_exact_decimals() {
    let ours = parse_ours(r#"{"n":18446744073709551615}"#).unwrap();
    let map = ours.as_object().expect("object");
    match map.get("n") {
        Some(Value::Decimal(decimal)) => {
            assert_eq!(decimal.to_string(), "18446744073709551615");
        }
        other => panic!("expected decimal, got {other:?}"),
    }
}
