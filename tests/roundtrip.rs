//! Purpose: End-to-end serialize/deserialize coverage for bound structs.
//! Exports: Integration tests only.
//! Role: Lock the literal output shapes and the round-trip guarantees.
//! Invariants: Default options omit null, zero, and default-equal members.
//! Invariants: Formatted output is structurally identical to compact output.

use bindjson::{
    bind_struct, deserialize, parse_str, serialize, serialize_formatted, JsonOptions, Value,
};

#[derive(Clone, Debug, Default, PartialEq)]
struct TestRecord {
    name: String,
    number: i32,
    description: Option<String>,
}

bind_struct! {
    TestRecord {
        name: String => "Name",
        number: i32 => "Number",
        description: Option<String> => "Description",
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct ComplexRecord {
    number: i32,
    test_object: TestRecord,
}

bind_struct! {
    ComplexRecord {
        number: i32 => "Number",
        test_object: TestRecord => "TestObject",
    }
}

fn sample() -> TestRecord {
    TestRecord {
        name: "hallo".to_string(),
        number: 10,
        description: Some("Beschreibung".to_string()),
    }
}

#[test]
fn serializes_every_populated_member() {
    let json = serialize(&sample(), &JsonOptions::new()).unwrap();
    assert_eq!(
        json,
        "{\"Name\":\"hallo\",\"Number\":10,\"Description\":\"Beschreibung\"}"
    );
}

#[test]
fn null_members_are_omitted_by_default() {
    let record = TestRecord {
        name: "hallo".to_string(),
        number: 10,
        description: None,
    };
    let json = serialize(&record, &JsonOptions::new()).unwrap();
    assert_eq!(json, "{\"Name\":\"hallo\",\"Number\":10}");
}

#[test]
fn zero_members_are_omitted_by_default() {
    let record = TestRecord {
        name: "hallo".to_string(),
        number: 0,
        description: None,
    };
    let json = serialize(&record, &JsonOptions::new()).unwrap();
    assert_eq!(json, "{\"Name\":\"hallo\"}");
}

#[test]
fn nested_objects_serialize_recursively() {
    let complex = ComplexRecord {
        number: 10,
        test_object: sample(),
    };
    let json = serialize(&complex, &JsonOptions::new()).unwrap();
    assert_eq!(
        json,
        "{\"Number\":10,\"TestObject\":{\"Name\":\"hallo\",\"Number\":10,\"Description\":\"Beschreibung\"}}"
    );
}

#[test]
fn sparse_nested_objects_skip_their_defaults_too() {
    let complex = ComplexRecord {
        number: 0,
        test_object: TestRecord {
            name: "hallo".to_string(),
            ..TestRecord::default()
        },
    };
    let json = serialize(&complex, &JsonOptions::new()).unwrap();
    assert_eq!(json, "{\"TestObject\":{\"Name\":\"hallo\"}}");
}

#[test]
fn deserializes_all_members() {
    let record: TestRecord = deserialize(
        "{\"Name\":\"hallo\",\"Number\":10,\"Description\":\"Beschreibung\"}",
        &JsonOptions::new(),
    )
    .unwrap();
    assert_eq!(record, sample());
}

#[test]
fn missing_members_keep_their_defaults() {
    let record: TestRecord =
        deserialize("{\"Name\":\"hallo\",\"Number\":10}", &JsonOptions::new()).unwrap();
    assert_eq!(record.name, "hallo");
    assert_eq!(record.number, 10);
    assert_eq!(record.description, None);
}

#[test]
fn unknown_fields_are_ignored() {
    let record: TestRecord = deserialize(
        "{\"Name\":\"hallo\",\"Number\":10,\"Extra\":{\"a\":[1,2]},\"More\":true}",
        &JsonOptions::new(),
    )
    .unwrap();
    assert_eq!(record.name, "hallo");
    assert_eq!(record.number, 10);
}

#[test]
fn wire_names_match_case_insensitively() {
    let record: TestRecord =
        deserialize("{\"name\":\"hallo\",\"NUMBER\":10}", &JsonOptions::new()).unwrap();
    assert_eq!(record.name, "hallo");
    assert_eq!(record.number, 10);
}

#[test]
fn round_trips_through_text() {
    let options = JsonOptions::new();
    let json = serialize(&sample(), &options).unwrap();
    let back: TestRecord = deserialize(&json, &options).unwrap();
    assert_eq!(back, sample());

    let complex = ComplexRecord {
        number: 7,
        test_object: sample(),
    };
    let back: ComplexRecord =
        deserialize(&serialize(&complex, &options).unwrap(), &options).unwrap();
    assert_eq!(back, complex);
}

#[test]
fn formatted_output_uses_two_space_indent_and_crlf() {
    let record = TestRecord {
        name: "hallo".to_string(),
        number: 10,
        description: Some("Description".to_string()),
    };
    let formatted = serialize_formatted(&record, &JsonOptions::new()).unwrap();
    assert_eq!(
        formatted,
        "{\r\n  \"Name\": \"hallo\",\r\n  \"Number\": 10,\r\n  \"Description\": \"Description\"\r\n}"
    );
}

#[test]
fn formatted_and_compact_output_are_structurally_identical() {
    let options = JsonOptions::new();
    let complex = ComplexRecord {
        number: 10,
        test_object: sample(),
    };
    let compact = serialize(&complex, &options).unwrap();
    let formatted = serialize_formatted(&complex, &options).unwrap();
    let from_compact = parse_str(&compact, &options).unwrap().value.unwrap();
    let from_formatted = parse_str(&formatted, &options).unwrap().value.unwrap();
    assert_eq!(from_compact, from_formatted);
}

#[test]
fn deserializing_formatted_text_works() {
    let formatted =
        "{\r\n  \"Name\": \"hallo\",\r\n  \"Number\": 10,\r\n  \"Description\": \"Description\"\r\n}";
    let record: TestRecord = deserialize(formatted, &JsonOptions::new()).unwrap();
    assert_eq!(record.name, "hallo");
    assert_eq!(record.number, 10);
    assert_eq!(record.description.as_deref(), Some("Description"));
}

#[test]
fn numeric_literals_keep_their_shape_through_a_round_trip() {
    let options = JsonOptions::new();
    for (text, expected) in [
        ("10", "10"),
        ("2147483648", "2147483648"),
        ("10.5", "10.5"),
        ("10.50", "10.50"),
        ("1e5", "100000"),
    ] {
        let value = parse_str(text, &options).unwrap().value.unwrap();
        assert_eq!(serialize(&value, &options).unwrap(), expected, "for {text}");
    }
    // Variant selection drives the shapes above.
    assert!(matches!(
        parse_str("10", &options).unwrap().value.unwrap(),
        Value::I32(10)
    ));
    assert!(matches!(
        parse_str("10.5", &options).unwrap().value.unwrap(),
        Value::Decimal(_)
    ));
    assert!(matches!(
        parse_str("1e5", &options).unwrap().value.unwrap(),
        Value::F64(_)
    ));
}
