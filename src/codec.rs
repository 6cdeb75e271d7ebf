//! Purpose: Top-level serialize/deserialize entry points.
//! Exports: `serialize`, `serialize_var`, `serialize_to`, `serialize_formatted`, `deserialize`, `apply`, `change_type`.
//! Role: Thin orchestration over the parser, writer, and binder; owns JSONP wrapping.
//! Invariants: One `ErrorSink` and one `ObjectGraph` per top-level call.
//! Invariants: Formatted serialization re-parses compact output; both are structurally identical.

use std::fmt;
use std::fmt::Write as _;

use crate::bind::{self, Bind, FieldType};
use crate::error::Error;
use crate::options::{ErrorSink, JsonOptions};
use crate::parse;
use crate::value::Value;
use crate::var::{ToVar, Var};
use crate::write::{self, ObjectGraph};

/// Serializes a value to JSON text.
pub fn serialize<T: ToVar + ?Sized>(value: &T, options: &JsonOptions) -> Result<String, Error> {
    serialize_var(&value.to_var(), options)
}

/// Serializes an already-dynamic value to JSON text.
pub fn serialize_var(value: &Var, options: &JsonOptions) -> Result<String, Error> {
    let mut out = String::new();
    serialize_var_to(&mut out, value, options)?;
    Ok(out)
}

/// Serializes a value into any character sink.
pub fn serialize_to<T: ToVar + ?Sized>(
    out: &mut dyn fmt::Write,
    value: &T,
    options: &JsonOptions,
) -> Result<(), Error> {
    serialize_var_to(out, &value.to_var(), options)
}

pub fn serialize_var_to(
    out: &mut dyn fmt::Write,
    value: &Var,
    options: &JsonOptions,
) -> Result<(), Error> {
    let mut sink = ErrorSink::new(options);
    let mut graph = ObjectGraph::new();
    let jsonp = options.jsonp_callback.as_deref().filter(|name| !name.is_empty());
    if let Some(name) = jsonp {
        write!(out, "{name}(").map_err(|_| write_failure())?;
    }
    write::write_value(out, value, &mut graph, options, &mut sink)?;
    if jsonp.is_some() {
        out.write_str(");").map_err(|_| write_failure())?;
    }
    if !sink.errors().is_empty() {
        tracing::warn!(
            collected = sink.errors().len(),
            "serialization completed with collected errors"
        );
    }
    Ok(())
}

/// Serializes with indentation: writes compact text, re-parses it, and
/// re-emits the tree formatted. Slow by design; meant for debugging output.
pub fn serialize_formatted<T: ToVar + ?Sized>(
    value: &T,
    options: &JsonOptions,
) -> Result<String, Error> {
    let mut compact_options = options.clone();
    compact_options.jsonp_callback = None;
    let compact = serialize(value, &compact_options)?;
    let parsed = parse::parse_str(&compact, &compact_options)?;
    let mut out = String::new();
    if let Some(tree) = parsed.value {
        write::write_formatted(&mut out, &tree, options)?;
    }
    Ok(out)
}

/// Deserializes an instance of `T` from JSON text. Missing fields keep
/// their defaults; unknown fields are dropped.
pub fn deserialize<T: Bind>(text: &str, options: &JsonOptions) -> Result<T, Error> {
    let parsed = parse::parse_str(text, options)?;
    let mut target = T::default();
    match parsed.value {
        None | Some(Value::Null) => Ok(target),
        Some(value) => {
            let mut sink = ErrorSink::new(options);
            bind::import_object(&mut target, &value, options, &mut sink)?;
            Ok(target)
        }
    }
}

/// Applies a parsed tree onto an existing target instance.
pub fn apply<T: Bind>(value: &Value, target: &mut T, options: &JsonOptions) -> Result<(), Error> {
    match value {
        Value::Null => Ok(()),
        _ => {
            let mut sink = ErrorSink::new(options);
            bind::import_object(target, value, options, &mut sink)
        }
    }
}

/// Converts a parsed value into any member-capable type.
pub fn change_type<F: FieldType + Default>(
    value: &Value,
    options: &JsonOptions,
) -> Result<F, Error> {
    let mut out = F::default();
    let mut sink = ErrorSink::new(options);
    out.import(value, options, &mut sink)?;
    Ok(out)
}

fn write_failure() -> Error {
    Error::new(crate::error::ErrorKind::Conversion).with_message("write to output sink failed")
}

#[cfg(test)]
mod tests {
    use super::{change_type, serialize, serialize_var};
    use crate::options::JsonOptions;
    use crate::value::Value;
    use crate::var::Var;

    #[test]
    fn scalar_serialization_goes_through_to_var() {
        let options = JsonOptions::new();
        assert_eq!(serialize(&10i32, &options).unwrap(), "10");
        assert_eq!(serialize("hallo", &options).unwrap(), "\"hallo\"");
        assert_eq!(serialize(&vec![1i32, 2], &options).unwrap(), "[1,2]");
    }

    #[test]
    fn jsonp_callback_wraps_the_output() {
        let mut options = JsonOptions::new();
        options.jsonp_callback = Some("loaded".to_string());
        assert_eq!(
            serialize_var(&Var::List(vec![Var::I32(1)]), &options).unwrap(),
            "loaded([1]);"
        );
    }

    #[test]
    fn change_type_converts_scalars_and_sequences() {
        let options = JsonOptions::new();
        let n: i64 = change_type(&Value::Str("42".into()), &options).unwrap();
        assert_eq!(n, 42);
        let v: Vec<i32> =
            change_type(&Value::Array(vec![Value::I32(1), Value::I32(2)]), &options).unwrap();
        assert_eq!(v, vec![1, 2]);
        let s: Option<String> = change_type(&Value::Null, &options).unwrap();
        assert_eq!(s, None);
    }
}
