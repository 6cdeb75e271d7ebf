//! Purpose: Serialize dynamic domain values to JSON text.
//! Exports: `write_value`, `write_formatted`, `escape_string`, `ObjectGraph`.
//! Role: The single dispatch point from runtime kind to textual form.
//! Invariants: Dispatch precedence is fixed: hook, null, scalars, lists, cycle check, maps, streams, objects.
//! Invariants: An `Obj` node is visited at most once per top-level write call.
//! Invariants: Formatted output is a second pass over re-parsed text, never interleaved formatting.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::io::Read;
use std::rc::Rc;

use crate::base64;
use crate::bind::registry::discriminator_for;
use crate::bind::{BindingRegistry, DynObject, TypeBinding};
use crate::date;
use crate::error::{Error, ErrorKind};
use crate::options::{
    ErrorSink, HookOutcome, JsonOptions, NamedValueOutcome, SerializationOptions,
};
use crate::value::Value;
use crate::var::Var;

/// Identity set of custom objects visited during one top-level write.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    seen: HashSet<usize>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(&self, identity: usize) -> bool {
        self.seen.contains(&identity)
    }

    fn insert(&mut self, identity: usize) {
        self.seen.insert(identity);
    }
}

/// Writes one dynamic value, dispatching on its runtime kind.
pub fn write_value(
    out: &mut dyn fmt::Write,
    value: &Var,
    graph: &mut ObjectGraph,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    if let Some(hook) = &options.hooks.write_value
        && matches!(hook(out, value)?, HookOutcome::Handled)
    {
        return Ok(());
    }

    match value {
        Var::Null => write_null(out),
        Var::Str(text) => write_quoted(out, text),
        Var::Bool(flag) => out
            .write_str(if *flag { "true" } else { "false" })
            .map_err(out_err),
        Var::Char(c) => {
            if *c == '\0' {
                write_null(out)
            } else {
                write_quoted(out, &c.to_string())
            }
        }
        Var::I8(n) => write!(out, "{n}").map_err(out_err),
        Var::U8(n) => write!(out, "{n}").map_err(out_err),
        Var::I16(n) => write!(out, "{n}").map_err(out_err),
        Var::U16(n) => write!(out, "{n}").map_err(out_err),
        Var::I32(n) => write!(out, "{n}").map_err(out_err),
        Var::U32(n) => write!(out, "{n}").map_err(out_err),
        Var::I64(n) => write!(out, "{n}").map_err(out_err),
        Var::U64(n) => write!(out, "{n}").map_err(out_err),
        Var::F32(n) => {
            if n.is_finite() {
                write!(out, "{n}").map_err(out_err)
            } else {
                write_null(out)
            }
        }
        Var::F64(n) => {
            if n.is_finite() {
                write!(out, "{n}").map_err(out_err)
            } else {
                write_null(out)
            }
        }
        Var::Decimal(n) => write!(out, "{n}").map_err(out_err),
        Var::Enum(token) => {
            if options.has(SerializationOptions::ENUM_AS_TEXT) {
                write_quoted(out, token.text)
            } else {
                write!(out, "{}", token.ordinal).map_err(out_err)
            }
        }
        Var::Duration(duration) => {
            if options.has(SerializationOptions::DURATION_AS_TEXT) {
                write_quoted(out, &duration.to_string())
            } else {
                // 100ns tick count, wire-compatible with the parse side.
                write!(out, "{}", duration.whole_nanoseconds() / 100).map_err(out_err)
            }
        }
        Var::Uri(uri) => write_quoted(out, uri.as_str()),
        Var::Timestamp(timestamp) => match write_timestamp(out, *timestamp, options) {
            Ok(()) => Ok(()),
            Err(error) => {
                sink.report(error)?;
                write_null(out)
            }
        },
        Var::Bytes(bytes) => {
            if options.has(SerializationOptions::BYTE_ARRAY_AS_BASE64) {
                out.write_char('"').map_err(out_err)?;
                base64::encode_into(out, bytes).map_err(out_err)?;
                out.write_char('"').map_err(out_err)
            } else {
                out.write_char('[').map_err(out_err)?;
                for (index, byte) in bytes.iter().enumerate() {
                    if index > 0 {
                        out.write_char(',').map_err(out_err)?;
                    }
                    write!(out, "{byte}").map_err(out_err)?;
                }
                out.write_char(']').map_err(out_err)
            }
        }
        Var::List(items) => {
            out.write_char('[').map_err(out_err)?;
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.write_char(',').map_err(out_err)?;
                }
                write_value(out, item, graph, options, sink)?;
            }
            out.write_char(']').map_err(out_err)
        }
        Var::Map(entries) => {
            out.write_char('{').map_err(out_err)?;
            for (index, (key, item)) in entries.iter().enumerate() {
                if index > 0 {
                    out.write_char(',').map_err(out_err)?;
                }
                write_key(out, &escape_string(key), options)?;
                out.write_char(':').map_err(out_err)?;
                write_value(out, item, graph, options, sink)?;
            }
            out.write_char('}').map_err(out_err)
        }
        Var::Stream(cell) => {
            if options.has(SerializationOptions::STREAMS_AS_BASE64) {
                write_base64_stream(out, cell, options, sink)
            } else {
                sink.report(Error::new(ErrorKind::Conversion).with_message(
                    "stream serialization requires the streams-as-base64 option",
                ))?;
                write_null(out)
            }
        }
        Var::Obj(object) => write_object(out, value, object, graph, options, sink),
    }
}

fn write_object(
    out: &mut dyn fmt::Write,
    whole: &Var,
    object: &Rc<dyn DynObject>,
    graph: &mut ObjectGraph,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    let vtable = object.vtable();
    let identity = object.identity();
    if graph.contains(identity) {
        if options.has(SerializationOptions::CONTINUE_ON_CYCLE) {
            tracing::warn!(
                type_name = (vtable.type_name)(),
                "cycle detected, writing null back-reference"
            );
            return write_null(out);
        }
        sink.report(
            Error::new(ErrorKind::Cycle)
                .with_message("cyclic object graph detected")
                .with_type_name((vtable.type_name)()),
        )?;
        return write_null(out);
    }
    graph.insert(identity);

    let binding = match BindingRegistry::global().get_dyn(vtable, options) {
        Ok(binding) => binding,
        Err(error) => {
            sink.report(error)?;
            return write_null(out);
        }
    };

    let mut body: Result<(), Error> = Ok(());
    let access = object.with_value(&mut |any| {
        body = write_object_body(out, whole, any, &vtable, &binding, graph, options, sink);
    });
    match access {
        Ok(()) => body,
        Err(error) => {
            if options.has(SerializationOptions::CONTINUE_ON_VALUE_ERROR) {
                tracing::debug!(
                    type_name = (vtable.type_name)(),
                    "unreadable value skipped"
                );
            } else {
                sink.report(error)?;
            }
            write_null(out)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_object_body(
    out: &mut dyn fmt::Write,
    whole: &Var,
    target: &dyn std::any::Any,
    vtable: &crate::bind::BindingVTable,
    binding: &TypeBinding,
    graph: &mut ObjectGraph,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    out.write_char('{').map_err(out_err)?;
    if let Some(hook) = &options.hooks.before_write_object
        && matches!(hook(out, whole)?, HookOutcome::Handled)
    {
        return out.write_char('}').map_err(out_err);
    }

    let mut first = true;
    if options.has(SerializationOptions::USE_TYPE_DISCRIMINATOR)
        && let Some(discriminator) = discriminator_for((vtable.type_id)())
    {
        write_key(out, "__type", options)?;
        out.write_char(':').map_err(out_err)?;
        write_quoted(out, &discriminator)?;
        first = false;
    }

    for member in binding.serialization_members() {
        let mut value = match member.read_value(target) {
            Ok(value) => value,
            Err(error) => {
                if options.has(SerializationOptions::CONTINUE_ON_VALUE_ERROR) {
                    tracing::debug!(member = member.name(), "unreadable member skipped");
                    continue;
                }
                sink.report(error)?;
                continue;
            }
        };

        let mut renamed: Option<String> = None;
        if let Some(hook) = &options.hooks.write_named_value {
            match hook(member.wire_name(), &value) {
                NamedValueOutcome::Handled => continue,
                NamedValueOutcome::Rewrite { name, value: replacement } => {
                    if name != member.wire_name() {
                        renamed = Some(name);
                    }
                    value = replacement;
                }
                NamedValueOutcome::Continue => {}
            }
        }

        if options.has(SerializationOptions::SKIP_NULL_PROPERTY_VALUES)
            && matches!(value, Var::Null)
        {
            continue;
        }
        if options.has(SerializationOptions::SKIP_ZERO_VALUE_TYPES) && value.is_zero_value() {
            continue;
        }
        if options.has(SerializationOptions::SKIP_NULL_TIMESTAMPS) && value.is_null_timestamp() {
            continue;
        }
        if options.has(SerializationOptions::SKIP_DEFAULT_VALUES)
            && let Some(default) = member.default_value()
            && value.matches_value(default)
        {
            continue;
        }

        if !first {
            out.write_char(',').map_err(out_err)?;
        } else {
            first = false;
        }
        match &renamed {
            Some(name) => write_key(out, &escape_string(name), options)?,
            None => write_key(out, member.escaped_wire_name(), options)?,
        }
        out.write_char(':').map_err(out_err)?;
        write_value(out, &value, graph, options, sink)?;
    }

    if let Some(hook) = &options.hooks.after_write_object {
        hook(out, whole)?;
    }
    out.write_char('}').map_err(out_err)
}

fn write_timestamp(
    out: &mut dyn fmt::Write,
    timestamp: time::OffsetDateTime,
    options: &JsonOptions,
) -> Result<(), Error> {
    let style = date::style_for(options);
    let text = date::format_timestamp(timestamp, style, options.timestamp_format.as_deref())?;
    match style {
        date::TimestampStyle::JsEpoch => out.write_str(&text).map_err(out_err),
        date::TimestampStyle::Custom | date::TimestampStyle::RoundTrip => write_quoted(out, &text),
        date::TimestampStyle::IsoShort => {
            out.write_char('"').map_err(out_err)?;
            out.write_str(&escape_string(&text)).map_err(out_err)?;
            if let Some(suffix) = date::offset_suffix(timestamp) {
                out.write_str(&suffix).map_err(out_err)?;
            }
            out.write_char('"').map_err(out_err)
        }
        date::TimestampStyle::Wrapped => {
            out.write_str("\"\\/Date(").map_err(out_err)?;
            out.write_str(&text).map_err(out_err)?;
            if let Some(suffix) = date::offset_suffix(timestamp) {
                out.write_str(&suffix).map_err(out_err)?;
            }
            out.write_str(")\\/\"").map_err(out_err)
        }
    }
}

/// Base64 in bounded chunks; peak memory stays at the chunk size.
fn write_base64_stream(
    out: &mut dyn fmt::Write,
    cell: &RefCell<Box<dyn Read>>,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    let mut reader = match cell.try_borrow_mut() {
        Ok(reader) => reader,
        Err(_) => {
            sink.report(
                Error::new(ErrorKind::Conversion).with_message("stream is already being read"),
            )?;
            return write_null(out);
        }
    };
    out.write_char('"').map_err(out_err)?;
    let mut buffer = vec![0u8; options.final_chunk_size()];
    let mut carry: Vec<u8> = Vec::with_capacity(2);
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => {
                let mut data = std::mem::take(&mut carry);
                data.extend_from_slice(&buffer[..count]);
                let whole = data.len() - data.len() % 3;
                base64::encode_into(out, &data[..whole]).map_err(out_err)?;
                carry.extend_from_slice(&data[whole..]);
            }
            Err(error) => {
                if error.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                sink.report(
                    Error::new(ErrorKind::Conversion)
                        .with_message("stream read failed")
                        .with_source(error),
                )?;
                break;
            }
        }
    }
    base64::encode_into(out, &carry).map_err(out_err)?;
    out.write_char('"').map_err(out_err)
}

/// Re-emits a parsed tree with indentation: two-pass pretty printing.
pub fn write_formatted(
    out: &mut dyn fmt::Write,
    value: &Value,
    options: &JsonOptions,
) -> Result<(), Error> {
    write_formatted_at(out, value, options, 0)
}

fn write_formatted_at(
    out: &mut dyn fmt::Write,
    value: &Value,
    options: &JsonOptions,
    level: usize,
) -> Result<(), Error> {
    match value {
        Value::Object(map) if map.is_empty() => out.write_str("{}").map_err(out_err),
        Value::Object(map) => {
            out.write_str("{\r\n").map_err(out_err)?;
            for (index, (key, child)) in map.iter().enumerate() {
                if index > 0 {
                    out.write_str(",\r\n").map_err(out_err)?;
                }
                write_indent(out, options, level + 1)?;
                write_key(out, &escape_string(key), options)?;
                out.write_str(": ").map_err(out_err)?;
                write_formatted_at(out, child, options, level + 1)?;
            }
            out.write_str("\r\n").map_err(out_err)?;
            write_indent(out, options, level)?;
            out.write_char('}').map_err(out_err)
        }
        Value::Array(items) if items.is_empty() => out.write_str("[]").map_err(out_err),
        Value::Array(items) => {
            out.write_str("[\r\n").map_err(out_err)?;
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.write_str(",\r\n").map_err(out_err)?;
                }
                write_indent(out, options, level + 1)?;
                write_formatted_at(out, item, options, level + 1)?;
            }
            out.write_str("\r\n").map_err(out_err)?;
            write_indent(out, options, level)?;
            out.write_char(']').map_err(out_err)
        }
        scalar => write_parsed_scalar(out, scalar),
    }
}

fn write_parsed_scalar(out: &mut dyn fmt::Write, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => write_null(out),
        Value::Bool(flag) => out
            .write_str(if *flag { "true" } else { "false" })
            .map_err(out_err),
        Value::I32(n) => write!(out, "{n}").map_err(out_err),
        Value::I64(n) => write!(out, "{n}").map_err(out_err),
        Value::Decimal(n) => write!(out, "{n}").map_err(out_err),
        Value::F64(n) => {
            if n.is_finite() {
                write!(out, "{n}").map_err(out_err)
            } else {
                write_null(out)
            }
        }
        Value::Str(text) => write_quoted(out, text),
        Value::Array(_) | Value::Object(_) => {
            debug_assert!(false, "containers are handled by the formatted walk");
            write_null(out)
        }
    }
}

fn write_indent(
    out: &mut dyn fmt::Write,
    options: &JsonOptions,
    level: usize,
) -> Result<(), Error> {
    for _ in 0..level {
        out.write_str(&options.formatting_tab).map_err(out_err)?;
    }
    Ok(())
}

fn write_key(out: &mut dyn fmt::Write, escaped: &str, options: &JsonOptions) -> Result<(), Error> {
    if options.has(SerializationOptions::WRITE_KEYS_WITHOUT_QUOTES) {
        out.write_str(escaped).map_err(out_err)
    } else {
        out.write_char('"').map_err(out_err)?;
        out.write_str(escaped).map_err(out_err)?;
        out.write_char('"').map_err(out_err)
    }
}

pub(crate) fn write_quoted(out: &mut dyn fmt::Write, text: &str) -> Result<(), Error> {
    out.write_char('"').map_err(out_err)?;
    out.write_str(&escape_string(text)).map_err(out_err)?;
    out.write_char('"').map_err(out_err)
}

fn write_null(out: &mut dyn fmt::Write) -> Result<(), Error> {
    out.write_str("null").map_err(out_err)
}

fn out_err(_: fmt::Error) -> Error {
    Error::new(ErrorKind::Conversion).with_message("write to output sink failed")
}

/// Escapes a string for JSON text. Angle brackets and apostrophes are
/// escaped as unicode so output can be embedded in markup.
pub fn escape_string(value: &str) -> Cow<'_, str> {
    if !value.chars().any(needs_escape) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '<' | '>' | '\'' => push_unicode(&mut out, c),
            c if c < ' ' => push_unicode(&mut out, c),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn needs_escape(c: char) -> bool {
    matches!(c, '"' | '\\' | '<' | '>' | '\'') || c < ' '
}

fn push_unicode(out: &mut String, c: char) {
    use fmt::Write as _;
    let _ = write!(out, "\\u{:04X}", c as u32);
}
