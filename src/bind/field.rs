//! Purpose: Per-type conversion capabilities between parsed values and member slots.
//! Exports: `FieldType`, `Polymorphic`.
//! Role: The collection-adapter seam; every member type opts into its own import/export rules.
//! Invariants: Importing replays sequences through add/clear semantics, never wholesale swaps.
//! Invariants: Fixed arrays write in place up to their bound; excess source elements are dropped.
//! Invariants: A null element going into a non-nullable slot is an element-type error.

use std::any::type_name;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use time::{Duration, OffsetDateTime};

use crate::base64;
use crate::bind::registry::resolve_discriminator;
use crate::bind::{apply_map, convert, Bind, DynObject};
use crate::date::{self, NULL_TIMESTAMP};
use crate::error::{Error, ErrorKind};
use crate::options::{CreateRequest, ErrorSink, JsonOptions, SerializationOptions};
use crate::value::{Decimal, Value};
use crate::var::{ByteBuf, Var};

/// A type that can occupy a bindable member slot.
///
/// `import` converts a parsed value into the existing slot, reusing the
/// current contents where the semantics call for it (nested objects
/// populate in place, collections replay). Conversion failures go through
/// the sink; the slot keeps a safe value either way.
pub trait FieldType: Sized + 'static {
    /// Whether a JSON null is a legal element value for this type.
    const ACCEPTS_NULL: bool = false;

    fn export(&self) -> Var;

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error>;
}

macro_rules! integer_field {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl FieldType for $ty {
            fn export(&self) -> Var {
                Var::$variant(*self)
            }

            fn import(
                &mut self,
                value: &Value,
                _options: &JsonOptions,
                sink: &mut ErrorSink,
            ) -> Result<(), Error> {
                match convert::to_i128(value) {
                    Ok(wide) => match <$ty>::try_from(wide) {
                        Ok(narrow) => {
                            *self = narrow;
                            Ok(())
                        }
                        Err(_) => sink.report(
                            Error::new(ErrorKind::Conversion)
                                .with_message(format!(
                                    "{wide} is out of range for {}",
                                    stringify!($ty)
                                )),
                        ),
                    },
                    Err(error) => sink.report(error.with_type_name(stringify!($ty))),
                }
            }
        }
    )+};
}

integer_field! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

impl FieldType for f64 {
    fn export(&self) -> Var {
        Var::F64(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match convert::to_f64(value) {
            Ok(float) => {
                *self = float;
                Ok(())
            }
            Err(error) => sink.report(error.with_type_name("f64")),
        }
    }
}

impl FieldType for f32 {
    fn export(&self) -> Var {
        Var::F32(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match convert::to_f64(value) {
            Ok(float) => {
                *self = float as f32;
                Ok(())
            }
            Err(error) => sink.report(error.with_type_name("f32")),
        }
    }
}

impl FieldType for bool {
    fn export(&self) -> Var {
        Var::Bool(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match convert::to_bool(value) {
            Ok(flag) => {
                *self = flag;
                Ok(())
            }
            Err(error) => sink.report(error),
        }
    }
}

impl FieldType for char {
    fn export(&self) -> Var {
        Var::Char(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                *self = '\0';
                Ok(())
            }
            Value::Str(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(only), None) => {
                        *self = only;
                        Ok(())
                    }
                    _ => sink.report(
                        Error::new(ErrorKind::Conversion)
                            .with_message(format!("cannot convert '{text}' to char")),
                    ),
                }
            }
            Value::I32(code) => match u32::try_from(*code).ok().and_then(char::from_u32) {
                Some(c) => {
                    *self = c;
                    Ok(())
                }
                None => sink.report(
                    Error::new(ErrorKind::Conversion)
                        .with_message(format!("{code} is not a character code")),
                ),
            },
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to char", other.kind_name())),
            ),
        }
    }
}

impl FieldType for String {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        Var::Str(self.clone())
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match convert::to_text(value) {
            Ok(text) => {
                *self = text;
                Ok(())
            }
            Err(error) => sink.report(error),
        }
    }
}

impl FieldType for Decimal {
    fn export(&self) -> Var {
        Var::Decimal(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        let converted = match value {
            Value::Null => Ok(Decimal::new(0, 0)),
            Value::Decimal(number) => Ok(*number),
            Value::I32(number) => Ok(Decimal::new(*number as i128, 0)),
            Value::I64(number) => Ok(Decimal::new(*number as i128, 0)),
            Value::F64(number) => number.to_string().parse::<Decimal>(),
            Value::Str(text) => text.parse::<Decimal>(),
            other => Err(Error::new(ErrorKind::Conversion)
                .with_message(format!("cannot convert {} to decimal", other.kind_name()))),
        };
        match converted {
            Ok(number) => {
                *self = number;
                Ok(())
            }
            Err(error) => sink.report(error),
        }
    }
}

/// Identity pass-through: a `Value` member keeps whatever was parsed.
impl FieldType for Value {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        convert::value_to_var(self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        _sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        *self = value.clone();
        Ok(())
    }
}

impl FieldType for OffsetDateTime {
    fn export(&self) -> Var {
        Var::Timestamp(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        let parsed = match value {
            Value::Null => Some(NULL_TIMESTAMP),
            // Bare date text is detected only under the auto-parse flag;
            // the wrapped epoch forms are always explicit enough.
            Value::Str(text) => {
                if options.has(SerializationOptions::AUTO_PARSE_TIMESTAMP) {
                    date::parse_timestamp(text)
                } else {
                    date::parse_wrapped_forms(text)
                }
            }
            Value::I32(millis) => date::from_epoch_millis(*millis as i64),
            Value::I64(millis) => date::from_epoch_millis(*millis),
            _ => None,
        };
        match parsed {
            Some(timestamp) => {
                *self = timestamp;
                Ok(())
            }
            None => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to a timestamp", value.kind_name())),
            ),
        }
    }
}

impl FieldType for Duration {
    fn export(&self) -> Var {
        Var::Duration(*self)
    }

    fn import(
        &mut self,
        value: &Value,
        _options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        // Durations travel as 100ns tick counts.
        match convert::to_i128(value) {
            Ok(ticks) => match i64::try_from(ticks.saturating_mul(100)) {
                Ok(nanos) => {
                    *self = Duration::nanoseconds(nanos);
                    Ok(())
                }
                Err(_) => sink.report(
                    Error::new(ErrorKind::Conversion)
                        .with_message(format!("tick count {ticks} is out of range")),
                ),
            },
            Err(error) => sink.report(error.with_type_name("duration")),
        }
    }
}

impl<F: FieldType + Default> FieldType for Option<F> {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        match self {
            Some(value) => value.export(),
            None => Var::Null,
        }
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        if self.is_none() {
            *self = Some(create_instance::<F>(options, element_count(value)));
        }
        if let Some(inner) = self {
            inner.import(value, options, sink)?;
        }
        Ok(())
    }
}

impl<F: FieldType + Default> FieldType for Vec<F> {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        Var::List(self.iter().map(FieldType::export).collect())
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                self.clear();
                Ok(())
            }
            Value::Array(items) => {
                for item in items {
                    let mut slot = F::default();
                    if item.is_null() && !F::ACCEPTS_NULL {
                        sink.report(element_null_error::<F>())?;
                    } else {
                        slot.import(item, options, sink)?;
                    }
                    self.push(slot);
                }
                Ok(())
            }
            Value::Str(text)
                if options.has(SerializationOptions::BYTE_ARRAY_AS_BASE64) =>
            {
                match base64::decode(text) {
                    Ok(bytes) => {
                        for byte in bytes {
                            let mut slot = F::default();
                            slot.import(&Value::I32(byte as i32), options, sink)?;
                            self.push(slot);
                        }
                        Ok(())
                    }
                    Err(error) => sink.report(error),
                }
            }
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to a sequence", other.kind_name())),
            ),
        }
    }
}

impl<F: FieldType + Default, const N: usize> FieldType for [F; N] {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        Var::List(self.iter().map(FieldType::export).collect())
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                for slot in self.iter_mut() {
                    *slot = F::default();
                }
                Ok(())
            }
            Value::Array(items) => {
                // Fixed bound: excess source elements are dropped, not an error.
                if items.len() > N {
                    tracing::debug!(
                        capacity = N,
                        elements = items.len(),
                        "excess array elements dropped"
                    );
                }
                for (slot, item) in self.iter_mut().zip(items) {
                    if item.is_null() && !F::ACCEPTS_NULL {
                        sink.report(element_null_error::<F>())?;
                        *slot = F::default();
                    } else {
                        slot.import(item, options, sink)?;
                    }
                }
                Ok(())
            }
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to an array", other.kind_name())),
            ),
        }
    }
}

macro_rules! map_field {
    ($($map:ident),+) => {$(
        impl<F: FieldType + Default> FieldType for $map<String, F> {
            const ACCEPTS_NULL: bool = true;

            fn export(&self) -> Var {
                Var::Map(
                    self.iter()
                        .map(|(key, value)| (key.clone(), value.export()))
                        .collect(),
                )
            }

            fn import(
                &mut self,
                value: &Value,
                options: &JsonOptions,
                sink: &mut ErrorSink,
            ) -> Result<(), Error> {
                match value {
                    Value::Null => {
                        self.clear();
                        Ok(())
                    }
                    Value::Object(map) => {
                        for (key, entry) in map.iter() {
                            let mut slot = F::default();
                            slot.import(entry, options, sink)?;
                            self.insert(key.to_string(), slot);
                        }
                        Ok(())
                    }
                    other => sink.report(
                        Error::new(ErrorKind::Conversion).with_message(format!(
                            "cannot convert {} to a dictionary",
                            other.kind_name()
                        )),
                    ),
                }
            }
        }
    )+};
}

map_field!(HashMap, BTreeMap);

impl FieldType for ByteBuf {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        Var::Bytes(self.0.clone())
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                self.0.clear();
                Ok(())
            }
            Value::Str(text) => {
                if !options.has(SerializationOptions::BYTE_ARRAY_AS_BASE64) {
                    return sink.report(Error::new(ErrorKind::Conversion).with_message(
                        "base64 byte input requires the byte-array-as-base64 option",
                    ));
                }
                match base64::decode(text) {
                    Ok(bytes) => {
                        self.0 = bytes;
                        Ok(())
                    }
                    Err(error) => sink.report(error),
                }
            }
            Value::Array(items) => {
                self.0.clear();
                for item in items {
                    match convert::to_i128(item).ok().and_then(|wide| u8::try_from(wide).ok()) {
                        Some(byte) => self.0.push(byte),
                        None => sink.report(
                            Error::new(ErrorKind::ElementType)
                                .with_message("byte array element is not a byte"),
                        )?,
                    }
                }
                Ok(())
            }
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to bytes", other.kind_name())),
            ),
        }
    }
}

/// Shared nodes keep their identity across export, so cycles are
/// detected; import populates the shared value in place.
impl<T: Bind> FieldType for Rc<RefCell<T>> {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        let object: Rc<dyn DynObject> = self.clone();
        Var::Obj(object)
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                *self = Rc::new(RefCell::new(T::default()));
                Ok(())
            }
            Value::Object(map) => match self.try_borrow_mut() {
                Ok(mut target) => apply_map(map, &mut *target, options, sink),
                Err(_) => sink.report(
                    Error::new(ErrorKind::Conversion)
                        .with_message("shared node is borrowed during deserialization")
                        .with_type_name(T::type_name()),
                ),
            },
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to an object", other.kind_name()))
                    .with_type_name(T::type_name()),
            ),
        }
    }
}

/// A member slot resolved through the `__type` discriminator registry.
#[derive(Clone, Default)]
pub struct Polymorphic(pub Option<Rc<dyn DynObject>>);

impl std::fmt::Debug for Polymorphic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(object) => write!(f, "Polymorphic({})", (object.vtable().type_name)()),
            None => f.write_str("Polymorphic(None)"),
        }
    }
}

impl FieldType for Polymorphic {
    const ACCEPTS_NULL: bool = true;

    fn export(&self) -> Var {
        match &self.0 {
            Some(object) => Var::Obj(Rc::clone(object)),
            None => Var::Null,
        }
    }

    fn import(
        &mut self,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match value {
            Value::Null => {
                self.0 = None;
                Ok(())
            }
            Value::Object(map) => {
                if !options.has(SerializationOptions::USE_TYPE_DISCRIMINATOR) {
                    return sink.report(Error::new(ErrorKind::Conversion).with_message(
                        "polymorphic member requires the type-discriminator option",
                    ));
                }
                let Some(name) = map.get("__type").and_then(Value::as_str) else {
                    return sink.report(
                        Error::new(ErrorKind::Instantiation)
                            .with_message("object carries no '__type' discriminator"),
                    );
                };
                let Some(factory) = resolve_discriminator(name) else {
                    return sink.report(
                        Error::new(ErrorKind::Instantiation)
                            .with_message(format!("unknown '__type' discriminator '{name}'")),
                    );
                };
                match factory(map, options, sink) {
                    Ok(object) => {
                        self.0 = Some(object);
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            }
            other => sink.report(
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("cannot convert {} to an object", other.kind_name())),
            ),
        }
    }
}

/// Default construction for a member instance, with the create-instance
/// hook consulted first.
fn create_instance<F: FieldType + Default>(options: &JsonOptions, element_count: usize) -> F {
    if let Some(hook) = &options.hooks.create_instance {
        let request = CreateRequest {
            type_name: type_name::<F>(),
            element_count,
        };
        if let Some(boxed) = hook(&request)
            && let Ok(replacement) = boxed.downcast::<F>()
        {
            return *replacement;
        }
    }
    F::default()
}

fn element_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    }
}

fn element_null_error<F>() -> Error {
    Error::new(ErrorKind::ElementType).with_message(format!(
        "cannot place null into a sequence of {}",
        type_name::<F>()
    ))
}
