//! Purpose: Dynamic representation of domain values handed to the writer.
//! Exports: `Var`, `EnumToken`, `ByteBuf`, `ToVar`, `MapLike`.
//! Role: The runtime-kind dispatch surface; everything serializable flows through it.
//! Invariants: Map-ness is an explicit opt-in (`MapLike`), never duck-typed.
//! Invariants: Only `Obj` nodes have identity; plain variants are owned values and cannot cycle.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::rc::Rc;

use time::{Duration, OffsetDateTime};

use crate::bind::{Bind, DynObject};
use crate::date::NULL_TIMESTAMP;
use crate::value::{Decimal, Value};

/// An enum value as the writer sees it: ordinal plus registered text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EnumToken {
    pub ordinal: i64,
    pub text: &'static str,
}

/// A byte buffer that serializes as binary data (base64 when enabled)
/// rather than as a numeric array.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ByteBuf(pub Vec<u8>);

/// A domain value at the writer's boundary.
pub enum Var {
    Null,
    Bool(bool),
    Char(char),
    Str(String),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Enum(EnumToken),
    Timestamp(OffsetDateTime),
    Duration(Duration),
    Uri(url::Url),
    Bytes(Vec<u8>),
    Stream(RefCell<Box<dyn Read>>),
    List(Vec<Var>),
    Map(Vec<(String, Var)>),
    Obj(Rc<dyn DynObject>),
}

impl Var {
    /// Wraps an owned custom object for serialization.
    pub fn object<T: Bind>(value: T) -> Var {
        Var::Obj(Rc::new(RefCell::new(value)))
    }

    /// Wraps a shared node; identity is preserved, so cycles are detected.
    pub fn shared<T: Bind>(node: &Rc<RefCell<T>>) -> Var {
        let object: Rc<dyn DynObject> = node.clone();
        Var::Obj(object)
    }

    /// Wraps a binary stream, written as base64 when enabled.
    pub fn stream(reader: impl Read + 'static) -> Var {
        Var::Stream(RefCell::new(Box::new(reader)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Var::Null => "null",
            Var::Bool(_) => "bool",
            Var::Char(_) => "char",
            Var::Str(_) => "string",
            Var::I8(_) | Var::U8(_) | Var::I16(_) | Var::U16(_) | Var::I32(_) | Var::U32(_)
            | Var::I64(_) | Var::U64(_) => "integer",
            Var::F32(_) | Var::F64(_) => "float",
            Var::Decimal(_) => "decimal",
            Var::Enum(_) => "enum",
            Var::Timestamp(_) => "timestamp",
            Var::Duration(_) => "duration",
            Var::Uri(_) => "uri",
            Var::Bytes(_) => "bytes",
            Var::Stream(_) => "stream",
            Var::List(_) => "list",
            Var::Map(_) => "map",
            Var::Obj(_) => "object",
        }
    }

    /// True for value-typed variants equal to the zero of their type.
    pub(crate) fn is_zero_value(&self) -> bool {
        match self {
            Var::Bool(value) => !value,
            Var::Char(value) => *value == '\0',
            Var::I8(value) => *value == 0,
            Var::U8(value) => *value == 0,
            Var::I16(value) => *value == 0,
            Var::U16(value) => *value == 0,
            Var::I32(value) => *value == 0,
            Var::U32(value) => *value == 0,
            Var::I64(value) => *value == 0,
            Var::U64(value) => *value == 0,
            Var::F32(value) => *value == 0.0,
            Var::F64(value) => *value == 0.0,
            Var::Decimal(value) => value.is_zero(),
            Var::Enum(token) => token.ordinal == 0,
            Var::Timestamp(value) => *value == NULL_TIMESTAMP,
            Var::Duration(value) => value.is_zero(),
            _ => false,
        }
    }

    /// Null, or the sentinel timestamp.
    pub(crate) fn is_null_timestamp(&self) -> bool {
        match self {
            Var::Null => true,
            Var::Timestamp(value) => *value == NULL_TIMESTAMP,
            _ => false,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Var::I8(value) => Some(*value as i128),
            Var::U8(value) => Some(*value as i128),
            Var::I16(value) => Some(*value as i128),
            Var::U16(value) => Some(*value as i128),
            Var::I32(value) => Some(*value as i128),
            Var::U32(value) => Some(*value as i128),
            Var::I64(value) => Some(*value as i128),
            Var::U64(value) => Some(*value as i128),
            Var::Enum(token) => Some(token.ordinal as i128),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Var::F32(value) => Some(*value as f64),
            Var::F64(value) => Some(*value),
            Var::Decimal(value) => Some(value.to_f64()),
            other => other.as_i128().map(|wide| wide as f64),
        }
    }

    /// Compares a member value against a registered default.
    pub(crate) fn matches_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Var::Null, Value::Null) => true,
            (Var::Bool(a), Value::Bool(b)) => a == b,
            (Var::Str(a), Value::Str(b)) => a == b,
            (Var::Char(a), Value::Str(b)) => {
                let mut chars = b.chars();
                chars.next() == Some(*a) && chars.next().is_none()
            }
            (Var::Enum(token), Value::Str(b)) => token.text == b,
            _ => {
                let numeric = match other {
                    Value::I32(b) => Some(*b as f64),
                    Value::I64(b) => Some(*b as f64),
                    Value::Decimal(b) => Some(b.to_f64()),
                    Value::F64(b) => Some(*b),
                    _ => None,
                };
                match (self.as_i128(), numeric, other) {
                    (Some(a), _, Value::I32(b)) => a == *b as i128,
                    (Some(a), _, Value::I64(b)) => a == *b as i128,
                    (_, Some(b), _) => self.as_f64().is_some_and(|a| a == b),
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Null => f.write_str("Null"),
            Var::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Var::Char(value) => f.debug_tuple("Char").field(value).finish(),
            Var::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Var::I8(value) => f.debug_tuple("I8").field(value).finish(),
            Var::U8(value) => f.debug_tuple("U8").field(value).finish(),
            Var::I16(value) => f.debug_tuple("I16").field(value).finish(),
            Var::U16(value) => f.debug_tuple("U16").field(value).finish(),
            Var::I32(value) => f.debug_tuple("I32").field(value).finish(),
            Var::U32(value) => f.debug_tuple("U32").field(value).finish(),
            Var::I64(value) => f.debug_tuple("I64").field(value).finish(),
            Var::U64(value) => f.debug_tuple("U64").field(value).finish(),
            Var::F32(value) => f.debug_tuple("F32").field(value).finish(),
            Var::F64(value) => f.debug_tuple("F64").field(value).finish(),
            Var::Decimal(value) => f.debug_tuple("Decimal").field(value).finish(),
            Var::Enum(token) => f.debug_tuple("Enum").field(token).finish(),
            Var::Timestamp(value) => f.debug_tuple("Timestamp").field(value).finish(),
            Var::Duration(value) => f.debug_tuple("Duration").field(value).finish(),
            Var::Uri(value) => f.debug_tuple("Uri").field(value).finish(),
            Var::Bytes(value) => f.debug_tuple("Bytes").field(&value.len()).finish(),
            Var::Stream(_) => f.write_str("Stream(..)"),
            Var::List(items) => f.debug_tuple("List").field(items).finish(),
            Var::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Var::Obj(object) => write!(f, "Obj({})", (object.vtable().type_name)()),
        }
    }
}

/// Conversion of a concrete domain value into the writer's dynamic form.
pub trait ToVar {
    fn to_var(&self) -> Var;
}

macro_rules! scalar_to_var {
    ($($ty:ty => $variant:ident),+ $(,)?) => {$(
        impl ToVar for $ty {
            fn to_var(&self) -> Var {
                Var::$variant(*self)
            }
        }
    )+};
}

scalar_to_var! {
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    EnumToken => Enum,
    OffsetDateTime => Timestamp,
    Duration => Duration,
}

impl ToVar for str {
    fn to_var(&self) -> Var {
        Var::Str(self.to_string())
    }
}

impl ToVar for &str {
    fn to_var(&self) -> Var {
        Var::Str(self.to_string())
    }
}

impl ToVar for String {
    fn to_var(&self) -> Var {
        Var::Str(self.clone())
    }
}

impl ToVar for url::Url {
    fn to_var(&self) -> Var {
        Var::Uri(self.clone())
    }
}

impl ToVar for ByteBuf {
    fn to_var(&self) -> Var {
        Var::Bytes(self.0.clone())
    }
}

/// Re-emitting a parsed tree: the identity pass-through.
impl ToVar for Value {
    fn to_var(&self) -> Var {
        crate::bind::convert::value_to_var(self)
    }
}

impl<T: ToVar> ToVar for Option<T> {
    fn to_var(&self) -> Var {
        match self {
            Some(value) => value.to_var(),
            None => Var::Null,
        }
    }
}

impl<T: ToVar> ToVar for Vec<T> {
    fn to_var(&self) -> Var {
        Var::List(self.iter().map(ToVar::to_var).collect())
    }
}

impl<T: ToVar> ToVar for [T] {
    fn to_var(&self) -> Var {
        Var::List(self.iter().map(ToVar::to_var).collect())
    }
}

impl<T: ToVar, const N: usize> ToVar for [T; N] {
    fn to_var(&self) -> Var {
        Var::List(self.iter().map(ToVar::to_var).collect())
    }
}

/// Explicit capability: a container that serializes as a JSON object.
pub trait MapLike {
    fn entries(&self) -> Vec<(String, Var)>;
}

impl<T: ToVar> MapLike for HashMap<String, T> {
    fn entries(&self) -> Vec<(String, Var)> {
        self.iter()
            .map(|(key, value)| (key.clone(), value.to_var()))
            .collect()
    }
}

impl<T: ToVar> MapLike for BTreeMap<String, T> {
    fn entries(&self) -> Vec<(String, Var)> {
        self.iter()
            .map(|(key, value)| (key.clone(), value.to_var()))
            .collect()
    }
}

impl<T: ToVar> ToVar for HashMap<String, T> {
    fn to_var(&self) -> Var {
        Var::Map(self.entries())
    }
}

impl<T: ToVar> ToVar for BTreeMap<String, T> {
    fn to_var(&self) -> Var {
        Var::Map(self.entries())
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteBuf, EnumToken, ToVar, Var};
    use crate::value::Value;

    #[test]
    fn scalar_conversions_pick_the_matching_variant() {
        assert!(matches!(10i32.to_var(), Var::I32(10)));
        assert!(matches!(true.to_var(), Var::Bool(true)));
        assert!(matches!("x".to_var(), Var::Str(_)));
        assert!(matches!(None::<i32>.to_var(), Var::Null));
        assert!(matches!(Some(5u8).to_var(), Var::U8(5)));
        assert!(matches!(ByteBuf(vec![1, 2]).to_var(), Var::Bytes(_)));
    }

    #[test]
    fn collections_become_lists_and_maps() {
        let list = vec![1i32, 2, 3].to_var();
        match list {
            Var::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {other:?}"),
        }
        let mut map = std::collections::BTreeMap::new();
        map.insert("a".to_string(), 1i32);
        match map.to_var() {
            Var::Map(entries) => assert_eq!(entries[0].0, "a"),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn zero_detection_covers_value_types() {
        assert!(Var::I32(0).is_zero_value());
        assert!(Var::Bool(false).is_zero_value());
        assert!(Var::Char('\0').is_zero_value());
        assert!(!Var::I32(10).is_zero_value());
        assert!(!Var::Str(String::new()).is_zero_value());
        assert!(!Var::Null.is_zero_value());
        assert!(Var::Enum(EnumToken { ordinal: 0, text: "None" }).is_zero_value());
    }

    #[test]
    fn default_comparison_crosses_numeric_variants() {
        assert!(Var::I32(10).matches_value(&Value::I32(10)));
        assert!(Var::I64(10).matches_value(&Value::I32(10)));
        assert!(Var::F64(10.0).matches_value(&Value::F64(10.0)));
        assert!(Var::Str("a".into()).matches_value(&Value::Str("a".into())));
        assert!(Var::Null.matches_value(&Value::Null));
        assert!(!Var::I32(10).matches_value(&Value::I32(11)));
        assert!(!Var::Str("a".into()).matches_value(&Value::Null));
    }
}
