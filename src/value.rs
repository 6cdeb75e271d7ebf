//! Purpose: Dynamic representation of parsed JSON text.
//! Exports: `Value`, `Map`, `Decimal`.
//! Role: The tree produced by the parser and consumed by the binder and the formatter.
//! Invariants: The numeric variant chosen by the parser is preserved (round-trip shape).
//! Invariants: `Map` keeps insertion order; inserting an existing key replaces in place.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// A parsed JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    Decimal(Decimal),
    F64(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Stable name of the variant, used in conversion diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "int32",
            Value::I64(_) => "int64",
            Value::Decimal(_) => "decimal",
            Value::F64(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Insertion-ordered string-keyed mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `value` under `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_ignore_case(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Exact decimal literal: mantissa and decimal scale.
///
/// `10.50` keeps mantissa 1050 and scale 2, so the literal shape survives a
/// round trip. Equality is shape equality, not numeric equality.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Whole part, truncating any fraction.
    pub fn truncated(&self) -> i128 {
        let mut whole = self.mantissa;
        for _ in 0..self.scale {
            whole /= 10;
        }
        whole
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Error> {
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(Error::new(ErrorKind::Conversion)
                .with_message(format!("'{text}' is not a decimal literal")));
        }
        let mut mantissa: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = c.to_digit(10).ok_or_else(|| {
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("'{text}' is not a decimal literal"))
            })?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit as i128))
                .ok_or_else(|| {
                    Error::new(ErrorKind::Conversion)
                        .with_message(format!("decimal literal '{text}' is out of range"))
                })?;
        }
        if negative {
            mantissa = -mantissa;
        }
        Ok(Self {
            mantissa,
            scale: fraction.len() as u32,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let mut digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if digits.len() <= scale {
            let mut padded = "0".repeat(scale + 1 - digits.len());
            padded.push_str(&digits);
            digits = padded;
        }
        let split = digits.len() - scale;
        write!(
            f,
            "{}{}.{}",
            if self.mantissa < 0 { "-" } else { "" },
            &digits[..split],
            &digits[split..]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Decimal, Map, Value};

    #[test]
    fn map_preserves_insertion_order() {
        let mut map = Map::new();
        map.insert("b", Value::I32(1));
        map.insert("a", Value::I32(2));
        map.insert("c", Value::I32(3));
        let keys: Vec<&str> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn map_insert_replaces_in_place() {
        let mut map = Map::new();
        map.insert("a", Value::I32(1));
        map.insert("b", Value::I32(2));
        map.insert("a", Value::I32(9));
        let entries: Vec<(&str, &Value)> = map.iter().collect();
        assert_eq!(entries[0], ("a", &Value::I32(9)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn map_lookup_is_case_sensitive_by_default() {
        let mut map = Map::new();
        map.insert("Name", Value::Str("x".into()));
        assert!(map.get("name").is_none());
        assert!(map.get_ignore_case("name").is_some());
    }

    #[test]
    fn decimal_round_trips_literal_shape() {
        let d: Decimal = "10.50".parse().unwrap();
        assert_eq!(d.to_string(), "10.50");
        assert_eq!(d.mantissa(), 1050);
        assert_eq!(d.scale(), 2);

        let small: Decimal = "-0.001".parse().unwrap();
        assert_eq!(small.to_string(), "-0.001");
        assert_eq!("10.5".parse::<Decimal>().unwrap().to_string(), "10.5");
    }

    #[test]
    fn decimal_rejects_non_digits_and_overflow() {
        assert!("abc".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
        assert!("1e5".parse::<Decimal>().is_err());
        let wide = "9".repeat(60);
        assert!(wide.parse::<Decimal>().is_err());
    }

    #[test]
    fn decimal_numeric_helpers() {
        let d: Decimal = "10.75".parse().unwrap();
        assert_eq!(d.truncated(), 10);
        assert!((d.to_f64() - 10.75).abs() < 1e-9);
        assert!("0.00".parse::<Decimal>().unwrap().is_zero());
        assert!(!"0.01".parse::<Decimal>().unwrap().is_zero());
    }

    #[test]
    fn value_accessors_match_variants() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
        assert_eq!(Value::I32(1).kind_name(), "int32");
        assert_eq!(Value::F64(1.0).kind_name(), "double");
        assert!(Value::Array(vec![]).as_array().is_some());
    }
}
