//! Purpose: Configuration surface for parse, write, and binding operations.
//! Exports: `SerializationOptions`, `JsonOptions`, `JsonHooks`, hook outcome enums, `ThrowMode`, `ErrorSink`.
//! Invariants: Options are immutable during one operation; per-call error state lives in `ErrorSink`.
//! Invariants: The flag bits are the binding-cache signature; equal bits must mean equal binding behavior.
//! Invariants: Hooks are plain function values returning explicit outcomes (no shared mutable event state).

use std::any::Any;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::value::Value;
use crate::var::Var;

/// Composable serialization flags.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SerializationOptions(u32);

impl SerializationOptions {
    pub const NONE: Self = Self(0);
    /// Honor per-member ignore-for-read/ignore-for-write registrations.
    pub const USE_IGNORE_METADATA: Self = Self(1 << 0);
    /// Honor the transient ("never on the wire") member registration.
    pub const USE_TRANSIENT_MARKER: Self = Self(1 << 1);
    /// Format timestamps with the custom pattern from `JsonOptions::timestamp_format`.
    pub const DATE_FORMAT_CUSTOM: Self = Self(1 << 2);
    /// Include members registered as fields (as opposed to properties).
    pub const SERIALIZE_FIELDS: Self = Self(1 << 3);
    /// Write timestamps as `new Date(epoch-milliseconds)`.
    pub const DATE_FORMAT_JS: Self = Self(1 << 4);
    /// Write timestamps in the short ISO-8601 form.
    pub const DATE_FORMAT_ISO8601: Self = Self(1 << 5);
    /// Write timestamps in the ISO-8601 round-trip (RFC 3339) form.
    pub const DATE_FORMAT_ROUNDTRIP: Self = Self(1 << 6);
    /// Write enum values as their text instead of their ordinal.
    pub const ENUM_AS_TEXT: Self = Self(1 << 7);
    /// Write `null` for a back-reference instead of failing on a cycle.
    pub const CONTINUE_ON_CYCLE: Self = Self(1 << 8);
    /// Skip members whose value cannot be read instead of failing.
    pub const CONTINUE_ON_VALUE_ERROR: Self = Self(1 << 9);
    /// Don't write members whose value is null.
    pub const SKIP_NULL_PROPERTY_VALUES: Self = Self(1 << 10);
    /// Don't write null or sentinel timestamp members.
    pub const SKIP_NULL_TIMESTAMPS: Self = Self(1 << 11);
    /// Let the binder parse timestamp-shaped strings into timestamp members.
    pub const AUTO_PARSE_TIMESTAMP: Self = Self(1 << 12);
    /// Write map keys without surrounding quotes.
    pub const WRITE_KEYS_WITHOUT_QUOTES: Self = Self(1 << 13);
    /// Write byte buffers as base64 strings, and accept base64 strings for them.
    pub const BYTE_ARRAY_AS_BASE64: Self = Self(1 << 14);
    /// Write binary streams as base64 strings in bounded chunks.
    pub const STREAMS_AS_BASE64: Self = Self(1 << 15);
    /// Don't write members equal to the zero value of their type.
    pub const SKIP_ZERO_VALUE_TYPES: Self = Self(1 << 16);
    /// Don't write members equal to their registered default value.
    pub const SKIP_DEFAULT_VALUES: Self = Self(1 << 17);
    /// Write durations as text instead of tick counts.
    pub const DURATION_AS_TEXT: Self = Self(1 << 18);
    /// Exclude members registered read-only from both member lists.
    pub const SKIP_READ_ONLY: Self = Self(1 << 19);
    /// Emit and resolve the `__type` discriminator for registered polymorphic types.
    pub const USE_TYPE_DISCRIMINATOR: Self = Self(1 << 20);

    /// The default combination: lenient input, compact output.
    pub const DEFAULT: Self = Self(
        Self::USE_IGNORE_METADATA.0
            | Self::USE_TRANSIENT_MARKER.0
            | Self::SERIALIZE_FIELDS.0
            | Self::AUTO_PARSE_TIMESTAMP.0
            | Self::SKIP_READ_ONLY.0
            | Self::SKIP_DEFAULT_VALUES.0
            | Self::SKIP_ZERO_VALUE_TYPES.0
            | Self::SKIP_NULL_PROPERTY_VALUES.0
            | Self::SKIP_NULL_TIMESTAMPS.0,
    );

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for SerializationOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for SerializationOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.with(rhs);
    }
}

/// Whether errors abort the operation or are collected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ThrowMode {
    #[default]
    Raise,
    Collect,
}

/// Outcome of a write-value or object-boundary hook.
#[derive(Debug, Eq, PartialEq)]
pub enum HookOutcome {
    Continue,
    Handled,
}

/// Outcome of the write-named-value hook.
pub enum NamedValueOutcome {
    Continue,
    Handled,
    Rewrite { name: String, value: Var },
}

/// Outcome of the map-entry hook (before wire-name lookup).
pub enum MapEntryOutcome {
    Continue,
    Skip,
    Rewrite { key: String, value: Value },
}

/// Outcome of the apply-entry hook (after wire-name lookup, before conversion).
pub enum ApplyEntryOutcome {
    Continue,
    Skip,
    Replace(Value),
}

/// Instance-creation request handed to the create-instance hook.
pub struct CreateRequest<'a> {
    pub type_name: &'a str,
    pub element_count: usize,
}

pub type WriteValueHook =
    Arc<dyn Fn(&mut dyn fmt::Write, &Var) -> Result<HookOutcome, Error> + Send + Sync>;
pub type NamedValueHook = Arc<dyn Fn(&str, &Var) -> NamedValueOutcome + Send + Sync>;
pub type CreateInstanceHook =
    Arc<dyn Fn(&CreateRequest<'_>) -> Option<Box<dyn Any>> + Send + Sync>;
pub type MapEntryHook = Arc<dyn Fn(&str, &Value) -> MapEntryOutcome + Send + Sync>;
pub type ApplyEntryHook = Arc<dyn Fn(&str, &str, &Value) -> ApplyEntryOutcome + Send + Sync>;

/// Optional extension points, each consulted before the default behavior.
#[derive(Clone, Default)]
pub struct JsonHooks {
    pub write_value: Option<WriteValueHook>,
    pub before_write_object: Option<WriteValueHook>,
    pub after_write_object: Option<WriteValueHook>,
    pub write_named_value: Option<NamedValueHook>,
    pub create_instance: Option<CreateInstanceHook>,
    pub map_entry: Option<MapEntryHook>,
    pub apply_entry: Option<ApplyEntryHook>,
}

impl fmt::Debug for JsonHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonHooks")
            .field("write_value", &self.write_value.is_some())
            .field("before_write_object", &self.before_write_object.is_some())
            .field("after_write_object", &self.after_write_object.is_some())
            .field("write_named_value", &self.write_named_value.is_some())
            .field("create_instance", &self.create_instance.is_some())
            .field("map_entry", &self.map_entry.is_some())
            .field("apply_entry", &self.apply_entry.is_some())
            .finish()
    }
}

/// Options for one parse, write, or binding operation.
#[derive(Clone, Debug)]
pub struct JsonOptions {
    pub serialization: SerializationOptions,
    pub throw_mode: ThrowMode,
    /// Collected-error budget; collection itself fails once reached. Minimum 1.
    pub max_errors: usize,
    /// Wraps serialized output as `name(...);` when set.
    pub jsonp_callback: Option<String>,
    /// `time` format description used with `DATE_FORMAT_CUSTOM`.
    pub timestamp_format: Option<String>,
    /// Indentation unit for formatted output.
    pub formatting_tab: String,
    /// Chunk size for base64 stream writes; clamped to a minimum of 512.
    pub streaming_chunk_size: usize,
    pub hooks: JsonHooks,
}

impl JsonOptions {
    pub fn new() -> Self {
        Self {
            serialization: SerializationOptions::DEFAULT,
            throw_mode: ThrowMode::Raise,
            max_errors: 100,
            jsonp_callback: None,
            timestamp_format: None,
            formatting_tab: "  ".to_string(),
            streaming_chunk_size: u16::MAX as usize,
            hooks: JsonHooks::default(),
        }
    }

    pub fn with_serialization(mut self, serialization: SerializationOptions) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn collecting(mut self) -> Self {
        self.throw_mode = ThrowMode::Collect;
        self
    }

    pub fn has(&self, flags: SerializationOptions) -> bool {
        self.serialization.contains(flags)
    }

    /// The binding-cache key contribution of these options.
    pub fn cache_signature(&self) -> u32 {
        self.serialization.bits()
    }

    pub fn final_chunk_size(&self) -> usize {
        self.streaming_chunk_size.max(512)
    }
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call error destination: raises immediately or collects up to a budget.
#[derive(Debug)]
pub struct ErrorSink {
    mode: ThrowMode,
    max: usize,
    errors: Vec<Error>,
}

impl ErrorSink {
    pub fn new(options: &JsonOptions) -> Self {
        Self {
            mode: options.throw_mode,
            max: options.max_errors.max(1),
            errors: Vec::new(),
        }
    }

    /// Raise or record `error`. Returns `Err` in raise mode, or once the
    /// budget is exhausted in collect mode; otherwise records and continues.
    pub fn report(&mut self, error: Error) -> Result<(), Error> {
        match self.mode {
            ThrowMode::Raise => Err(error),
            ThrowMode::Collect => {
                if self.errors.len() >= self.max {
                    return Err(Error::new(ErrorKind::ErrorBudget)
                        .with_message(format!(
                            "too many errors collected ({})",
                            self.errors.len()
                        ))
                        .with_source(error));
                }
                tracing::warn!(error = %error, "json error collected");
                self.errors.push(error);
                Ok(())
            }
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorSink, JsonOptions, SerializationOptions, ThrowMode};
    use crate::error::{Error, ErrorKind};

    #[test]
    fn flag_algebra_behaves_like_a_bitset() {
        let flags = SerializationOptions::ENUM_AS_TEXT | SerializationOptions::CONTINUE_ON_CYCLE;
        assert!(flags.contains(SerializationOptions::ENUM_AS_TEXT));
        assert!(!flags.contains(SerializationOptions::SKIP_NULL_PROPERTY_VALUES));
        let trimmed = flags.without(SerializationOptions::ENUM_AS_TEXT);
        assert!(!trimmed.contains(SerializationOptions::ENUM_AS_TEXT));
        assert!(trimmed.contains(SerializationOptions::CONTINUE_ON_CYCLE));
    }

    #[test]
    fn default_combination_balances_leniency_and_compactness() {
        let defaults = SerializationOptions::DEFAULT;
        assert!(defaults.contains(SerializationOptions::SKIP_NULL_PROPERTY_VALUES));
        assert!(defaults.contains(SerializationOptions::SKIP_DEFAULT_VALUES));
        assert!(defaults.contains(SerializationOptions::AUTO_PARSE_TIMESTAMP));
        assert!(!defaults.contains(SerializationOptions::CONTINUE_ON_CYCLE));
        assert!(!defaults.contains(SerializationOptions::ENUM_AS_TEXT));
    }

    #[test]
    fn raise_mode_propagates_the_first_error() {
        let options = JsonOptions::new();
        let mut sink = ErrorSink::new(&options);
        assert!(sink.report(Error::new(ErrorKind::Syntax)).is_err());
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn collect_mode_records_until_the_budget_is_exhausted() {
        let mut options = JsonOptions::new().collecting();
        options.max_errors = 2;
        let mut sink = ErrorSink::new(&options);
        assert!(sink.report(Error::new(ErrorKind::Syntax)).is_ok());
        assert!(sink.report(Error::new(ErrorKind::Conversion)).is_ok());
        let overflow = sink.report(Error::new(ErrorKind::Syntax)).unwrap_err();
        assert_eq!(overflow.kind(), ErrorKind::ErrorBudget);
        assert_eq!(sink.errors().len(), 2);
    }

    #[test]
    fn cache_signature_tracks_the_flag_bits() {
        let a = JsonOptions::new();
        let b = JsonOptions::new()
            .with_serialization(SerializationOptions::DEFAULT | SerializationOptions::ENUM_AS_TEXT);
        assert_ne!(a.cache_signature(), b.cache_signature());
        assert_eq!(a.cache_signature(), JsonOptions::new().cache_signature());
        assert_eq!(ThrowMode::default(), ThrowMode::Raise);
    }
}
