//! Purpose: Self-contained JSON codec with declarative type binding.
//! Exports: `parse`/`serialize`/`deserialize` entry points, the value and var models, the binding registry.
//! Role: Converts between JSON text and domain objects without a platform JSON library.
//! Invariants: Parsing, writing, and binding share one options bag and one error currency.
//! Invariants: The binding registry is the only process-wide mutable state.

pub mod base64;
pub mod bind;
pub mod codec;
pub mod date;
pub mod error;
mod macros;
pub mod options;
pub mod parse;
pub mod value;
pub mod var;
pub mod write;

pub use bind::{
    import_object, register_polymorphic, Bind, BindingRegistry, BindingVTable, DynObject,
    FieldType, MemberBinding, Polymorphic, Schema, TypeBinding,
};
pub use codec::{
    apply, change_type, deserialize, serialize, serialize_formatted, serialize_to, serialize_var,
    serialize_var_to,
};
pub use date::{format_timestamp, parse_timestamp, TimestampStyle, NULL_TIMESTAMP};
pub use error::{Error, ErrorKind};
pub use options::{
    ApplyEntryOutcome, CreateRequest, ErrorSink, HookOutcome, JsonHooks, JsonOptions,
    MapEntryOutcome, NamedValueOutcome, SerializationOptions, ThrowMode,
};
pub use parse::{parse_chars, parse_str, Parsed, Scanner};
pub use value::{Decimal, Map, Value};
pub use var::{ByteBuf, EnumToken, MapLike, ToVar, Var};
pub use write::{escape_string, write_formatted, write_value, ObjectGraph};
