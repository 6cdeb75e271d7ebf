//! Purpose: Type-binding layer between the value model and domain types.
//! Exports: `Bind`, `MemberBinding`, `TypeBinding`, `DynObject`, `BindingVTable`, submodules.
//! Role: Discovers, caches, and applies per-type member maps; the only bridge to domain objects.
//! Invariants: Member accessors are closures fixed at registration; no runtime introspection.
//! Invariants: Binding lists mutate only through the explicit add/remove operations.
//! Invariants: Duplicate wire names in one deserialization list are a configuration error.

pub mod convert;
pub mod field;
pub mod registry;
pub mod schema;

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{Error, ErrorKind};
use crate::options::{ApplyEntryOutcome, ErrorSink, JsonOptions, MapEntryOutcome, SerializationOptions};
use crate::value::{Map, Value};
use crate::var::Var;
use crate::write::escape_string;

pub use field::{FieldType, Polymorphic};
pub use registry::{register_polymorphic, BindingRegistry};
pub use schema::{Bind, Schema};

pub(crate) type Getter = Box<dyn Fn(&dyn Any) -> Result<Var, Error> + Send + Sync>;
pub(crate) type Applier =
    Box<dyn Fn(&mut dyn Any, &Value, &JsonOptions, &mut ErrorSink) -> Result<(), Error> + Send + Sync>;

/// One bindable member of a domain type: names, flags, default, and the
/// accessor closure pair. Immutable once part of a `TypeBinding`.
pub struct MemberBinding {
    name: String,
    wire_name: String,
    escaped_wire_name: String,
    default_value: Option<Value>,
    ignore_read: bool,
    ignore_write: bool,
    transient: bool,
    read_only: bool,
    field_like: bool,
    get: Getter,
    apply: Option<Applier>,
}

impl MemberBinding {
    /// A member backed by a projection pair onto `T`.
    pub fn of<T, F, G, M>(name: impl Into<String>, get: G, get_mut: M) -> Self
    where
        T: Any,
        F: FieldType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let mut member = Self::read_only_of(name, get);
        member.read_only = false;
        member.apply = Some(Box::new(
            move |any: &mut dyn Any, value: &Value, options: &JsonOptions, sink: &mut ErrorSink| {
                let target = any.downcast_mut::<T>().ok_or_else(foreign_target)?;
                get_mut(target).import(value, options, sink)
            },
        ));
        member
    }

    /// A member with no setter; it never deserializes.
    pub fn read_only_of<T, F, G>(name: impl Into<String>, get: G) -> Self
    where
        T: Any,
        F: FieldType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        let name = name.into();
        let escaped_wire_name = escape_string(&name).into_owned();
        Self {
            wire_name: name.clone(),
            escaped_wire_name,
            name,
            default_value: None,
            ignore_read: false,
            ignore_write: false,
            transient: false,
            read_only: true,
            field_like: false,
            get: Box::new(move |any: &dyn Any| {
                let target = any.downcast_ref::<T>().ok_or_else(foreign_target)?;
                Ok(get(target).export())
            }),
            apply: None,
        }
    }

    pub fn with_wire_name(&mut self, wire_name: impl Into<String>) -> &mut Self {
        self.wire_name = wire_name.into();
        self.escaped_wire_name = escape_string(&self.wire_name).into_owned();
        self
    }

    pub fn with_default_value(&mut self, value: Value) -> &mut Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_ignore_read(&mut self) -> &mut Self {
        self.ignore_read = true;
        self
    }

    pub fn with_ignore_write(&mut self) -> &mut Self {
        self.ignore_write = true;
        self
    }

    /// The platform "never on the wire" convention.
    pub fn with_transient(&mut self) -> &mut Self {
        self.transient = true;
        self
    }

    pub fn with_read_only(&mut self) -> &mut Self {
        self.read_only = true;
        self
    }

    /// Marks the member as field-backed; included only when the
    /// serialize-fields flag is set.
    pub fn with_field_like(&mut self) -> &mut Self {
        self.field_like = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn escaped_wire_name(&self) -> &str {
        &self.escaped_wire_name
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn read_value(&self, target: &dyn Any) -> Result<Var, Error> {
        (self.get)(target)
    }

    pub(crate) fn apply(
        &self,
        target: &mut dyn Any,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        match &self.apply {
            Some(apply) => apply(target, value, options, sink),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MemberBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberBinding")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name)
            .field("read_only", &self.read_only)
            .finish()
    }
}

fn foreign_target() -> Error {
    Error::new(ErrorKind::Conversion).with_message("member accessor received a foreign value")
}

#[derive(Default)]
struct MemberLists {
    serialization: Vec<Arc<MemberBinding>>,
    deserialization: Vec<Arc<MemberBinding>>,
}

/// The cached member map of one domain type under one configuration
/// signature. Lists mutate only through the explicit add/remove calls.
pub struct TypeBinding {
    type_name: &'static str,
    members: Mutex<MemberLists>,
}

impl TypeBinding {
    pub(crate) fn from_members(
        type_name: &'static str,
        options: &JsonOptions,
        drafts: Vec<MemberBinding>,
    ) -> Result<Self, Error> {
        let flags = options.serialization;
        let mut lists = MemberLists::default();
        for draft in drafts {
            if draft.field_like && !flags.contains(SerializationOptions::SERIALIZE_FIELDS) {
                continue;
            }
            if flags.contains(SerializationOptions::USE_TRANSIENT_MARKER) && draft.transient {
                continue;
            }
            if flags.contains(SerializationOptions::SKIP_READ_ONLY) && draft.read_only {
                continue;
            }
            let honor_ignore = flags.contains(SerializationOptions::USE_IGNORE_METADATA);
            let in_serialization = !(honor_ignore && draft.ignore_write);
            let in_deserialization = !(honor_ignore && draft.ignore_read) && draft.apply.is_some();
            let member = Arc::new(draft);
            if in_serialization {
                lists.serialization.push(member.clone());
            }
            if in_deserialization {
                lists.deserialization.push(member);
            }
        }
        check_wire_names(type_name, &lists.deserialization)?;
        Ok(Self {
            type_name,
            members: Mutex::new(lists),
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn lists(&self) -> std::sync::MutexGuard<'_, MemberLists> {
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the serialization list; the lock is not held while
    /// member accessors run.
    pub fn serialization_members(&self) -> Vec<Arc<MemberBinding>> {
        self.lists().serialization.clone()
    }

    pub fn deserialization_members(&self) -> Vec<Arc<MemberBinding>> {
        self.lists().deserialization.clone()
    }

    /// Case-insensitive wire-name lookup; first registration wins.
    pub fn find_deserialization_member(&self, key: &str) -> Option<Arc<MemberBinding>> {
        self.lists()
            .deserialization
            .iter()
            .find(|member| member.wire_name.eq_ignore_ascii_case(key))
            .cloned()
    }

    pub fn add_serialization_member(&self, member: MemberBinding) {
        self.lists().serialization.push(Arc::new(member));
    }

    pub fn add_deserialization_member(&self, member: MemberBinding) -> Result<(), Error> {
        let mut lists = self.lists();
        if lists
            .deserialization
            .iter()
            .any(|existing| existing.wire_name.eq_ignore_ascii_case(&member.wire_name))
        {
            return Err(duplicate_wire_name(self.type_name, &member.wire_name));
        }
        lists.deserialization.push(Arc::new(member));
        Ok(())
    }

    pub fn remove_serialization_member(&self, name: &str) -> bool {
        let mut lists = self.lists();
        let before = lists.serialization.len();
        lists.serialization.retain(|member| member.name != name);
        lists.serialization.len() != before
    }

    pub fn remove_deserialization_member(&self, name: &str) -> bool {
        let mut lists = self.lists();
        let before = lists.deserialization.len();
        lists.deserialization.retain(|member| member.name != name);
        lists.deserialization.len() != before
    }

    /// Routes one incoming key/value pair to the matching member.
    /// Unknown keys are dropped, not errors.
    pub(crate) fn apply_entry(
        &self,
        target: &mut dyn Any,
        key: &str,
        value: &Value,
        options: &JsonOptions,
        sink: &mut ErrorSink,
    ) -> Result<(), Error> {
        let Some(member) = self.find_deserialization_member(key) else {
            tracing::debug!(key, type_name = self.type_name, "unknown field dropped");
            return Ok(());
        };
        if let Some(hook) = &options.hooks.apply_entry {
            match hook(member.name(), key, value) {
                ApplyEntryOutcome::Skip => return Ok(()),
                ApplyEntryOutcome::Replace(replacement) => {
                    return member.apply(target, &replacement, options, sink);
                }
                ApplyEntryOutcome::Continue => {}
            }
        }
        member.apply(target, value, options, sink)
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.lists();
        f.debug_struct("TypeBinding")
            .field("type_name", &self.type_name)
            .field("serialization", &lists.serialization.len())
            .field("deserialization", &lists.deserialization.len())
            .finish()
    }
}

fn check_wire_names(type_name: &str, members: &[Arc<MemberBinding>]) -> Result<(), Error> {
    for (index, member) in members.iter().enumerate() {
        if members[index + 1..]
            .iter()
            .any(|other| other.wire_name.eq_ignore_ascii_case(&member.wire_name))
        {
            return Err(duplicate_wire_name(type_name, &member.wire_name));
        }
    }
    Ok(())
}

fn duplicate_wire_name(type_name: &str, wire_name: &str) -> Error {
    Error::new(ErrorKind::Config)
        .with_message(format!("duplicate wire name '{wire_name}'"))
        .with_type_name(type_name)
}

/// The portable handle to a bindable type: identity, name, and builder.
#[derive(Clone, Copy)]
pub struct BindingVTable {
    pub type_id: fn() -> TypeId,
    pub type_name: fn() -> &'static str,
    pub build: fn(&JsonOptions) -> Result<TypeBinding, Error>,
}

impl BindingVTable {
    pub fn of<T: Bind>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: T::type_name,
            build: build_binding::<T>,
        }
    }
}

fn build_binding<T: Bind>(options: &JsonOptions) -> Result<TypeBinding, Error> {
    let mut schema = Schema::new();
    T::describe(&mut schema);
    schema.finish(T::type_name(), options)
}

/// Object-safe view of a custom object node in a `Var` graph.
pub trait DynObject {
    fn vtable(&self) -> BindingVTable;
    /// Stable address for cycle tracking, valid for the node's lifetime.
    fn identity(&self) -> usize;
    /// Runs `reader` against the underlying value. `Err` means the value
    /// is inaccessible (e.g. mutably borrowed), never a reader failure.
    fn with_value(&self, reader: &mut dyn FnMut(&dyn Any)) -> Result<(), Error>;
}

impl<T: Bind> DynObject for RefCell<T> {
    fn vtable(&self) -> BindingVTable {
        BindingVTable::of::<T>()
    }

    fn identity(&self) -> usize {
        self as *const RefCell<T> as *const () as usize
    }

    fn with_value(&self, reader: &mut dyn FnMut(&dyn Any)) -> Result<(), Error> {
        match self.try_borrow() {
            Ok(value) => {
                reader(&*value);
                Ok(())
            }
            Err(_) => Err(Error::new(ErrorKind::Conversion)
                .with_message("value is mutably borrowed during serialization")
                .with_type_name(T::type_name())),
        }
    }
}

/// Populates `target` from an object map, honoring the map-entry hook and
/// dropping unknown keys.
pub(crate) fn apply_map<T: Bind>(
    map: &Map,
    target: &mut T,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    let binding = match BindingRegistry::global().get::<T>(options) {
        Ok(binding) => binding,
        Err(error) => return sink.report(error),
    };
    for (key, value) in map.iter() {
        if key == "__type" && options.has(SerializationOptions::USE_TYPE_DISCRIMINATOR) {
            continue;
        }
        match &options.hooks.map_entry {
            Some(hook) => match hook(key, value) {
                MapEntryOutcome::Skip => continue,
                MapEntryOutcome::Rewrite { key, value } => {
                    binding.apply_entry(target, &key, &value, options, sink)?;
                }
                MapEntryOutcome::Continue => {
                    binding.apply_entry(target, key, value, options, sink)?;
                }
            },
            None => binding.apply_entry(target, key, value, options, sink)?,
        }
    }
    Ok(())
}

/// `FieldType::import` for bindable types: objects populate in place,
/// null resets to the default.
pub fn import_object<T: Bind>(
    target: &mut T,
    value: &Value,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<(), Error> {
    match value {
        Value::Object(map) => apply_map(map, target, options, sink),
        Value::Null => {
            *target = T::default();
            Ok(())
        }
        other => sink.report(
            Error::new(ErrorKind::Conversion)
                .with_message(format!("cannot convert {} to an object", other.kind_name()))
                .with_type_name(T::type_name()),
        ),
    }
}
