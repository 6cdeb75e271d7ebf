//! Purpose: Process-wide cache of type bindings and polymorphic factories.
//! Exports: `BindingRegistry`, `register_polymorphic`.
//! Role: The only shared mutable state in the crate; everything behind one lock per table.
//! Invariants: Two lookups with equal (type, signature) keys return the identical binding.
//! Invariants: Entries are never evicted; `reset` exists for embedding tests only.
//! Invariants: Locks are never held while member accessors or hooks run.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::bind::{apply_map, Bind, BindingVTable, DynObject, MemberBinding, TypeBinding};
use crate::error::Error;
use crate::options::{ErrorSink, JsonOptions};
use crate::value::Map;

/// Cache of `TypeBinding`s keyed by (type identity, configuration
/// signature). A process-wide instance backs normal use; standalone
/// instances exist so embedding applications can reset state in tests.
pub struct BindingRegistry {
    entries: Mutex<HashMap<(TypeId, u32), Arc<TypeBinding>>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static BindingRegistry {
        static GLOBAL: OnceLock<BindingRegistry> = OnceLock::new();
        GLOBAL.get_or_init(BindingRegistry::new)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(TypeId, u32), Arc<TypeBinding>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get<T: Bind>(&self, options: &JsonOptions) -> Result<Arc<TypeBinding>, Error> {
        self.get_dyn(BindingVTable::of::<T>(), options)
    }

    /// Lazily builds and caches the binding for the vtable's type under
    /// the options' signature.
    pub fn get_dyn(
        &self,
        vtable: BindingVTable,
        options: &JsonOptions,
    ) -> Result<Arc<TypeBinding>, Error> {
        let key = ((vtable.type_id)(), options.cache_signature());
        let mut entries = self.entries();
        if let Some(binding) = entries.get(&key) {
            return Ok(binding.clone());
        }
        let binding = Arc::new((vtable.build)(options)?);
        tracing::debug!(
            type_name = binding.type_name(),
            signature = key.1,
            "type binding discovered"
        );
        entries.insert(key, binding.clone());
        Ok(binding)
    }

    /// Drops every cached binding. Intended for tests.
    pub fn reset(&self) {
        self.entries().clear();
    }

    pub fn add_serialization_member<T: Bind>(
        &self,
        options: &JsonOptions,
        member: MemberBinding,
    ) -> Result<(), Error> {
        self.get::<T>(options)?.add_serialization_member(member);
        Ok(())
    }

    pub fn add_deserialization_member<T: Bind>(
        &self,
        options: &JsonOptions,
        member: MemberBinding,
    ) -> Result<(), Error> {
        self.get::<T>(options)?.add_deserialization_member(member)
    }

    pub fn remove_serialization_member<T: Bind>(
        &self,
        options: &JsonOptions,
        name: &str,
    ) -> Result<bool, Error> {
        Ok(self.get::<T>(options)?.remove_serialization_member(name))
    }

    pub fn remove_deserialization_member<T: Bind>(
        &self,
        options: &JsonOptions,
        name: &str,
    ) -> Result<bool, Error> {
        Ok(self.get::<T>(options)?.remove_deserialization_member(name))
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type PolyFactory =
    fn(&Map, &JsonOptions, &mut ErrorSink) -> Result<Rc<dyn DynObject>, Error>;

#[derive(Default)]
struct PolyTables {
    by_name: HashMap<String, PolyFactory>,
    by_type: HashMap<TypeId, String>,
}

fn poly_tables() -> &'static Mutex<PolyTables> {
    static TABLES: OnceLock<Mutex<PolyTables>> = OnceLock::new();
    TABLES.get_or_init(|| Mutex::new(PolyTables::default()))
}

fn locked_poly() -> MutexGuard<'static, PolyTables> {
    poly_tables()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registers `T` under a `__type` discriminator. Reading an object whose
/// `__type` matches constructs a `T`; writing a `T` object with the
/// discriminator flag set emits the name first.
pub fn register_polymorphic<T: Bind>(name: impl Into<String>) {
    let name = name.into();
    let mut tables = locked_poly();
    tables.by_type.insert(TypeId::of::<T>(), name.clone());
    tables.by_name.insert(name, create_polymorphic::<T>);
}

fn create_polymorphic<T: Bind>(
    map: &Map,
    options: &JsonOptions,
    sink: &mut ErrorSink,
) -> Result<Rc<dyn DynObject>, Error> {
    let mut value = T::default();
    apply_map(map, &mut value, options, sink)?;
    Ok(Rc::new(RefCell::new(value)))
}

pub(crate) fn discriminator_for(type_id: TypeId) -> Option<String> {
    locked_poly().by_type.get(&type_id).cloned()
}

pub(crate) fn resolve_discriminator(name: &str) -> Option<PolyFactory> {
    locked_poly().by_name.get(name).copied()
}
