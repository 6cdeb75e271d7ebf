//! Purpose: Declarative member registration for bindable types.
//! Exports: `Bind`, `Schema`.
//! Role: The descriptor table that replaces runtime type introspection.
//! Invariants: `describe` lists every bindable member once; flags filter at build time.
//! Invariants: Registration order is serialization order.

use std::any::Any;
use std::marker::PhantomData;

use crate::bind::field::FieldType;
use crate::bind::{MemberBinding, TypeBinding};
use crate::error::Error;
use crate::options::JsonOptions;

/// A type the binding registry can convert to and from JSON objects.
///
/// `describe` registers every member with its accessor pair and any
/// wire-name override, default value, or ignore flags. The registry runs
/// it once per (type, configuration signature) and caches the result.
pub trait Bind: Default + Any + Sized {
    fn type_name() -> &'static str;

    fn describe(schema: &mut Schema<Self>);
}

/// Collects member registrations while `Bind::describe` runs.
pub struct Schema<T> {
    members: Vec<MemberBinding>,
    marker: PhantomData<fn(T)>,
}

impl<T: Bind> Schema<T> {
    pub(crate) fn new() -> Self {
        Self {
            members: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Registers a readable and writable member backed by the projection
    /// pair. Returns the draft for chained configuration.
    pub fn field<F, G, M>(&mut self, name: &str, get: G, get_mut: M) -> &mut MemberBinding
    where
        F: FieldType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.members.push(MemberBinding::of(name, get, get_mut));
        self.last()
    }

    /// Registers a member with no setter; it serializes but never
    /// deserializes, and the skip-read-only flag drops it entirely.
    pub fn read_only_field<F, G>(&mut self, name: &str, get: G) -> &mut MemberBinding
    where
        F: FieldType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        self.members.push(MemberBinding::read_only_of(name, get));
        self.last()
    }

    fn last(&mut self) -> &mut MemberBinding {
        let index = self.members.len() - 1;
        &mut self.members[index]
    }

    pub(crate) fn finish(
        self,
        type_name: &'static str,
        options: &JsonOptions,
    ) -> Result<TypeBinding, Error> {
        TypeBinding::from_members(type_name, options, self.members)
    }
}
