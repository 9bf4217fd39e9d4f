// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::source::Span;
use crate::types::Type;
use crate::utils::is_reserved;
use crate::value::{Callable, Value};
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::debug;

/// A function implemented outside the build description, e.g. by a
/// dynamically loaded plugin.
///
/// Natives are invoked synchronously and only return values; they never
/// modify the dependency graph.
pub trait NativeFunction: Send + Sync {
    fn name(&self) -> String;

    fn parameter_types(&self) -> Vec<Type>;

    /// Names that keyword arguments may use. Natives without names only
    /// accept positional arguments.
    fn parameter_names(&self) -> Vec<String> {
        vec![]
    }

    fn return_type(&self) -> Type;

    fn invoke(&self, args: &[Value]) -> Result<Value>;
}

#[derive(Clone)]
enum Entry {
    Native(Rc<dyn NativeFunction>),
    Namespace(BTreeMap<String, Rc<dyn NativeFunction>>),
}

/// The natives available to one evaluation.
///
/// Each entry becomes a top-level binding: a native directly, or a record
/// of natives for a namespace.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    entries: BTreeMap<String, Entry>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    pub fn register(&mut self, native: Box<dyn NativeFunction>) -> Result<()> {
        let name = native.name();
        Self::check_name(&name)?;
        if self.entries.contains_key(&name) {
            bail!("native function {name} already added");
        }
        debug!("registering native {name}");
        self.entries.insert(name, Entry::Native(Rc::from(native)));
        Ok(())
    }

    /// Register `native` as a field of the record bound to `namespace`.
    pub fn register_in(&mut self, namespace: &str, native: Box<dyn NativeFunction>) -> Result<()> {
        Self::check_name(namespace)?;
        let name = native.name();
        let natives = match self
            .entries
            .entry(namespace.to_string())
            .or_insert_with(|| Entry::Namespace(BTreeMap::new()))
        {
            Entry::Namespace(natives) => natives,
            Entry::Native(_) => bail!("{namespace} is already added as a native function"),
        };
        if natives.contains_key(&name) {
            bail!("native function {namespace}.{name} already added");
        }
        debug!("registering native {namespace}.{name}");
        natives.insert(name, Rc::from(native));
        Ok(())
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() {
            bail!("native function name cannot be empty");
        }
        if is_reserved(name) {
            bail!("native function name {name} is reserved");
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The top-level bindings for the registered natives.
    pub fn bindings(&self) -> Result<Vec<(String, Value)>> {
        let mut bindings = vec![];
        for (name, entry) in &self.entries {
            let value = match entry {
                Entry::Native(n) => Value::Callable(Callable::Native(n.clone())),
                Entry::Namespace(natives) => Value::record(
                    natives
                        .iter()
                        .map(|(k, n)| (k.as_str(), Value::Callable(Callable::Native(n.clone())))),
                    &Span::builtin(),
                )?,
            };
            bindings.push((name.clone(), value));
        }
        Ok(bindings)
    }
}
