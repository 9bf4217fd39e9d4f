// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::EvalError;
use crate::source::Span;
use crate::utils::is_reserved;
use crate::value::Value;
use crate::Rc;

use std::collections::BTreeMap;

use log::trace;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    span: Span,
}

/// A lexical environment.
///
/// Scopes only point at their parent. The evaluator owns the innermost
/// scope through an `Rc`; closures keep a clone of that `Rc`. Defining a
/// name in a scope that a closure has captured copies the scope first
/// (`Rc::make_mut`), so a closure never observes later bindings and no
/// reference cycle can form between a scope and the closures stored in it.
#[derive(Debug, Clone)]
pub struct Scope {
    name: Rc<str>,
    parent: Option<Rc<Scope>>,
    bindings: BTreeMap<Rc<str>, Binding>,
}

impl Scope {
    pub fn new(name: &str) -> Scope {
        Scope {
            name: name.into(),
            parent: None,
            bindings: BTreeMap::new(),
        }
    }

    pub fn child(name: &str, parent: Rc<Scope>) -> Scope {
        Scope {
            name: name.into(),
            parent: Some(parent),
            bindings: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        match &self.parent {
            Some(p) => p.depth() + 1,
            None => 0,
        }
    }

    /// Bind `name` in this scope level.
    ///
    /// Shadowing a name from an enclosing scope is allowed; binding a name
    /// twice in the same level or binding a reserved name is not.
    pub fn define(&mut self, name: &str, value: Value, span: &Span) -> Result<(), EvalError> {
        if is_reserved(name) {
            return Err(EvalError::DuplicateBinding {
                name: name.into(),
                span: span.clone(),
                previous: Some(Span::builtin()),
            });
        }
        self.define_reserved(name, value, span)
    }

    /// Bind `name` without the reserved-name check. Used for builtins.
    pub fn define_reserved(
        &mut self,
        name: &str,
        value: Value,
        span: &Span,
    ) -> Result<(), EvalError> {
        if let Some(existing) = self.bindings.get(name) {
            return Err(EvalError::DuplicateBinding {
                name: name.into(),
                span: span.clone(),
                previous: Some(existing.span.clone()),
            });
        }

        trace!("{}: defining {name}: {}", self.name, value.ty());
        self.bindings.insert(
            name.into(),
            Binding {
                value,
                span: span.clone(),
            },
        );
        Ok(())
    }

    /// Innermost binding of `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(b) = s.bindings.get(name) {
                return Some(&b.value);
            }
            scope = s.parent.as_deref();
        }
        None
    }

    pub fn lookup(&self, name: &str, span: &Span) -> Result<Value, EvalError> {
        match self.get(name) {
            Some(v) => {
                trace!("{}: found {name}", self.name);
                Ok(v.clone())
            }
            None => Err(EvalError::undefined_name(name, span)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Names bound in this level, sorted.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(|k| k.as_ref())
    }

    /// Values bound in this level, sorted by name.
    pub fn local_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, b)| (k.as_ref(), &b.value))
    }
}
