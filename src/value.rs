// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::ExprRef;
use crate::builtins::Builtin;
use crate::dag::{File, Rule};
use crate::error::EvalError;
use crate::plugin::NativeFunction;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::{unify_all, Type};
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A declared parameter of a function, action or native.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Rc<str>,
    pub ty: Type,
    pub default: Option<Value>,
    pub span: Span,
}

impl Parameter {
    pub fn new(name: &str, ty: Type) -> Parameter {
        Parameter {
            name: name.into(),
            ty,
            default: None,
            span: Span::builtin(),
        }
    }
}

/// A user-defined function closing over its defining scope.
#[derive(Debug)]
pub struct Closure {
    pub name: Option<Rc<str>>,
    pub params: Vec<Parameter>,
    pub result: Type,
    pub body: ExprRef,
    pub scope: Rc<Scope>,
    pub span: Span,
}

/// Invocable values.
#[derive(Clone)]
pub enum Callable {
    Function(Rc<Closure>),
    Builtin(&'static Builtin),
    Native(Rc<dyn NativeFunction>),
    Rule(Rc<Rule>),
}

impl Callable {
    pub fn name(&self) -> String {
        match self {
            Callable::Function(c) => match &c.name {
                Some(n) => n.to_string(),
                None => "function".to_string(),
            },
            Callable::Builtin(b) => b.name.to_string(),
            Callable::Native(n) => n.name(),
            Callable::Rule(r) => r.name().to_string(),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Callable::Function(c) => Type::function(
                c.params.iter().map(|p| p.ty.clone()).collect(),
                c.result.clone(),
            ),
            Callable::Builtin(b) => Type::function(
                b.params.iter().map(|(_, t)| t.clone()).collect(),
                b.result.clone(),
            ),
            Callable::Native(n) => Type::function(n.parameter_types(), n.return_type()),
            Callable::Rule(r) => r.ty().clone(),
        }
    }

    fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Builtin(a), Callable::Builtin(b)) => core::ptr::eq(*a, *b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Rule(a), Callable::Rule(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}: {}>", self.kind(), self.name(), self.ty())
    }
}

impl Callable {
    fn kind(&self) -> &'static str {
        match self {
            Callable::Function(_) => "function",
            Callable::Builtin(_) => "builtin",
            Callable::Native(_) => "native",
            Callable::Rule(_) => "action",
        }
    }
}

/// Homogeneous list; `element` is the declared or inferred element type.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element: Type,
    pub items: Vec<Value>,
}

/// Optional value. `inner` is the type of the wrapped value.
#[derive(Debug, Clone, PartialEq)]
pub struct Maybe {
    pub inner: Type,
    pub value: Option<Value>,
}

/// A parameter that no caller has bound yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub name: Rc<str>,
    pub ty: Type,
    pub declared: Span,
}

#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    File(Rc<File>),
    List(Rc<List>),
    Record(Rc<BTreeMap<Rc<str>, Value>>),
    Maybe(Rc<Maybe>),
    Callable(Callable),
    Type(Type),
    Unresolved(Rc<Placeholder>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::File(a), Value::File(b)) => {
                a.relative_name() == b.relative_name() && a.attributes() == b.attributes()
            }
            (Value::List(a), Value::List(b)) => a.items == b.items,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Maybe(a), Value::Maybe(b)) => a.value == b.value,
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Unresolved(a), Value::Unresolved(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Str(s) => serializer.serialize_str(s.as_ref()),
            // Files serialize as their relative name.
            Value::File(f) => serializer.serialize_str(&f.relative_name()),
            Value::List(l) => l.items.serialize(serializer),
            Value::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }
            Value::Maybe(m) => match &m.value {
                Some(v) => v.serialize(serializer),
                None => serializer.serialize_none(),
            },
            Value::Callable(c) => serializer.collect_str(&format_args!("{c:?}")),
            Value::Type(t) => serializer.collect_str(&format_args!("<type {t}>")),
            Value::Unresolved(p) => {
                serializer.collect_str(&format_args!("<unresolved {}>", p.name))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<File> for Value {
    fn from(f: File) -> Self {
        Value::File(Rc::new(f))
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Callable(c)
    }
}

impl Value {
    /// Typed list constructor. Every item must be a subtype of `element`.
    pub fn list(element: Type, items: Vec<Value>, span: &Span) -> Result<Value, EvalError> {
        for item in &items {
            item.ty().check_subtype(&element, span)?;
        }
        Ok(Value::List(Rc::new(List { element, items })))
    }

    /// List whose element type is inferred from its items.
    pub fn infer_list(items: Vec<Value>, span: &Span) -> Result<Value, EvalError> {
        let types: Vec<Type> = items.iter().map(Value::ty).collect();
        let element = unify_all(types.iter(), span)?;
        Ok(Value::List(Rc::new(List { element, items })))
    }

    /// Record constructor. Field names must be unique.
    pub fn record<I, K>(fields: I, span: &Span) -> Result<Value, EvalError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Rc<str>>,
    {
        let mut map = BTreeMap::new();
        for (name, value) in fields {
            let name: Rc<str> = name.into();
            if map.contains_key(&name) {
                return Err(EvalError::DuplicateBinding {
                    name,
                    span: span.clone(),
                    previous: None,
                });
            }
            map.insert(name, value);
        }
        Ok(Value::Record(Rc::new(map)))
    }

    pub fn some(value: Value) -> Value {
        Value::Maybe(Rc::new(Maybe {
            inner: value.ty(),
            value: Some(value),
        }))
    }

    pub fn none(inner: Type) -> Value {
        Value::Maybe(Rc::new(Maybe { inner, value: None }))
    }

    /// The value's resolved type.
    pub fn ty(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Str(_) => Type::String,
            Value::File(_) => Type::file(),
            Value::List(l) => Type::list(l.element.clone()),
            Value::Record(fields) => {
                Type::record(fields.iter().map(|(k, v)| (k.to_string(), v.ty())))
            }
            Value::Maybe(m) => Type::optional(m.inner.clone()),
            Value::Callable(c) => c.ty(),
            Value::Type(t) => Type::meta(t.clone()),
            Value::Unresolved(p) => p.ty.clone(),
        }
    }

    /// Adapt a value that is a subtype of `expected` to it: present values
    /// flowing into optional slots are wrapped, lists and absent optionals
    /// take the expected element type.
    pub fn widen_to(self, expected: &Type) -> Value {
        match expected {
            Type::Optional { inner } => match self {
                Value::Unresolved(_) => self,
                Value::Maybe(m) => match &m.value {
                    Some(v) => Value::Maybe(Rc::new(Maybe {
                        inner: inner.as_ref().clone(),
                        value: Some(v.clone().widen_to(inner)),
                    })),
                    None => Value::none(inner.as_ref().clone()),
                },
                v => Value::Maybe(Rc::new(Maybe {
                    inner: inner.as_ref().clone(),
                    value: Some(v.widen_to(inner)),
                })),
            },
            Type::List { element } => match self {
                Value::List(l) if l.element != **element => Value::List(Rc::new(List {
                    element: element.as_ref().clone(),
                    items: l.items.iter().map(|v| v.clone().widen_to(element)).collect(),
                })),
                v => v,
            },
            _ => self,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Value::Unresolved(_))
    }

    /// Fail with `UndefinedValueError` if this value, or anything it
    /// contains, is still a placeholder.
    pub fn ensure_resolved(&self, span: &Span) -> Result<(), EvalError> {
        match self {
            Value::Unresolved(p) => Err(EvalError::UndefinedValue {
                name: p.name.clone(),
                declared: p.declared.clone(),
                span: span.clone(),
            }),
            Value::List(l) => l.items.iter().try_for_each(|v| v.ensure_resolved(span)),
            Value::Record(fields) => fields.values().try_for_each(|v| v.ensure_resolved(span)),
            Value::Maybe(m) => match &m.value {
                Some(v) => v.ensure_resolved(span),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Field of a record, file or optional value.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Record(fields) => fields.get(name).cloned(),
            Value::File(f) => f.field(name),
            Value::Maybe(m) => match name {
                "exists" => Some(Value::Bool(m.value.is_some())),
                "value" => m.value.clone(),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn has_fields(&self) -> bool {
        matches!(self, Value::Record(_) | Value::File(_) | Value::Maybe(_))
    }

    pub fn field_names(&self) -> Vec<String> {
        match self {
            Value::Record(fields) => fields.keys().map(|k| k.to_string()).collect(),
            Value::File(f) => f.field_names(),
            Value::Maybe(_) => vec!["exists".to_string(), "value".to_string()],
            _ => vec![],
        }
    }

    /// All files in a file or (nested) list of files.
    pub fn files(&self) -> Vec<Rc<File>> {
        let mut files = vec![];
        self.collect_files(&mut files);
        files
    }

    fn collect_files(&self, files: &mut Vec<Rc<File>>) {
        match self {
            Value::File(f) => files.push(f.clone()),
            Value::List(l) => l.items.iter().for_each(|v| v.collect_files(files)),
            Value::Maybe(m) => {
                if let Some(v) = &m.value {
                    v.collect_files(files);
                }
            }
            _ => (),
        }
    }

    /// Rebuild this value with every contained file passed through `f`.
    pub fn try_map_files(
        &self,
        f: &dyn Fn(&Rc<File>) -> Result<Rc<File>, EvalError>,
    ) -> Result<Value, EvalError> {
        Ok(match self {
            Value::File(file) => Value::File(f(file)?),
            Value::List(l) => Value::List(Rc::new(List {
                element: l.element.clone(),
                items: l
                    .items
                    .iter()
                    .map(|v| v.try_map_files(f))
                    .collect::<Result<Vec<Value>, EvalError>>()?,
            })),
            Value::Record(fields) => Value::Record(Rc::new(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.try_map_files(f)?)))
                    .collect::<Result<BTreeMap<Rc<str>, Value>, EvalError>>()?,
            )),
            Value::Maybe(m) => match &m.value {
                Some(v) => Value::Maybe(Rc::new(Maybe {
                    inner: m.inner.clone(),
                    value: Some(v.try_map_files(f)?),
                })),
                None => self.clone(),
            },
            _ => self.clone(),
        })
    }

    /// Plain text of a value, as substituted into commands.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.to_string(),
            Value::File(f) => f.full_name(),
            Value::List(l) => l
                .items
                .iter()
                .map(Value::render)
                .collect::<Vec<String>>()
                .join(" "),
            Value::Maybe(m) => match &m.value {
                Some(v) => v.render(),
                None => String::new(),
            },
            _ => self.to_string(),
        }
    }
}

impl Value {
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => bail!("not a bool"),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => bail!("not an int"),
        }
    }

    pub fn as_string(&self) -> Result<&Rc<str>> {
        match self {
            Value::Str(s) => Ok(s),
            _ => bail!("not a string"),
        }
    }

    pub fn as_file(&self) -> Result<&Rc<File>> {
        match self {
            Value::File(f) => Ok(f),
            _ => bail!("not a file"),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<Value>> {
        match self {
            Value::List(l) => Ok(&l.items),
            _ => bail!("not a list"),
        }
    }

    pub fn as_record(&self) -> Result<&BTreeMap<Rc<str>, Value>> {
        match self {
            Value::Record(r) => Ok(r),
            _ => bail!("not a record"),
        }
    }
}
