// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::EvalError;
use crate::source::Span;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Direction of a file parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileTag {
    Plain,
    In,
    Out,
}

/// Names of the fields that every file value exposes.
pub const FILE_FIELDS: [&str; 7] = [
    "basename",
    "extension",
    "filename",
    "fullname",
    "generated",
    "name",
    "subdir",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Type {
    // Empty list element, absent optional.
    Nil,

    Bool,
    Int,
    String,
    File {
        tag: FileTag,
    },

    List {
        element: Rc<Type>,
    },

    Function {
        params: Rc<Vec<Type>>,
        result: Rc<Type>,
    },

    // Fields are kept sorted so that equality is structural.
    Record {
        fields: Rc<BTreeMap<String, Type>>,
    },

    Optional {
        inner: Rc<Type>,
    },

    // Type of a value that names a type.
    Type {
        inner: Rc<Type>,
    },
}

impl Type {
    pub fn file() -> Type {
        Type::File {
            tag: FileTag::Plain,
        }
    }

    pub fn input_file() -> Type {
        Type::File { tag: FileTag::In }
    }

    pub fn output_file() -> Type {
        Type::File { tag: FileTag::Out }
    }

    pub fn list(element: Type) -> Type {
        Type::List {
            element: Rc::new(element),
        }
    }

    pub fn optional(inner: Type) -> Type {
        match inner {
            Type::Optional { .. } => inner,
            _ => Type::Optional {
                inner: Rc::new(inner),
            },
        }
    }

    pub fn function(params: Vec<Type>, result: Type) -> Type {
        Type::Function {
            params: Rc::new(params),
            result: Rc::new(result),
        }
    }

    pub fn record<I, S>(fields: I) -> Type
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Type::Record {
            fields: Rc::new(fields.into_iter().map(|(k, t)| (k.into(), t)).collect()),
        }
    }

    pub fn meta(inner: Type) -> Type {
        Type::Type {
            inner: Rc::new(inner),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Type::File { .. })
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::List { element } => Some(element),
            _ => None,
        }
    }

    /// Does a value of this type contain (or refer to) files?
    pub fn has_files(&self) -> bool {
        match self {
            Type::File { .. } => true,
            Type::List { element } => element.has_files(),
            Type::Record { fields } => fields.values().any(Type::has_files),
            Type::Optional { inner } => inner.has_files(),
            _ => false,
        }
    }

    /// Does this type contain a `file[out]`?
    pub fn has_output(&self) -> bool {
        match self {
            Type::File { tag } => *tag == FileTag::Out,
            Type::List { element } => element.has_output(),
            Type::Record { fields } => fields.values().any(Type::has_output),
            Type::Optional { inner } => inner.has_output(),
            _ => false,
        }
    }

    pub fn is_file_or_files(&self) -> bool {
        match self {
            Type::File { .. } => true,
            Type::List { element } => element.is_file_or_files(),
            Type::Optional { inner } => inner.is_file_or_files(),
            _ => false,
        }
    }

    fn file_tag(&self) -> Option<FileTag> {
        match self {
            Type::File { tag } => Some(*tag),
            Type::List { element } => element.file_tag(),
            Type::Optional { inner } => inner.file_tag(),
            _ => None,
        }
    }

    /// `file[in]` or a (possibly optional) list of them.
    pub fn is_input(&self) -> bool {
        self.file_tag() == Some(FileTag::In)
    }

    /// `file[out]` or a (possibly optional) list of them.
    pub fn is_output(&self) -> bool {
        self.file_tag() == Some(FileTag::Out)
    }

    /// Type of the named field, for types with statically known fields.
    pub fn field_type(&self, name: &str) -> Option<Type> {
        match self {
            Type::Record { fields } => fields.get(name).cloned(),
            Type::File { .. } => match name {
                "generated" => Some(Type::Bool),
                "subdir" => Some(Type::file()),
                _ if FILE_FIELDS.contains(&name) => Some(Type::String),
                _ => None,
            },
            Type::Optional { inner } => match name {
                "exists" => Some(Type::Bool),
                "value" => Some(inner.as_ref().clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Can a value of this type be used where `expected` is required?
    ///
    /// Records use width subtyping, a present value widens to an optional of
    /// a supertype, lists and optionals are covariant and function types are
    /// contravariant in their parameters.
    pub fn is_subtype(&self, expected: &Type) -> bool {
        if self == expected {
            return true;
        }

        match (self, expected) {
            (Type::Nil, _) => true,
            (Type::File { tag: found }, Type::File { tag: wanted }) => {
                *found == FileTag::Plain || *wanted == FileTag::Plain || found == wanted
            }
            (Type::List { element: e1 }, Type::List { element: e2 }) => e1.is_subtype(e2),
            (Type::Optional { inner: i1 }, Type::Optional { inner: i2 }) => i1.is_subtype(i2),
            (_, Type::Optional { inner }) => self.is_subtype(inner),
            (Type::Record { fields: have }, Type::Record { fields: want }) => {
                want.iter().all(|(name, wanted)| match have.get(name) {
                    Some(t) => t.is_subtype(wanted),
                    None => false,
                })
            }
            (
                Type::Function {
                    params: p1,
                    result: r1,
                },
                Type::Function {
                    params: p2,
                    result: r2,
                },
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2.iter()).all(|(a, b)| b.is_subtype(a))
                    && r1.is_subtype(r2)
            }
            (Type::Type { inner: i1 }, Type::Type { inner: i2 }) => i1.is_subtype(i2),
            _ => false,
        }
    }

    pub fn check_subtype(&self, expected: &Type, span: &Span) -> Result<(), EvalError> {
        match self.is_subtype(expected) {
            true => Ok(()),
            false => Err(EvalError::type_mismatch(expected, self, span)),
        }
    }

    /// Symmetric structural compatibility.
    ///
    /// Unlike [`Type::is_subtype`], records must have identical field sets.
    pub fn is_compatible(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (Type::Nil, _) | (_, Type::Nil) => true,
            (Type::File { tag: t1 }, Type::File { tag: t2 }) => {
                !matches!((t1, t2), (FileTag::In, FileTag::Out) | (FileTag::Out, FileTag::In))
            }
            (Type::List { element: e1 }, Type::List { element: e2 }) => e1.is_compatible(e2),
            (Type::Optional { inner: i1 }, Type::Optional { inner: i2 }) => i1.is_compatible(i2),
            (Type::Optional { inner }, t) | (t, Type::Optional { inner }) => {
                inner.is_compatible(t)
            }
            (Type::Record { fields: f1 }, Type::Record { fields: f2 }) => {
                f1.len() == f2.len()
                    && f1.iter().all(|(name, t1)| match f2.get(name) {
                        Some(t2) => t1.is_compatible(t2),
                        None => false,
                    })
            }
            (
                Type::Function {
                    params: p1,
                    result: r1,
                },
                Type::Function {
                    params: p2,
                    result: r2,
                },
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2.iter()).all(|(a, b)| a.is_compatible(b))
                    && r1.is_compatible(r2)
            }
            (Type::Type { inner: i1 }, Type::Type { inner: i2 }) => i1.is_compatible(i2),
            _ => false,
        }
    }

    fn supertype(&self, other: &Type) -> Option<Type> {
        if other.is_subtype(self) {
            return Some(self.clone());
        }
        if self.is_subtype(other) {
            return Some(other.clone());
        }

        match (self, other) {
            (Type::File { .. }, Type::File { .. }) => Some(Type::file()),
            (Type::List { element: e1 }, Type::List { element: e2 }) => {
                Some(Type::list(e1.supertype(e2)?))
            }
            (Type::Optional { inner: i1 }, Type::Optional { inner: i2 }) => {
                Some(Type::optional(i1.supertype(i2)?))
            }
            (Type::Optional { inner }, t) | (t, Type::Optional { inner }) => {
                Some(Type::optional(inner.supertype(t)?))
            }
            (Type::Record { fields: f1 }, Type::Record { fields: f2 }) => {
                let mut common = BTreeMap::new();
                for (name, t1) in f1.iter() {
                    if let Some(t) = f2.get(name).and_then(|t2| t1.supertype(t2)) {
                        common.insert(name.clone(), t);
                    }
                }
                match common.is_empty() {
                    true => None,
                    false => Some(Type::Record {
                        fields: Rc::new(common),
                    }),
                }
            }
            _ => None,
        }
    }
}

/// Type of a value. Pure and total.
pub fn type_of(value: &crate::value::Value) -> Type {
    value.ty()
}

/// Structural compatibility check.
pub fn check_compatible(a: &Type, b: &Type, span: &Span) -> Result<(), EvalError> {
    match a.is_compatible(b) {
        true => Ok(()),
        false => Err(EvalError::type_mismatch(a, b, span)),
    }
}

/// Least common supertype of two element types.
pub fn unify(a: &Type, b: &Type, span: &Span) -> Result<Type, EvalError> {
    match a.supertype(b) {
        Some(t) => Ok(t),
        None => Err(EvalError::Type {
            message: format!("cannot unify {a} with {b}"),
            expected: Some(a.clone()),
            found: Some(b.clone()),
            span: span.clone(),
        }),
    }
}

/// Infer the element type of a list from its element types.
pub fn unify_all<'a, I>(types: I, span: &Span) -> Result<Type, EvalError>
where
    I: IntoIterator<Item = &'a Type>,
{
    let mut result = Type::Nil;
    for t in types {
        result = unify(&result, t, span)?;
    }
    Ok(result)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nil => f.write_str("nil"),
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::File { tag } => match tag {
                FileTag::Plain => f.write_str("file"),
                FileTag::In => f.write_str("file[in]"),
                FileTag::Out => f.write_str("file[out]"),
            },
            Type::List { element } => write!(f, "list[{element}]"),
            Type::Function { params, result } => {
                f.write_str("(")?;
                for (idx, p) in params.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")=>{result}")
            }
            Type::Record { fields } => {
                f.write_str("record[")?;
                for (idx, (name, t)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}:{t}")?;
                }
                f.write_str("]")
            }
            Type::Optional { inner } => write!(f, "maybe[{inner}]"),
            Type::Type { inner } => write!(f, "type[{inner}]"),
        }
    }
}
