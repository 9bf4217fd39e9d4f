// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::ensure_fields;
use crate::builtins::Builtin;
use crate::error::EvalError;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::Type;
use crate::value::Value;

use std::collections::{BTreeMap, HashMap};

use log::info;

pub fn register(m: &mut HashMap<&'static str, Builtin>) {
    m.insert(
        "print",
        Builtin::new("print", vec![("value", Type::Nil)], Type::Nil, print),
    );
    m.insert(
        "fields",
        Builtin::new(
            "fields",
            vec![("value", Type::Nil)],
            Type::list(Type::String),
            fields,
        ),
    );
    m.insert(
        "typeof",
        Builtin::new("typeof", vec![("value", Type::Nil)], Type::String, type_of),
    );
}

// Returns its argument so that it can wrap any expression.
fn print(
    span: &Span,
    _scope: &Scope,
    args: &[Value],
    _extra: &BTreeMap<String, Value>,
) -> Result<Value, EvalError> {
    info!("{span}: {}", args[0].render());
    Ok(args[0].clone())
}

fn fields(
    span: &Span,
    _scope: &Scope,
    args: &[Value],
    _extra: &BTreeMap<String, Value>,
) -> Result<Value, EvalError> {
    ensure_fields("fields", span, &args[0])?;
    let names = args[0]
        .field_names()
        .into_iter()
        .map(Value::from)
        .collect();
    Value::list(Type::String, names, span)
}

fn type_of(
    _span: &Span,
    _scope: &Scope,
    args: &[Value],
    _extra: &BTreeMap<String, Value>,
) -> Result<Value, EvalError> {
    Ok(Value::from(args[0].ty().to_string()))
}
