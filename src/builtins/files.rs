// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_optional_file, ensure_string};
use crate::builtins::Builtin;
use crate::dag::File;
use crate::error::EvalError;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::Type;
use crate::value::Value;

use std::collections::{BTreeMap, HashMap};

pub fn register(m: &mut HashMap<&'static str, Builtin>) {
    let mut file = Builtin::new(
        "file",
        vec![
            ("filename", Type::String),
            ("subdir", Type::optional(Type::file())),
        ],
        Type::file(),
        file,
    );
    file.extra_keywords = true;
    m.insert("file", file);
}

/// Directory that relative filenames are resolved against.
pub fn current_subdir(scope: &Scope, span: &Span) -> Result<String, EvalError> {
    match scope.lookup("subdir", span)? {
        Value::File(f) => Ok(f.relative_name()),
        other => Err(EvalError::Type {
            message: "'subdir' is not a file".to_string(),
            expected: Some(Type::file()),
            found: Some(other.ty()),
            span: span.clone(),
        }),
    }
}

// `file('name', subdir = d, attr = value...)`
fn file(
    span: &Span,
    scope: &Scope,
    args: &[Value],
    attributes: &BTreeMap<String, Value>,
) -> Result<Value, EvalError> {
    let name = ensure_string("file", span, &args[0])?;
    let subdir = match ensure_optional_file("file", span, &args[1])? {
        Some(dir) => dir.relative_name(),
        None => current_subdir(scope, span)?,
    };
    let file = File::create(&subdir, &name, attributes.clone(), span, false)?;
    Ok(Value::from(file))
}
