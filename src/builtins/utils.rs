// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::dag::File;
use crate::error::EvalError;
use crate::source::Span;
use crate::types::Type;
use crate::value::Value;
use crate::Rc;

pub fn ensure_string(fcn: &str, span: &Span, v: &Value) -> Result<Rc<str>, EvalError> {
    Ok(match v {
        Value::Str(s) => s.clone(),
        _ => {
            return Err(EvalError::Type {
                message: format!("`{fcn}` expects string argument. Got `{v}` instead"),
                expected: Some(Type::String),
                found: Some(v.ty()),
                span: span.clone(),
            })
        }
    })
}

/// The file in an optional file argument, if present.
pub fn ensure_optional_file(
    fcn: &str,
    span: &Span,
    v: &Value,
) -> Result<Option<Rc<File>>, EvalError> {
    Ok(match v {
        Value::File(f) => Some(f.clone()),
        Value::Maybe(m) => match &m.value {
            Some(Value::File(f)) => Some(f.clone()),
            None => None,
            Some(other) => return ensure_optional_file(fcn, span, other),
        },
        _ => {
            return Err(EvalError::Type {
                message: format!("`{fcn}` expects file argument. Got `{v}` instead"),
                expected: Some(Type::optional(Type::file())),
                found: Some(v.ty()),
                span: span.clone(),
            })
        }
    })
}

pub fn ensure_fields(fcn: &str, span: &Span, v: &Value) -> Result<(), EvalError> {
    match v.has_fields() {
        true => Ok(()),
        false => Err(EvalError::type_error(
            format!("`{fcn}` expects a record or file. Got {} instead", v.ty()),
            span,
        )),
    }
}
