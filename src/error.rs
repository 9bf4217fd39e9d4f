// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::source::Span;
use crate::types::Type;
use crate::Rc;

use core::fmt;

use serde::Serialize;
use thiserror::Error;

/// Category of an evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ErrorKind {
    UndefinedName,
    DuplicateBinding,
    Type,
    Argument,
    NoSuchField,
    UndefinedValue,
    DuplicateOutput,
    Cycle,
    Semantic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::UndefinedName => "UndefinedNameError",
            ErrorKind::DuplicateBinding => "DuplicateBindingError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Argument => "ArgumentError",
            ErrorKind::NoSuchField => "NoSuchFieldError",
            ErrorKind::UndefinedValue => "UndefinedValueError",
            ErrorKind::DuplicateOutput => "DuplicateOutputError",
            ErrorKind::Cycle => "CycleError",
            ErrorKind::Semantic => "SemanticError",
        })
    }
}

fn previous_note(previous: &Option<Span>) -> String {
    match previous {
        Some(p) if p == &Span::builtin() => " (reserved name)".to_string(),
        Some(p) => format!(" (previously defined at {p})"),
        None => String::new(),
    }
}

/// Error raised while evaluating a build description.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{span}: undefined name '{name}'")]
    UndefinedName { name: Rc<str>, span: Span },

    #[error("{span}: redefining '{name}'{}", previous_note(.previous))]
    DuplicateBinding {
        name: Rc<str>,
        span: Span,
        previous: Option<Span>,
    },

    /// Structural mismatch. `expected` and `found` are set when two types
    /// were compared.
    #[error("{span}: type error: {message}")]
    Type {
        message: String,
        expected: Option<Type>,
        found: Option<Type>,
        span: Span,
    },

    #[error("{span}: argument error: {message}")]
    Argument { message: String, span: Span },

    #[error("{span}: no field '{field}' in value of type {ty}")]
    NoSuchField { field: Rc<str>, ty: Type, span: Span },

    #[error("{span}: '{name}' has no value (parameter declared at {declared})")]
    UndefinedValue {
        name: Rc<str>,
        declared: Span,
        span: Span,
    },

    #[error("{span}: output file '{file}' is already produced by the build at {existing}")]
    DuplicateOutput {
        file: String,
        existing: Span,
        span: Span,
    },

    #[error("{span}: build '{build}' would create a dependency cycle: {}", .cycle.join(" -> "))]
    Cycle {
        build: String,
        cycle: Vec<String>,
        span: Span,
    },

    #[error("{span}: {message}")]
    Semantic { message: String, span: Span },
}

impl EvalError {
    pub fn type_mismatch(expected: &Type, found: &Type, span: &Span) -> EvalError {
        EvalError::Type {
            message: format!("expected {expected}, found {found}"),
            expected: Some(expected.clone()),
            found: Some(found.clone()),
            span: span.clone(),
        }
    }

    pub fn type_error<S: Into<String>>(message: S, span: &Span) -> EvalError {
        EvalError::Type {
            message: message.into(),
            expected: None,
            found: None,
            span: span.clone(),
        }
    }

    pub fn argument<S: Into<String>>(message: S, span: &Span) -> EvalError {
        EvalError::Argument {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub fn semantic<S: Into<String>>(message: S, span: &Span) -> EvalError {
        EvalError::Semantic {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub fn undefined_name(name: &str, span: &Span) -> EvalError {
        EvalError::UndefinedName {
            name: name.into(),
            span: span.clone(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UndefinedName { .. } => ErrorKind::UndefinedName,
            EvalError::DuplicateBinding { .. } => ErrorKind::DuplicateBinding,
            EvalError::Type { .. } => ErrorKind::Type,
            EvalError::Argument { .. } => ErrorKind::Argument,
            EvalError::NoSuchField { .. } => ErrorKind::NoSuchField,
            EvalError::UndefinedValue { .. } => ErrorKind::UndefinedValue,
            EvalError::DuplicateOutput { .. } => ErrorKind::DuplicateOutput,
            EvalError::Cycle { .. } => ErrorKind::Cycle,
            EvalError::Semantic { .. } => ErrorKind::Semantic,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            EvalError::UndefinedName { span, .. }
            | EvalError::DuplicateBinding { span, .. }
            | EvalError::Type { span, .. }
            | EvalError::Argument { span, .. }
            | EvalError::NoSuchField { span, .. }
            | EvalError::UndefinedValue { span, .. }
            | EvalError::DuplicateOutput { span, .. }
            | EvalError::Cycle { span, .. }
            | EvalError::Semantic { span, .. } => span,
        }
    }

    /// The message without its leading location.
    pub fn description(&self) -> String {
        let full = self.to_string();
        let prefix = format!("{}: ", self.span());
        match full.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.to_string(),
            None => full,
        }
    }
}

fn display_errors(errors: &[EvalError]) -> String {
    let mut s = match errors.len() {
        1 => "1 error while evaluating build description".to_string(),
        n => format!("{n} errors while evaluating build description"),
    };
    for e in errors {
        s.push_str(&format!("\n{e}"));
    }
    s
}

/// All errors collected during one evaluation pass.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", display_errors(.errors))]
pub struct EvalErrors {
    pub errors: Vec<EvalError>,
}

impl EvalErrors {
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(EvalError::kind).collect()
    }
}
