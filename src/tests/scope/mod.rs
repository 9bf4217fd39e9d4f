// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::{ErrorKind, EvalError};
use crate::scope::Scope;
use crate::source::Span;
use crate::value::Value;
use crate::Rc;

use anyhow::Result;

#[test]
fn shadowing_does_not_alter_outer_binding() -> Result<()> {
    let span = Span::new("a.fab", 1, 1);
    let mut outer = Scope::new("outer");
    outer.define("x", Value::Int(1), &span)?;
    let outer = Rc::new(outer);

    let mut inner = Scope::child("inner", outer.clone());
    inner.define("x", Value::Int(2), &span)?;
    assert_eq!(inner.lookup("x", &span)?, Value::Int(2));
    assert_eq!(inner.depth(), 1);
    drop(inner);

    assert_eq!(outer.lookup("x", &span)?, Value::Int(1));
    Ok(())
}

#[test]
fn redefinition_in_same_level() -> Result<()> {
    let first = Span::new("a.fab", 1, 1);
    let second = Span::new("a.fab", 2, 1);
    let mut scope = Scope::new("file");
    scope.define("x", Value::Int(1), &first)?;

    match scope.define("x", Value::Int(2), &second) {
        Err(EvalError::DuplicateBinding {
            name,
            span,
            previous,
        }) => {
            assert_eq!(name.as_ref(), "x");
            assert_eq!(span, second);
            assert_eq!(previous, Some(first));
        }
        other => panic!("unexpected {other:?}"),
    }

    // The first binding survives.
    assert_eq!(scope.lookup("x", &second)?, Value::Int(1));
    Ok(())
}

#[test]
fn reserved_names() {
    let span = Span::new("a.fab", 1, 1);
    let mut scope = Scope::new("file");
    for name in ["file", "print", "srcroot", "true", "action"] {
        let e = scope.define(name, Value::Int(1), &span).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DuplicateBinding);
        assert!(e.to_string().contains("reserved name"), "{e}");
    }
    assert!(scope.define("subdir_files", Value::Int(1), &span).is_ok());
}

#[test]
fn undefined_name_carries_location() {
    let span = Span::new("a.fab", 4, 9);
    let scope = Scope::new("file");
    match scope.lookup("missing", &span) {
        Err(EvalError::UndefinedName { name, span: at }) => {
            assert_eq!(name.as_ref(), "missing");
            assert_eq!(at, span);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn captured_scope_is_copied_on_write() -> Result<()> {
    let span = Span::builtin();
    let mut current = Rc::new(Scope::new("file"));
    Rc::make_mut(&mut current).define("a", Value::Int(1), &span)?;

    // A closure holding the scope keeps seeing it as it was.
    let captured = current.clone();
    Rc::make_mut(&mut current).define("b", Value::Int(2), &span)?;

    assert!(current.contains("b"));
    assert!(!captured.contains("b"));
    assert!(captured.contains("a"));
    assert_eq!(current.local_names().collect::<Vec<_>>(), vec!["a", "b"]);
    Ok(())
}
