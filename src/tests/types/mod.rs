// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::source::Span;
use crate::types::*;
use crate::value::Value;

use anyhow::Result;

fn r1() -> Type {
    Type::record([("a", Type::Int), ("b", Type::String)])
}

#[test]
fn record_field_order_is_irrelevant() -> Result<()> {
    let span = Span::builtin();
    let v1 = Value::record([("a", Value::Int(1)), ("b", Value::from("x"))], &span)?;
    let v2 = Value::record([("b", Value::from("y")), ("a", Value::Int(2))], &span)?;

    check_compatible(&type_of(&v1), &type_of(&v2), &span)?;
    assert_eq!(type_of(&v1), type_of(&v2));
    assert_eq!(type_of(&v1), r1());
    Ok(())
}

#[test]
fn width_subtyping() {
    let r3 = Type::record([("a", Type::Int)]);

    // A larger record can be passed where a narrower shape is expected.
    assert!(r1().is_subtype(&r3));
    assert!(!r3.is_subtype(&r1()));

    // Compatibility requires identical field sets.
    assert!(!r1().is_compatible(&r3));

    let narrower = Type::record([("a", Type::String)]);
    assert!(!r1().is_subtype(&narrower));
}

#[test]
fn file_tags() {
    let plain = Type::file();
    let input = Type::input_file();
    let output = Type::output_file();

    assert!(plain.is_subtype(&input));
    assert!(plain.is_subtype(&output));
    assert!(input.is_subtype(&plain));
    assert!(!input.is_subtype(&output));
    assert!(!output.is_subtype(&input));
    assert!(!input.is_compatible(&output));

    assert!(Type::list(input.clone()).is_input());
    assert!(Type::optional(output.clone()).is_output());
    assert!(!plain.is_input());
    assert!(Type::record([("o", output)]).has_output());
}

#[test]
fn optionals() {
    let maybe_int = Type::optional(Type::Int);

    assert!(Type::Int.is_subtype(&maybe_int));
    assert!(!maybe_int.is_subtype(&Type::Int));
    assert!(Type::Nil.is_subtype(&maybe_int));
    assert!(maybe_int.is_compatible(&Type::Int));
    assert!(Type::Int.is_compatible(&maybe_int));

    // Optionals do not nest.
    assert_eq!(Type::optional(maybe_int.clone()), maybe_int);
}

#[test]
fn functions_are_contravariant_in_parameters() {
    let narrow = Type::record([("a", Type::Int)]);
    let takes_narrow = Type::function(vec![narrow.clone()], Type::Int);
    let takes_wide = Type::function(vec![r1()], Type::Int);

    assert!(takes_narrow.is_subtype(&takes_wide));
    assert!(!takes_wide.is_subtype(&takes_narrow));

    let returns_wide = Type::function(vec![], r1());
    let returns_narrow = Type::function(vec![], narrow);
    assert!(returns_wide.is_subtype(&returns_narrow));
    assert!(!returns_narrow.is_subtype(&returns_wide));
}

#[test]
fn lists_are_covariant() {
    assert!(Type::list(Type::Nil).is_subtype(&Type::list(Type::Int)));
    assert!(Type::list(r1()).is_subtype(&Type::list(Type::record([("b", Type::String)]))));
    assert!(!Type::list(Type::Int).is_subtype(&Type::list(Type::String)));
}

#[test]
fn unification() -> Result<()> {
    let span = Span::builtin();

    assert_eq!(unify(&Type::Nil, &Type::Int, &span)?, Type::Int);
    assert_eq!(
        unify(&Type::input_file(), &Type::output_file(), &span)?,
        Type::file()
    );
    assert_eq!(
        unify(&Type::Int, &Type::optional(Type::Int), &span)?,
        Type::optional(Type::Int)
    );

    // Records unify to their common fields.
    let other = Type::record([("a", Type::Int), ("c", Type::Bool)]);
    assert_eq!(
        unify(&r1(), &other, &span)?,
        Type::record([("a", Type::Int)])
    );

    let e = unify(&Type::Int, &Type::String, &span).unwrap_err();
    assert_eq!(e.kind(), crate::ErrorKind::Type);

    let types = [Type::Nil, Type::Int, Type::Int];
    assert_eq!(unify_all(types.iter(), &span)?, Type::Int);
    assert_eq!(unify_all(std::iter::empty(), &span)?, Type::Nil);
    Ok(())
}

#[test]
fn mismatch_carries_both_types() {
    let span = Span::new("build.fab", 3, 7);
    match check_compatible(&Type::Int, &Type::String, &span) {
        Err(crate::EvalError::Type {
            expected,
            found,
            span: at,
            ..
        }) => {
            assert_eq!(expected, Some(Type::Int));
            assert_eq!(found, Some(Type::String));
            assert_eq!(at, span);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn display() {
    let t = Type::function(
        vec![Type::list(Type::input_file()), Type::optional(Type::Int)],
        Type::record([("b", Type::Bool), ("a", Type::output_file())]),
    );
    assert_eq!(
        t.to_string(),
        "(list[file[in]], maybe[int])=>record[a:file[out], b:bool]"
    );
    assert_eq!(Type::meta(Type::String).to_string(), "type[string]");
    assert_eq!(Type::Nil.to_string(), "nil");
}

#[test]
fn typed_list_constructor_rejects_mismatched_items() {
    let span = Span::builtin();
    let e = Value::list(Type::Int, vec![Value::Int(1), Value::from("two")], &span).unwrap_err();
    assert_eq!(e.kind(), crate::ErrorKind::Type);

    let e = Value::record([("a", Value::Int(1)), ("a", Value::Int(2))], &span).unwrap_err();
    assert_eq!(e.kind(), crate::ErrorKind::DuplicateBinding);
}
