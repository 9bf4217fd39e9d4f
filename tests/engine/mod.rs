// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use fabrique::*;
use serde_json::json;

fn program(file: &str, values: serde_json::Value) -> String {
    json!({ "file": file, "values": values }).to_string()
}

fn engine_with(values: serde_json::Value) -> Result<Engine> {
    let mut engine = Engine::new();
    engine.add_program_json(&program("build.fab", values))?;
    Ok(engine)
}

fn call(callee: serde_json::Value, args: serde_json::Value) -> serde_json::Value {
    json!({ "kind": "call", "callee": callee, "args": args })
}

fn name(n: &str) -> serde_json::Value {
    json!({ "kind": "name", "name": n })
}

fn string(s: &str) -> serde_json::Value {
    json!({ "kind": "str", "value": s })
}

fn eval_errors(engine: &Engine) -> Result<EvalErrors> {
    match engine.build_dag() {
        Ok(dag) => bail!(
            "evaluation unexpectedly succeeded\n{}",
            serde_json::to_string_pretty(&dag)?
        ),
        Err(e) => Ok(e.downcast::<EvalErrors>()?),
    }
}

struct Join;

impl NativeFunction for Join {
    fn name(&self) -> String {
        "join".to_string()
    }

    fn parameter_types(&self) -> Vec<Type> {
        vec![Type::list(Type::String), Type::String]
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["items".to_string(), "sep".to_string()]
    }

    fn return_type(&self) -> Type {
        Type::String
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        let sep: &str = args[1].as_string()?;
        let items = args[0]
            .as_list()?
            .iter()
            .map(|v| Ok(v.as_string()?.to_string()))
            .collect::<Result<Vec<String>>>()?;
        Ok(Value::from(items.join(sep)))
    }
}

// Positional only; fails or misbehaves on demand.
struct Upper {
    fail: bool,
    wrong_type: bool,
}

impl NativeFunction for Upper {
    fn name(&self) -> String {
        "upper".to_string()
    }

    fn parameter_types(&self) -> Vec<Type> {
        vec![Type::String]
    }

    fn return_type(&self) -> Type {
        Type::String
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        if self.fail {
            bail!("boom");
        }
        if self.wrong_type {
            return Ok(Value::Int(1));
        }
        Ok(Value::from(args[0].as_string()?.to_uppercase()))
    }
}

fn upper() -> Box<Upper> {
    Box::new(Upper {
        fail: false,
        wrong_type: false,
    })
}

#[test]
fn native_with_keywords() -> Result<()> {
    let mut engine = engine_with(json!([
        {
            "name": "x",
            "value": call(name("join"), json!([
                { "value": { "kind": "list", "items": [string("a"), string("b")] } },
                { "name": "sep", "value": string("-") }
            ]))
        }
    ]))?;

    // Not registered yet.
    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::UndefinedName]);

    engine.add_plugin(Box::new(Join))?;
    assert!(engine.add_plugin(Box::new(Join)).is_err());

    let dag = engine.build_dag()?;
    assert_eq!(dag.value("x"), Some(&Value::from("a-b")));
    Ok(())
}

#[test]
fn native_names_cannot_be_reserved() {
    struct Print;
    impl NativeFunction for Print {
        fn name(&self) -> String {
            "print".to_string()
        }
        fn parameter_types(&self) -> Vec<Type> {
            vec![]
        }
        fn return_type(&self) -> Type {
            Type::Bool
        }
        fn invoke(&self, _args: &[Value]) -> Result<Value> {
            Ok(Value::Bool(true))
        }
    }

    let mut engine = Engine::new();
    assert!(engine.add_plugin(Box::new(Print)).is_err());
    assert!(engine.add_plugin_in("file", Box::new(Print)).is_err());
}

#[test]
fn native_in_namespace() -> Result<()> {
    let mut engine = engine_with(json!([
        {
            "name": "x",
            "value": call(
                json!({ "kind": "field", "base": name("text"), "field": "upper" }),
                json!([{ "value": string("abc") }])
            )
        }
    ]))?;
    engine.add_plugin_in("text", upper())?;
    engine.add_plugin_in("text", Box::new(Join))?;
    assert!(engine.add_plugin_in("text", upper()).is_err());

    let dag = engine.build_dag()?;
    assert_eq!(dag.value("x"), Some(&Value::from("ABC")));
    Ok(())
}

#[test]
fn positional_only_native() -> Result<()> {
    let mut engine = engine_with(json!([
        {
            "name": "x",
            "value": call(name("upper"), json!([{ "name": "s", "value": string("abc") }]))
        }
    ]))?;
    engine.add_plugin(upper())?;

    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::Argument]);
    assert!(errors.to_string().contains("only accepts positional arguments"));
    Ok(())
}

#[test]
fn native_failures_are_semantic_errors() -> Result<()> {
    let values = json!([
        { "name": "x", "value": call(name("upper"), json!([{ "value": string("abc") }])) }
    ]);

    let mut engine = engine_with(values.clone())?;
    engine.add_plugin(Box::new(Upper {
        fail: true,
        wrong_type: false,
    }))?;
    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::Semantic]);
    assert!(errors.to_string().contains("native 'upper' failed: boom"));

    let mut engine = engine_with(values)?;
    engine.add_plugin(Box::new(Upper {
        fail: false,
        wrong_type: true,
    }))?;
    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::Semantic]);
    assert!(errors
        .to_string()
        .contains("native 'upper' returned a value of type int, expected string"));
    Ok(())
}

#[test]
fn native_argument_types_are_checked() -> Result<()> {
    let mut engine = engine_with(json!([
        {
            "name": "x",
            "value": call(name("upper"), json!([{ "value": { "kind": "int", "value": 1 } }]))
        }
    ]))?;
    engine.add_plugin(upper())?;
    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::Type]);
    Ok(())
}

#[test]
fn arguments_and_roots() -> Result<()> {
    let mut engine = engine_with(json!([
        { "name": "debug", "value": { "kind": "field", "base": name("args"), "field": "debug" } },
        { "name": "src", "value": name("srcroot") },
        { "name": "broot", "value": name("buildroot") },
        {
            "name": "level",
            "value": {
                "kind": "field_query",
                "base": name("args"),
                "field": "level",
                "default": { "kind": "int", "value": 2 }
            }
        }
    ]))?;

    let mut arguments = BTreeMap::new();
    arguments.insert("debug".to_string(), Value::Bool(true));
    engine.set_arguments(arguments);
    engine.set_srcroot("/src".to_string());
    engine.set_buildroot("/build".to_string());

    let dag = engine.build_dag()?;
    assert_eq!(dag.value("debug"), Some(&Value::Bool(true)));
    assert_eq!(dag.value("src"), Some(&Value::from("/src")));
    assert_eq!(dag.value("broot"), Some(&Value::from("/build")));
    assert_eq!(dag.value("level"), Some(&Value::Int(2)));
    Ok(())
}

#[test]
fn programs_have_their_own_scope() -> Result<()> {
    let mut engine = Engine::new();
    engine.add_program_json(&program(
        "build.fab",
        json!([{ "name": "x", "value": { "kind": "int", "value": 1 } }]),
    ))?;
    engine.add_program_json(&program(
        "lib/build.fab",
        json!([
            { "name": "y", "value": name("x") },
            { "name": "src", "value": { "kind": "filename", "name": "lib.c" } }
        ]),
    ))?;

    let errors = eval_errors(&engine)?;
    assert_eq!(errors.kinds(), vec![ErrorKind::UndefinedName]);

    let mut engine = Engine::new();
    engine.add_program_json(&program(
        "lib/build.fab",
        json!([{ "name": "src", "value": { "kind": "filename", "name": "lib.c" } }]),
    ))?;
    let dag = engine.build_dag()?;
    assert_eq!(
        dag.value("src").map(Value::to_string),
        Some("\"lib/lib.c\"".to_string())
    );
    Ok(())
}

#[test]
fn top_level_names_are_global() -> Result<()> {
    let mut engine = Engine::new();
    engine.add_program_json(&program(
        "a.fab",
        json!([{ "name": "x", "value": { "kind": "int", "value": 1 } }]),
    ))?;
    engine.add_program_json(&program(
        "b.fab",
        json!([
            { "name": "x", "value": { "kind": "int", "value": 2 } },
            { "name": "y", "value": name("x") }
        ]),
    ))?;

    // The clashing `x` is not bound in b.fab either.
    let errors = eval_errors(&engine)?;
    assert_eq!(
        errors.kinds(),
        vec![ErrorKind::DuplicateBinding, ErrorKind::UndefinedName]
    );
    Ok(())
}

#[test]
fn fail_fast_skips_remaining_programs() -> Result<()> {
    let mut engine = Engine::new();
    for file in ["a.fab", "b.fab"] {
        engine.add_program_json(&program(file, json!([{ "name": "x", "value": name("missing") }])))?;
    }

    assert_eq!(eval_errors(&engine)?.errors.len(), 2);

    engine.set_fail_fast(true);
    let errors = eval_errors(&engine)?;
    assert_eq!(errors.errors.len(), 1);
    Ok(())
}

#[test]
fn regeneration_build() -> Result<()> {
    let mut engine = engine_with(json!([
        { "name": "src", "value": { "kind": "filename", "name": "main.c" } }
    ]))?;
    engine.set_regeneration(
        "fabrique".to_string(),
        vec!["build.fab".to_string()],
        vec!["build.ninja".to_string()],
    );

    let dag = engine.build_dag()?;
    let rules: Vec<&str> = dag.rules().iter().map(|r| r.name()).collect();
    assert_eq!(rules, vec![REGENERATION_RULE]);
    assert_eq!(dag.builds().len(), 1);
    assert_eq!(dag.builds()[0].command(), "fabrique ${srcroot}/build.fab");
    assert_eq!(
        dag.builds()[0].description(),
        "Regenerating ${buildroot}/build.ninja"
    );
    Ok(())
}

#[test]
fn evaluation_is_deterministic() -> Result<()> {
    let values = json!([
        {
            "name": "cc",
            "value": {
                "kind": "action",
                "args": [{ "value": string("cc -c ${src} -o ${obj}") }],
                "params": [
                    { "name": "src", "type": "file[in]" },
                    { "name": "obj", "type": "file[out]" }
                ]
            }
        },
        {
            "name": "objects",
            "value": {
                "kind": "foreach",
                "var": "src",
                "sequence": { "kind": "files", "names": ["z.c", "a.c", "m/k.c"] },
                "body": call(name("cc"), json!([
                    { "value": name("src") },
                    {
                        "value": {
                            "kind": "binary",
                            "op": "add",
                            "lhs": name("src"),
                            "rhs": string(".o")
                        }
                    }
                ]))
            }
        }
    ]);

    let first = serde_json::to_string(&engine_with(values.clone())?.build_dag()?)?;
    let second = serde_json::to_string(&engine_with(values)?.build_dag()?)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn errors_render_with_source() -> Result<()> {
    let mut engine = engine_with(json!([
        { "name": "x", "at": "build.fab:1:1", "value": { "kind": "name", "name": "missing", "at": "build.fab:1:5" } }
    ]))?;
    let errors = eval_errors(&engine)?;

    assert_eq!(
        engine.render_errors(&errors),
        "build.fab:1:5: UndefinedNameError: undefined name 'missing'"
    );

    engine.add_source("build.fab".to_string(), "x = missing;\n".to_string())?;
    let rendered = engine.render_error(&errors.errors[0]);
    assert!(rendered.contains("--> build.fab:1:5"), "{rendered}");
    assert!(rendered.contains("1 | x = missing;"), "{rendered}");
    assert!(rendered.contains("  |     ^"), "{rendered}");
    assert!(
        rendered.ends_with("UndefinedNameError: undefined name 'missing'"),
        "{rendered}"
    );
    Ok(())
}

#[test]
fn programs_from_files() -> Result<()> {
    let mut engine = Engine::new();
    assert!(engine.add_program_from_file("tests/engine/missing.yaml").is_err());
    assert!(engine.add_program_json("{ \"values\": 1 }").is_err());
    assert!(engine
        .add_program_json(&program("a.fab", json!([{ "value": { "kind": "int" } }])))
        .is_err());
    assert!(engine.get_programs().is_empty());
    Ok(())
}
