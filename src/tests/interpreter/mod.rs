// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::env;

use crate::ast::Program;
use crate::*;

use anyhow::{bail, Result};
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    program: Program,
    #[serde(default)]
    fail_fast: bool,
    want_values: Option<BTreeMap<String, serde_json::Value>>,
    want_builds: Option<Vec<serde_json::Value>>,
    want_rules: Option<Vec<serde_json::Value>>,
    want_files: Option<Vec<serde_json::Value>>,
    error: Option<String>,
    error_kind: Option<String>,
    error_count: Option<usize>,
    skip: Option<bool>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

// Every key present in `expected` must match in `actual`. Lists must have
// the same length.
fn check_subset(expected: &serde_json::Value, actual: &serde_json::Value, path: &str) -> Result<()> {
    use serde_json::Value as Json;
    match (expected, actual) {
        (Json::Object(e), Json::Object(a)) => {
            for (k, v) in e {
                match a.get(k) {
                    Some(av) => check_subset(v, av, &format!("{path}.{k}"))?,
                    None => bail!("{path}: missing key `{k}` in {actual}"),
                }
            }
            Ok(())
        }
        (Json::Array(e), Json::Array(a)) => {
            if e.len() != a.len() {
                bail!("{path}: expected {} items, found {}\n{actual:#}", e.len(), a.len());
            }
            for (idx, (ev, av)) in e.iter().zip(a.iter()).enumerate() {
                check_subset(ev, av, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        _ if expected == actual => Ok(()),
        _ => {
            let e = expected.to_string();
            let a = actual.to_string();
            println!("{path} mismatch:\n{}", prettydiff::diff_chars(&e, &a));
            bail!("{path}: expected {e}, found {a}")
        }
    }
}

fn check_dag(case: &TestCase, dag: &Dag) -> Result<()> {
    if let Some(want_values) = &case.want_values {
        for (name, expected) in want_values {
            let actual = match dag.value(name) {
                Some(v) => serde_json::to_value(v)?,
                None => bail!("no value named `{name}`"),
            };
            check_subset(expected, &actual, name)?;
        }
    }

    let json = serde_json::to_value(dag)?;
    let sections = [
        ("builds", &case.want_builds),
        ("rules", &case.want_rules),
        ("files", &case.want_files),
    ];
    for (section, expected) in sections {
        if let Some(expected) = expected {
            check_subset(
                &serde_json::Value::Array(expected.clone()),
                &json[section],
                section,
            )?;
        }
    }
    Ok(())
}

fn check_error(case: &TestCase, error: anyhow::Error) -> Result<()> {
    let errors = match error.downcast_ref::<EvalErrors>() {
        Some(errors) => errors,
        None => return Err(error),
    };

    let message = errors.to_string();
    if let Some(expected) = &case.error {
        if !message.contains(expected.as_str()) {
            bail!("Error message\n`{message}\n`\ndoes not contain `{expected}`");
        }
    }
    if let Some(kind) = &case.error_kind {
        let first = errors.kinds().first().map(ErrorKind::to_string);
        if first.as_deref() != Some(kind.as_str()) {
            bail!("expected {kind}, found {first:?}\n{message}");
        }
    }
    if let Some(count) = case.error_count {
        if errors.errors.len() != count {
            bail!("expected {count} errors, found {}\n{message}", errors.errors.len());
        }
    }
    println!("{message}");
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    for case in test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }

        let wants_error = case.error.is_some() || case.error_kind.is_some();
        let wants_dag = case.want_values.is_some()
            || case.want_builds.is_some()
            || case.want_rules.is_some()
            || case.want_files.is_some();
        if wants_error == wants_dag {
            panic!("either an expected result or an expected error must be specified in test case.");
        }

        let mut engine = Engine::new();
        engine.set_fail_fast(case.fail_fast);
        engine.add_program(Program {
            file: case.program.file.clone(),
            values: case.program.values.clone(),
        });

        match engine.build_dag() {
            Ok(dag) if wants_dag => check_dag(&case, &dag)?,
            Ok(dag) => bail!(
                "evaluation succeeded and did not produce any errors\n{}",
                serde_json::to_string_pretty(&dag)?
            ),
            Err(e) if wants_error => check_error(&case, e)?,
            Err(e) => return Err(e),
        }

        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test]
fn yaml_test_basic() -> Result<()> {
    yaml_test("tests/interpreter/cases/basic/literals.yaml")
}

#[test]
#[ignore = "intended for running a single case file"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();

    for a in env::args() {
        if a.ends_with(".yaml") {
            file = a;
        }
    }

    if file.is_empty() {
        bail!("missing <yaml-file>");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/interpreter/cases/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
