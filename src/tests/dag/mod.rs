// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::dag::*;
use crate::error::{ErrorKind, EvalError};
use crate::source::Span;
use crate::types::Type;
use crate::value::{Parameter, Value};
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::Result;

fn span(line: u32) -> Span {
    Span::new("build.fab", line, 1)
}

fn compile_rule() -> Result<Rc<Rule>> {
    Ok(Rc::new(Rule::new(
        "cc",
        "cc -c ${src} -o ${obj}",
        BTreeMap::new(),
        vec![
            Parameter::new("src", Type::input_file()),
            Parameter::new("obj", Type::output_file()),
        ],
        &span(1),
    )?))
}

fn file(path: &str) -> Result<Value> {
    Ok(Value::from(File::from_path(path, &span(0))?))
}

fn build(rule: &Rc<Rule>, src: &str, obj: &str, line: u32) -> Result<Build> {
    let mut arguments = BTreeMap::new();
    arguments.insert("src".to_string(), file(src)?);
    arguments.insert("obj".to_string(), file(obj)?);
    Ok(Build::create(rule, arguments, &span(line))?)
}

fn output_names(dag: &Dag) -> Vec<String> {
    dag.topological_order()
        .map(|b| b.outputs()[0].relative_name())
        .collect()
}

#[test]
fn build_binds_inputs_and_outputs() -> Result<()> {
    let cc = compile_rule()?;
    let b = build(&cc, "foo.c", "obj/foo.o", 2)?;

    assert_eq!(b.inputs().len(), 1);
    assert_eq!(b.outputs().len(), 1);
    assert!(!b.inputs()[0].is_generated());
    assert!(b.outputs()[0].is_generated());
    assert_eq!(b.command(), "cc -c ${srcroot}/foo.c -o ${buildroot}/obj/foo.o");
    assert_eq!(b.description(), b.command());

    match b.value() {
        Value::File(f) => assert_eq!(f.relative_name(), "obj/foo.o"),
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn build_requires_every_parameter() -> Result<()> {
    let cc = compile_rule()?;
    let mut arguments = BTreeMap::new();
    arguments.insert("obj".to_string(), file("foo.o")?);

    let e = Build::create(&cc, arguments, &span(3)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::UndefinedValue);

    let mut arguments = BTreeMap::new();
    arguments.insert("src".to_string(), file("foo.c")?);
    arguments.insert("obj".to_string(), file("foo.o")?);
    arguments.insert("flags".to_string(), Value::from("-O2"));
    let e = Build::create(&cc, arguments, &span(3)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Argument);
    Ok(())
}

#[test]
fn untagged_file_parameter_is_rejected() {
    let e = Rule::new(
        "bad",
        "true",
        BTreeMap::new(),
        vec![Parameter::new("f", Type::list(Type::file()))],
        &span(1),
    )
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Type);
}

#[test]
fn duplicate_output_leaves_graph_unchanged() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();
    dag.add_build(build(&cc, "foo.c", "foo.o", 2)?)?;

    match dag.add_build(build(&cc, "bar.c", "foo.o", 3)?) {
        Err(EvalError::DuplicateOutput {
            file,
            existing,
            span: at,
        }) => {
            assert_eq!(file, "foo.o");
            assert_eq!(existing, span(2));
            assert_eq!(at, span(3));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dag.builds().len(), 1);

    // bar.c was never recorded.
    let frozen = dag.freeze(&FreezeOptions::default())?;
    assert!(frozen.file("bar.c").is_none());
    assert_eq!(frozen.builds().len(), 1);
    Ok(())
}

#[test]
fn cycle_is_rejected_when_it_closes() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();

    // A reads y and produces x.
    dag.add_build(build(&cc, "y", "x", 2)?)?;

    // B reads x and produces y, closing the cycle.
    match dag.add_build(build(&cc, "x", "y", 3)?) {
        Err(EvalError::Cycle { build, cycle, span: at }) => {
            assert_eq!(build, "cc");
            assert_eq!(cycle, vec!["y", "x", "y"]);
            assert_eq!(at, span(3));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dag.builds().len(), 1);
    Ok(())
}

#[test]
fn self_loop() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();
    let e = dag.add_build(build(&cc, "x", "x", 2)?).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Cycle);
    assert!(dag.builds().is_empty());
    Ok(())
}

#[test]
fn topological_order() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();

    // Consumer inserted before its producer.
    dag.add_build(build(&cc, "gen.h", "a.o", 2)?)?;
    dag.add_build(build(&cc, "gen.in", "gen.h", 3)?)?;
    dag.add_build(build(&cc, "b.c", "b.o", 4)?)?;

    let frozen = dag.freeze(&FreezeOptions::default())?;
    assert_eq!(output_names(&frozen), vec!["gen.h", "a.o", "b.o"]);

    // gen.h is generated once a build produces it.
    let gen = frozen.file("gen.h").map(|f| f.is_generated());
    assert_eq!(gen, Some(true));
    assert_eq!(
        frozen.producer("gen.h").map(|b| b.span().clone()),
        Some(span(3))
    );

    // Its consumer reads the generated file through inputs and arguments.
    let consumer = &frozen.builds()[1];
    assert!(consumer.inputs()[0].is_generated());
    assert_eq!(
        consumer.arguments().get("src").map(Value::render),
        Some("${buildroot}/gen.h".to_string())
    );
    assert_eq!(consumer.command(), "cc -c ${buildroot}/gen.h -o ${buildroot}/a.o");
    Ok(())
}

#[test]
fn directories_and_regeneration() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();
    dag.add_build(build(&cc, "foo.c", "obj/x/foo.o", 2)?)?;

    let options = FreezeOptions {
        generate_directories: true,
        regeneration: Some(Regeneration {
            command: "fabrique".to_string(),
            inputs: vec!["build.fab".to_string(), "lib/build.fab".to_string()],
            outputs: vec!["build.ninja".to_string()],
        }),
    };
    let frozen = dag.freeze(&options)?;

    let rules: Vec<&str> = frozen.rules().iter().map(|r| r.name()).collect();
    assert_eq!(rules, vec!["cc", "mkdir", REGENERATION_RULE]);

    let commands: Vec<String> = frozen.builds().iter().map(|b| b.command()).collect();
    assert_eq!(
        commands,
        vec![
            "cc -c ${srcroot}/foo.c -o ${buildroot}/obj/x/foo.o",
            "mkdir -p ${buildroot}/obj",
            "mkdir -p ${buildroot}/obj/x",
            "fabrique ${srcroot}/build.fab",
        ]
    );
    assert_eq!(frozen.builds()[3].inputs().len(), 2);
    assert_eq!(
        frozen.file("build.ninja").map(|f| f.is_generated()),
        Some(true)
    );
    Ok(())
}

#[test]
fn regeneration_requires_an_input() -> Result<()> {
    let options = FreezeOptions {
        generate_directories: false,
        regeneration: Some(Regeneration::default()),
    };
    let e = DagBuilder::new().freeze(&options).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Semantic);
    Ok(())
}

#[test]
fn values_are_split_into_variables_and_targets() -> Result<()> {
    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();
    let b = dag.add_build(build(&cc, "foo.c", "foo.o", 2)?)?;

    dag.define("answer", Value::Int(42), &span(5))?;
    dag.define("obj", b.value(), &span(6))?;

    let e = dag.define("answer", Value::Int(0), &span(7)).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::DuplicateBinding);

    let frozen = dag.freeze(&FreezeOptions::default())?;
    assert_eq!(frozen.variables().get("answer"), Some(&Value::Int(42)));
    assert!(frozen.targets().contains_key("obj"));
    assert_eq!(frozen.value("obj").map(|v| v.to_string()), Some("\"foo.o\"".to_string()));
    Ok(())
}

#[test]
fn target_conflicting_with_file() -> Result<()> {
    let mut dag = DagBuilder::new();
    let foo = Rc::new(File::from_path("foo.c", &span(1))?);
    dag.add_file(&foo);
    dag.define("foo.c", file("bar.c")?, &span(2))?;

    let e = dag.freeze(&FreezeOptions::default()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Semantic);
    assert!(e.to_string().contains("conflicts with file 'foo.c'"), "{e}");
    Ok(())
}

#[test]
fn unique_rule_names() -> Result<()> {
    let mut dag = DagBuilder::new();
    let cc = compile_rule()?;
    dag.add_rule(&cc)?;
    dag.add_rule(&cc)?;
    assert_eq!(dag.unique_rule_name("cc"), "cc_1");
    assert_eq!(dag.unique_rule_name("ld"), "ld");

    let other = compile_rule()?;
    let e = dag.add_rule(&other).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::DuplicateBinding);
    Ok(())
}

#[test]
fn visitor_sees_graph_in_order() -> Result<()> {
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Visitor for Recorder {
        fn visit_file(&mut self, file: &File) -> Result<()> {
            self.events.push(format!("file {}", file.full_name()));
            Ok(())
        }

        fn visit_rule(&mut self, rule: &Rule) -> Result<()> {
            self.events.push(format!("rule {}", rule.name()));
            Ok(())
        }

        fn visit_build(&mut self, build: &Build) -> Result<()> {
            self.events.push(format!("build {}", build.command()));
            Ok(())
        }

        fn visit_value(&mut self, name: &str, _value: &Value, is_target: bool) -> Result<()> {
            self.events.push(format!("value {name} {is_target}"));
            Ok(())
        }
    }

    let cc = compile_rule()?;
    let mut dag = DagBuilder::new();
    let b = dag.add_build(build(&cc, "foo.c", "foo.o", 2)?)?;
    dag.define("obj", b.value(), &span(3))?;
    dag.define("n", Value::Int(1), &span(4))?;

    let frozen = dag.freeze(&FreezeOptions::default())?;
    let mut recorder = Recorder::default();
    frozen.accept(&mut recorder)?;

    assert_eq!(
        recorder.events,
        vec![
            "file ${buildroot}/foo.o",
            "file ${srcroot}/foo.c",
            "rule cc",
            "build cc -c ${srcroot}/foo.c -o ${buildroot}/foo.o",
            "value n false",
            "value obj true",
        ]
    );
    Ok(())
}

#[test]
fn files_under_the_root_stay_absolute() -> Result<()> {
    let rooted = File::from_path("/foo.c", &span(0))?;
    let relative = File::from_path("foo.c", &span(0))?;
    assert_eq!(rooted.relative_name(), "/foo.c");
    assert_eq!(rooted.full_name(), "/foo.c");
    assert_eq!(relative.full_name(), "${srcroot}/foo.c");

    let mut dag = DagBuilder::new();
    dag.add_file(&Rc::new(rooted));
    dag.add_file(&Rc::new(relative));
    let frozen = dag.freeze(&FreezeOptions::default())?;
    assert_eq!(frozen.files().len(), 2);
    assert!(frozen.file("/foo.c").is_some());
    assert!(frozen.file("foo.c").is_some());
    Ok(())
}
