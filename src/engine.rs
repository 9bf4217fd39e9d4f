// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins::BUILTINS;
use crate::dag::{Dag, FreezeOptions, Regeneration};
use crate::error::{EvalError, EvalErrors};
use crate::interpreter::Interpreter;
use crate::plugin::{NativeFunction, PluginRegistry};
use crate::scope::Scope;
use crate::source::{Source, Span};
use crate::value::{Callable, Value};
use crate::Rc;

use std::collections::BTreeMap;
use std::convert::AsRef;
use std::path::Path;

use anyhow::Result;
use log::info;

/// The build description evaluator.
///
/// Programs are evaluated in the order they were added, each in a scope of
/// its own below the global scope of builtins, reserved names and plugins.
#[derive(Clone)]
pub struct Engine {
    programs: Vec<Ref<Program>>,
    sources: BTreeMap<String, Source>,
    plugins: PluginRegistry,
    fail_fast: bool,
    srcroot: String,
    buildroot: String,
    arguments: BTreeMap<String, Value>,
    freeze: FreezeOptions,
}

/// Create a default engine.
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            programs: vec![],
            sources: BTreeMap::new(),
            plugins: PluginRegistry::new(),
            fail_fast: false,
            srcroot: ".".to_string(),
            buildroot: ".".to_string(),
            arguments: BTreeMap::new(),
            freeze: FreezeOptions::default(),
        }
    }

    pub fn add_program(&mut self, program: Program) {
        self.programs.push(Ref::new(program));
    }

    /// Add a program delivered as a JSON AST.
    pub fn add_program_json(&mut self, json: &str) -> Result<()> {
        self.add_program(Program::from_json_str(json)?);
        Ok(())
    }

    /// Add a program from a JSON or YAML AST file.
    pub fn add_program_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.add_program(Program::from_file(path)?);
        Ok(())
    }

    /// Register the text of a build description so that errors located in
    /// it can be rendered with the offending line.
    pub fn add_source(&mut self, path: String, contents: String) -> Result<()> {
        let source = Source::from_contents(path.clone(), contents)?;
        self.sources.insert(path, source);
        Ok(())
    }

    pub fn get_programs(&self) -> &Vec<Ref<Program>> {
        &self.programs
    }

    /// Stop at the first failing top-level declaration instead of
    /// collecting errors from all of them.
    pub fn set_fail_fast(&mut self, fail_fast: bool) {
        self.fail_fast = fail_fast;
    }

    pub fn set_srcroot(&mut self, srcroot: String) {
        self.srcroot = srcroot;
    }

    pub fn set_buildroot(&mut self, buildroot: String) {
        self.buildroot = buildroot;
    }

    /// Values of the `args` record.
    pub fn set_arguments(&mut self, arguments: BTreeMap<String, Value>) {
        self.arguments = arguments;
    }

    pub fn set_generate_directories(&mut self, generate: bool) {
        self.freeze.generate_directories = generate;
    }

    /// Add a build that reruns `command` when any of `inputs` change.
    pub fn set_regeneration(&mut self, command: String, inputs: Vec<String>, outputs: Vec<String>) {
        self.freeze.regeneration = Some(Regeneration {
            command,
            inputs,
            outputs,
        });
    }

    pub fn add_plugin(&mut self, native: Box<dyn NativeFunction>) -> Result<()> {
        self.plugins.register(native)
    }

    /// Add a native reachable as `namespace.name`.
    pub fn add_plugin_in(&mut self, namespace: &str, native: Box<dyn NativeFunction>) -> Result<()> {
        self.plugins.register_in(namespace, native)
    }

    fn globals(&self) -> Result<Scope> {
        let span = Span::builtin();
        let mut scope = Scope::new("<globals>");

        let mut builtins: Vec<_> = BUILTINS.iter().collect();
        builtins.sort_by_key(|(name, _)| **name);
        for (name, builtin) in builtins {
            scope.define_reserved(name, Value::Callable(Callable::Builtin(builtin)), &span)?;
        }

        scope.define_reserved("srcroot", Value::from(self.srcroot.as_str()), &span)?;
        scope.define_reserved("buildroot", Value::from(self.buildroot.as_str()), &span)?;
        scope.define_reserved(
            "args",
            Value::record(
                self.arguments.iter().map(|(k, v)| (k.as_str(), v.clone())),
                &span,
            )?,
            &span,
        )?;

        for (name, value) in self.plugins.bindings()? {
            scope.define(&name, value, &span)?;
        }
        Ok(scope)
    }

    /// Evaluate every program and freeze the resulting graph.
    ///
    /// On failure the error wraps [`EvalErrors`] with every error found.
    pub fn build_dag(&self) -> Result<Dag> {
        info!("evaluating {} programs", self.programs.len());
        let mut interpreter = Interpreter::new(Rc::new(self.globals()?));
        interpreter.set_fail_fast(self.fail_fast);

        for program in &self.programs {
            interpreter.eval_program(program);
            if interpreter.should_stop() {
                break;
            }
        }

        let (builder, errors) = interpreter.into_parts();
        if !errors.is_empty() {
            info!("evaluation failed with {} errors", errors.len());
            return Err(EvalErrors { errors }.into());
        }

        match builder.freeze(&self.freeze) {
            Ok(dag) => {
                info!(
                    "dependency graph: {} files, {} rules, {} builds",
                    dag.files().len(),
                    dag.rules().len(),
                    dag.builds().len()
                );
                Ok(dag)
            }
            Err(e) => Err(EvalErrors { errors: vec![e] }.into()),
        }
    }

    /// Show an error with the source line it points at, when that source
    /// has been added with [`Engine::add_source`].
    pub fn render_error(&self, error: &EvalError) -> String {
        let span = error.span();
        let kind = error.kind().to_string();
        span.message(
            self.sources.get(span.file.as_ref()),
            &kind,
            &error.description(),
        )
    }

    pub fn render_errors(&self, errors: &EvalErrors) -> String {
        errors
            .errors
            .iter()
            .map(|e| self.render_error(e))
            .collect::<Vec<String>>()
            .join("\n")
    }
}
