// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod build;
mod file;
mod rule;
mod visitor;

pub use build::Build;
pub use file::File;
pub use rule::{Rule, REGENERATION_RULE};
pub use visitor::Visitor;

use crate::error::EvalError;
use crate::scheduler::{schedule, BuildInfo, SortResult};
use crate::source::Span;
use crate::types::Type;
use crate::utils::path;
use crate::value::Value;
use crate::Rc;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Rule and build that regenerate the build files when any of the build
/// descriptions change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regeneration {
    pub command: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Extra rules and builds added when the graph is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct FreezeOptions {
    pub generate_directories: bool,
    pub regeneration: Option<Regeneration>,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        Self {
            generate_directories: true,
            regeneration: None,
        }
    }
}

/// The graph while it is being built. Only the evaluator mutates it.
#[derive(Debug, Default)]
pub struct DagBuilder {
    files: IndexMap<String, Rc<File>>,
    rules: IndexMap<String, Rc<Rule>>,
    builds: Vec<Rc<Build>>,
    // Output file to the index of the build producing it.
    producers: BTreeMap<String, usize>,
    // Input file to the indices of the builds reading it.
    consumers: BTreeMap<String, Vec<usize>>,
    values: IndexMap<String, (Value, Span)>,
}

impl DagBuilder {
    pub fn new() -> DagBuilder {
        DagBuilder::default()
    }

    /// Record a file. The first file seen with a given relative name is
    /// kept, upgraded to generated if a later one is.
    pub fn add_file(&mut self, file: &Rc<File>) {
        let name = file.relative_name();
        match self.files.get_mut(&name) {
            Some(existing) => {
                if file.is_generated() && !existing.is_generated() {
                    *existing = file.clone();
                }
            }
            None => {
                self.files.insert(name, file.clone());
            }
        }
    }

    /// A rule name based on `base` that is not yet taken.
    pub fn unique_rule_name(&self, base: &str) -> String {
        if !self.rules.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let name = format!("{base}_{n}");
            if !self.rules.contains_key(&name) {
                return name;
            }
            n += 1;
        }
    }

    pub fn add_rule(&mut self, rule: &Rc<Rule>) -> Result<(), EvalError> {
        match self.rules.get(rule.name()) {
            Some(existing) if Rc::ptr_eq(existing, rule) => Ok(()),
            Some(existing) => Err(EvalError::DuplicateBinding {
                name: rule.name().into(),
                span: rule.span().clone(),
                previous: Some(existing.span().clone()),
            }),
            None => {
                debug!("adding rule {}", rule.name());
                self.rules.insert(rule.name().to_string(), rule.clone());
                Ok(())
            }
        }
    }

    /// Insert a build.
    ///
    /// Fails without modifying the graph if one of the build's outputs is
    /// already produced by another build, or if the build would close a
    /// dependency cycle.
    pub fn add_build(&mut self, build: Build) -> Result<Rc<Build>, EvalError> {
        let outputs: Vec<String> = build.outputs().iter().map(|f| f.relative_name()).collect();
        let inputs: Vec<String> = build.inputs().iter().map(|f| f.relative_name()).collect();

        let mut seen = BTreeSet::new();
        for output in &outputs {
            if let Some(idx) = self.producers.get(output) {
                return Err(EvalError::DuplicateOutput {
                    file: output.clone(),
                    existing: self.builds[*idx].span().clone(),
                    span: build.span().clone(),
                });
            }
            if !seen.insert(output.as_str()) {
                return Err(EvalError::DuplicateOutput {
                    file: output.clone(),
                    existing: build.span().clone(),
                    span: build.span().clone(),
                });
            }
        }

        if let Some(cycle) = self.find_cycle(&inputs, &outputs) {
            return Err(EvalError::Cycle {
                build: build.rule().name().to_string(),
                cycle,
                span: build.span().clone(),
            });
        }

        self.add_rule(build.rule())?;
        let idx = self.builds.len();
        for file in build.inputs().iter().chain(build.outputs().iter()) {
            self.add_file(file);
        }
        for output in outputs {
            self.producers.insert(output, idx);
        }
        for input in inputs {
            let readers = self.consumers.entry(input).or_default();
            if readers.last() != Some(&idx) {
                readers.push(idx);
            }
        }

        debug!(
            "adding build {idx} of rule {} producing {}",
            build.rule().name(),
            build
                .outputs()
                .iter()
                .map(|f| f.relative_name())
                .collect::<Vec<String>>()
                .join(" ")
        );
        let build = Rc::new(build);
        self.builds.push(build.clone());
        Ok(build)
    }

    // Path of files from one of `outputs` back to one of `inputs` through
    // existing builds, closed by the new build.
    fn find_cycle(&self, inputs: &[String], outputs: &[String]) -> Option<Vec<String>> {
        let inputs: BTreeSet<&str> = inputs.iter().map(String::as_str).collect();
        let mut visited = BTreeSet::new();
        let mut stack: Vec<Vec<&str>> = outputs.iter().map(|o| vec![o.as_str()]).collect();

        while let Some(path) = stack.pop() {
            let file = match path.last() {
                Some(f) => *f,
                None => continue,
            };
            if inputs.contains(file) {
                let mut cycle: Vec<String> = path.iter().map(|f| f.to_string()).collect();
                cycle.push(path[0].to_string());
                return Some(cycle);
            }
            if !visited.insert(file) {
                continue;
            }
            for idx in self.consumers.get(file).into_iter().flatten() {
                for next in self.builds[*idx].outputs() {
                    let next = match self.producers.get_key_value(&next.relative_name()) {
                        Some((name, _)) => name.as_str(),
                        None => continue,
                    };
                    let mut p = path.clone();
                    p.push(next);
                    stack.push(p);
                }
            }
        }
        None
    }

    /// Fail if a top-level value named `name` was already recorded.
    pub fn check_undefined(&self, name: &str, span: &Span) -> Result<(), EvalError> {
        match self.values.get(name) {
            Some((_, previous)) => Err(EvalError::DuplicateBinding {
                name: name.into(),
                span: span.clone(),
                previous: Some(previous.clone()),
            }),
            None => Ok(()),
        }
    }

    /// Record a named top-level value.
    pub fn define(&mut self, name: &str, value: Value, span: &Span) -> Result<(), EvalError> {
        self.check_undefined(name, span)?;
        for file in value.files() {
            self.add_file(&file);
        }
        self.values.insert(name.to_string(), (value, span.clone()));
        Ok(())
    }

    pub fn builds(&self) -> &[Rc<Build>] {
        &self.builds
    }

    /// Finish the graph.
    pub fn freeze(mut self, options: &FreezeOptions) -> Result<Dag, EvalError> {
        if options.generate_directories {
            self.add_directory_builds()?;
        }
        if let Some(regeneration) = &options.regeneration {
            self.add_regeneration_build(regeneration)?;
        }

        // A file is generated if any build produces it.
        let mut canonical: BTreeMap<String, Rc<File>> = BTreeMap::new();
        for (name, file) in &self.files {
            let file = match self.producers.contains_key(name) && !file.is_generated() {
                true => Rc::new(file.with_generated(file.span())?),
                false => file.clone(),
            };
            canonical.insert(name.clone(), file);
        }
        let lookup = |f: &Rc<File>| match canonical.get(&f.relative_name()) {
            Some(c) => c.clone(),
            None => f.clone(),
        };

        let builds: Vec<Rc<Build>> = self
            .builds
            .iter()
            .map(|b| Ok(Rc::new(b.map_files(&lookup)?)))
            .collect::<Result<_, EvalError>>()?;

        let mut variables = IndexMap::new();
        let mut targets = IndexMap::new();
        for (name, (value, span)) in &self.values {
            let value = value.try_map_files(&|f| Ok(lookup(f)))?;
            if !value.ty().has_files() {
                variables.insert(name.clone(), value);
                continue;
            }
            if let Some(file) = canonical.get(name) {
                let same = match &value {
                    Value::File(f) => f.relative_name() == *name,
                    _ => false,
                };
                if !same {
                    return Err(EvalError::semantic(
                        format!(
                            "target '{name}' conflicts with file '{}' declared at {}",
                            file.relative_name(),
                            file.span()
                        ),
                        span,
                    ));
                }
            }
            targets.insert(name.clone(), value);
        }

        let names: Vec<(Vec<String>, Vec<String>)> = builds
            .iter()
            .map(|b| {
                (
                    b.inputs().iter().map(|f| f.relative_name()).collect(),
                    b.outputs().iter().map(|f| f.relative_name()).collect(),
                )
            })
            .collect();
        let infos: Vec<BuildInfo<'_>> = names
            .iter()
            .map(|(inputs, outputs)| BuildInfo {
                inputs: inputs.iter().map(String::as_str).collect(),
                outputs: outputs.iter().map(String::as_str).collect(),
            })
            .collect();

        let order = match schedule(&infos) {
            Ok(SortResult::Order(order)) => order,
            Ok(SortResult::Cycle(file, stuck)) => {
                let span = stuck
                    .first()
                    .map(|idx| builds[*idx].span().clone())
                    .unwrap_or_default();
                return Err(EvalError::Cycle {
                    build: stuck
                        .first()
                        .map(|idx| builds[*idx].rule().name().to_string())
                        .unwrap_or_default(),
                    cycle: vec![file],
                    span,
                });
            }
            Err(e) => return Err(EvalError::semantic(e.to_string(), &Span::builtin())),
        };

        let mut files: Vec<Rc<File>> = canonical.into_values().collect();
        files.sort_by_key(|f| f.full_name());

        Ok(Dag {
            files,
            rules: self.rules.into_values().collect(),
            builds,
            order,
            producers: self.producers,
            variables,
            targets,
        })
    }

    fn add_directory_builds(&mut self) -> Result<(), EvalError> {
        let mut directories = BTreeSet::new();
        for build in &self.builds {
            for output in build.outputs() {
                if output.is_absolute() {
                    continue;
                }
                let mut dir = output.subdir();
                while !dir.is_empty() && dir != "/" {
                    directories.insert(dir.to_string());
                    dir = path::directory_of(dir);
                }
            }
        }
        if directories.is_empty() {
            return Ok(());
        }

        let rule = Rc::new(Rule::mkdir()?);
        let name = self.unique_rule_name(rule.name());
        let rule = match name == rule.name() {
            true => rule,
            false => Rc::new(rule.renamed(&name)),
        };
        self.add_rule(&rule)?;

        for dir in directories {
            let span = Span::builtin();
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "directory".to_string(),
                Value::from(File::dir(&dir, true, &span)),
            );
            let build = Build::create(&rule, arguments, &span)?;
            self.add_build(build)?;
        }
        Ok(())
    }

    fn add_regeneration_build(&mut self, regeneration: &Regeneration) -> Result<(), EvalError> {
        let span = Span::builtin();
        let (root, others) = match regeneration.inputs.split_first() {
            Some(split) => split,
            None => {
                return Err(EvalError::semantic(
                    "regeneration requires at least one input",
                    &span,
                ))
            }
        };

        let rule = Rc::new(Rule::regeneration(&regeneration.command)?);
        self.add_rule(&rule)?;

        let files = |names: &[String]| -> Result<Value, EvalError> {
            let files = names
                .iter()
                .map(|n| Ok(Value::from(File::from_path(n, &span)?)))
                .collect::<Result<Vec<Value>, EvalError>>()?;
            Value::list(Type::file(), files, &span)
        };

        let mut arguments = BTreeMap::new();
        arguments.insert(
            "rootInput".to_string(),
            Value::from(File::from_path(root, &span)?),
        );
        arguments.insert("otherInputs".to_string(), files(others)?);
        arguments.insert("output".to_string(), files(&regeneration.outputs)?);
        let build = Build::create(&rule, arguments, &span)?;
        self.add_build(build)?;
        Ok(())
    }
}

/// The finished dependency graph, handed read-only to backends.
#[derive(Debug, Clone)]
pub struct Dag {
    files: Vec<Rc<File>>,
    rules: Vec<Rc<Rule>>,
    builds: Vec<Rc<Build>>,
    order: Vec<usize>,
    producers: BTreeMap<String, usize>,
    variables: IndexMap<String, Value>,
    targets: IndexMap<String, Value>,
}

impl Dag {
    /// Every file, sorted by full name.
    pub fn files(&self) -> &[Rc<File>] {
        &self.files
    }

    /// Rules in the order they were declared.
    pub fn rules(&self) -> &[Rc<Rule>] {
        &self.rules
    }

    /// Builds in the order they were inserted.
    pub fn builds(&self) -> &[Rc<Build>] {
        &self.builds
    }

    /// Builds such that each comes after the producers of its inputs.
    pub fn topological_order(&self) -> impl Iterator<Item = &Rc<Build>> {
        self.order.iter().map(|idx| &self.builds[*idx])
    }

    /// Top-level values that do not refer to files.
    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }

    /// Top-level values that refer to files.
    pub fn targets(&self) -> &IndexMap<String, Value> {
        &self.targets
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).or_else(|| self.targets.get(name))
    }

    pub fn file(&self, relative_name: &str) -> Option<&Rc<File>> {
        self.files
            .iter()
            .find(|f| f.relative_name() == relative_name)
    }

    /// The build producing `relative_name`, if any.
    pub fn producer(&self, relative_name: &str) -> Option<&Rc<Build>> {
        self.producers
            .get(relative_name)
            .map(|idx| &self.builds[*idx])
    }

    pub fn accept(&self, visitor: &mut dyn Visitor) -> Result<()> {
        for file in &self.files {
            visitor.visit_file(file)?;
        }
        for rule in &self.rules {
            visitor.visit_rule(rule)?;
        }
        for build in self.topological_order() {
            visitor.visit_build(build)?;
        }
        for (name, value) in &self.variables {
            visitor.visit_value(name, value, false)?;
        }
        for (name, value) in &self.targets {
            visitor.visit_value(name, value, true)?;
        }
        Ok(())
    }
}

fn is_empty<T>(map: &&BTreeMap<String, T>) -> bool {
    map.is_empty()
}

#[derive(Serialize)]
struct FileDump<'a> {
    name: String,
    fullname: String,
    generated: bool,
    #[serde(skip_serializing_if = "is_empty")]
    attributes: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct ParameterDump {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Serialize)]
struct RuleDump<'a> {
    name: &'a str,
    command: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    arguments: &'a BTreeMap<String, String>,
    parameters: Vec<ParameterDump>,
}

#[derive(Serialize)]
struct BuildDump<'a> {
    rule: &'a str,
    inputs: Vec<String>,
    outputs: Vec<String>,
    command: String,
    description: String,
    arguments: &'a BTreeMap<String, Value>,
}

impl Serialize for Dag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let files: Vec<FileDump<'_>> = self
            .files
            .iter()
            .map(|f| FileDump {
                name: f.relative_name(),
                fullname: f.full_name(),
                generated: f.is_generated(),
                attributes: f.attributes(),
            })
            .collect();

        let rules: Vec<RuleDump<'_>> = self
            .rules
            .iter()
            .map(|r| RuleDump {
                name: r.name(),
                command: r.command(),
                description: r.description(),
                arguments: r.arguments(),
                parameters: r
                    .parameters()
                    .iter()
                    .map(|p| ParameterDump {
                        name: p.name.to_string(),
                        ty: p.ty.to_string(),
                    })
                    .collect(),
            })
            .collect();

        let builds: Vec<BuildDump<'_>> = self
            .topological_order()
            .map(|b| BuildDump {
                rule: b.rule().name(),
                inputs: b.inputs().iter().map(|f| f.relative_name()).collect(),
                outputs: b.outputs().iter().map(|f| f.relative_name()).collect(),
                command: b.command(),
                description: b.description(),
                arguments: b.arguments(),
            })
            .collect();

        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("files", &files)?;
        map.serialize_entry("rules", &rules)?;
        map.serialize_entry("builds", &builds)?;
        map.serialize_entry("variables", &self.variables)?;
        map.serialize_entry("targets", &self.targets)?;
        map.end()
    }
}
