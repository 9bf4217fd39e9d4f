// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::EvalError;
use crate::source::Span;
use crate::types::Type;
use crate::value::Parameter;
use crate::Rc;

use std::collections::BTreeMap;

/// Name of the rule that regenerates the build files themselves.
pub const REGENERATION_RULE: &str = "_fabrique_regenerate";

/// A command template from which builds are instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    name: Rc<str>,
    command: String,
    description: String,
    arguments: BTreeMap<String, String>,
    parameters: Vec<Parameter>,
    ty: Type,
    span: Span,
}

impl Rule {
    /// Create a rule. `description` is taken from `arguments` and defaults
    /// to the command. Every file-typed parameter must be tagged `in` or
    /// `out`.
    pub fn new(
        name: &str,
        command: &str,
        mut arguments: BTreeMap<String, String>,
        parameters: Vec<Parameter>,
        span: &Span,
    ) -> Result<Rule, EvalError> {
        for p in &parameters {
            if p.ty.is_file_or_files() && !p.ty.is_input() && !p.ty.is_output() {
                return Err(EvalError::Type {
                    message: format!(
                        "file parameter '{}' must be tagged in or out, found {}",
                        p.name, p.ty
                    ),
                    expected: None,
                    found: Some(p.ty.clone()),
                    span: p.span.clone(),
                });
            }
        }

        let description = arguments
            .remove("description")
            .unwrap_or_else(|| command.to_string());

        let outputs: Vec<&Parameter> = parameters.iter().filter(|p| p.ty.is_output()).collect();
        let result = match outputs.as_slice() {
            [single] if single.ty.is_file() => Type::file(),
            _ => Type::list(Type::file()),
        };
        let ty = Type::function(parameters.iter().map(|p| p.ty.clone()).collect(), result);

        Ok(Rule {
            name: name.into(),
            command: command.to_string(),
            description,
            arguments,
            parameters,
            ty,
            span: span.clone(),
        })
    }

    /// `mkdir` rule used for generated output directories.
    pub fn mkdir() -> Result<Rule, EvalError> {
        let mut arguments = BTreeMap::new();
        arguments.insert(
            "description".to_string(),
            "Creating ${directory}".to_string(),
        );
        Rule::new(
            "mkdir",
            "mkdir -p ${directory}",
            arguments,
            vec![Parameter::new("directory", Type::output_file())],
            &Span::builtin(),
        )
    }

    /// Rule that reruns the generator when a build description changes.
    pub fn regeneration(command: &str) -> Result<Rule, EvalError> {
        let mut arguments = BTreeMap::new();
        arguments.insert(
            "description".to_string(),
            "Regenerating ${output}".to_string(),
        );
        arguments.insert("pool".to_string(), "console".to_string());
        Rule::new(
            REGENERATION_RULE,
            &format!("{command} ${{rootInput}}"),
            arguments,
            vec![
                Parameter::new("rootInput", Type::input_file()),
                Parameter::new("otherInputs", Type::list(Type::input_file())),
                Parameter::new("output", Type::list(Type::output_file())),
            ],
            &Span::builtin(),
        )
    }

    /// The same rule under another name.
    pub fn renamed(&self, name: &str) -> Rule {
        Rule {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rule variables other than the command and description.
    pub fn arguments(&self) -> &BTreeMap<String, String> {
        &self.arguments
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name.as_ref() == name)
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
