// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::dag::{File, Rule};
use crate::error::EvalError;
use crate::source::Span;
use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use std::collections::BTreeMap;

/// One instantiation of a rule over concrete files.
#[derive(Debug, Clone, PartialEq)]
pub struct Build {
    rule: Rc<Rule>,
    inputs: Vec<Rc<File>>,
    outputs: Vec<Rc<File>>,
    arguments: BTreeMap<String, Value>,
    span: Span,
}

impl Build {
    /// Bind `arguments` (already matched to parameter names) to `rule`.
    ///
    /// Missing arguments take the parameter's default. Files passed to
    /// `file[in]` parameters become inputs, files passed to `file[out]`
    /// parameters become generated outputs.
    pub fn create(
        rule: &Rc<Rule>,
        mut arguments: BTreeMap<String, Value>,
        span: &Span,
    ) -> Result<Build, EvalError> {
        for name in arguments.keys() {
            if rule.parameter(name).is_none() {
                return Err(EvalError::argument(
                    format!("invalid parameter '{name}' for action '{}'", rule.name()),
                    span,
                ));
            }
        }

        let mut inputs = vec![];
        let mut outputs = vec![];

        for param in rule.parameters() {
            let arg = match arguments.get(param.name.as_ref()) {
                Some(a) => a.clone(),
                None => match &param.default {
                    Some(d) => d.clone(),
                    None => {
                        return Err(EvalError::UndefinedValue {
                            name: param.name.clone(),
                            declared: param.span.clone(),
                            span: span.clone(),
                        })
                    }
                },
            };
            arg.ensure_resolved(span)?;
            arg.ty().check_subtype(&param.ty, span)?;
            let arg = arg.widen_to(&param.ty);

            let arg = match param.ty.is_output() {
                true => arg.try_map_files(&|f| Ok(Rc::new(f.with_generated(span)?)))?,
                false => arg,
            };

            if param.ty.is_input() {
                inputs.extend(arg.files());
            } else if param.ty.is_output() {
                outputs.extend(arg.files());
            }
            arguments.insert(param.name.to_string(), arg);
        }

        if outputs.is_empty() {
            return Err(EvalError::argument(
                "build does not produce any output files",
                span,
            ));
        }

        Ok(Build {
            rule: rule.clone(),
            inputs,
            outputs,
            arguments,
            span: span.clone(),
        })
    }

    /// The value a build call evaluates to: its only output, or the list of
    /// its outputs.
    pub fn value(&self) -> Value {
        match self.rule.ty() {
            Type::Function { result, .. } if result.is_file() && self.outputs.len() == 1 => {
                Value::File(self.outputs[0].clone())
            }
            _ => Value::List(Rc::new(crate::value::List {
                element: Type::file(),
                items: self.outputs.iter().cloned().map(Value::File).collect(),
            })),
        }
    }

    /// The same build with every file replaced through `canonical`.
    pub(crate) fn map_files(
        &self,
        canonical: &dyn Fn(&Rc<File>) -> Rc<File>,
    ) -> Result<Build, EvalError> {
        let arguments = self
            .arguments
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.try_map_files(&|f| Ok(canonical(f)))?)))
            .collect::<Result<BTreeMap<String, Value>, EvalError>>()?;
        Ok(Build {
            rule: self.rule.clone(),
            inputs: self.inputs.iter().map(canonical).collect(),
            outputs: self.outputs.iter().map(canonical).collect(),
            arguments,
            span: self.span.clone(),
        })
    }

    pub fn rule(&self) -> &Rc<Rule> {
        &self.rule
    }

    pub fn inputs(&self) -> &[Rc<File>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Rc<File>] {
        &self.outputs
    }

    /// Every parameter's value, including defaults.
    pub fn arguments(&self) -> &BTreeMap<String, Value> {
        &self.arguments
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Substitute `${name}` references to this build's arguments.
    ///
    /// References to names that are not arguments are left in place for
    /// the backend (e.g. `${srcroot}`).
    pub fn expand(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len());
        let mut rest = pattern;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.arguments.get(name) {
                        Some(v) => out.push_str(&v.render()),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    pub fn command(&self) -> String {
        self.expand(self.rule.command())
    }

    pub fn description(&self) -> String {
        self.expand(self.rule.description())
    }
}
