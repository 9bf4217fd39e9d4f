// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins::Builtin;
use crate::dag::{Build, Rule};
use crate::error::EvalError;
use crate::interpreter::{concrete, Interpreter, Result};
use crate::plugin::NativeFunction;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::Type;
use crate::utils::is_reserved;
use crate::value::{Callable, Closure, Parameter, Placeholder, Value};
use crate::Rc;

use std::collections::BTreeMap;

use log::debug;

struct CallArgs {
    positional: Vec<(Value, Span)>,
    named: Vec<(Ident, Value, Span)>,
}

// Arguments matched to parameter slots, plus keywords that matched no
// parameter.
struct Matched {
    slots: Vec<Option<(Value, Span)>>,
    extra: BTreeMap<String, Value>,
}

fn match_arguments(
    callee: &str,
    names: &[&str],
    args: CallArgs,
    allow_extra: bool,
    span: &Span,
) -> Result<Matched> {
    if args.positional.len() > names.len() {
        return Err(EvalError::argument(
            format!(
                "too many positional arguments to '{callee}' (expected at most {}, got {})",
                names.len(),
                args.positional.len()
            ),
            span,
        ));
    }

    let mut slots: Vec<Option<(Value, Span)>> = vec![None; names.len()];
    for (idx, arg) in args.positional.into_iter().enumerate() {
        slots[idx] = Some(arg);
    }

    let mut extra = BTreeMap::new();
    for (name, value, arg_span) in args.named {
        let span = name.span_or(&arg_span);
        match names.iter().position(|n| *n == name.name.as_ref()) {
            Some(idx) if slots[idx].is_some() => {
                return Err(EvalError::argument(
                    format!("redefining '{}'", name.name),
                    span,
                ))
            }
            Some(idx) => slots[idx] = Some((value, arg_span)),
            None if allow_extra => {
                if extra.insert(name.name.to_string(), value).is_some() {
                    return Err(EvalError::argument(
                        format!("redefining '{}'", name.name),
                        span,
                    ));
                }
            }
            None => {
                return Err(EvalError::argument(
                    format!("invalid parameter '{}' for '{callee}'", name.name),
                    span,
                ))
            }
        }
    }

    Ok(Matched { slots, extra })
}

/// Check an argument against its parameter type and adapt it.
fn bind(value: Value, expected: &Type, span: &Span) -> Result<Value> {
    value.ty().check_subtype(expected, span)?;
    Ok(value.widen_to(expected))
}

impl Interpreter {
    pub(super) fn eval_call(
        &mut self,
        callee: &ExprRef,
        args: &[Argument],
        span: &Span,
    ) -> Result<Value> {
        let callable = match self.eval_expr(callee)? {
            Value::Callable(c) => c,
            Value::Unresolved(p) => {
                return Err(EvalError::type_error(
                    format!("cannot call '{}' which has no value", p.name),
                    span,
                ))
            }
            other => {
                return Err(EvalError::type_error(
                    format!("cannot call a value of type {}", other.ty()),
                    span,
                ))
            }
        };

        let mut call_args = CallArgs {
            positional: vec![],
            named: vec![],
        };
        for arg in args {
            let value = self.eval_expr(&arg.value)?;
            let arg_span = match arg.span.is_builtin() {
                true => arg.value.span().clone(),
                false => arg.span.clone(),
            };
            match &arg.name {
                Some(name) => call_args.named.push((name.clone(), value, arg_span)),
                None if !call_args.named.is_empty() => {
                    return Err(EvalError::argument(
                        "positional argument after keywords",
                        &arg_span,
                    ))
                }
                None => call_args.positional.push((value, arg_span)),
            }
        }

        debug!("calling {}", callable.name());
        match callable {
            Callable::Function(f) => self.call_function(&f, call_args, span),
            Callable::Builtin(b) => self.call_builtin(b, call_args, span),
            Callable::Native(n) => self.call_native(n.as_ref(), call_args, span),
            Callable::Rule(r) => self.call_rule(&r, call_args, span),
        }
    }

    fn call_function(&mut self, f: &Rc<Closure>, args: CallArgs, span: &Span) -> Result<Value> {
        let callee = f.name.as_deref().unwrap_or("function").to_string();
        let names: Vec<&str> = f.params.iter().map(|p| p.name.as_ref()).collect();
        let matched = match_arguments(&callee, &names, args, false, span)?;

        let mut scope = Scope::child(&callee, f.scope.clone());
        for (param, slot) in f.params.iter().zip(matched.slots) {
            let value = match slot {
                Some((v, arg_span)) => bind(v, &param.ty, &arg_span)?,
                None => match &param.default {
                    Some(d) => d.clone(),
                    None => Value::Unresolved(Rc::new(Placeholder {
                        name: param.name.clone(),
                        ty: param.ty.clone(),
                        declared: param.span.clone(),
                    })),
                },
            };
            scope.define(&param.name, value, &param.span)?;
        }

        let saved = std::mem::replace(&mut self.scope, Rc::new(scope));
        let result = self.eval_expr(&f.body);
        self.scope = saved;

        let result = result?;
        result.ty().check_subtype(&f.result, f.body.span())?;
        Ok(result.widen_to(&f.result))
    }

    fn call_builtin(
        &mut self,
        b: &'static Builtin,
        args: CallArgs,
        span: &Span,
    ) -> Result<Value> {
        let names: Vec<&str> = b.params.iter().map(|(n, _)| *n).collect();
        let matched = match_arguments(b.name, &names, args, b.extra_keywords, span)?;

        let mut values = vec![];
        for ((name, ty), slot) in b.params.iter().zip(matched.slots) {
            let value = match slot {
                Some((v, arg_span)) => {
                    v.ensure_resolved(&arg_span)?;
                    match ty {
                        Type::Nil => v,
                        _ => bind(v, ty, &arg_span)?,
                    }
                }
                None => match ty {
                    Type::Optional { inner } => Value::none(inner.as_ref().clone()),
                    _ => {
                        return Err(EvalError::argument(
                            format!("missing argument '{name}' to '{}'", b.name),
                            span,
                        ))
                    }
                },
            };
            values.push(value);
        }
        for v in matched.extra.values() {
            v.ensure_resolved(span)?;
        }

        let result = (b.fcn)(span, &self.scope, &values, &matched.extra)?;
        self.add_files(&result);
        Ok(result)
    }

    fn call_native(
        &mut self,
        n: &dyn NativeFunction,
        args: CallArgs,
        span: &Span,
    ) -> Result<Value> {
        let name = n.name();
        let types = n.parameter_types();
        let declared = n.parameter_names();
        let names: Vec<String> = match declared.len() == types.len() {
            true => declared,
            false => {
                if let Some((ident, _, arg_span)) = args.named.first() {
                    return Err(EvalError::argument(
                        format!("native '{name}' only accepts positional arguments"),
                        ident.span_or(arg_span),
                    ));
                }
                (0..types.len()).map(|i| format!("#{i}")).collect()
            }
        };
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let matched = match_arguments(&name, &names, args, false, span)?;

        let mut values = vec![];
        for ((param, ty), slot) in names.iter().zip(types.iter()).zip(matched.slots) {
            let value = match slot {
                Some((v, arg_span)) => {
                    v.ensure_resolved(&arg_span)?;
                    bind(v, ty, &arg_span)?
                }
                None => match ty {
                    Type::Optional { inner } => Value::none(inner.as_ref().clone()),
                    _ => {
                        return Err(EvalError::argument(
                            format!("missing argument '{param}' to native '{name}'"),
                            span,
                        ))
                    }
                },
            };
            values.push(value);
        }

        let result = match n.invoke(&values) {
            Ok(r) => r,
            Err(e) => {
                return Err(EvalError::semantic(
                    format!("native '{name}' failed: {e}"),
                    span,
                ))
            }
        };

        let expected = n.return_type();
        if !result.ty().is_subtype(&expected) {
            return Err(EvalError::semantic(
                format!(
                    "native '{name}' returned a value of type {}, expected {expected}",
                    result.ty()
                ),
                span,
            ));
        }
        let result = result.widen_to(&expected);
        self.add_files(&result);
        Ok(result)
    }

    fn call_rule(&mut self, rule: &Rc<Rule>, args: CallArgs, span: &Span) -> Result<Value> {
        let names: Vec<&str> = rule.parameters().iter().map(|p| p.name.as_ref()).collect();
        let matched = match_arguments(rule.name(), &names, args, false, span)?;

        let mut arguments = BTreeMap::new();
        for (name, slot) in names.iter().zip(matched.slots) {
            if let Some((v, _)) = slot {
                arguments.insert(name.to_string(), v);
            }
        }

        let build = Build::create(rule, arguments, span)?;
        let build = self.dag.add_build(build)?;
        Ok(build.value())
    }

    /// Declared parameters, with defaults evaluated in the current scope.
    pub(super) fn eval_parameters(&mut self, params: &[Ref<ParamDecl>]) -> Result<Vec<Parameter>> {
        let mut parameters: Vec<Parameter> = vec![];
        for p in params {
            let span = p.name.span_or(&p.span);
            if is_reserved(&p.name.name) {
                return Err(EvalError::DuplicateBinding {
                    name: p.name.name.clone(),
                    span: span.clone(),
                    previous: Some(Span::builtin()),
                });
            }
            if let Some(previous) = parameters.iter().find(|q| q.name == p.name.name) {
                return Err(EvalError::DuplicateBinding {
                    name: p.name.name.clone(),
                    span: span.clone(),
                    previous: Some(previous.span.clone()),
                });
            }

            let ty = self.resolve_type(&p.ty, span)?;
            let default = match &p.default {
                Some(d) => {
                    let value = self.eval_expr(d)?;
                    Some(bind(value, &ty, d.span())?)
                }
                None => None,
            };
            parameters.push(Parameter {
                name: p.name.name.clone(),
                ty,
                default,
                span: span.clone(),
            });
        }
        Ok(parameters)
    }

    pub(super) fn eval_function(
        &mut self,
        params: &[Ref<ParamDecl>],
        result: &TypeExpr,
        body: &ExprRef,
        span: &Span,
    ) -> Result<Value> {
        let params = self.eval_parameters(params)?;
        let result = self.resolve_type(result, span)?;
        let name = self.current_name();
        debug!(
            "defining function {} at {span}",
            name.as_deref().unwrap_or("<anonymous>")
        );
        Ok(Value::Callable(Callable::Function(Rc::new(Closure {
            name: name.map(Rc::from),
            params,
            result,
            body: body.clone(),
            scope: self.scope.clone(),
            span: span.clone(),
        }))))
    }

    /// `action('command', description = '...', var = value... <- params)`
    pub(super) fn eval_action(
        &mut self,
        args: &[Argument],
        params: &[Ref<ParamDecl>],
        span: &Span,
    ) -> Result<Value> {
        let mut command = None;
        let mut arguments = BTreeMap::new();

        for (idx, arg) in args.iter().enumerate() {
            let value = concrete(self.eval_expr(&arg.value)?, &arg.span)?;
            let key = match &arg.name {
                Some(n) => n.name.to_string(),
                None if idx == 0 => "command".to_string(),
                None => {
                    return Err(EvalError::argument(
                        "action takes a single positional argument (the command)",
                        &arg.span,
                    ))
                }
            };

            if key == "command" {
                if command.is_some() {
                    return Err(EvalError::argument("redefining 'command'", &arg.span));
                }
                command = match value {
                    Value::Str(s) => Some(s),
                    other => {
                        return Err(EvalError::type_mismatch(
                            &Type::String,
                            &other.ty(),
                            &arg.span,
                        ))
                    }
                };
            } else if arguments.insert(key.clone(), value.render()).is_some() {
                return Err(EvalError::argument(
                    format!("redefining '{key}'"),
                    &arg.span,
                ));
            }
        }

        let command = match command {
            Some(c) => c,
            None => return Err(EvalError::argument("action requires a command", span)),
        };

        let params = self.eval_parameters(params)?;
        let base = self.current_name().unwrap_or_else(|| "action".to_string());
        let name = self.dag.unique_rule_name(&base);
        let rule = Rc::new(Rule::new(&name, &command, arguments, params, span)?);
        self.dag.add_rule(&rule)?;
        Ok(Value::Callable(Callable::Rule(rule)))
    }
}
