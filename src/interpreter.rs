// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod calls;
mod loops;
mod operators;

use crate::ast::*;
use crate::builtins::files::current_subdir;
use crate::dag::{DagBuilder, File};
use crate::error::EvalError;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::Type;
use crate::utils::dotted;
use crate::utils::path;
use crate::value::Value;
use crate::Rc;

use std::collections::BTreeMap;

use log::{debug, info};

/// Evaluates programs into a dependency graph.
///
/// Evaluation is a single depth-first walk. An error aborts the top-level
/// declaration being evaluated; evaluation then continues with the next
/// one unless `fail_fast` is set.
pub struct Interpreter {
    scope: Rc<Scope>,
    dag: DagBuilder,
    // Path of the value being defined, e.g. `["compilers", "cc"]`.
    names: Vec<Rc<str>>,
    errors: Vec<EvalError>,
    fail_fast: bool,
}

type Result<T> = std::result::Result<T, EvalError>;

impl Interpreter {
    /// `globals` holds the builtins, reserved names and plugins.
    pub fn new(globals: Rc<Scope>) -> Interpreter {
        Interpreter {
            scope: globals,
            dag: DagBuilder::new(),
            names: vec![],
            errors: vec![],
            fail_fast: false,
        }
    }

    pub fn set_fail_fast(&mut self, fail_fast: bool) {
        self.fail_fast = fail_fast;
    }

    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    /// Stop evaluating further programs?
    pub fn should_stop(&self) -> bool {
        self.fail_fast && !self.errors.is_empty()
    }

    pub fn into_parts(self) -> (DagBuilder, Vec<EvalError>) {
        (self.dag, self.errors)
    }

    /// Evaluate every top-level declaration of `program` in a scope of its
    /// own. `subdir` and `builddir` name the program's directory.
    pub fn eval_program(&mut self, program: &Program) {
        let file = program.file.as_deref().unwrap_or("<input>");
        info!("evaluating {file}");

        let span = Span::new(file, 1, 1);
        let dir = match &program.file {
            Some(f) => path::directory_of(f).to_string(),
            None => String::new(),
        };

        let globals = self.scope.clone();
        let mut scope = Scope::child(file, globals.clone());
        let reserved = [
            ("subdir", Value::from(File::dir(&dir, false, &span))),
            ("builddir", Value::from(File::dir(&dir, true, &span))),
        ];
        for (name, value) in reserved {
            if let Err(e) = scope.define_reserved(name, value, &Span::builtin()) {
                self.errors.push(e);
                return;
            }
        }
        self.scope = Rc::new(scope);

        for decl in &program.values {
            if let Err(e) = self.eval_top_level(decl) {
                debug!("{e}");
                self.errors.push(e);
                if self.fail_fast {
                    break;
                }
            }
        }

        self.scope = globals;
        info!(
            "finished {file}: {} builds, {} errors",
            self.dag.builds().len(),
            self.errors.len()
        );
    }

    fn eval_top_level(&mut self, decl: &ValueDecl) -> Result<()> {
        let name = match &decl.name {
            Some(n) => n,
            None => {
                debug!("evaluating anonymous value at {}", decl.span);
                self.eval_value_decl(decl)?;
                return Ok(());
            }
        };

        debug!("evaluating {}", name.name);
        self.names.push(name.name.clone());
        let value = self.eval_value_decl(decl);
        self.names.pop();
        let value = value?;

        let span = name.span_or(&decl.span);
        value.ensure_resolved(span)?;
        // Top-level names are unique across programs.
        self.dag.check_undefined(&name.name, span)?;
        Rc::make_mut(&mut self.scope).define(&name.name, value.clone(), span)?;
        self.dag.define(&name.name, value, span)
    }

    fn eval_value_decl(&mut self, decl: &ValueDecl) -> Result<Value> {
        let value = self.eval_expr(&decl.value)?;
        match &decl.ty {
            Some(t) => {
                let ty = self.resolve_type(t, &decl.span)?;
                value.ty().check_subtype(&ty, &decl.span)?;
                Ok(value.widen_to(&ty))
            }
            None => Ok(value),
        }
    }

    /// Evaluate declarations into the current scope, in order.
    fn eval_local_decls(&mut self, decls: &[Ref<ValueDecl>]) -> Result<Vec<(Rc<str>, Value)>> {
        let mut values = vec![];
        for decl in decls {
            let name = match &decl.name {
                Some(n) => n,
                None => {
                    self.eval_value_decl(decl)?;
                    continue;
                }
            };
            self.names.push(name.name.clone());
            let value = self.eval_value_decl(decl);
            self.names.pop();
            let value = value?;

            let span = name.span_or(&decl.span);
            Rc::make_mut(&mut self.scope).define(&name.name, value.clone(), span)?;
            values.push((name.name.clone(), value));
        }
        Ok(values)
    }

    /// Make a child of the current scope current. Returns the scope to
    /// restore with [`Interpreter::leave`].
    fn enter(&mut self, name: &str) -> Rc<Scope> {
        let parent = self.scope.clone();
        debug!("entering scope {name} at depth {}", parent.depth() + 1);
        self.scope = Rc::new(Scope::child(name, parent.clone()));
        parent
    }

    fn leave(&mut self, parent: Rc<Scope>) {
        debug!("leaving scope {}", self.scope.name());
        self.scope = parent;
    }

    /// Dotted name of the value being defined.
    fn current_name(&self) -> Option<String> {
        match self.names.is_empty() {
            true => None,
            false => Some(
                self.names
                    .iter()
                    .fold(String::new(), |acc, n| dotted(&acc, n)),
            ),
        }
    }

    fn add_files(&mut self, value: &Value) {
        for file in value.files() {
            self.dag.add_file(&file);
        }
    }

    fn eval_expr(&mut self, expr: &ExprRef) -> Result<Value> {
        match expr.as_ref() {
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Filename { span, name } => self.eval_filename(name, span),
            Expr::Files { span, names, args } => self.eval_files(names, args, span),
            Expr::Name { span, name } => self.scope.lookup(name, span),
            Expr::List { span, items } => {
                let items = items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<Result<Vec<Value>>>()?;
                Value::infer_list(items, span)
            }
            Expr::Record { span, fields } => self.eval_record(fields, span),
            Expr::Field { span, base, field } => {
                let base = self.eval_expr(base)?;
                self.eval_field(&base, field, span)
            }
            Expr::FieldQuery {
                span,
                base,
                field,
                default,
            } => self.eval_field_query(base, field, default, span),
            Expr::Binary { span, op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, span),
            Expr::Unary { span, op, operand } => self.eval_unary(*op, operand, span),
            Expr::If {
                span,
                condition,
                then,
                otherwise,
            } => {
                let condition = concrete(self.eval_expr(condition)?, span)?;
                match condition {
                    Value::Bool(true) => self.eval_expr(then),
                    Value::Bool(false) => self.eval_expr(otherwise),
                    other => Err(EvalError::type_mismatch(&Type::Bool, &other.ty(), span)),
                }
            }
            Expr::Foreach {
                span,
                var,
                index,
                ty,
                sequence,
                body,
            } => self.eval_foreach(var, index.as_ref(), ty.as_ref(), sequence, body, span),
            Expr::Function {
                span,
                params,
                result,
                body,
            } => self.eval_function(params, result, body, span),
            Expr::Action { span, args, params } => self.eval_action(args, params, span),
            Expr::Call { span, callee, args } => self.eval_call(callee, args, span),
            Expr::Compound {
                values, result, ..
            } => {
                let saved = self.enter("compound");
                let value = match self.eval_local_decls(values) {
                    Ok(_) => self.eval_expr(result),
                    Err(e) => Err(e),
                };
                self.leave(saved);
                value
            }
            Expr::Some { value, .. } => Ok(Value::some(self.eval_expr(value)?)),
            Expr::None { span, ty } => match ty {
                Some(t) => Ok(Value::none(self.resolve_type(t, span)?)),
                None => Ok(Value::none(Type::Nil)),
            },
            Expr::Type { span, ty } => Ok(Value::Type(self.resolve_type(ty, span)?)),
        }
    }

    fn eval_filename(&mut self, name: &str, span: &Span) -> Result<Value> {
        let subdir = current_subdir(&self.scope, span)?;
        let file = Rc::new(File::create(&subdir, name, BTreeMap::new(), span, false)?);
        self.dag.add_file(&file);
        Ok(Value::File(file))
    }

    // `files(a.c b.c, subdir = d, attr = value...)`
    fn eval_files(&mut self, names: &[Rc<str>], args: &[Argument], span: &Span) -> Result<Value> {
        let mut subdir = None;
        let mut attributes = BTreeMap::new();
        for arg in args {
            let name = match &arg.name {
                Some(n) => n,
                None => {
                    return Err(EvalError::argument(
                        "files() only takes keyword arguments after the filenames",
                        &arg.span,
                    ))
                }
            };
            let value = concrete(self.eval_expr(&arg.value)?, &arg.span)?;
            if name.name.as_ref() == "subdir" {
                if subdir.is_some() {
                    return Err(EvalError::argument("redefining 'subdir'", &arg.span));
                }
                subdir = match value {
                    Value::File(f) => Some(f.relative_name()),
                    Value::Str(s) => Some(path::join_path(&current_subdir(&self.scope, span)?, &s)),
                    other => {
                        return Err(EvalError::type_mismatch(&Type::file(), &other.ty(), &arg.span))
                    }
                };
            } else if attributes
                .insert(name.name.to_string(), value)
                .is_some()
            {
                return Err(EvalError::argument(
                    format!("redefining '{}'", name.name),
                    &arg.span,
                ));
            }
        }

        let subdir = match subdir {
            Some(s) => s,
            None => current_subdir(&self.scope, span)?,
        };
        let mut files = vec![];
        for name in names {
            let file = Rc::new(File::create(&subdir, name, attributes.clone(), span, false)?);
            self.dag.add_file(&file);
            files.push(Value::File(file));
        }
        Value::list(Type::file(), files, span)
    }

    fn eval_record(&mut self, fields: &[Ref<ValueDecl>], span: &Span) -> Result<Value> {
        let saved = self.enter("record");
        let values = self.eval_local_decls(fields);
        self.leave(saved);
        Value::record(values?, span)
    }

    fn eval_field(&mut self, base: &Value, field: &Ident, span: &Span) -> Result<Value> {
        let base = concrete(base.clone(), span)?;
        if !base.has_fields() {
            return Err(EvalError::type_error(
                format!("value of type {} has no fields", base.ty()),
                span,
            ));
        }
        if let Value::Maybe(m) = &base {
            if m.value.is_none() && field.name.as_ref() == "value" {
                return Err(EvalError::Type {
                    message: format!("optional value of type {} is absent", m.inner),
                    expected: Some(m.inner.clone()),
                    found: Some(Type::Nil),
                    span: span.clone(),
                });
            }
        }
        match base.field(&field.name) {
            Some(v) => Ok(v),
            None => Err(EvalError::NoSuchField {
                field: field.name.clone(),
                ty: base.ty(),
                span: field.span_or(span).clone(),
            }),
        }
    }

    // `base.field ? default`
    fn eval_field_query(
        &mut self,
        base: &ExprRef,
        field: &Ident,
        default: &ExprRef,
        span: &Span,
    ) -> Result<Value> {
        let base = concrete(self.eval_expr(base)?, span)?;
        let default = self.eval_expr(default)?;
        if !base.has_fields() {
            return Err(EvalError::type_error(
                format!("value of type {} has no fields", base.ty()),
                span,
            ));
        }
        match base.field(&field.name) {
            Some(v) => {
                crate::types::check_compatible(&v.ty(), &default.ty(), span)?;
                Ok(v)
            }
            None => Ok(default),
        }
    }

    /// Resolve a type annotation. Names other than the primitive types must
    /// be bound to `type` values.
    pub(crate) fn resolve_type(&self, t: &TypeExpr, span: &Span) -> Result<Type> {
        Ok(match t {
            TypeExpr::Named(name) => match name.as_ref() {
                "bool" => Type::Bool,
                "int" => Type::Int,
                "string" => Type::String,
                "file" => Type::file(),
                "nil" => Type::Nil,
                _ => match self.scope.lookup(name, span)? {
                    Value::Type(t) => t,
                    other => {
                        return Err(EvalError::type_error(
                            format!("'{name}' is a value of type {}, not a type", other.ty()),
                            span,
                        ))
                    }
                },
            },
            TypeExpr::File(tag) => Type::File { tag: *tag },
            TypeExpr::List(e) => Type::list(self.resolve_type(e, span)?),
            TypeExpr::Maybe(e) => Type::optional(self.resolve_type(e, span)?),
            TypeExpr::Record(fields) => {
                let mut resolved = vec![];
                for (name, t) in fields {
                    if resolved.iter().any(|(n, _): &(String, Type)| n == name.as_ref()) {
                        return Err(EvalError::DuplicateBinding {
                            name: name.clone(),
                            span: span.clone(),
                            previous: None,
                        });
                    }
                    resolved.push((name.to_string(), self.resolve_type(t, span)?));
                }
                Type::record(resolved)
            }
            TypeExpr::Function(params, result) => Type::function(
                params
                    .iter()
                    .map(|p| self.resolve_type(p, span))
                    .collect::<Result<Vec<Type>>>()?,
                self.resolve_type(result, span)?,
            ),
        })
    }
}

/// Fail with `UndefinedValueError` if `value` is an unbound parameter.
fn concrete(value: Value, span: &Span) -> Result<Value> {
    match value {
        Value::Unresolved(p) => Err(EvalError::UndefinedValue {
            name: p.name.clone(),
            declared: p.declared.clone(),
            span: span.clone(),
        }),
        v => Ok(v),
    }
}
