// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::EvalError;
use crate::interpreter::{concrete, Interpreter, Result};
use crate::source::Span;
use crate::value::Value;
use crate::Rc;

use log::trace;

impl Interpreter {
    /// `foreach var in sequence: body`
    ///
    /// The body is evaluated once per element, in order, in a fresh scope
    /// binding `var` (and `index`, if given). The results form a list.
    pub(super) fn eval_foreach(
        &mut self,
        var: &Ident,
        index: Option<&Ident>,
        ty: Option<&TypeExpr>,
        sequence: &ExprRef,
        body: &ExprRef,
        span: &Span,
    ) -> Result<Value> {
        let sequence = concrete(self.eval_expr(sequence)?, sequence.span())?;
        let list = match &sequence {
            Value::List(l) => l.clone(),
            other => {
                return Err(EvalError::type_error(
                    format!("cannot iterate over a value of type {}", other.ty()),
                    span,
                ))
            }
        };

        let element = match ty {
            Some(t) => {
                let declared = self.resolve_type(t, span)?;
                list.element.check_subtype(&declared, span)?;
                declared
            }
            None => list.element.clone(),
        };

        let mut results = Vec::with_capacity(list.items.len());
        for (idx, item) in list.items.iter().enumerate() {
            trace!("{}: iteration {idx}", var.name);
            let saved = self.enter("foreach");
            let result = self.eval_iteration(var, index, idx, item.clone().widen_to(&element), body);
            self.leave(saved);
            results.push(result?);
        }

        Value::infer_list(results, span)
    }

    fn eval_iteration(
        &mut self,
        var: &Ident,
        index: Option<&Ident>,
        idx: usize,
        item: Value,
        body: &ExprRef,
    ) -> Result<Value> {
        let scope = Rc::make_mut(&mut self.scope);
        scope.define(&var.name, item, &var.span)?;
        if let Some(index) = index {
            let idx = match i64::try_from(idx) {
                Ok(i) => i,
                Err(_) => return Err(EvalError::semantic("loop index overflow", &index.span)),
            };
            scope.define(&index.name, Value::Int(idx), &index.span)?;
        }
        self.eval_expr(body)
    }
}
