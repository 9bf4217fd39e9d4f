// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::error::EvalError;
use crate::interpreter::{Interpreter, Result};
use crate::source::Span;
use crate::types::{check_compatible, unify, Type};
use crate::value::{List, Value};
use crate::Rc;

fn unsupported(op: BinOp, lhs: &Value, rhs: &Value, span: &Span) -> EvalError {
    EvalError::Type {
        message: format!(
            "unsupported operand types for {op}: {} and {}",
            lhs.ty(),
            rhs.ty()
        ),
        expected: Some(lhs.ty()),
        found: Some(rhs.ty()),
        span: span.clone(),
    }
}

fn arithmetic(op: BinOp, a: i64, b: i64, span: &Span) -> Result<Value> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div if b == 0 => return Err(EvalError::semantic("division by zero", span)),
        BinOp::Div => a.checked_div(b),
        _ => None,
    };
    match result {
        Some(r) => Ok(Value::Int(r)),
        None => Err(EvalError::semantic(
            format!("integer overflow in {a} {op} {b}"),
            span,
        )),
    }
}

// An optional equals a plain value when it is present and its contents match.
fn equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Maybe(_), Value::Maybe(_)) => lhs == rhs,
        (Value::Maybe(m), plain) | (plain, Value::Maybe(m)) => m.value.as_ref() == Some(plain),
        _ => lhs == rhs,
    }
}

fn concat(element: Type, items: Vec<Value>) -> Value {
    Value::List(Rc::new(List { element, items }))
}

impl Interpreter {
    /// Both operands are always evaluated.
    pub(super) fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
        span: &Span,
    ) -> Result<Value> {
        let lhs = self.eval_expr(lhs)?;
        let rhs = self.eval_expr(rhs)?;
        lhs.ensure_resolved(span)?;
        rhs.ensure_resolved(span)?;

        let result = match (op, &lhs, &rhs) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Value::from(format!("{a}{b}")),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                let element = unify(&a.element, &b.element, span)?;
                let mut items = a.items.clone();
                items.extend(b.items.iter().cloned());
                concat(element, items)
            }
            (BinOp::Add, Value::List(a), item) => {
                let element = unify(&a.element, &item.ty(), span)?;
                let mut items = a.items.clone();
                items.push(item.clone());
                concat(element, items)
            }
            (BinOp::Add, Value::File(f), Value::Str(suffix)) => {
                Value::File(Rc::new(f.with_suffix(suffix, span)))
            }
            (
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div,
                Value::Int(a),
                Value::Int(b),
            ) => arithmetic(op, *a, *b, span)?,

            (BinOp::Prefix, item, Value::List(l)) => {
                let element = unify(&item.ty(), &l.element, span)?;
                let mut items = Vec::with_capacity(l.items.len() + 1);
                items.push(item.clone());
                items.extend(l.items.iter().cloned());
                concat(element, items)
            }
            (BinOp::Prefix, Value::Str(prefix), Value::File(f)) => {
                Value::File(Rc::new(f.with_prefix(prefix, span)))
            }

            (BinOp::Equal | BinOp::NotEqual, _, _) => {
                check_compatible(&lhs.ty(), &rhs.ty(), span)?;
                Value::Bool(equal(&lhs, &rhs) == (op == BinOp::Equal))
            }

            (BinOp::And, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a && *b),
            (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a || *b),
            (BinOp::Xor, Value::Bool(a), Value::Bool(b)) => Value::Bool(*a ^ *b),

            _ => return Err(unsupported(op, &lhs, &rhs, span)),
        };

        self.add_files(&result);
        Ok(result)
    }

    pub(super) fn eval_unary(
        &mut self,
        op: UnaryOp,
        operand: &ExprRef,
        span: &Span,
    ) -> Result<Value> {
        let value = self.eval_expr(operand)?;
        value.ensure_resolved(span)?;
        match (op, &value) {
            (UnaryOp::Plus, Value::Int(i)) => Ok(Value::Int(*i)),
            (UnaryOp::Minus, Value::Int(i)) => match i.checked_neg() {
                Some(n) => Ok(Value::Int(n)),
                None => Err(EvalError::semantic(format!("integer overflow in -{i}"), span)),
            },
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Not, _) => Err(EvalError::type_mismatch(&Type::Bool, &value.ty(), span)),
            _ => Err(EvalError::type_mismatch(&Type::Int, &value.ty(), span)),
        }
    }
}
