// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod files;
pub mod utils;
pub mod values;

use crate::error::EvalError;
use crate::scope::Scope;
use crate::source::Span;
use crate::types::Type;
use crate::value::Value;

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

/// Arguments are matched to `params` by the interpreter. Keyword arguments
/// that match no parameter are passed in the map when the builtin accepts
/// them.
pub type BuiltinFcn =
    fn(&Span, &Scope, &[Value], &BTreeMap<String, Value>) -> Result<Value, EvalError>;

#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    // A `nil` parameter accepts any value.
    pub params: Vec<(&'static str, Type)>,
    pub result: Type,
    pub extra_keywords: bool,
    pub fcn: BuiltinFcn,
}

impl Builtin {
    pub fn new(
        name: &'static str,
        params: Vec<(&'static str, Type)>,
        result: Type,
        fcn: BuiltinFcn,
    ) -> Builtin {
        Builtin {
            name,
            params,
            result,
            extra_keywords: false,
            fcn,
        }
    }
}

#[rustfmt::skip]
lazy_static! {
    pub static ref BUILTINS: HashMap<&'static str, Builtin> = {
	let mut m : HashMap<&'static str, Builtin>  = HashMap::new();

	files::register(&mut m);
	values::register(&mut m);

	m
    };
}
