// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod builtins;
mod dag;
mod engine;
mod error;
mod interpreter;
mod plugin;
mod scheduler;
mod scope;
mod source;
mod types;
mod utils;
mod value;

pub(crate) use std::sync::Arc as Rc;

pub use dag::{Build, Dag, File, Rule, Visitor, REGENERATION_RULE};
pub use engine::Engine;
pub use error::{ErrorKind, EvalError, EvalErrors};
pub use plugin::{NativeFunction, PluginRegistry};
pub use scope::Scope;
pub use source::{Source, Span};
pub use types::{check_compatible, type_of, unify, unify_all, FileTag, Type};
pub use value::{Callable, Closure, List, Maybe, Parameter, Placeholder, Value};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::builtins::Builtin;
    pub use crate::dag::{DagBuilder, FreezeOptions, Regeneration};
    pub use crate::scheduler::{schedule, BuildInfo, SortResult};
    pub use crate::utils::path;
}

#[cfg(test)]
mod tests;
