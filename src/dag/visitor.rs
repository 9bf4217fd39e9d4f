// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::dag::{Build, File, Rule};
use crate::value::Value;

use anyhow::Result;

/// Read-only traversal of a frozen [`crate::Dag`].
///
/// [`crate::Dag::accept`] visits every file, then every rule, then every
/// build in topological order, then every top-level value. Backends
/// override the methods they need.
pub trait Visitor {
    fn visit_file(&mut self, _file: &File) -> Result<()> {
        Ok(())
    }

    fn visit_rule(&mut self, _rule: &Rule) -> Result<()> {
        Ok(())
    }

    fn visit_build(&mut self, _build: &Build) -> Result<()> {
        Ok(())
    }

    /// `is_target` is set for values that contain files.
    fn visit_value(&mut self, _name: &str, _value: &Value, _is_target: bool) -> Result<()> {
        Ok(())
    }
}
