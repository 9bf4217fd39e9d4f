// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::EvalError;
use crate::source::Span;
use crate::types::Type;
use crate::utils::path;
use crate::value::Value;
use crate::Rc;

use std::collections::BTreeMap;

/// A file named by the build description.
///
/// Files are identified by their relative name (subdirectory joined with
/// the filename). Source files live under `${srcroot}`, generated files
/// under `${buildroot}`; absolute paths are used as given.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    filename: Rc<str>,
    subdir: Rc<str>,
    absolute: bool,
    generated: bool,
    attributes: BTreeMap<String, Value>,
    span: Span,
}

impl File {
    /// Create a file named `name` relative to `subdir`.
    ///
    /// A boolean `generated` attribute sets the generated flag and is not
    /// kept as an attribute.
    pub fn create(
        subdir: &str,
        name: &str,
        mut attributes: BTreeMap<String, Value>,
        span: &Span,
        mut generated: bool,
    ) -> Result<File, EvalError> {
        if name.is_empty() {
            return Err(EvalError::semantic("empty filename", span));
        }

        let filename = path::filename_component(name);
        let directory = match path::is_absolute(name) {
            true => path::directory_of(name).to_string(),
            false => path::join_path(subdir, path::directory_of(name)),
        };

        if let Some(g) = attributes.remove("generated") {
            match g {
                Value::Bool(b) => generated = b,
                other => {
                    return Err(EvalError::Type {
                        message: "'generated' field not boolean".to_string(),
                        expected: Some(Type::Bool),
                        found: Some(other.ty()),
                        span: span.clone(),
                    })
                }
            }
        }

        let file = File {
            filename: filename.into(),
            absolute: path::is_absolute(&directory),
            subdir: directory.into(),
            generated: false,
            attributes,
            span: span.clone(),
        };

        match generated {
            true => file.with_generated(span),
            false => Ok(file),
        }
    }

    /// A file naming a directory, such as the current `subdir`.
    pub fn dir(subdir: &str, generated: bool, span: &Span) -> File {
        File {
            filename: Rc::from(""),
            subdir: subdir.into(),
            absolute: path::is_absolute(subdir),
            generated,
            attributes: BTreeMap::new(),
            span: span.clone(),
        }
    }

    /// A file for a path given in full, e.g. `src/main.c`.
    pub fn from_path(full_path: &str, span: &Span) -> Result<File, EvalError> {
        File::create("", full_path, BTreeMap::new(), span, false)
    }

    /// The same file, marked as produced by a build.
    pub fn with_generated(&self, span: &Span) -> Result<File, EvalError> {
        if self.absolute {
            return Err(EvalError::semantic(
                format!(
                    "cannot generate file with absolute path '{}'",
                    self.relative_name()
                ),
                span,
            ));
        }
        let mut file = self.clone();
        file.generated = true;
        Ok(file)
    }

    /// `file + suffix`: append to the filename, which may move the file into
    /// a subdirectory.
    pub fn with_suffix(&self, suffix: &str, span: &Span) -> File {
        let joined = format!("{}{suffix}", self.filename);
        File {
            filename: path::filename_component(&joined).into(),
            subdir: path::join_path(&self.subdir, path::directory_of(&joined)).into(),
            absolute: self.absolute,
            generated: self.generated,
            attributes: self.attributes.clone(),
            span: span.clone(),
        }
    }

    /// `prefix :: file`: prepend to the filename.
    pub fn with_prefix(&self, prefix: &str, span: &Span) -> File {
        File {
            filename: format!("{prefix}{}", self.filename).into(),
            subdir: self.subdir.clone(),
            absolute: self.absolute,
            generated: self.generated,
            attributes: self.attributes.clone(),
            span: span.clone(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Subdirectory joined with the filename. This is the file's identity.
    pub fn relative_name(&self) -> String {
        path::join_path(&self.subdir, &self.filename)
    }

    /// Directory including the `${srcroot}` or `${buildroot}` prefix.
    pub fn directory(&self) -> String {
        if self.absolute {
            return self.subdir.to_string();
        }
        let root = match self.generated {
            true => "${buildroot}",
            false => "${srcroot}",
        };
        path::join_path(root, &self.subdir)
    }

    pub fn full_name(&self) -> String {
        path::join_path(&self.directory(), &self.filename)
    }

    /// Value of a builtin field or user attribute.
    pub fn field(&self, name: &str) -> Option<Value> {
        let s = |text: &str| Some(Value::from(text));
        match name {
            "basename" => s(path::basename(&self.filename)),
            "extension" => s(path::extension(&self.filename)),
            "filename" => s(&self.filename),
            "fullname" => s(&self.full_name()),
            "generated" => Some(Value::Bool(self.generated)),
            "name" => s(&self.relative_name()),
            "subdir" => Some(Value::from(File::dir(&self.subdir, self.generated, &self.span))),
            _ => self.attributes.get(name).cloned(),
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = crate::types::FILE_FIELDS
            .iter()
            .map(|n| n.to_string())
            .collect();
        names.extend(self.attributes.keys().cloned());
        names.sort();
        names
    }
}
