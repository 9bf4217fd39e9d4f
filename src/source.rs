// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Rc;

use core::fmt::{self, Debug, Formatter};
use core::ops::Range;

use anyhow::{bail, Result};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

struct SourceText {
    file: String,
    contents: String,
    // Byte range of each line, without its terminator.
    lines: Vec<Range<usize>>,
}

/// Text of a build description, kept only to render diagnostics.
///
/// The evaluator never reads source text; an external front end produces
/// the AST. Registering the text lets error reports show the offending line.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceText>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.file.fmt(f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        if u32::try_from(contents.len()).is_err() {
            bail!("{file} is too large to index");
        }

        let mut lines = vec![];
        let mut offset = 0;
        for line in contents.split_inclusive('\n') {
            let text = line.trim_end_matches('\n').trim_end_matches('\r');
            lines.push(offset..offset + text.len());
            offset += line.len();
        }
        if lines.is_empty() {
            lines.push(0..0);
        }

        Ok(Source {
            src: Rc::new(SourceText {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn file(&self) -> &str {
        &self.src.file
    }

    /// Text of the zero-based line `idx`, or "" past the end.
    pub fn line(&self, idx: u32) -> &str {
        match self.src.lines.get(idx as usize) {
            Some(range) => &self.src.contents[range.clone()],
            None => "",
        }
    }

    /// Render a diagnostic pointing at `line`:`col` (both 1-based).
    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line == 0 || line as usize > self.src.lines.len() {
            return format!("{}: invalid line {line} specified", self.src.file);
        }

        let gutter = " ".repeat(line.to_string().len() + 1);
        let number = format!("{line:<width$}", width = gutter.len());
        let caret = format!("{}^", " ".repeat((col as usize).saturating_sub(1)));
        format!(
            "\n--> {}:{line}:{col}\n{gutter}|\n{number}| {}\n{gutter}| {caret}\n{kind}: {msg}",
            self.src.file,
            self.line(line - 1),
        )
    }
}

/// Location of an AST node: file, line and column.
///
/// Spans are written as `file:line:col` when serialized. The front end may
/// also deliver them as a map with `file`, `line` and `col` keys.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub file: Rc<str>,
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(file: &str, line: u32, col: u32) -> Span {
        Span {
            file: file.into(),
            line,
            col,
        }
    }

    /// Span for values that the evaluator creates itself.
    pub fn builtin() -> Span {
        Span::new("<builtin>", 0, 0)
    }

    pub fn is_builtin(&self) -> bool {
        self.line == 0
    }

    /// Render `msg` against the registered source text, if any.
    pub fn message(&self, source: Option<&Source>, kind: &str, msg: &str) -> String {
        match source {
            Some(s) if !self.is_builtin() => s.message(self.line, self.col, kind, msg),
            _ => format!("{self}: {kind}: {msg}"),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::new("<input>", 0, 0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpanRepr {
    Text(String),
    Fields { file: String, line: u32, col: u32 },
}

fn parse_span(text: &str) -> Option<Span> {
    let mut parts = text.rsplitn(3, ':');
    let col = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some(Span::new(file, line, col))
}

impl<'de> Deserialize<'de> for Span {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match SpanRepr::deserialize(deserializer)? {
            SpanRepr::Text(text) => parse_span(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid location `{text}`"))),
            SpanRepr::Fields { file, line, col } => Ok(Span::new(&file, line, col)),
        }
    }
}
