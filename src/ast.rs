// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::source::Span;
use crate::types::FileTag;
use crate::Rc;

use core::str::FromStr;
use core::{cmp, fmt, ops::Deref};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Deserializer};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    // `x :: xs`
    Prefix,
    Equal,
    NotEqual,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Prefix => "::",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "not",
        })
    }
}

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> cmp::Ord for NodeRef<T> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Rc::as_ptr(&self.r).cmp(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::PartialOrd for NodeRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for NodeRef<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(NodeRef::new)
    }
}

#[cfg(feature = "ast")]
impl<T: serde::Serialize> serde::Serialize for NodeRef<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.r.as_ref().serialize(serializer)
    }
}

pub type Ref<T> = NodeRef<T>;

/// An identifier. Written either as a bare string or as
/// `{ name: ..., at: file:line:col }`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub struct Ident {
    pub span: Span,
    pub name: Rc<str>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdentRepr {
    Bare(String),
    Located {
        name: String,
        #[serde(default)]
        at: Span,
    },
}

impl<'de> Deserialize<'de> for Ident {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match IdentRepr::deserialize(deserializer)? {
            IdentRepr::Bare(name) => Ident {
                span: Span::default(),
                name: name.into(),
            },
            IdentRepr::Located { name, at } => Ident {
                span: at,
                name: name.into(),
            },
        })
    }
}

impl Ident {
    /// The identifier's own location, or `fallback` if it has none.
    pub fn span_or<'a>(&'a self, fallback: &'a Span) -> &'a Span {
        match self.span.is_builtin() {
            true => fallback,
            false => &self.span,
        }
    }
}

/// A type annotation, written in the surface syntax of the language:
/// `int`, `file[in]`, `list[string]`, `maybe[int]`, `record[a:int, b:file]`,
/// `(int, string)=>bool`, or the name of a user-defined type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(Rc<str>),
    File(FileTag),
    List(Box<TypeExpr>),
    Maybe(Box<TypeExpr>),
    Record(Vec<(Rc<str>, TypeExpr)>),
    Function(Vec<TypeExpr>, Box<TypeExpr>),
}

struct TypeParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn skip_ws(&mut self) {
        while let Some(ch) = self.text[self.pos..].chars().next() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        match self.eat(token) {
            true => Ok(()),
            false => bail!("expected `{token}` at offset {} in `{}`", self.pos, self.text),
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while let Some(ch) = self.text[self.pos..].chars().next() {
            if !(ch.is_alphanumeric() || ch == '_' || ch == '.') {
                break;
            }
            self.pos += ch.len_utf8();
        }
        match start == self.pos {
            true => bail!("expected a type name at offset {start} in `{}`", self.text),
            false => Ok(&self.text[start..self.pos]),
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        if self.eat("(") {
            let mut params = vec![];
            if !self.eat(")") {
                loop {
                    params.push(self.parse_type()?);
                    if self.eat(")") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            self.expect("=>")?;
            let result = self.parse_type()?;
            return Ok(TypeExpr::Function(params, Box::new(result)));
        }

        let name = self.ident()?;
        if !self.eat("[") {
            return Ok(TypeExpr::Named(name.into()));
        }

        let t = match name {
            "file" => match self.ident()? {
                "in" => TypeExpr::File(FileTag::In),
                "out" => TypeExpr::File(FileTag::Out),
                tag => bail!("invalid file tag `{tag}` in `{}`", self.text),
            },
            "list" => TypeExpr::List(Box::new(self.parse_type()?)),
            "maybe" => TypeExpr::Maybe(Box::new(self.parse_type()?)),
            "record" => {
                let mut fields = vec![];
                self.skip_ws();
                if !self.text[self.pos..].starts_with(']') {
                    loop {
                        let field = self.ident()?;
                        self.expect(":")?;
                        fields.push((field.into(), self.parse_type()?));
                        if !self.eat(",") {
                            break;
                        }
                    }
                }
                TypeExpr::Record(fields)
            }
            _ => bail!("`{name}` does not take type parameters"),
        };
        self.expect("]")?;
        Ok(t)
    }
}

impl FromStr for TypeExpr {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<TypeExpr> {
        let mut parser = TypeParser { text, pos: 0 };
        let t = parser.parse_type()?;
        parser.skip_ws();
        match parser.pos == text.len() {
            true => Ok(t),
            false => Err(anyhow!(
                "unexpected `{}` after type in `{text}`",
                &text[parser.pos..]
            )),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(n) => f.write_str(n),
            TypeExpr::File(FileTag::In) => f.write_str("file[in]"),
            TypeExpr::File(FileTag::Out) => f.write_str("file[out]"),
            TypeExpr::File(FileTag::Plain) => f.write_str("file"),
            TypeExpr::List(e) => write!(f, "list[{e}]"),
            TypeExpr::Maybe(e) => write!(f, "maybe[{e}]"),
            TypeExpr::Record(fields) => {
                f.write_str("record[")?;
                for (idx, (name, t)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}:{t}")?;
                }
                f.write_str("]")
            }
            TypeExpr::Function(params, result) => {
                f.write_str("(")?;
                for (idx, p) in params.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")=>{result}")
            }
        }
    }
}

impl<'de> Deserialize<'de> for TypeExpr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        TypeExpr::from_str(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "ast")]
impl serde::Serialize for TypeExpr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// `name = value` or positional `value` in a call or action.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub struct Argument {
    #[serde(rename = "at", default)]
    pub span: Span,
    pub name: Option<Ident>,
    pub value: ExprRef,
}

/// A declared parameter of a function or action.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub struct ParamDecl {
    #[serde(rename = "at", default)]
    pub span: Span,
    pub name: Ident,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    pub default: Option<ExprRef>,
}

/// `name:type = value;`. Name and type are optional.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub struct ValueDecl {
    #[serde(rename = "at", default)]
    pub span: Span,
    pub name: Option<Ident>,
    #[serde(rename = "type")]
    pub ty: Option<TypeExpr>,
    pub value: ExprRef,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Bool {
        #[serde(rename = "at", default)]
        span: Span,
        value: bool,
    },

    Int {
        #[serde(rename = "at", default)]
        span: Span,
        value: i64,
    },

    Str {
        #[serde(rename = "at", default)]
        span: Span,
        value: Rc<str>,
    },

    // A file in the current `subdir`.
    Filename {
        #[serde(rename = "at", default)]
        span: Span,
        name: Rc<str>,
    },

    // `files(a.c b.c, subdir = 'x')`
    Files {
        #[serde(rename = "at", default)]
        span: Span,
        names: Vec<Rc<str>>,
        #[serde(default)]
        args: Vec<Argument>,
    },

    Name {
        #[serde(rename = "at", default)]
        span: Span,
        name: Rc<str>,
    },

    List {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(default)]
        items: Vec<ExprRef>,
    },

    Record {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(default)]
        fields: Vec<Ref<ValueDecl>>,
    },

    Field {
        #[serde(rename = "at", default)]
        span: Span,
        base: ExprRef,
        field: Ident,
    },

    // `base.field ? default`
    FieldQuery {
        #[serde(rename = "at", default)]
        span: Span,
        base: ExprRef,
        field: Ident,
        default: ExprRef,
    },

    Binary {
        #[serde(rename = "at", default)]
        span: Span,
        op: BinOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },

    Unary {
        #[serde(rename = "at", default)]
        span: Span,
        op: UnaryOp,
        operand: ExprRef,
    },

    If {
        #[serde(rename = "at", default)]
        span: Span,
        condition: ExprRef,
        then: ExprRef,
        otherwise: ExprRef,
    },

    Foreach {
        #[serde(rename = "at", default)]
        span: Span,
        var: Ident,
        index: Option<Ident>,
        #[serde(rename = "type")]
        ty: Option<TypeExpr>,
        sequence: ExprRef,
        body: ExprRef,
    },

    Function {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(default)]
        params: Vec<Ref<ParamDecl>>,
        result: TypeExpr,
        body: ExprRef,
    },

    Action {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(default)]
        args: Vec<Argument>,
        #[serde(default)]
        params: Vec<Ref<ParamDecl>>,
    },

    Call {
        #[serde(rename = "at", default)]
        span: Span,
        callee: ExprRef,
        #[serde(default)]
        args: Vec<Argument>,
    },

    // `{ x = 1; y = 2; x + y }`
    Compound {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(default)]
        values: Vec<Ref<ValueDecl>>,
        result: ExprRef,
    },

    Some {
        #[serde(rename = "at", default)]
        span: Span,
        value: ExprRef,
    },

    None {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(rename = "type")]
        ty: Option<TypeExpr>,
    },

    // `type record[...]`
    Type {
        #[serde(rename = "at", default)]
        span: Span,
        #[serde(rename = "type")]
        ty: TypeExpr,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        use Expr::*;
        match self {
            Bool { span, .. }
            | Int { span, .. }
            | Str { span, .. }
            | Filename { span, .. }
            | Files { span, .. }
            | Name { span, .. }
            | List { span, .. }
            | Record { span, .. }
            | Field { span, .. }
            | FieldQuery { span, .. }
            | Binary { span, .. }
            | Unary { span, .. }
            | If { span, .. }
            | Foreach { span, .. }
            | Function { span, .. }
            | Action { span, .. }
            | Call { span, .. }
            | Compound { span, .. }
            | Some { span, .. }
            | None { span, .. }
            | Type { span, .. } => span,
        }
    }
}

pub type ExprRef = Ref<Expr>;

/// One build description: an ordered list of top-level value declarations.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "ast", derive(serde::Serialize))]
pub struct Program {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub values: Vec<Ref<ValueDecl>>,
}

impl Program {
    pub fn from_json_str(json: &str) -> Result<Program> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Program> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Program> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.display()),
        };
        match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "yaml")]
            Some("yaml" | "yml") => Program::from_yaml_str(&contents),
            _ => Program::from_json_str(&contents),
        }
    }
}
