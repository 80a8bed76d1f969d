// Syntax tree types for `{{path | modifier(args)}}` placeholders

use serde::{Deserialize, Serialize};
use std::fmt;

/// A placeholder located in a template string
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    /// Byte offset of the opening `{{`
    pub start: usize,
    /// Byte offset just past the closing `}}`
    pub end: usize,
}

impl TokenSpan {
    pub fn raw<'a>(&self, template: &'a str) -> &'a str {
        &template[self.start..self.end]
    }

    pub fn inner<'a>(&self, template: &'a str) -> &'a str {
        &template[self.start + 2..self.end - 2]
    }
}

/// Catalog category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Entry,
    Collection,
    Site,
    User,
    System,
}

impl TokenCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCategory::Entry => "entry",
            TokenCategory::Collection => "collection",
            TokenCategory::Site => "site",
            TokenCategory::User => "user",
            TokenCategory::System => "system",
        }
    }
}

/// Leading segment of a token path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenNamespace {
    Entry,
    Collection,
    Site,
    User,
    System,
    /// Anything else resolves against the caller's raw context values
    Context,
}

impl TokenNamespace {
    pub fn parse(segment: &str) -> Self {
        match segment {
            "entry" => TokenNamespace::Entry,
            "collection" => TokenNamespace::Collection,
            "site" => TokenNamespace::Site,
            "user" => TokenNamespace::User,
            "system" => TokenNamespace::System,
            _ => TokenNamespace::Context,
        }
    }

    pub fn category(&self) -> Option<TokenCategory> {
        match self {
            TokenNamespace::Entry => Some(TokenCategory::Entry),
            TokenNamespace::Collection => Some(TokenCategory::Collection),
            TokenNamespace::Site => Some(TokenCategory::Site),
            TokenNamespace::User => Some(TokenCategory::User),
            TokenNamespace::System => Some(TokenCategory::System),
            TokenNamespace::Context => None,
        }
    }
}

/// Dotted token path, e.g. `entry.author.name`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPath {
    pub segments: Vec<String>,
}

impl TokenPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn namespace(&self) -> TokenNamespace {
        self.segments
            .first()
            .map(|s| TokenNamespace::parse(s))
            .unwrap_or(TokenNamespace::Context)
    }

    /// Segments after the namespace
    pub fn rest(&self) -> &[String] {
        match self.namespace() {
            TokenNamespace::Context => &self.segments,
            _ => &self.segments[1..],
        }
    }

    pub fn key(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for TokenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One `name(args)` stage of a modifier chain
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<String>,
}

impl ModifierCall {
    pub fn new(name: &str, args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// A parsed placeholder. `path` is `None` when the path text is not a
/// valid dotted identifier sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenExpr {
    pub raw_path: String,
    pub path: Option<TokenPath>,
    pub modifiers: Vec<ModifierCall>,
}

/// Malformed modifier stage, with the byte position inside the stage text
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierSyntaxError {
    pub stage: String,
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ModifierSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at position {} in modifier '{}'",
            self.message, self.position, self.stage
        )
    }
}

impl std::error::Error for ModifierSyntaxError {}
