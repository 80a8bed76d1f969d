// Template module for `{{path | modifier(args)}}` placeholders
//
// This module provides span scanning, path and modifier-chain parsing,
// dotted-path resolution and the modifier registry.

mod ast;
mod parser;
mod pipeline;
mod resolver;

pub use ast::{
    ModifierCall, ModifierSyntaxError, TokenCategory, TokenExpr, TokenNamespace, TokenPath,
    TokenSpan,
};
pub use parser::{
    find_token_spans, has_unescaped_token, parse_path, parse_token, protect_escaped_braces,
    restore_escaped_braces, scan_token_spans, split_args, ModifierParser,
};
pub use pipeline::{
    AsyncModifier, FnModifier, Modifier, ModifierContext, ModifierDefinition, ModifierFn,
    ModifierRegistry, ParamSpec, RegisteredModifier,
};
pub use resolver::{resolve_in_object, resolve_path};
