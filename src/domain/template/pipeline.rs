// Modifier traits, registry and chain execution

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::ast::ModifierCall;
use crate::domain::value::ValueType;
use crate::services::providers::MediaConfigProvider;

/// Parameter description for tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, default: Option<&'static str>) -> Self {
        Self {
            name,
            required: false,
            default,
        }
    }
}

/// Metadata describing a modifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub accepts: Vec<ValueType>,
    pub params: Vec<ParamSpec>,
    #[serde(rename = "async")]
    pub is_async: bool,
}

impl ModifierDefinition {
    /// Modifiers accepting `any` also run when the value is missing
    pub fn accepts_missing(&self) -> bool {
        self.accepts.contains(&ValueType::Any)
    }
}

/// Per-call environment handed to every modifier
#[derive(Clone)]
pub struct ModifierContext {
    pub now: DateTime<Utc>,
    pub media: Option<Arc<dyn MediaConfigProvider>>,
}

impl ModifierContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now, media: None }
    }

    pub fn with_media(mut self, media: Option<Arc<dyn MediaConfigProvider>>) -> Self {
        self.media = media;
        self
    }
}

/// Trait for synchronous value transformations
pub trait Modifier: Send + Sync {
    fn definition(&self) -> &ModifierDefinition;
    fn apply(&self, value: &Value, args: &[String], ctx: &ModifierContext) -> Result<Value>;
}

/// Trait for transformations that may suspend on I/O
#[async_trait]
pub trait AsyncModifier: Send + Sync {
    fn definition(&self) -> &ModifierDefinition;
    async fn apply(&self, value: &Value, args: &[String], ctx: &ModifierContext) -> Result<Value>;
}

pub type ModifierFn = fn(&Value, &[String], &ModifierContext) -> Result<Value>;

/// Modifier backed by a plain function
pub struct FnModifier {
    definition: ModifierDefinition,
    func: ModifierFn,
}

impl FnModifier {
    pub fn new(
        name: &'static str,
        description: &'static str,
        accepts: &[ValueType],
        params: &[ParamSpec],
        func: ModifierFn,
    ) -> Self {
        Self {
            definition: ModifierDefinition {
                name,
                description,
                accepts: accepts.to_vec(),
                params: params.to_vec(),
                is_async: false,
            },
            func,
        }
    }
}

impl Modifier for FnModifier {
    fn definition(&self) -> &ModifierDefinition {
        &self.definition
    }

    fn apply(&self, value: &Value, args: &[String], ctx: &ModifierContext) -> Result<Value> {
        (self.func)(value, args, ctx)
    }
}

pub enum RegisteredModifier {
    Sync(Box<dyn Modifier>),
    Async(Box<dyn AsyncModifier>),
}

impl RegisteredModifier {
    pub fn definition(&self) -> &ModifierDefinition {
        match self {
            RegisteredModifier::Sync(m) => m.definition(),
            RegisteredModifier::Async(m) => m.definition(),
        }
    }
}

/// Registry for modifiers, keyed by name
pub struct ModifierRegistry {
    modifiers: HashMap<&'static str, RegisteredModifier>,
}

impl ModifierRegistry {
    /// Registry with every built-in family
    pub fn new() -> Self {
        let mut registry = Self::empty();
        crate::modifiers::register_builtins(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            modifiers: HashMap::new(),
        }
    }

    pub fn register(&mut self, modifier: Box<dyn Modifier>) {
        self.modifiers
            .insert(modifier.definition().name, RegisteredModifier::Sync(modifier));
    }

    pub fn register_async(&mut self, modifier: Box<dyn AsyncModifier>) {
        self.modifiers
            .insert(modifier.definition().name, RegisteredModifier::Async(modifier));
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModifier> {
        self.modifiers.get(name)
    }

    /// All definitions sorted by name, for tooling
    pub fn definitions(&self) -> Vec<&ModifierDefinition> {
        let mut defs: Vec<_> = self.modifiers.values().map(|m| m.definition()).collect();
        defs.sort_by_key(|d| d.name);
        defs
    }

    /// Run a chain, awaiting async stages.
    ///
    /// Unknown stages are skipped with a warning; a failing stage is logged
    /// and leaves the pre-stage value in place.
    pub async fn apply_chain(&self, value: Value, chain: &[ModifierCall], ctx: &ModifierContext) -> Value {
        let mut current = value;
        for call in chain {
            let Some(modifier) = self.stage(call, &current) else {
                continue;
            };
            let outcome = match modifier {
                RegisteredModifier::Sync(m) => m.apply(&current, &call.args, ctx),
                RegisteredModifier::Async(m) => m.apply(&current, &call.args, ctx).await,
            };
            current = settle(call, current, outcome);
        }
        current
    }

    /// Best-effort synchronous chain. Async stages cannot complete here, so
    /// they are skipped with a warning and the value passes through.
    pub fn apply_chain_sync(&self, value: Value, chain: &[ModifierCall], ctx: &ModifierContext) -> Value {
        let mut current = value;
        for call in chain {
            let Some(modifier) = self.stage(call, &current) else {
                continue;
            };
            match modifier {
                RegisteredModifier::Sync(m) => {
                    let outcome = m.apply(&current, &call.args, ctx);
                    current = settle(call, current, outcome);
                }
                RegisteredModifier::Async(_) => {
                    tracing::warn!(
                        modifier = %call.name,
                        "Async modifier used in synchronous replacement; value left unmodified"
                    );
                }
            }
        }
        current
    }

    fn stage(&self, call: &ModifierCall, current: &Value) -> Option<&RegisteredModifier> {
        let Some(modifier) = self.get(&call.name) else {
            tracing::warn!(modifier = %call.name, "Unknown modifier; stage skipped");
            return None;
        };
        if current.is_null() && !modifier.definition().accepts_missing() {
            return None;
        }
        Some(modifier)
    }
}

fn settle(call: &ModifierCall, previous: Value, outcome: Result<Value>) -> Value {
    match outcome {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(modifier = %call.name, error = %e, "Modifier failed; keeping previous value");
            previous
        }
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
