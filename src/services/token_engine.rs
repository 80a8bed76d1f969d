// Replacement orchestrator: finds placeholders, resolves them, runs their
// modifier chains and re-expands until the string is stable

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::providers::{MediaConfig, MediaConfigProvider, StaticMediaConfig};
use super::relation_service::{RelationLookup, RelationResolver, ACCESS_DENIED};
use crate::config::{EngineSettings, UnresolvedPolicy, DEFAULT_MAX_DEPTH};
use crate::domain::template::{
    parse_token, protect_escaped_braces, resolve_in_object, resolve_path, restore_escaped_braces,
    scan_token_spans, ModifierContext, ModifierRegistry, TokenExpr, TokenNamespace, TokenPath,
};
use crate::domain::value::stringify;
use crate::domain::{Clock, CollectionSchema, FieldDefinition, TokenContext, User};
use crate::error::TokenError;
use crate::tokens::{
    AvailableTokens, CatalogOptions, InMemoryTokenCache, SystemToken, TokenCatalog, TokenRegistry,
};

/// Per-call replacement options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOptions {
    pub max_depth: usize,
    pub unresolved: UnresolvedPolicy,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unresolved: UnresolvedPolicy::Preserve,
        }
    }
}

impl ReplaceOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_unresolved(mut self, unresolved: UnresolvedPolicy) -> Self {
        self.unresolved = unresolved;
        self
    }
}

/// Outcome of a replacement with the bookkeeping callers may want
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaceReport {
    pub output: String,
    /// Token paths that produced a value
    pub resolved: Vec<String>,
    /// Token paths that did not
    pub failed: Vec<String>,
    pub iterations: usize,
}

impl ReplaceReport {
    fn record(list: &mut Vec<String>, path: &str) {
        if !list.iter().any(|p| p == path) {
            list.push(path.to_string());
        }
    }
}

/// Where a path's value comes from
enum Lookup<'a> {
    Found(Option<Value>),
    Relation {
        field: &'a FieldDefinition,
        rest: &'a [String],
    },
}

pub struct TokenEngine {
    modifiers: ModifierRegistry,
    registry: TokenRegistry,
    relations: Option<RelationResolver>,
    media: Option<Arc<dyn MediaConfigProvider>>,
    clock: Arc<dyn Clock>,
    options: ReplaceOptions,
}

impl TokenEngine {
    /// Engine with built-in modifiers, an in-memory catalog cache and no
    /// relation support
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(InMemoryTokenCache::new(Arc::clone(&clock)));
        Self {
            modifiers: ModifierRegistry::new(),
            registry: TokenRegistry::new(cache),
            relations: None,
            media: None,
            clock,
            options: ReplaceOptions::default(),
        }
    }

    pub fn from_settings(settings: &EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(InMemoryTokenCache::with_ttl(
            Arc::clone(&clock),
            chrono::Duration::seconds(settings.cache_ttl_secs),
        ));
        let registry = TokenRegistry::new(cache).with_user_allow_list(settings.user_allow_list.clone());
        let mut engine = Self::new(clock)
            .with_registry(registry)
            .with_options(ReplaceOptions {
                max_depth: settings.max_depth,
                unresolved: settings.unresolved,
            });
        if let Some(base_url) = &settings.media_base_url {
            engine = engine.with_media(Arc::new(StaticMediaConfig::new(MediaConfig {
                base_url: base_url.clone(),
            })));
        }
        engine
    }

    pub fn with_registry(mut self, registry: TokenRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierRegistry) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_relations(mut self, relations: RelationResolver) -> Self {
        self.relations = Some(relations);
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaConfigProvider>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_options(mut self, options: ReplaceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    pub fn options(&self) -> ReplaceOptions {
        self.options
    }

    /// Fresh context stamped with the engine clock
    pub fn new_context(&self) -> TokenContext {
        TokenContext::new(self.clock.now())
    }

    pub async fn replace_tokens(&self, template: &str, ctx: &TokenContext) -> Result<String, TokenError> {
        self.replace_tokens_with(template, ctx, self.options).await
    }

    pub async fn replace_tokens_with(
        &self,
        template: &str,
        ctx: &TokenContext,
        options: ReplaceOptions,
    ) -> Result<String, TokenError> {
        Ok(self.replace_tokens_detailed(template, ctx, options).await?.output)
    }

    /// Full replacement, awaiting relation lookups and async modifiers
    pub async fn replace_tokens_detailed(
        &self,
        template: &str,
        ctx: &TokenContext,
        options: ReplaceOptions,
    ) -> Result<ReplaceReport, TokenError> {
        let mut report = ReplaceReport::default();
        if !template.contains("{{") {
            report.output = restore_escaped_braces(&protect_escaped_braces(template));
            return Ok(report);
        }

        let catalog = self.catalog_for(ctx);
        let modifier_ctx = self.modifier_context(ctx);
        let mut current = protect_escaped_braces(template);

        while report.iterations < options.max_depth {
            let spans = scan_token_spans(&current);
            if spans.is_empty() {
                break;
            }
            report.iterations += 1;

            let mut memo: HashMap<String, String> = HashMap::new();
            let mut next = String::with_capacity(current.len());
            let mut last = 0;
            for span in &spans {
                next.push_str(&current[last..span.start]);
                let raw = span.raw(&current);
                let replacement = match memo.get(raw) {
                    Some(done) => done.clone(),
                    None => {
                        let expr = parse_token(span.inner(&current));
                        let lookup = match &expr.path {
                            Some(path) => self.lookup(path, ctx, &catalog).await,
                            None => RelationLookup::Value(None),
                        };
                        let text = match lookup {
                            RelationLookup::Denied => denied(&expr, &mut report),
                            RelationLookup::Value(base) => {
                                let found = base.is_some();
                                let value = self
                                    .modifiers
                                    .apply_chain(base.unwrap_or(Value::Null), &expr.modifiers, &modifier_ctx)
                                    .await;
                                settle(&expr, raw, found, value, options, &mut report)?
                            }
                        };
                        memo.insert(raw.to_string(), text.clone());
                        text
                    }
                };
                next.push_str(&replacement);
                last = span.end;
            }
            next.push_str(&current[last..]);

            if next == current {
                break;
            }
            current = next;
        }

        report.output = restore_escaped_braces(&current);
        Ok(report)
    }

    pub fn replace_tokens_sync(&self, template: &str, ctx: &TokenContext) -> Result<String, TokenError> {
        Ok(self
            .replace_tokens_sync_detailed(template, ctx, self.options)?
            .output)
    }

    /// Best-effort replacement without awaiting. Async modifiers pass their
    /// input through and relation tokens count as unresolved.
    pub fn replace_tokens_sync_detailed(
        &self,
        template: &str,
        ctx: &TokenContext,
        options: ReplaceOptions,
    ) -> Result<ReplaceReport, TokenError> {
        let mut report = ReplaceReport::default();
        if !template.contains("{{") {
            report.output = restore_escaped_braces(&protect_escaped_braces(template));
            return Ok(report);
        }

        let catalog = self.catalog_for(ctx);
        let modifier_ctx = self.modifier_context(ctx);
        let mut current = protect_escaped_braces(template);

        while report.iterations < options.max_depth {
            let spans = scan_token_spans(&current);
            if spans.is_empty() {
                break;
            }
            report.iterations += 1;

            let mut memo: HashMap<String, String> = HashMap::new();
            let mut next = String::with_capacity(current.len());
            let mut last = 0;
            for span in &spans {
                next.push_str(&current[last..span.start]);
                let raw = span.raw(&current);
                let replacement = match memo.get(raw) {
                    Some(done) => done.clone(),
                    None => {
                        let expr = parse_token(span.inner(&current));
                        let base = match &expr.path {
                            Some(path) => self.lookup_sync(path, ctx, &catalog),
                            None => None,
                        };
                        let found = base.is_some();
                        let value = self.modifiers.apply_chain_sync(
                            base.unwrap_or(Value::Null),
                            &expr.modifiers,
                            &modifier_ctx,
                        );
                        let text = settle(&expr, raw, found, value, options, &mut report)?;
                        memo.insert(raw.to_string(), text.clone());
                        text
                    }
                };
                next.push_str(&replacement);
                last = span.end;
            }
            next.push_str(&current[last..]);

            if next == current {
                break;
            }
            current = next;
        }

        report.output = restore_escaped_braces(&current);
        Ok(report)
    }

    /// Token catalog visible to `user`, grouped by category
    pub fn get_available_tokens(
        &self,
        schema: Option<&CollectionSchema>,
        user: Option<&User>,
        options: &CatalogOptions,
    ) -> AvailableTokens {
        self.registry.get_tokens(schema, user, options)
    }

    pub fn clear_token_cache(&self) {
        self.registry.clear();
        tracing::debug!("Token cache cleared");
    }

    fn catalog_for(&self, ctx: &TokenContext) -> Arc<TokenCatalog> {
        let options = CatalogOptions {
            roles: ctx.roles.clone(),
            site_config: ctx.site_config.clone(),
            locale: ctx.locale.clone(),
            sample_entry: None,
        };
        self.registry
            .catalog(ctx.collection.as_ref(), ctx.user.as_ref(), &options)
    }

    fn modifier_context(&self, ctx: &TokenContext) -> ModifierContext {
        ModifierContext::new(ctx.now).with_media(self.media.clone())
    }

    async fn lookup(&self, path: &TokenPath, ctx: &TokenContext, catalog: &TokenCatalog) -> RelationLookup {
        match self.resolve_static(path, ctx, catalog) {
            Lookup::Found(value) => RelationLookup::Value(value),
            Lookup::Relation { field, rest } => {
                let Some(relations) = &self.relations else {
                    tracing::warn!(token = %path, "No relation resolver configured; token unresolved");
                    return RelationLookup::Value(None);
                };
                match relations.lookup(field, rest, ctx).await {
                    Ok(lookup) => lookup,
                    Err(e) => {
                        tracing::error!(token = %path, error = %e, "Relation lookup failed");
                        RelationLookup::Value(None)
                    }
                }
            }
        }
    }

    fn lookup_sync(&self, path: &TokenPath, ctx: &TokenContext, catalog: &TokenCatalog) -> Option<Value> {
        match self.resolve_static(path, ctx, catalog) {
            Lookup::Found(value) => value,
            Lookup::Relation { .. } => {
                tracing::warn!(token = %path, "Relation token in synchronous replacement; token unresolved");
                None
            }
        }
    }

    /// Everything that can be answered from the context alone
    fn resolve_static<'a>(&self, path: &'a TokenPath, ctx: &'a TokenContext, catalog: &TokenCatalog) -> Lookup<'a> {
        let namespace = path.namespace();
        let rest = path.rest();

        match namespace {
            // Always live, never from a cached definition
            TokenNamespace::System => {
                return Lookup::Found(SystemToken::parse(&rest.join(".")).map(|t| t.resolve(ctx.now)));
            }
            TokenNamespace::User => {
                let Some((name, nested)) = rest.split_first() else {
                    return Lookup::Found(None);
                };
                if !self.registry.allows_user_field(name) {
                    return Lookup::Found(Some(Value::String(String::new())));
                }
                let value = ctx.user.as_ref().and_then(|u| u.field(name));
                return Lookup::Found(value.and_then(|v| resolve_path(nested, &v).cloned()));
            }
            TokenNamespace::Entry => {
                let field = rest
                    .split_first()
                    .and_then(|(name, nested)| Some((ctx.collection.as_ref()?.field(name)?, nested)));
                if let Some((field, nested)) = field {
                    if !field.can_read(ctx.user.as_ref(), &ctx.roles) {
                        tracing::debug!(token = %path, "Field not readable by caller; token unresolved");
                        return Lookup::Found(None);
                    }
                    if field.is_relation() {
                        return Lookup::Relation { field, rest: nested };
                    }
                }
            }
            _ => {}
        }

        if let Some(token) = catalog.get(&path.key()) {
            if !TokenCatalog::is_visible(token, ctx.user.as_ref(), &ctx.roles, ctx.collection.as_ref()) {
                return Lookup::Found(None);
            }
            return Lookup::Found(token.resolver.resolve(ctx));
        }

        let value = match namespace {
            TokenNamespace::Entry => ctx.entry.as_ref().and_then(|e| resolve_path(rest, e)).cloned(),
            TokenNamespace::Collection => ctx
                .collection
                .as_ref()
                .and_then(|c| serde_json::to_value(c).ok())
                .and_then(|v| resolve_path(rest, &v).cloned()),
            TokenNamespace::Site => resolve_in_object(rest, &ctx.site_config).cloned(),
            TokenNamespace::Context => resolve_in_object(rest, &ctx.extra).cloned(),
            TokenNamespace::System | TokenNamespace::User => None,
        };
        Lookup::Found(value)
    }
}

/// Denied relations substitute the sentinel as-is; modifiers never see it
fn denied(expr: &TokenExpr, report: &mut ReplaceReport) -> String {
    ReplaceReport::record(&mut report.resolved, &expr.raw_path);
    ACCESS_DENIED.to_string()
}

/// Turn a token's final value into substitution text, applying the
/// unresolved policy when nothing was produced
fn settle(
    expr: &TokenExpr,
    raw: &str,
    found: bool,
    value: Value,
    options: ReplaceOptions,
    report: &mut ReplaceReport,
) -> Result<String, TokenError> {
    if found || !value.is_null() {
        ReplaceReport::record(&mut report.resolved, &expr.raw_path);
        return Ok(stringify(&value));
    }

    ReplaceReport::record(&mut report.failed, &expr.raw_path);
    match options.unresolved {
        UnresolvedPolicy::Preserve => Ok(raw.to_string()),
        UnresolvedPolicy::Strip => Ok(String::new()),
        UnresolvedPolicy::Throw => Err(TokenError::UnresolvedToken(expr.raw_path.clone())),
    }
}
