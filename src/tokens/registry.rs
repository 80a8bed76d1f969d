// Token catalog construction, caching and per-caller filtering

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::cache::{CacheKey, TokenCache};
use super::definition::{SystemToken, TokenDefinition, TokenResolver};
use crate::domain::template::TokenCategory;
use crate::domain::{CollectionSchema, Role, User, ValueType, DEFAULT_USER_ALLOW_LIST};

/// Catalog grouped by category, as handed to the token picker
pub type AvailableTokens = BTreeMap<TokenCategory, Vec<TokenDefinition>>;

const ENTRY_META: &[(&str, &str, ValueType)] = &[
    ("_id", "Entry ID", ValueType::String),
    ("status", "Status", ValueType::String),
    ("createdAt", "Created", ValueType::Date),
    ("updatedAt", "Updated", ValueType::Date),
];

const COLLECTION_ATTRS: &[(&str, &str)] = &[
    ("_id", "Collection ID"),
    ("name", "Collection name"),
    ("label", "Collection label"),
    ("description", "Collection description"),
];

/// Built token list plus the key index used at resolution time.
/// Adding a token always indexes it, so catalog and runtime agree.
#[derive(Debug, Default)]
pub struct TokenCatalog {
    tokens: Vec<TokenDefinition>,
    index: HashMap<String, usize>,
}

impl TokenCatalog {
    pub fn add(&mut self, token: TokenDefinition) {
        match self.index.get(&token.key) {
            Some(&pos) => self.tokens[pos] = token,
            None => {
                self.index.insert(token.key.clone(), self.tokens.len());
                self.tokens.push(token);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&TokenDefinition> {
        self.index.get(key).map(|&pos| &self.tokens[pos])
    }

    pub fn resolver(&self, key: &str) -> Option<&TokenResolver> {
        self.get(key).map(|t| &t.resolver)
    }

    pub fn tokens(&self) -> &[TokenDefinition] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether `user` may see and resolve `token`
    pub fn is_visible(token: &TokenDefinition, user: Option<&User>, roles: &[Role], schema: Option<&CollectionSchema>) -> bool {
        if let Some(permission) = &token.required_permission {
            let granted = user.map(|u| u.has_permission(permission, roles)).unwrap_or(false);
            if !granted {
                return false;
            }
        }
        match (&token.field, schema) {
            (Some(field), Some(schema)) => schema
                .field(field)
                .map(|f| f.can_read(user, roles))
                .unwrap_or(true),
            _ => true,
        }
    }

    /// Tokens `user` may see, grouped by category. Every category is present.
    pub fn visible_to(&self, user: Option<&User>, roles: &[Role], schema: Option<&CollectionSchema>) -> AvailableTokens {
        let mut grouped: AvailableTokens = [
            TokenCategory::Entry,
            TokenCategory::Collection,
            TokenCategory::Site,
            TokenCategory::User,
            TokenCategory::System,
        ]
        .into_iter()
        .map(|c| (c, Vec::new()))
        .collect();

        for token in &self.tokens {
            if Self::is_visible(token, user, roles, schema) {
                grouped.entry(token.category).or_default().push(token.clone());
            }
        }
        grouped
    }
}

/// Inputs to catalog construction besides schema and user
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    pub roles: Vec<Role>,
    pub site_config: Map<String, Value>,
    pub locale: Option<String>,
    /// Source of example values for entry tokens
    pub sample_entry: Option<Value>,
}

pub struct TokenRegistry {
    cache: Arc<dyn TokenCache>,
    custom: Vec<TokenDefinition>,
    user_allow_list: Vec<String>,
}

impl TokenRegistry {
    pub fn new(cache: Arc<dyn TokenCache>) -> Self {
        Self {
            cache,
            custom: Vec::new(),
            user_allow_list: DEFAULT_USER_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_custom_token(mut self, token: TokenDefinition) -> Self {
        self.custom.push(token);
        self
    }

    pub fn with_user_allow_list(mut self, fields: Vec<String>) -> Self {
        self.user_allow_list = fields;
        self
    }

    pub fn allows_user_field(&self, name: &str) -> bool {
        self.user_allow_list.iter().any(|f| f == name)
    }

    pub fn cache_key(schema: Option<&CollectionSchema>, user: Option<&User>, locale: Option<&str>) -> CacheKey {
        CacheKey {
            role: user.map(|u| u.role.clone()).unwrap_or_else(|| "anonymous".to_string()),
            collection_id: schema.map(|s| s.id.clone()),
            locale: locale.map(str::to_string),
        }
    }

    /// Cached catalog for the caller's (role, collection, locale)
    pub fn catalog(&self, schema: Option<&CollectionSchema>, user: Option<&User>, options: &CatalogOptions) -> Arc<TokenCatalog> {
        let key = Self::cache_key(schema, user, options.locale.as_deref());
        if let Some(catalog) = self.cache.get(&key) {
            return catalog;
        }

        let catalog = Arc::new(self.build(schema, options));
        tracing::debug!(key = %key, tokens = catalog.len(), "Rebuilt token catalog");
        self.cache.set(key, Arc::clone(&catalog));
        catalog
    }

    /// Tokens available to `user`, filtered per call against the cached list
    pub fn get_tokens(&self, schema: Option<&CollectionSchema>, user: Option<&User>, options: &CatalogOptions) -> AvailableTokens {
        self.catalog(schema, user, options)
            .visible_to(user, &options.roles, schema)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    fn build(&self, schema: Option<&CollectionSchema>, options: &CatalogOptions) -> TokenCatalog {
        let mut catalog = TokenCatalog::default();

        for token in SystemToken::ALL {
            catalog.add(
                TokenDefinition::new(
                    &format!("system.{}", token.name()),
                    &capitalize(token.name()),
                    TokenCategory::System,
                    token.value_type(),
                    TokenResolver::System(token),
                )
                .with_description(token.description()),
            );
        }

        for field in &self.user_allow_list {
            catalog.add(
                TokenDefinition::new(
                    &format!("user.{}", field),
                    &capitalize(field.trim_start_matches('_')),
                    TokenCategory::User,
                    ValueType::String,
                    TokenResolver::UserField(field.clone()),
                )
                .with_description("Field of the signed-in user"),
            );
        }

        for (key, value) in &options.site_config {
            let value_type = match value {
                Value::String(_) => ValueType::String,
                Value::Number(_) => ValueType::Number,
                Value::Bool(_) => ValueType::Boolean,
                _ => continue,
            };
            catalog.add(
                TokenDefinition::new(
                    &format!("site.{}", key),
                    &capitalize(key),
                    TokenCategory::Site,
                    value_type,
                    TokenResolver::SiteSetting(key.clone()),
                )
                .with_description("Site setting")
                .with_example(value.clone()),
            );
        }

        if let Some(schema) = schema {
            self.add_schema_tokens(&mut catalog, schema, options.sample_entry.as_ref());
        }

        for token in &self.custom {
            catalog.add(token.clone());
        }

        catalog
    }

    fn add_schema_tokens(&self, catalog: &mut TokenCatalog, schema: &CollectionSchema, sample: Option<&Value>) {
        for (attr, label) in COLLECTION_ATTRS {
            catalog.add(
                TokenDefinition::new(
                    &format!("collection.{}", attr),
                    label,
                    TokenCategory::Collection,
                    ValueType::String,
                    TokenResolver::CollectionField(attr.to_string()),
                )
                .with_description(&format!("{} of {}", label, schema.name)),
            );
        }

        for field in &schema.fields {
            let resolver = if field.is_relation() {
                TokenResolver::Relation {
                    field: field.name.clone(),
                }
            } else {
                TokenResolver::EntryField(field.name.clone())
            };
            let description = field
                .description
                .clone()
                .unwrap_or_else(|| format!("{} field", field.display_label()));
            let mut token = TokenDefinition::new(
                &format!("entry.{}", field.name),
                field.display_label(),
                TokenCategory::Entry,
                field.value_type(),
                resolver,
            )
            .with_description(&description)
            .with_field(&field.name);
            if let Some(example) = sample.and_then(|s| s.get(&field.name)).filter(|v| !v.is_null()) {
                token = token.with_example(example.clone());
            }
            catalog.add(token);
        }

        for (name, label, value_type) in ENTRY_META {
            if schema.field(name).is_some() {
                continue;
            }
            catalog.add(
                TokenDefinition::new(
                    &format!("entry.{}", name),
                    label,
                    TokenCategory::Entry,
                    *value_type,
                    TokenResolver::EntryField(name.to_string()),
                )
                .with_description("Entry metadata"),
            );
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
