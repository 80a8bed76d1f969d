// Per-call resolution context

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::schema::CollectionSchema;
use super::user::{Role, User};

/// Read-only bag of everything a template may draw from. Built once per
/// call; the engine never mutates it.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub entry: Option<Value>,
    pub collection: Option<CollectionSchema>,
    pub site_config: Map<String, Value>,
    pub user: Option<User>,
    /// Clock snapshot that every `system.*` token and relative date reads
    pub now: DateTime<Utc>,
    pub tenant_id: Option<String>,
    pub roles: Vec<Role>,
    pub locale: Option<String>,
    /// Caller-supplied top-level values for paths outside the known namespaces
    pub extra: Map<String, Value>,
}

impl TokenContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entry: None,
            collection: None,
            site_config: Map::new(),
            user: None,
            now,
            tenant_id: None,
            roles: Vec::new(),
            locale: None,
            extra: Map::new(),
        }
    }

    pub fn with_entry(mut self, entry: Value) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_site_config(mut self, site_config: Map<String, Value>) -> Self {
        self.site_config = site_config;
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .as_ref()
            .map(|u| u.is_admin_in(&self.roles))
            .unwrap_or(false)
    }
}
