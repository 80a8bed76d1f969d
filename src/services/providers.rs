// Collaborator interfaces consumed by the engine, plus in-memory
// implementations used by the CLI and tests

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::domain::{CollectionSchema, Role, User};

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn get_collection_by_id(&self, id: &str, tenant_id: Option<&str>) -> Result<Option<CollectionSchema>>;
}

/// Collection-level read check. Callers apply the admin bypass before
/// asking.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn can_read(&self, user: &User, collection_id: &str, tenant_id: Option<&str>, roles: &[Role]) -> Result<bool>;
}

/// Public (template-visible) site settings
#[async_trait]
pub trait SiteConfigProvider: Send + Sync {
    async fn public_config(&self) -> Result<Map<String, Value>>;
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>>;
}

/// Loads related records when an entry stores relation ids
#[async_trait]
pub trait EntryProvider: Send + Sync {
    async fn get_entry(&self, collection_id: &str, id: &str, tenant_id: Option<&str>) -> Result<Option<Value>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    pub base_url: String,
}

#[async_trait]
pub trait MediaConfigProvider: Send + Sync {
    async fn media_config(&self) -> Result<Option<MediaConfig>>;
}

/// Schemas held in memory; `upsert` stands in for a schema edit
#[derive(Default)]
pub struct InMemorySchemaProvider {
    schemas: RwLock<HashMap<String, CollectionSchema>>,
}

impl InMemorySchemaProvider {
    pub fn new(schemas: Vec<CollectionSchema>) -> Self {
        Self {
            schemas: RwLock::new(schemas.into_iter().map(|s| (s.id.clone(), s)).collect()),
        }
    }

    pub async fn upsert(&self, schema: CollectionSchema) {
        self.schemas.write().await.insert(schema.id.clone(), schema);
    }
}

#[async_trait]
impl SchemaProvider for InMemorySchemaProvider {
    async fn get_collection_by_id(&self, id: &str, _tenant_id: Option<&str>) -> Result<Option<CollectionSchema>> {
        Ok(self.schemas.read().await.get(id).cloned())
    }
}

/// Grants read access per (collection, role). A role carrying the
/// permission `<collection>:read` is also granted.
#[derive(Debug, Default)]
pub struct RoleGrantPermissions {
    grants: HashMap<String, HashSet<String>>,
}

impl RoleGrantPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, collection_id: &str, role: &str) -> Self {
        self.grants
            .entry(collection_id.to_string())
            .or_default()
            .insert(role.to_string());
        self
    }
}

#[async_trait]
impl PermissionChecker for RoleGrantPermissions {
    async fn can_read(&self, user: &User, collection_id: &str, _tenant_id: Option<&str>, roles: &[Role]) -> Result<bool> {
        if self
            .grants
            .get(collection_id)
            .map(|granted| granted.contains(&user.role))
            .unwrap_or(false)
        {
            return Ok(true);
        }
        Ok(user.has_permission(&format!("{}:read", collection_id), roles))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticSiteConfig {
    config: Map<String, Value>,
}

impl StaticSiteConfig {
    pub fn new(config: Map<String, Value>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SiteConfigProvider for StaticSiteConfig {
    async fn public_config(&self) -> Result<Map<String, Value>> {
        Ok(self.config.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticUserProvider {
    user: Option<User>,
}

impl StaticUserProvider {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }
}

#[async_trait]
impl UserProvider for StaticUserProvider {
    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.user.clone())
    }
}

/// Entries keyed by (collection id, entry id)
#[derive(Debug, Default)]
pub struct InMemoryEntryProvider {
    entries: HashMap<(String, String), Value>,
}

impl InMemoryEntryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, collection_id: &str, id: &str, entry: Value) -> Self {
        self.entries.insert((collection_id.to_string(), id.to_string()), entry);
        self
    }
}

#[async_trait]
impl EntryProvider for InMemoryEntryProvider {
    async fn get_entry(&self, collection_id: &str, id: &str, _tenant_id: Option<&str>) -> Result<Option<Value>> {
        Ok(self
            .entries
            .get(&(collection_id.to_string(), id.to_string()))
            .cloned())
    }
}

#[derive(Debug, Clone)]
pub struct StaticMediaConfig {
    config: MediaConfig,
}

impl StaticMediaConfig {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MediaConfigProvider for StaticMediaConfig {
    async fn media_config(&self) -> Result<Option<MediaConfig>> {
        Ok(Some(self.config.clone()))
    }
}
