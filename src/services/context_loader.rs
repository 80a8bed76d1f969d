// Builds a TokenContext from the collaborator providers

use serde_json::Value;
use std::sync::Arc;

use super::providers::{SchemaProvider, SiteConfigProvider, UserProvider};
use crate::domain::{Clock, Role, TokenContext};
use crate::error::TokenError;

/// What the caller knows about the template being rendered
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub collection_id: Option<String>,
    pub entry: Option<Value>,
    pub tenant_id: Option<String>,
    pub locale: Option<String>,
}

pub struct ContextLoader {
    schemas: Arc<dyn SchemaProvider>,
    site: Arc<dyn SiteConfigProvider>,
    clock: Arc<dyn Clock>,
    roles: Vec<Role>,
}

impl ContextLoader {
    pub fn new(schemas: Arc<dyn SchemaProvider>, site: Arc<dyn SiteConfigProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            schemas,
            site,
            clock,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    pub fn schemas(&self) -> &Arc<dyn SchemaProvider> {
        &self.schemas
    }

    /// Assemble a per-call context. An unknown collection id is an error;
    /// everything else is optional.
    pub async fn load(&self, users: &dyn UserProvider, request: ContextRequest) -> Result<TokenContext, TokenError> {
        let mut ctx = TokenContext::new(self.clock.now())
            .with_site_config(self.site.public_config().await?)
            .with_roles(self.roles.clone());

        if let Some(user) = users.current_user().await? {
            ctx = ctx.with_user(user);
        }
        if let Some(tenant) = &request.tenant_id {
            ctx = ctx.with_tenant(tenant);
        }
        if let Some(locale) = &request.locale {
            ctx = ctx.with_locale(locale);
        }
        if let Some(id) = &request.collection_id {
            let schema = self
                .schemas
                .get_collection_by_id(id, request.tenant_id.as_deref())
                .await?
                .ok_or_else(|| TokenError::CollectionNotFound(id.clone()))?;
            ctx = ctx.with_collection(schema);
        }
        if let Some(entry) = request.entry {
            ctx = ctx.with_entry(entry);
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CollectionSchema, FixedClock, User};
    use crate::services::providers::{InMemorySchemaProvider, StaticSiteConfig, StaticUserProvider};
    use chrono::Utc;
    use serde_json::{json, Map};

    fn loader() -> ContextLoader {
        let mut site = Map::new();
        site.insert("siteName".to_string(), json!("Demo"));
        ContextLoader::new(
            Arc::new(InMemorySchemaProvider::new(vec![CollectionSchema::new("posts", "Posts")])),
            Arc::new(StaticSiteConfig::new(site)),
            Arc::new(FixedClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn test_load_full_context() {
        let users = StaticUserProvider::new(Some(User::new("u1", "editor")));
        let ctx = loader()
            .load(
                &users,
                ContextRequest {
                    collection_id: Some("posts".to_string()),
                    entry: Some(json!({"title": "Hi"})),
                    tenant_id: Some("acme".to_string()),
                    locale: Some("en".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(ctx.collection.unwrap().id, "posts");
        assert_eq!(ctx.user.unwrap().id, "u1");
        assert_eq!(ctx.site_config["siteName"], json!("Demo"));
        assert_eq!(ctx.tenant_id.as_deref(), Some("acme"));
        assert_eq!(ctx.locale.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let users = StaticUserProvider::new(None);
        let request = ContextRequest {
            collection_id: Some("nope".to_string()),
            ..Default::default()
        };
        let err = loader().load(&users, request).await.unwrap_err();
        assert_eq!(err, TokenError::CollectionNotFound("nope".to_string()));
    }
}
