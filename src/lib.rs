pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod modifiers;
pub mod services;
pub mod tokens;

use axum::{
    routing::{get, post},
    Router,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::EngineSettings;
use domain::{Clock, CollectionSchema};
use services::{
    providers::{InMemorySchemaProvider, RoleGrantPermissions, StaticSiteConfig},
    ContextLoader, RelationResolver, TokenEngine,
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

// Application state
pub struct AppState {
    pub engine: TokenEngine,
    pub loader: ContextLoader,
}

impl AppState {
    pub fn new(engine: TokenEngine, loader: ContextLoader) -> Self {
        Self { engine, loader }
    }

    /// State backed by in-memory providers loaded from configuration
    pub fn from_config(
        settings: &EngineSettings,
        schemas: Vec<CollectionSchema>,
        site_config: Map<String, Value>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let schema_provider = Arc::new(InMemorySchemaProvider::new(schemas));
        let permissions = settings
            .read_grants
            .iter()
            .flat_map(|(collection, roles)| roles.iter().map(move |role| (collection, role)))
            .fold(RoleGrantPermissions::new(), |grants, (collection, role)| {
                grants.grant(collection, role)
            });

        let engine = TokenEngine::from_settings(settings, Arc::clone(&clock))
            .with_relations(RelationResolver::new(schema_provider.clone(), Arc::new(permissions)));
        let loader = ContextLoader::new(schema_provider, Arc::new(StaticSiteConfig::new(site_config)), clock)
            .with_roles(settings.roles.clone());
        Self::new(engine, loader)
    }
}

// Public function to create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tokens/catalog", post(handlers::tokens::catalog))
        .route("/api/tokens/replace", post(handlers::tokens::replace))
        .route("/api/tokens/modifiers", get(handlers::tokens::modifiers))
        .route("/api/tokens/cache/clear", post(handlers::tokens::clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
