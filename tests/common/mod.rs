// Common test fixtures shared across test files

use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use cms_tokens::config::EngineSettings;
use cms_tokens::domain::{CollectionSchema, FieldAccess, FieldDefinition, FixedClock, Role, TokenContext, User};
use cms_tokens::services::providers::{InMemoryEntryProvider, InMemorySchemaProvider, RoleGrantPermissions};
use cms_tokens::services::{RelationResolver, TokenEngine};
use cms_tokens::AppState;

/// Clock pinned to 2024-01-15T10:30:00Z
#[allow(dead_code)]
pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()))
}

#[allow(dead_code)]
pub fn posts_schema() -> CollectionSchema {
    CollectionSchema::new("posts", "Posts")
        .with_label("Blog Posts")
        .with_display_field("title")
        .with_field(FieldDefinition::new("title", "Input").with_label("Title"))
        .with_field(FieldDefinition::new("publishedAt", "Date").with_label("Published"))
        .with_field(FieldDefinition::new("hero", "MediaUpload"))
        .with_field(FieldDefinition::relation("author", "authors"))
        .with_field(FieldDefinition::relation("reviewers", "authors").with_multiple(true))
        .with_field(
            FieldDefinition::new("internalNotes", "RichText")
                .with_permission("viewer", FieldAccess { read: false, write: false }),
        )
}

#[allow(dead_code)]
pub fn authors_schema() -> CollectionSchema {
    CollectionSchema::new("authors", "Authors")
        .with_field(FieldDefinition::new("name", "Input"))
        .with_field(FieldDefinition::new("email", "Email"))
}

#[allow(dead_code)]
pub fn site_config() -> Map<String, Value> {
    let mut site = Map::new();
    site.insert("siteName".to_string(), json!("Demo Site"));
    site.insert("itemsPerPage".to_string(), json!(20));
    site
}

#[allow(dead_code)]
pub fn sample_entry() -> Value {
    json!({
        "_id": "p1",
        "status": "published",
        "title": "hello world",
        "publishedAt": "2024-01-15T10:30:00.000Z",
        "hero": "img-42",
        "views": 0,
        "author": {"_id": "a1", "name": "Ada Lovelace", "email": "ada@example.com"},
        "reviewers": ["a2", "a3"],
        "internalNotes": "do not publish"
    })
}

#[allow(dead_code)]
pub fn editor() -> User {
    User::new("u-editor", "editor")
        .with_field("username", json!("ed"))
        .with_field("email", json!("ed@example.com"))
        .with_field("password", json!("hunter2"))
}

#[allow(dead_code)]
pub fn viewer() -> User {
    User::new("u-viewer", "viewer").with_field("username", json!("vi"))
}

#[allow(dead_code)]
pub fn admin() -> User {
    User::new("u-admin", "viewer").with_admin(true)
}

/// Engine with relation support: editors may read authors, viewers may not
#[allow(dead_code)]
pub fn engine(clock: Arc<FixedClock>) -> TokenEngine {
    let schemas = Arc::new(InMemorySchemaProvider::new(vec![posts_schema(), authors_schema()]));
    let entries = InMemoryEntryProvider::new()
        .with_entry("authors", "a2", json!({"name": "Grace Hopper"}))
        .with_entry("authors", "a3", json!({"name": "Alan Turing"}));
    let relations = RelationResolver::new(schemas, Arc::new(RoleGrantPermissions::new().grant("authors", "editor")))
        .with_entries(Arc::new(entries));
    TokenEngine::new(clock).with_relations(relations)
}

/// Context for a post rendered by `user`
#[allow(dead_code)]
pub fn post_context(engine: &TokenEngine, user: Option<User>) -> TokenContext {
    let ctx = engine
        .new_context()
        .with_collection(posts_schema())
        .with_site_config(site_config())
        .with_entry(sample_entry());
    match user {
        Some(user) => ctx.with_user(user),
        None => ctx,
    }
}

/// Create a test Axum router backed by in-memory providers. Editors may
/// read authors and `superuser` is the configured admin role.
#[allow(dead_code)]
pub fn create_test_app() -> axum::Router {
    let mut settings = EngineSettings::default();
    settings
        .read_grants
        .insert("authors".to_string(), vec!["editor".to_string()]);
    settings.media_base_url = Some("https://media.example.com".to_string());
    settings.roles = vec![Role::admin("superuser"), Role::new("editor"), Role::new("viewer")];

    let state = AppState::from_config(
        &settings,
        vec![posts_schema(), authors_schema()],
        site_config(),
        fixed_clock(),
    );
    cms_tokens::create_router(Arc::new(state))
}
