// Token API handlers: catalog, replacement, modifier listing and cache invalidation

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    config::UnresolvedPolicy,
    domain::User,
    error::AppError,
    services::{providers::StaticUserProvider, ContextRequest},
    tokens::CatalogOptions,
    AppState,
};

/// Caller identity as sent in a request body. Admin status is never taken
/// from the client; it comes from the configured roles.
#[derive(Deserialize, Debug)]
pub struct RequestUser {
    #[serde(rename = "_id")]
    id: String,
    role: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl From<RequestUser> for User {
    fn from(request: RequestUser) -> Self {
        let mut user = User::new(&request.id, &request.role);
        user.data = request.data;
        user
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    collection_id: Option<String>,
    user: Option<RequestUser>,
    locale: Option<String>,
    sample_entry: Option<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRequest {
    template: String,
    collection_id: Option<String>,
    entry: Option<Value>,
    user: Option<RequestUser>,
    locale: Option<String>,
    tenant_id: Option<String>,
    #[serde(default)]
    strict: bool,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Tokens the caller may insert, grouped by category
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CatalogRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = body(payload)?;
    let users = StaticUserProvider::new(request.user.map(User::from));
    let ctx = state
        .loader
        .load(
            &users,
            ContextRequest {
                collection_id: request.collection_id,
                locale: request.locale.clone(),
                ..Default::default()
            },
        )
        .await?;

    let options = CatalogOptions {
        roles: ctx.roles.clone(),
        site_config: ctx.site_config.clone(),
        locale: request.locale,
        sample_entry: request.sample_entry,
    };
    let tokens = state
        .engine
        .get_available_tokens(ctx.collection.as_ref(), ctx.user.as_ref(), &options);
    Ok(Json(tokens))
}

/// Render a template against an entry. `strict` turns unresolved tokens
/// into a 400.
pub async fn replace(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReplaceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = body(payload)?;
    let users = StaticUserProvider::new(request.user.map(User::from));
    let ctx = state
        .loader
        .load(
            &users,
            ContextRequest {
                collection_id: request.collection_id,
                entry: request.entry,
                tenant_id: request.tenant_id,
                locale: request.locale,
            },
        )
        .await?;

    let mut options = state.engine.options();
    if request.strict {
        options = options.with_unresolved(UnresolvedPolicy::Throw);
    }
    let report = state
        .engine
        .replace_tokens_detailed(&request.template, &ctx, options)
        .await?;
    Ok(Json(report))
}

pub async fn modifiers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let definitions: Vec<_> = state
        .engine
        .modifiers()
        .definitions()
        .into_iter()
        .cloned()
        .collect();
    Json(definitions)
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.engine.clear_token_cache();
    StatusCode::NO_CONTENT
}
