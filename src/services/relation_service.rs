// Cross-collection token resolution behind a read-permission gate

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use super::providers::{EntryProvider, PermissionChecker, SchemaProvider};
use crate::domain::template::resolve_path;
use crate::domain::value::stringify;
use crate::domain::{CollectionSchema, FieldDefinition, TokenContext};

/// Substituted when the caller may not read the related collection
pub const ACCESS_DENIED: &str = "[Access Denied]";

/// Outcome of a relation lookup before it becomes substitution text
#[derive(Debug, Clone, PartialEq)]
pub enum RelationLookup {
    Denied,
    Value(Option<Value>),
}

pub struct RelationResolver {
    schemas: Arc<dyn SchemaProvider>,
    permissions: Arc<dyn PermissionChecker>,
    entries: Option<Arc<dyn EntryProvider>>,
}

impl RelationResolver {
    pub fn new(schemas: Arc<dyn SchemaProvider>, permissions: Arc<dyn PermissionChecker>) -> Self {
        Self {
            schemas,
            permissions,
            entries: None,
        }
    }

    pub fn with_entries(mut self, entries: Arc<dyn EntryProvider>) -> Self {
        self.entries = Some(entries);
        self
    }

    /// Resolve `entry.<field>.<rest...>` for a relation field.
    ///
    /// Denied access yields [`ACCESS_DENIED`]. `None` means nothing to
    /// resolve: empty relation, unloadable ids or a missing nested field.
    pub async fn resolve(&self, field: &FieldDefinition, rest: &[String], ctx: &TokenContext) -> Result<Option<Value>> {
        Ok(match self.lookup(field, rest, ctx).await? {
            RelationLookup::Denied => Some(Value::String(ACCESS_DENIED.to_string())),
            RelationLookup::Value(value) => value,
        })
    }

    /// Like [`resolve`](Self::resolve), keeping a denial distinct from data
    pub async fn lookup(&self, field: &FieldDefinition, rest: &[String], ctx: &TokenContext) -> Result<RelationLookup> {
        let Some(target) = field.collection.as_deref() else {
            tracing::debug!(field = %field.name, "Relation field has no target collection");
            return Ok(RelationLookup::Value(None));
        };

        if !self.can_access(field, target, ctx).await {
            return Ok(RelationLookup::Denied);
        }
        self.navigate(target, &field.name, rest, ctx).await.map(RelationLookup::Value)
    }

    async fn navigate(&self, target: &str, field_name: &str, rest: &[String], ctx: &TokenContext) -> Result<Option<Value>> {
        let references = relation_references(ctx.entry.as_ref(), field_name);
        if rest.first().map(String::as_str) == Some("count") {
            return Ok(Some(Value::from(references.len())));
        }

        let tenant = ctx.tenant_id.as_deref();
        let schema = self.schemas.get_collection_by_id(target, tenant).await?;

        match rest.split_first() {
            Some((head, tail)) if head == "all" => {
                let mut parts = Vec::new();
                for reference in &references {
                    if let Some(record) = self.load(target, reference, tenant).await? {
                        let value = if tail.is_empty() {
                            display_value(&record, schema.as_ref())
                        } else {
                            resolve_path(tail, &record).cloned()
                        };
                        if let Some(value) = value {
                            parts.push(stringify(&value));
                        }
                    }
                }
                if parts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::String(parts.join(", "))))
                }
            }
            _ => {
                // Explicit index into a multi-valued relation, else the first item
                let (index, path) = match rest.split_first() {
                    Some((head, tail)) => match head.parse::<usize>() {
                        Ok(index) => (index, tail),
                        Err(_) => (0, rest),
                    },
                    None => (0, rest),
                };
                let Some(reference) = references.get(index) else {
                    return Ok(None);
                };
                let Some(record) = self.load(target, reference, tenant).await? else {
                    return Ok(None);
                };
                if path.is_empty() {
                    Ok(display_value(&record, schema.as_ref()))
                } else {
                    Ok(resolve_path(path, &record).cloned())
                }
            }
        }
    }

    /// Admin bypass, else an explicit read check. Denials are audited.
    async fn can_access(&self, field: &FieldDefinition, target: &str, ctx: &TokenContext) -> bool {
        let Some(user) = ctx.user.as_ref() else {
            tracing::warn!(actor = "anonymous", field = %field.name, collection = %target, "Denied relation token access");
            return false;
        };
        if user.is_admin_in(&ctx.roles) {
            return true;
        }

        let allowed = match self
            .permissions
            .can_read(user, target, ctx.tenant_id.as_deref(), &ctx.roles)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!(actor = %user.id, collection = %target, error = %e, "Permission check failed");
                false
            }
        };
        if !allowed {
            tracing::warn!(actor = %user.id, field = %field.name, collection = %target, "Denied relation token access");
        }
        allowed
    }

    async fn load(&self, collection_id: &str, reference: &Value, tenant: Option<&str>) -> Result<Option<Value>> {
        match reference {
            Value::Object(_) => Ok(Some(reference.clone())),
            Value::String(_) | Value::Number(_) => {
                let Some(entries) = &self.entries else {
                    tracing::debug!(collection = %collection_id, "Relation holds ids but no entry provider is configured");
                    return Ok(None);
                };
                entries
                    .get_entry(collection_id, &stringify(reference), tenant)
                    .await
            }
            _ => Ok(None),
        }
    }
}

/// The raw relation value as a list: populated records or ids
fn relation_references(entry: Option<&Value>, field: &str) -> Vec<Value> {
    match entry.and_then(|e| e.get(field)) {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

fn display_value(record: &Value, schema: Option<&CollectionSchema>) -> Option<Value> {
    let preferred = schema.and_then(|s| s.display_field_name());
    preferred
        .into_iter()
        .chain(["title", "name"])
        .find_map(|field| record.get(field).filter(|v| !v.is_null()))
        .cloned()
}
