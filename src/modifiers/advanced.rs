// I/O-capable modifiers: media URLs and related-record lookup

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::arg;
use crate::domain::template::{AsyncModifier, ModifierContext, ModifierDefinition, ModifierRegistry, ParamSpec};
use crate::domain::value::{stringify, ValueType};

pub fn register(registry: &mut ModifierRegistry) {
    registry.register_async(Box::new(ImageStyleModifier::new()));
    registry.register_async(Box::new(RelatedModifier::new()));
}

/// Rewrites a media id into a media-server URL carrying a `style` param
pub struct ImageStyleModifier {
    definition: ModifierDefinition,
}

impl ImageStyleModifier {
    pub fn new() -> Self {
        Self {
            definition: ModifierDefinition {
                name: "image_style",
                description: "Media URL for an image style",
                accepts: vec![ValueType::Media, ValueType::String],
                params: vec![ParamSpec::required("style")],
                is_async: true,
            },
        }
    }
}

impl Default for ImageStyleModifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncModifier for ImageStyleModifier {
    fn definition(&self) -> &ModifierDefinition {
        &self.definition
    }

    async fn apply(&self, value: &Value, args: &[String], ctx: &ModifierContext) -> Result<Value> {
        let style = arg(args, 0).context("image_style requires a style name")?;
        let media_id = stringify(value);

        let config = match &ctx.media {
            Some(provider) => match provider.media_config().await {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "Media config lookup failed; using raw media id");
                    None
                }
            },
            None => None,
        };
        let Some(config) = config else {
            tracing::warn!(media_id = %media_id, "Media config unavailable; using raw media id");
            return Ok(value.clone());
        };

        let mut url = match Url::parse(&media_id) {
            Ok(absolute) if absolute.has_host() => absolute,
            _ => {
                let base = config.base_url.trim_end_matches('/');
                let joined = format!("{}/{}", base, urlencoding::encode(media_id.trim_start_matches('/')));
                Url::parse(&joined).with_context(|| format!("invalid media base URL '{}'", config.base_url))?
            }
        };
        url.query_pairs_mut().append_pair("style", style);
        Ok(Value::String(url.to_string()))
    }
}

/// Placeholder for related-record lookup. Needs a collection lookup
/// integration to do anything; until then it passes the value through.
pub struct RelatedModifier {
    definition: ModifierDefinition,
}

impl RelatedModifier {
    pub fn new() -> Self {
        Self {
            definition: ModifierDefinition {
                name: "related",
                description: "Read a field from a related record (requires collection lookup integration)",
                accepts: vec![ValueType::Relation, ValueType::String],
                params: vec![ParamSpec::required("field")],
                is_async: true,
            },
        }
    }
}

impl Default for RelatedModifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncModifier for RelatedModifier {
    fn definition(&self) -> &ModifierDefinition {
        &self.definition
    }

    async fn apply(&self, value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
        tracing::warn!(
            field = arg(args, 0).unwrap_or(""),
            "related modifier has no collection lookup integration; value unchanged"
        );
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MediaConfig, StaticMediaConfig};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx_with_media(base: &str) -> ModifierContext {
        ModifierContext::new(Utc::now()).with_media(Some(Arc::new(StaticMediaConfig::new(MediaConfig {
            base_url: base.to_string(),
        }))))
    }

    #[tokio::test]
    async fn test_image_style_builds_url() {
        let out = ImageStyleModifier::new()
            .apply(&json!("abc123"), &["thumbnail".to_string()], &ctx_with_media("https://media.example.com/files/"))
            .await
            .unwrap();
        assert_eq!(out, json!("https://media.example.com/files/abc123?style=thumbnail"));
    }

    #[tokio::test]
    async fn test_image_style_keeps_absolute_urls() {
        let out = ImageStyleModifier::new()
            .apply(
                &json!("https://cdn.example.com/a.jpg?v=2"),
                &["hero".to_string()],
                &ctx_with_media("https://media.example.com"),
            )
            .await
            .unwrap();
        assert_eq!(out, json!("https://cdn.example.com/a.jpg?v=2&style=hero"));
    }

    #[tokio::test]
    async fn test_image_style_without_media_config() {
        let out = ImageStyleModifier::new()
            .apply(&json!("abc123"), &["thumbnail".to_string()], &ModifierContext::new(Utc::now()))
            .await
            .unwrap();
        assert_eq!(out, json!("abc123"));
    }

    #[tokio::test]
    async fn test_image_style_requires_style() {
        let result = ImageStyleModifier::new()
            .apply(&json!("abc123"), &[], &ctx_with_media("https://media.example.com"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_related_is_passthrough() {
        let out = RelatedModifier::new()
            .apply(&json!("id-1"), &["title".to_string()], &ModifierContext::new(Utc::now()))
            .await
            .unwrap();
        assert_eq!(out, json!("id-1"));
    }
}
