use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{Role, DEFAULT_USER_ALLOW_LIST};
use crate::tokens::DEFAULT_TTL_SECS;

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// What happens to a placeholder that resolves to nothing
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Leave the original `{{...}}` text in place
    #[default]
    Preserve,
    /// Substitute the empty string
    Strip,
    /// Fail the whole replacement
    Throw,
}

/// Engine settings, read from YAML
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub max_depth: usize,
    pub unresolved: UnresolvedPolicy,
    pub cache_ttl_secs: i64,
    pub user_allow_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_base_url: Option<String>,
    /// Collection id to the roles allowed to read it through relation tokens
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub read_grants: BTreeMap<String, Vec<String>>,
    /// Role definitions; the only source of admin status and token permissions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unresolved: UnresolvedPolicy::Preserve,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            user_allow_list: DEFAULT_USER_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
            media_base_url: None,
            read_grants: BTreeMap::new(),
            roles: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn from_yaml(yml: &str) -> Result<Self> {
        let settings: EngineSettings = serde_yaml::from_str(yml).context("Invalid engine settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yml = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file {}", path.display()))?;
        Self::from_yaml(&yml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            bail!("maxDepth must be at least 1");
        }
        if self.cache_ttl_secs < 0 {
            bail!("cacheTtlSecs must not be negative");
        }
        if let Some(base) = &self.media_base_url {
            url::Url::parse(base).with_context(|| format!("mediaBaseUrl '{}' is not a valid URL", base))?;
        }
        Ok(())
    }
}
