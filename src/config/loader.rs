use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::domain::CollectionSchema;

/// Parse a YAML list of collection schemas. Collection ids must be unique.
pub fn parse_schemas(yml: &str) -> Result<Vec<CollectionSchema>> {
    let schemas: Vec<CollectionSchema> = serde_yaml::from_str(yml).context("Invalid schema configuration")?;
    let mut seen = HashSet::new();
    for schema in &schemas {
        if !seen.insert(schema.id.as_str()) {
            bail!("Duplicate collection id: {}", schema.id);
        }
    }
    Ok(schemas)
}

pub fn load_schemas(path: &Path) -> Result<Vec<CollectionSchema>> {
    let yml = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read schema file {}", path.display()))?;
    parse_schemas(&yml)
}

/// Parse the public site settings map
pub fn parse_site_config(yml: &str) -> Result<Map<String, Value>> {
    serde_yaml::from_str(yml).context("Invalid site configuration")
}

pub fn load_site_config(path: &Path) -> Result<Map<String, Value>> {
    let yml = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read site file {}", path.display()))?;
    parse_site_config(&yml)
}
