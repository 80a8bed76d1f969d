// Configuration: engine settings and YAML loaders for schemas and site settings

pub mod engine_settings;
pub mod loader;

pub use engine_settings::{EngineSettings, UnresolvedPolicy, DEFAULT_MAX_DEPTH};
pub use loader::{load_schemas, load_site_config, parse_schemas, parse_site_config};
