// Services: collaborator providers, relation lookup, context assembly and
// the replacement engine

pub mod context_loader;
pub mod providers;
pub mod relation_service;
pub mod token_engine;

pub use context_loader::{ContextLoader, ContextRequest};
pub use relation_service::{RelationLookup, RelationResolver, ACCESS_DENIED};
pub use token_engine::{ReplaceOptions, ReplaceReport, TokenEngine};
