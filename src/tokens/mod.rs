// Token catalog: definitions, bound resolvers and the TTL cache

pub mod cache;
pub mod definition;
pub mod registry;

pub use cache::{CacheKey, InMemoryTokenCache, TokenCache, DEFAULT_TTL_SECS};
pub use definition::{CustomResolverFn, SystemToken, TokenDefinition, TokenResolver};
pub use registry::{AvailableTokens, CatalogOptions, TokenCatalog, TokenRegistry};
