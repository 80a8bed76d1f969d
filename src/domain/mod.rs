// Domain model for token resolution: schema, user, context and values

pub mod clock;
pub mod context;
pub mod schema;
pub mod template;
pub mod user;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::TokenContext;
pub use schema::{CollectionSchema, FieldAccess, FieldDefinition};
pub use user::{Role, User, DEFAULT_USER_ALLOW_LIST};
pub use value::ValueType;
