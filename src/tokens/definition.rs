// Token metadata and the resolvers bound to it

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::domain::template::{resolve_in_object, resolve_path, TokenCategory};
use crate::domain::{TokenContext, ValueType};

/// Tokens computed from the context clock at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemToken {
    Now,
    Year,
    Timestamp,
    Date,
    Time,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl SystemToken {
    pub const ALL: [SystemToken; 10] = [
        SystemToken::Now,
        SystemToken::Year,
        SystemToken::Timestamp,
        SystemToken::Date,
        SystemToken::Time,
        SystemToken::Month,
        SystemToken::Day,
        SystemToken::Hour,
        SystemToken::Minute,
        SystemToken::Second,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemToken::Now => "now",
            SystemToken::Year => "year",
            SystemToken::Timestamp => "timestamp",
            SystemToken::Date => "date",
            SystemToken::Time => "time",
            SystemToken::Month => "month",
            SystemToken::Day => "day",
            SystemToken::Hour => "hour",
            SystemToken::Minute => "minute",
            SystemToken::Second => "second",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemToken::Now => "Current date and time (ISO 8601)",
            SystemToken::Year => "Current year",
            SystemToken::Timestamp => "Milliseconds since the Unix epoch",
            SystemToken::Date => "Current date (YYYY-MM-DD)",
            SystemToken::Time => "Current time (HH:MM:SS)",
            SystemToken::Month => "Current month (1-12)",
            SystemToken::Day => "Day of the month",
            SystemToken::Hour => "Hour (0-23)",
            SystemToken::Minute => "Minute",
            SystemToken::Second => "Second",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            SystemToken::Now => ValueType::Date,
            SystemToken::Date | SystemToken::Time => ValueType::String,
            _ => ValueType::Number,
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> Value {
        match self {
            SystemToken::Now => json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            SystemToken::Year => json!(now.year()),
            SystemToken::Timestamp => json!(now.timestamp_millis()),
            SystemToken::Date => json!(now.format("%Y-%m-%d").to_string()),
            SystemToken::Time => json!(now.format("%H:%M:%S").to_string()),
            SystemToken::Month => json!(now.month()),
            SystemToken::Day => json!(now.day()),
            SystemToken::Hour => json!(now.hour()),
            SystemToken::Minute => json!(now.minute()),
            SystemToken::Second => json!(now.second()),
        }
    }
}

/// Caller-registered resolver. Receives only the context.
pub type CustomResolverFn = Arc<dyn Fn(&TokenContext) -> Option<Value> + Send + Sync>;

/// How a token turns a context into a value. Every variant reads the
/// context it is handed; none captures a schema or user.
#[derive(Clone)]
pub enum TokenResolver {
    System(SystemToken),
    /// Allow-listed user field
    UserField(String),
    SiteSetting(String),
    /// Schema field or entry meta key
    EntryField(String),
    CollectionField(String),
    /// Handled by the relation service; never resolved from context alone
    Relation { field: String },
    Custom { name: String, func: CustomResolverFn },
}

impl TokenResolver {
    pub fn custom<F>(name: &str, func: F) -> Self
    where
        F: Fn(&TokenContext) -> Option<Value> + Send + Sync + 'static,
    {
        TokenResolver::Custom {
            name: name.to_string(),
            func: Arc::new(func),
        }
    }

    /// Total: absence is `None`, never a panic or error
    pub fn resolve(&self, ctx: &TokenContext) -> Option<Value> {
        match self {
            TokenResolver::System(token) => Some(token.resolve(ctx.now)),
            TokenResolver::UserField(name) => ctx.user.as_ref().and_then(|u| u.field(name)),
            TokenResolver::SiteSetting(key) => resolve_in_object(&[key], &ctx.site_config).cloned(),
            TokenResolver::EntryField(name) => ctx
                .entry
                .as_ref()
                .and_then(|entry| resolve_path(&[name], entry))
                .cloned(),
            TokenResolver::CollectionField(attr) => {
                let collection = ctx.collection.as_ref()?;
                let value = match attr.as_str() {
                    "_id" | "id" => Some(collection.id.clone()),
                    "name" => Some(collection.name.clone()),
                    "label" => collection.label.clone(),
                    "description" => collection.description.clone(),
                    _ => None,
                };
                value.map(Value::String)
            }
            TokenResolver::Relation { .. } => None,
            TokenResolver::Custom { func, .. } => func(ctx),
        }
    }
}

impl fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenResolver::System(token) => write!(f, "System({})", token.name()),
            TokenResolver::UserField(name) => write!(f, "UserField({})", name),
            TokenResolver::SiteSetting(key) => write!(f, "SiteSetting({})", key),
            TokenResolver::EntryField(name) => write!(f, "EntryField({})", name),
            TokenResolver::CollectionField(attr) => write!(f, "CollectionField({})", attr),
            TokenResolver::Relation { field } => write!(f, "Relation({})", field),
            TokenResolver::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// Catalog entry for a single token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDefinition {
    pub key: String,
    pub name: String,
    pub description: String,
    pub category: TokenCategory,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Schema field this token reads, for field-level permission checks
    #[serde(skip)]
    pub field: Option<String>,
    #[serde(skip)]
    pub resolver: TokenResolver,
}

impl TokenDefinition {
    pub fn new(key: &str, name: &str, category: TokenCategory, value_type: ValueType, resolver: TokenResolver) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: String::new(),
            category,
            value_type,
            required_permission: None,
            example: None,
            field: None,
            resolver,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.required_permission = Some(permission.to_string());
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}
