// Authenticated user and role definitions as seen by the token engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User fields templates may read. Everything else resolves empty.
pub const DEFAULT_USER_ALLOW_LIST: &[&str] = &[
    "_id",
    "username",
    "email",
    "role",
    "firstName",
    "lastName",
    "avatar",
];

/// Role definition from the surrounding system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            is_admin: false,
            permissions: Vec::new(),
        }
    }

    pub fn admin(id: &str) -> Self {
        let mut role = Self::new(id);
        role.is_admin = true;
        role
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }
}

/// The authenticated user. `data` is the raw user document and may hold
/// fields that must never reach a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl User {
    pub fn new(id: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            role: role.to_string(),
            is_admin: false,
            data: Map::new(),
        }
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.data.insert(name.to_string(), value);
        self
    }

    /// Raw field lookup, without any allow-list check
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "_id" | "id" => Some(Value::String(self.id.clone())),
            "role" => Some(Value::String(self.role.clone())),
            _ => self.data.get(name).filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Admin by flag or by holding a role marked admin. A role's name alone
    /// grants nothing.
    pub fn is_admin_in(&self, roles: &[Role]) -> bool {
        self.is_admin || roles.iter().any(|r| r.is_admin && r.id == self.role)
    }

    pub fn has_permission(&self, permission: &str, roles: &[Role]) -> bool {
        self.is_admin_in(roles)
            || roles
                .iter()
                .filter(|r| r.id == self.role)
                .any(|r| r.permissions.iter().any(|p| p == permission))
    }
}
