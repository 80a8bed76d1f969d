// Collection schema model consumed from the schema provider

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::{Role, User};
use super::value::ValueType;

/// Per-role access flags on a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAccess {
    #[serde(default = "allowed")]
    pub read: bool,
    #[serde(default = "allowed")]
    pub write: bool,
}

fn allowed() -> bool {
    true
}

fn default_widget() -> String {
    "Input".to_string()
}

impl Default for FieldAccess {
    fn default() -> Self {
        Self {
            read: true,
            write: true,
        }
    }
}

/// A single field of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_widget")]
    pub widget_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target collection id for relation fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, FieldAccess>,
}

impl FieldDefinition {
    pub fn new(name: &str, widget_type: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            widget_type: widget_type.to_string(),
            description: None,
            collection: None,
            multiple: false,
            permissions: BTreeMap::new(),
        }
    }

    /// Relation field pointing at `target` collection
    pub fn relation(name: &str, target: &str) -> Self {
        let mut field = Self::new(name, "Relation");
        field.collection = Some(target.to_string());
        field
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn with_permission(mut self, role: &str, access: FieldAccess) -> Self {
        self.permissions.insert(role.to_string(), access);
        self
    }

    pub fn is_relation(&self) -> bool {
        self.widget_type.eq_ignore_ascii_case("relation")
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::from_widget(&self.widget_type)
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Field-level read check. Roles without an explicit rule may read;
    /// admins always may.
    pub fn can_read(&self, user: Option<&User>, roles: &[Role]) -> bool {
        if self.permissions.is_empty() {
            return true;
        }
        match user {
            Some(user) if user.is_admin_in(roles) => true,
            Some(user) => self
                .permissions
                .get(&user.role)
                .map(|access| access.read)
                .unwrap_or(true),
            None => self
                .permissions
                .get("anonymous")
                .map(|access| access.read)
                .unwrap_or(true),
        }
    }
}

/// Collection schema: identity plus ordered field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl CollectionSchema {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            label: None,
            description: None,
            display_field: None,
            fields: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_display_field(mut self, field: &str) -> Self {
        self.display_field = Some(field.to_string());
        self
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field used when a related record is shown as text
    pub fn display_field_name(&self) -> Option<&str> {
        if let Some(field) = self.display_field.as_deref() {
            return Some(field);
        }
        ["title", "name"]
            .into_iter()
            .find(|candidate| self.field(candidate).is_some())
            .or_else(|| self.fields.first().map(|f| f.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> User {
        User::new("u1", "editor")
    }

    #[test]
    fn test_deserialize_schema() {
        let json = r#"{
            "_id": "posts",
            "name": "Posts",
            "fields": [
                {"name": "title", "label": "Title", "widgetType": "Input"},
                {"name": "author", "widgetType": "Relation", "collection": "authors"},
                {"name": "secret", "permissions": {"editor": {"read": false}}}
            ]
        }"#;
        let schema: CollectionSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.id, "posts");
        assert_eq!(schema.fields.len(), 3);
        assert!(schema.field("author").unwrap().is_relation());
        assert_eq!(schema.field("secret").unwrap().widget_type, "Input");
        assert!(!schema.field("secret").unwrap().permissions["editor"].read);
        assert!(schema.field("secret").unwrap().permissions["editor"].write);
    }

    #[test]
    fn test_field_can_read() {
        let field = FieldDefinition::new("salary", "Number")
            .with_permission("editor", FieldAccess { read: false, write: false });
        let admin = User::new("a1", "admin").with_admin(true);

        assert!(!field.can_read(Some(&editor()), &[]));
        assert!(field.can_read(Some(&admin), &[]));
        assert!(field.can_read(Some(&User::new("u2", "viewer")), &[]));
    }

    #[test]
    fn test_display_field_fallbacks() {
        let schema = CollectionSchema::new("authors", "Authors")
            .with_field(FieldDefinition::new("bio", "RichText"))
            .with_field(FieldDefinition::new("name", "Input"));
        assert_eq!(schema.display_field_name(), Some("name"));

        let schema = schema.with_display_field("bio");
        assert_eq!(schema.display_field_name(), Some("bio"));

        let empty = CollectionSchema::new("x", "X");
        assert_eq!(empty.display_field_name(), None);
    }
}
