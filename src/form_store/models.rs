//! Data models for the primary form store.
//!
//! Forms own a sequence of immutable schema versions; submissions always
//! reference the exact version they were answered under.

use serde::{Deserialize, Serialize};

/// Answers keyed by field key. Values are restricted by validation, not by
/// the type: a submission carries whatever JSON the client sent for each key.
pub type AnswerMap = serde_json::Map<String, serde_json::Value>;

/// Audit action tag for an accepted submission.
pub const ACTION_SUBMISSION_CREATED: &str = "SUBMISSION_CREATED";

/// The closed set of field types a schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Email,
    Select,
    Checkbox,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
        }
    }
}

/// One field of a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    /// Only meaningful for `select` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// An ordered list of field definitions. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub fields: Vec<FieldDef>,
}

impl FormSchema {
    /// Check the structural preconditions for publishing this schema.
    pub fn validate(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("schema must declare at least one field".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.key.is_empty() {
                return Err("field key must not be empty".to_string());
            }
            if field.label.is_empty() {
                return Err(format!("field '{}' has an empty label", field.key));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(format!("duplicate field key '{}'", field.key));
            }
        }
        Ok(())
    }
}

/// A named template owning a sequence of schema versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Form {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An immutable, numbered schema snapshot belonging to a form.
///
/// `(form_id, version)` is unique and versions are strictly increasing from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormVersion {
    pub id: String,
    pub form_id: String,
    pub version: i64,
    pub schema: FormSchema,
    pub published_at: i64,
}

/// One user's answer set against a specific form version. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: String,
    pub form_version_id: String,
    pub answers: AnswerMap,
    pub created_at: i64,
}

/// An append-only record of a notable action.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Assigned by the store on append.
    pub id: Option<i64>,
    pub action: String,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: i64,
}

impl AuditEntry {
    pub fn new(action: &str) -> Self {
        Self {
            id: None,
            action: action.to_string(),
            entity_id: None,
            details: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_entity(mut self, entity_id: String) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Slugs are URL path segments: lowercase ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
