use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named slot in a template, resolved to a concrete value at generation time.
///
/// Placeholders are extracted from raw template text by the parser. Keys are
/// unique within a template; when the same key appears more than once in the
/// source text, the first occurrence's metadata wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePlaceholder {
    /// Lookup key. Dot-paths are allowed (`client.companyName`).
    pub key: String,
    /// Human-readable label derived from the key, used in validation messages.
    pub label: String,
    pub placeholder_type: PlaceholderType,
    pub required: bool,
    /// Optional per-placeholder format string (e.g. `DD/MM/YYYY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Which data bundle this placeholder resolves against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PlaceholderSource>,
    /// Dotted lookup path into the source bundle, with the source prefix
    /// stripped from the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlaceholderType {
    Text,
    Date,
    Currency,
    Number,
    Email,
    Phone,
    Address,
    List,
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlaceholderSource {
    Client,
    Service,
    User,
    Practice,
    System,
    Profile,
    Manual,
}

/// Declared constraints checked against a resolved, non-empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}
