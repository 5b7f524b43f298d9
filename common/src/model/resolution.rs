use crate::model::placeholder::{PlaceholderSource, PlaceholderType};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Per-generation input: who the letter is for and any manual overrides.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderContext {
    pub client_id: String,
    pub service_id: Option<String>,
    pub user_id: String,
    pub manual_values: HashMap<String, Value>,
}

/// The final verdict for a single placeholder within one generation.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPlaceholder {
    pub key: String,
    /// Raw resolved value; `Value::Null` when nothing matched.
    pub value: Value,
    /// The value after type-specific formatting, ready for substitution.
    pub formatted_value: String,
    pub source: PlaceholderSource,
    pub placeholder_type: PlaceholderType,
}

/// A single problem found during resolution, carried to the caller rather
/// than thrown, so one run reports every problem at once.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceholderError {
    /// The placeholder this error belongs to; `None` for bundle-level
    /// failures that are not tied to a single key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Stable machine code, e.g. `REQUIRED_FIELD_MISSING`.
    pub code: &'static str,
    pub message: String,
}

/// The authoritative outcome of resolving a placeholder set.
///
/// Every placeholder from the source template has an entry in `placeholders`,
/// even when resolution failed for it (it resolves to null/empty rather than
/// disappearing).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaceholderResolutionResult {
    pub placeholders: BTreeMap<String, ResolvedPlaceholder>,
    pub missing_required: Vec<String>,
    pub errors: Vec<PlaceholderError>,
}

impl PlaceholderResolutionResult {
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.placeholders.get(key).map(|p| &p.value)
    }

    pub fn formatted(&self, key: &str) -> Option<&str> {
        self.placeholders.get(key).map(|p| p.formatted_value.as_str())
    }

    /// Whether generation may proceed on this result.
    pub fn can_generate(&self) -> bool {
        self.missing_required.is_empty() && self.errors.is_empty()
    }
}
