use crate::model::placeholder::TemplatePlaceholder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A versioned letter template definition.
///
/// The template body lives in the document store under `file_id`; this record
/// carries the metadata and the ordered placeholder set extracted from the
/// body. Updates are copy-on-write: the prior version is snapshotted to
/// history and `version` is incremented. Deleting a template removes the
/// metadata but keeps the underlying file for historical letters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Document-store reference for the raw template body.
    pub file_id: String,
    #[serde(default)]
    pub placeholders: Vec<TemplatePlaceholder>,
    pub active: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
