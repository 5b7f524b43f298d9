use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record of one generated letter.
///
/// The resolved placeholder values are captured on the record itself rather
/// than referencing the template, so historical letters stay stable even if
/// the template changes later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedLetter {
    pub id: String,
    pub template_id: String,
    pub template_name: String,
    pub client_id: String,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub user_id: String,
    /// Formatted placeholder values as they appeared in the letter.
    pub placeholder_values: BTreeMap<String, String>,
    /// Document-store reference for the primary rendered document.
    pub document_id: String,
    pub status: LetterStatus,
    pub download_count: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LetterStatus {
    Draft,
    Generated,
    Downloaded,
}
