use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Request payload for generating a single letter.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateLetterRequest {
    pub template_id: String,
    pub client_id: String,
    #[serde(default)]
    pub service_id: Option<String>,
    pub user_id: String,
    /// Manual placeholder overrides; these win over every other source.
    #[serde(default)]
    pub manual_values: HashMap<String, Value>,
    /// Requested output formats. The first entry is the primary document,
    /// used for persistence and archiving.
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
}

/// Request payload for a bulk generation run over many clients.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkGenerateRequest {
    pub template_id: String,
    pub client_ids: Vec<String>,
    pub user_id: String,
    /// Overrides shared by every client in the batch.
    #[serde(default)]
    pub manual_values: HashMap<String, Value>,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Pdf]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Docx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}
