use crate::stores::StoreError;
use thiserror::Error;

/// Everything that can go wrong along the letter generation pipeline.
///
/// Each variant carries a stable machine code (see [`GenerationError::code`])
/// alongside the human-readable message; internal details are logged at the
/// failure site, never returned to the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template file not found: {0}")]
    TemplateFileNotFound(String),

    #[error("Template is inactive: {0}")]
    TemplateInactive(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Template parsing failed: {0}")]
    TemplateParsingFailed(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFileFormat(String),

    #[error("Document generation failed: {0}")]
    DocumentGenerationFailed(String),

    #[error("Bulk generation failed: {0}")]
    BulkGenerationFailed(String),

    #[error("Archive creation failed: {0}")]
    ZipCreationFailed(String),

    #[error("Archive not found: {0}")]
    ZipFileNotFound(String),

    #[error("Letter not found: {0}")]
    LetterNotFound(String),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl GenerationError {
    /// Stable machine code for API consumers and audit payloads.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            GenerationError::TemplateFileNotFound(_) => "TEMPLATE_FILE_NOT_FOUND",
            GenerationError::TemplateInactive(_) => "TEMPLATE_INACTIVE",
            GenerationError::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            GenerationError::ServiceNotFound(_) => "SERVICE_NOT_FOUND",
            GenerationError::MissingRequiredFields(_) => "MISSING_REQUIRED_FIELDS",
            GenerationError::ValidationFailed(_) => "VALIDATION_FAILED",
            GenerationError::TemplateParsingFailed(_) => "TEMPLATE_PARSING_FAILED",
            GenerationError::UnsupportedFileFormat(_) => "UNSUPPORTED_FILE_FORMAT",
            GenerationError::DocumentGenerationFailed(_) => "DOCUMENT_GENERATION_FAILED",
            GenerationError::BulkGenerationFailed(_) => "BULK_GENERATION_FAILED",
            GenerationError::ZipCreationFailed(_) => "ZIP_CREATION_FAILED",
            GenerationError::ZipFileNotFound(_) => "ZIP_FILE_NOT_FOUND",
            GenerationError::LetterNotFound(_) => "LETTER_NOT_FOUND",
            GenerationError::Store(_) => "STORAGE_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            GenerationError::TemplateNotFound("t1".into()).code(),
            "TEMPLATE_NOT_FOUND"
        );
        assert_eq!(
            GenerationError::MissingRequiredFields(vec!["dueDate".into()]).code(),
            "MISSING_REQUIRED_FIELDS"
        );
    }

    #[test]
    fn missing_fields_message_lists_keys() {
        let err = GenerationError::MissingRequiredFields(vec!["clientName".into(), "fee".into()]);
        assert_eq!(err.to_string(), "Missing required fields: clientName, fee");
    }
}
