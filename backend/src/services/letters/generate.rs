//! Single-letter generation.
//!
//! Orchestrates the pipeline end to end: load the template and its body,
//! resolve placeholders, gate on missing/invalid values, populate the body,
//! render the requested formats, persist the primary document and the
//! letter record, and emit the audit event.

use chrono::Utc;
use common::model::letter::{GeneratedLetter, LetterStatus};
use common::model::placeholder::TemplatePlaceholder;
use common::model::resolution::PlaceholderContext;
use common::model::template::Template;
use common::requests::{GenerateLetterRequest, OutputFormat};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PracticeDetails;
use crate::error::GenerationError;
use crate::services::letters::bulk::document_file_name;
use crate::services::letters::resolve::PlaceholderResolver;
use crate::services::templates::{docx, evaluate, parse, pdf};
use crate::stores::{
    AuditEvent, AuditSink, ClientDirectory, DocumentMetadata, DocumentStore, LetterStore,
    ServiceDirectory, TemplateStore,
};

/// One rendered output format. Only the primary document is uploaded; the
/// rest are returned as transient buffers for the caller to stream.
pub struct RenderedDocument {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub document_id: Option<String>,
}

pub struct GenerationOutcome {
    pub letter: GeneratedLetter,
    pub documents: Vec<RenderedDocument>,
}

/// The letter generation service, wired to its collaborators.
pub struct LetterGenerator {
    pub(crate) templates: Arc<dyn TemplateStore>,
    pub(crate) clients: Arc<dyn ClientDirectory>,
    pub(crate) services: Arc<dyn ServiceDirectory>,
    pub(crate) documents: Arc<dyn DocumentStore>,
    pub(crate) letters: Arc<dyn LetterStore>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) practice: PracticeDetails,
}

impl LetterGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        clients: Arc<dyn ClientDirectory>,
        services: Arc<dyn ServiceDirectory>,
        documents: Arc<dyn DocumentStore>,
        letters: Arc<dyn LetterStore>,
        audit: Arc<dyn AuditSink>,
        practice: PracticeDetails,
    ) -> Self {
        Self {
            templates,
            clients,
            services,
            documents,
            letters,
            audit,
            practice,
        }
    }

    /// Generates one letter from a request.
    pub fn generate(
        &self,
        request: &GenerateLetterRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let (template, body) = self.load_template(&request.template_id)?;
        self.generate_with_template(
            &template,
            &body,
            &request.client_id,
            request.service_id.as_deref(),
            &request.user_id,
            &request.manual_values,
            &request.formats,
        )
    }

    /// Loads the template metadata and fetches its body from the document
    /// store. Structural failures abort immediately.
    pub(crate) fn load_template(
        &self,
        template_id: &str,
    ) -> Result<(Template, String), GenerationError> {
        let template = self
            .templates
            .find_one(template_id)?
            .ok_or_else(|| GenerationError::TemplateNotFound(template_id.to_string()))?;
        if !template.active {
            return Err(GenerationError::TemplateInactive(template.name.clone()));
        }
        let bytes = self
            .documents
            .get_document_file(&template.file_id)?
            .ok_or_else(|| GenerationError::TemplateFileNotFound(template.file_id.clone()))?;
        let body = String::from_utf8(bytes)
            .map_err(|_| GenerationError::UnsupportedFileFormat(template.name.clone()))?;
        Ok((template, body))
    }

    /// The per-client generation path shared with the bulk coordinator: the
    /// template and body are loaded once by the caller.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn generate_with_template(
        &self,
        template: &Template,
        body: &str,
        client_id: &str,
        service_id: Option<&str>,
        user_id: &str,
        manual_values: &HashMap<String, Value>,
        formats: &[OutputFormat],
    ) -> Result<GenerationOutcome, GenerationError> {
        // Stored placeholder metadata wins; otherwise parse the body.
        let placeholders: Vec<TemplatePlaceholder> = if template.placeholders.is_empty() {
            parse::extract_placeholders(body)
        } else {
            template.placeholders.clone()
        };

        let context = PlaceholderContext {
            client_id: client_id.to_string(),
            service_id: service_id.map(str::to_string),
            user_id: user_id.to_string(),
            manual_values: manual_values.clone(),
        };

        let resolver = PlaceholderResolver::new(
            self.clients.as_ref(),
            self.services.as_ref(),
            &self.practice,
        );
        let bundles = resolver.fetch_bundles(&context)?;
        let resolution = resolver.resolve_with_bundles(&placeholders, &context, &bundles);
        let client_name = bundles.client_name.unwrap_or_else(|| client_id.to_string());

        if !resolution.missing_required.is_empty() {
            return Err(GenerationError::MissingRequiredFields(
                resolution.missing_required,
            ));
        }
        if !resolution.errors.is_empty() {
            return Err(GenerationError::ValidationFailed(
                resolution.errors.iter().map(|e| e.message.clone()).collect(),
            ));
        }

        let populated = evaluate::evaluate(body, &resolution)?;

        let formats: Vec<OutputFormat> = if formats.is_empty() {
            vec![OutputFormat::Pdf]
        } else {
            formats.to_vec()
        };
        let generated_at = Utc::now();
        let mut documents = Vec::with_capacity(formats.len());
        for format in &formats {
            let bytes = match format {
                OutputFormat::Pdf => pdf::render_pdf(&populated, &template.name, &self.practice)?,
                OutputFormat::Docx => {
                    docx::render_docx(&populated, &template.name, &self.practice)?
                }
            };
            documents.push(RenderedDocument {
                format: *format,
                bytes,
                document_id: None,
            });
        }

        // Upload the primary document; it backs the letter record and any
        // later archive entry.
        let primary = &mut documents[0];
        let file_name = document_file_name(
            &client_name,
            &template.name,
            generated_at.date_naive(),
            primary.format.extension(),
        );
        let stored = self.documents.upload_document(
            &primary.bytes,
            DocumentMetadata {
                file_name,
                mime_type: primary.format.mime_type().to_string(),
                category: template.category.clone(),
            },
        )?;
        primary.document_id = Some(stored.id.clone());

        let letter = GeneratedLetter {
            id: Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            client_id: client_id.to_string(),
            client_name,
            service_id: service_id.map(str::to_string),
            user_id: user_id.to_string(),
            placeholder_values: resolution
                .placeholders
                .iter()
                .map(|(k, v)| (k.clone(), v.formatted_value.clone()))
                .collect(),
            document_id: stored.id,
            status: LetterStatus::Generated,
            download_count: 0,
            generated_at,
        };
        self.letters.insert(&letter)?;

        self.audit.log_event(AuditEvent::LetterGenerated {
            letter_id: letter.id.clone(),
            template_id: template.id.clone(),
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
        });
        log::info!(
            "generated letter {} for client {} from template {}",
            letter.id,
            client_id,
            template.id
        );

        Ok(GenerationOutcome { letter, documents })
    }

    /// Returns the stored primary document for a letter, bumping its
    /// download counter and status.
    pub fn download_letter(
        &self,
        letter_id: &str,
        user_id: &str,
    ) -> Result<(GeneratedLetter, Vec<u8>), GenerationError> {
        let letter = self
            .letters
            .record_download(letter_id)?
            .ok_or_else(|| GenerationError::LetterNotFound(letter_id.to_string()))?;
        let bytes = self
            .documents
            .get_document_file(&letter.document_id)?
            .ok_or_else(|| {
                GenerationError::DocumentGenerationFailed(format!(
                    "stored document {} is missing",
                    letter.document_id
                ))
            })?;
        self.audit.log_event(AuditEvent::LetterDownloaded {
            letter_id: letter.id.clone(),
            user_id: user_id.to_string(),
        });
        Ok((letter, bytes))
    }
}
