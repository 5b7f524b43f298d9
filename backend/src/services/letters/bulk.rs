//! Bulk letter generation.
//!
//! Strictly sequential over the client id list: each client runs the full
//! single-letter pipeline, and one client's failure never aborts the batch.
//! Successful primary documents are packed into a single zip archive;
//! archive failure degrades the result to "no archive" without touching the
//! per-item outcomes.

use chrono::NaiveDate;
use common::model::bulk::{BulkGenerationItem, BulkGenerationResult};
use common::requests::BulkGenerateRequest;
use std::fs;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::GenerationError;
use crate::services::letters::format;
use crate::services::letters::generate::LetterGenerator;
use crate::stores::{AuditEvent, DocumentMetadata};

const MAX_NAME_COMPONENT: usize = 50;

/// Strips everything outside `[A-Za-z0-9 _-]`, collapses whitespace to
/// underscores and truncates to 50 characters.
pub fn sanitize_component(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let collapsed: String = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    collapsed.chars().take(MAX_NAME_COMPONENT).collect()
}

/// Deterministic document name: sanitized client + sanitized template +
/// ISO date + extension.
pub fn document_file_name(
    client_name: &str,
    template_name: &str,
    date: NaiveDate,
    extension: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_component(client_name),
        sanitize_component(template_name),
        date.format("%Y-%m-%d"),
        extension
    )
}

impl LetterGenerator {
    /// Runs the pipeline for every client in the request and returns the
    /// accumulated result. Only structural template failures abort the
    /// batch; per-client failures become failure items.
    pub fn generate_bulk(
        &self,
        request: &BulkGenerateRequest,
    ) -> Result<BulkGenerationResult, GenerationError> {
        let (template, body) = self.load_template(&request.template_id)?;

        let mut results: Vec<BulkGenerationItem> = Vec::with_capacity(request.client_ids.len());
        let mut archive_entries: Vec<(String, Vec<u8>)> = Vec::new();

        for client_id in &request.client_ids {
            match self.generate_with_template(
                &template,
                &body,
                client_id,
                None,
                &request.user_id,
                &request.manual_values,
                &request.formats,
            ) {
                Ok(outcome) => {
                    let entry_name = unique_entry_name(
                        &archive_entries,
                        document_file_name(
                            &outcome.letter.client_name,
                            &template.name,
                            outcome.letter.generated_at.date_naive(),
                            outcome.documents[0].format.extension(),
                        ),
                    );
                    archive_entries.push((entry_name, outcome.documents[0].bytes.clone()));
                    results.push(BulkGenerationItem::success(
                        client_id.clone(),
                        outcome.letter.client_name.clone(),
                        outcome.letter.id.clone(),
                    ));
                }
                Err(e) => {
                    log::warn!("bulk generation failed for client {}: {}", client_id, e);
                    results.push(BulkGenerationItem::failure(client_id.clone(), e.to_string()));
                }
            }
        }

        let zip_file_id = if archive_entries.is_empty() {
            None
        } else {
            match self.build_archive(&template.name, &archive_entries) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("archive creation failed, returning batch without zip: {}", e);
                    None
                }
            }
        };

        let result = BulkGenerationResult::from_results(results, zip_file_id);
        self.audit.log_event(AuditEvent::BulkRunCompleted {
            template_id: template.id.clone(),
            user_id: request.user_id.clone(),
            total: result.total_requested,
            succeeded: result.success_count,
            failed: result.failure_count,
        });
        log::info!("bulk run for template {}: {}", template.id, result.summary);
        Ok(result)
    }

    /// Returns the bytes of a previously built bulk archive.
    pub fn download_archive(&self, zip_file_id: &str) -> Result<Vec<u8>, GenerationError> {
        self.documents
            .get_document_file(zip_file_id)?
            .ok_or_else(|| GenerationError::ZipFileNotFound(zip_file_id.to_string()))
    }

    /// Writes the archive to a scoped temporary location, finalizes the
    /// stream, then hands the bytes to the document store. The archive id
    /// is only reported once the backing file is fully written.
    fn build_archive(
        &self,
        template_name: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<String, GenerationError> {
        let dir = tempfile::tempdir()
            .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        let archive_name = format!(
            "{}_{}.zip",
            sanitize_component(template_name),
            format::today().format("%Y-%m-%d")
        );
        let path = dir.path().join(&archive_name);

        let file = fs::File::create(&path)
            .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in entries {
            zip.start_file(name.as_str(), options)
                .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
            zip.write_all(bytes)
                .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        }
        let mut file = zip
            .finish()
            .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        file.flush()
            .map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        drop(file);

        let bytes =
            fs::read(&path).map_err(|e| GenerationError::ZipCreationFailed(e.to_string()))?;
        let stored = self.documents.upload_document(
            &bytes,
            DocumentMetadata {
                file_name: archive_name,
                mime_type: "application/zip".to_string(),
                category: "bulk-letters".to_string(),
            },
        )?;
        Ok(stored.id)
    }
}

/// Suffixes a duplicate entry name so the archive never carries two entries
/// with the same path.
fn unique_entry_name(existing: &[(String, Vec<u8>)], candidate: String) -> String {
    if !existing.iter().any(|(name, _)| *name == candidate) {
        return candidate;
    }
    let (stem, ext) = candidate
        .rsplit_once('.')
        .map(|(s, e)| (s.to_string(), e.to_string()))
        .unwrap_or((candidate.clone(), String::new()));
    let mut n = 2;
    loop {
        let next = if ext.is_empty() {
            format!("{}_{}", stem, n)
        } else {
            format!("{}_{}.{}", stem, n, ext)
        };
        if !existing.iter().any(|(name, _)| *name == next) {
            return next;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_strips_and_collapses() {
        assert_eq!(sanitize_component("Acme Trading Ltd."), "Acme_Trading_Ltd");
        assert_eq!(sanitize_component("Smith & Sons (2024)"), "Smith_Sons_2024");
        assert_eq!(sanitize_component("a  b\tc"), "a_b_c");
        assert_eq!(sanitize_component("café—münchen"), "cafmnchen");
    }

    #[test]
    fn sanitization_truncates_to_fifty() {
        let long = "x".repeat(80);
        assert_eq!(sanitize_component(&long).len(), 50);
    }

    #[test]
    fn file_name_layout() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 25).unwrap();
        assert_eq!(
            document_file_name("Acme Trading Ltd", "Engagement Letter", date, "pdf"),
            "Acme_Trading_Ltd_Engagement_Letter_2025-11-25.pdf"
        );
    }

    #[test]
    fn duplicate_entry_names_get_suffixes() {
        let existing = vec![("a_b.pdf".to_string(), Vec::new())];
        assert_eq!(
            unique_entry_name(&existing, "a_b.pdf".to_string()),
            "a_b_2.pdf"
        );
        assert_eq!(unique_entry_name(&existing, "c.pdf".to_string()), "c.pdf");
    }
}
