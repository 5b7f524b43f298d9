//! Collaborator contracts consumed by the generation pipeline.
//!
//! Persistence, file storage, record lookup and audit logging live outside
//! this crate; the pipeline talks to them through the narrow traits below.
//! `memory` provides in-process implementations used by the tests.

use common::model::letter::GeneratedLetter;
use common::model::records::{ClientRecord, ServiceRecord};
use common::model::template::Template;
use thiserror::Error;

pub mod memory;

/// I/O-level failure inside a collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait ClientDirectory: Send + Sync {
    fn find_one(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError>;
}

pub trait ServiceDirectory: Send + Sync {
    fn find_one(&self, service_id: &str) -> Result<Option<ServiceRecord>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub file_name: String,
    pub mime_type: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub file_name: String,
    pub size_bytes: usize,
}

pub trait DocumentStore: Send + Sync {
    fn upload_document(
        &self,
        bytes: &[u8],
        metadata: DocumentMetadata,
    ) -> Result<StoredDocument, StoreError>;

    fn get_document_file(&self, document_id: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

pub trait TemplateStore: Send + Sync {
    fn find_one(&self, template_id: &str) -> Result<Option<Template>, StoreError>;
}

pub trait LetterStore: Send + Sync {
    fn insert(&self, letter: &GeneratedLetter) -> Result<(), StoreError>;

    fn find_one(&self, letter_id: &str) -> Result<Option<GeneratedLetter>, StoreError>;

    /// Increments the download counter, marks the letter downloaded and
    /// returns the updated record; `None` when the letter does not exist.
    fn record_download(&self, letter_id: &str) -> Result<Option<GeneratedLetter>, StoreError>;
}

#[derive(Debug, Clone)]
pub enum AuditEvent {
    LetterGenerated {
        letter_id: String,
        template_id: String,
        client_id: String,
        user_id: String,
    },
    LetterDownloaded {
        letter_id: String,
        user_id: String,
    },
    BulkRunCompleted {
        template_id: String,
        user_id: String,
        total: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Fire-and-forget audit sink. Implementations must swallow their own
/// failures; a broken audit trail never aborts generation.
pub trait AuditSink: Send + Sync {
    fn log_event(&self, event: AuditEvent);
}
