//! In-memory collaborator implementations.
//!
//! Used by the integration tests and as scaffolding when embedding the
//! pipeline without a real persistence layer behind it.

use crate::stores::{
    AuditEvent, AuditSink, ClientDirectory, DocumentMetadata, DocumentStore, LetterStore,
    ServiceDirectory, StoreError, StoredDocument, TemplateStore,
};
use common::model::letter::{GeneratedLetter, LetterStatus};
use common::model::records::{ClientRecord, ServiceRecord};
use common::model::template::Template;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryClientDirectory {
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl InMemoryClientDirectory {
    pub fn with_clients(clients: Vec<ClientRecord>) -> Self {
        Self {
            clients: Mutex::new(clients.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }
}

impl ClientDirectory for InMemoryClientDirectory {
    fn find_one(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        Ok(self.clients.lock().unwrap().get(client_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryServiceDirectory {
    services: Mutex<HashMap<String, ServiceRecord>>,
}

impl InMemoryServiceDirectory {
    pub fn with_services(services: Vec<ServiceRecord>) -> Self {
        Self {
            services: Mutex::new(services.into_iter().map(|s| (s.id.clone(), s)).collect()),
        }
    }
}

impl ServiceDirectory for InMemoryServiceDirectory {
    fn find_one(&self, service_id: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.services.lock().unwrap().get(service_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    files: Mutex<HashMap<String, (DocumentMetadata, Vec<u8>)>>,
}

impl InMemoryDocumentStore {
    /// Seeds a file under a caller-chosen id, e.g. a template body.
    pub fn seed(&self, document_id: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(
            document_id.to_string(),
            (
                DocumentMetadata {
                    file_name: document_id.to_string(),
                    mime_type: "application/octet-stream".into(),
                    category: "seed".into(),
                },
                bytes,
            ),
        );
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn upload_document(
        &self,
        bytes: &[u8],
        metadata: DocumentMetadata,
    ) -> Result<StoredDocument, StoreError> {
        let id = Uuid::new_v4().to_string();
        let stored = StoredDocument {
            id: id.clone(),
            file_name: metadata.file_name.clone(),
            size_bytes: bytes.len(),
        };
        self.files
            .lock()
            .unwrap()
            .insert(id, (metadata, bytes.to_vec()));
        Ok(stored)
    }

    fn get_document_file(&self, document_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(document_id)
            .map(|(_, bytes)| bytes.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: Mutex<HashMap<String, Template>>,
}

impl InMemoryTemplateStore {
    pub fn with_templates(templates: Vec<Template>) -> Self {
        Self {
            templates: Mutex::new(templates.into_iter().map(|t| (t.id.clone(), t)).collect()),
        }
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn find_one(&self, template_id: &str) -> Result<Option<Template>, StoreError> {
        Ok(self.templates.lock().unwrap().get(template_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryLetterStore {
    letters: Mutex<HashMap<String, GeneratedLetter>>,
}

impl LetterStore for InMemoryLetterStore {
    fn insert(&self, letter: &GeneratedLetter) -> Result<(), StoreError> {
        self.letters
            .lock()
            .unwrap()
            .insert(letter.id.clone(), letter.clone());
        Ok(())
    }

    fn find_one(&self, letter_id: &str) -> Result<Option<GeneratedLetter>, StoreError> {
        Ok(self.letters.lock().unwrap().get(letter_id).cloned())
    }

    fn record_download(&self, letter_id: &str) -> Result<Option<GeneratedLetter>, StoreError> {
        let mut letters = self.letters.lock().unwrap();
        Ok(letters.get_mut(letter_id).map(|letter| {
            letter.download_count += 1;
            letter.status = LetterStatus::Downloaded;
            letter.clone()
        }))
    }
}

/// Audit sink that forwards every event to the log.
#[derive(Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn log_event(&self, event: AuditEvent) {
        log::info!("audit: {:?}", event);
    }
}

/// Audit sink that records events for assertions in tests.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingAuditSink {
    fn log_event(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
