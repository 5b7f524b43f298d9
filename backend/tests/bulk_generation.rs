//! End-to-end pipeline tests over the in-memory collaborators.

use std::io::{Cursor, Read};
use std::sync::Arc;

use backend::config::PracticeDetails;
use backend::services::letters::generate::LetterGenerator;
use backend::services::templates::parse;
use backend::stores::memory::{
    InMemoryClientDirectory, InMemoryDocumentStore, InMemoryLetterStore, InMemoryServiceDirectory,
    InMemoryTemplateStore, RecordingAuditSink,
};
use backend::stores::{AuditEvent, DocumentStore, LetterStore};
use chrono::{NaiveDate, Utc};
use common::model::letter::LetterStatus;
use common::model::records::{Address, ClientRecord};
use common::model::template::Template;
use common::requests::{BulkGenerateRequest, GenerateLetterRequest, OutputFormat};

const LEGACY_BODY: &str = "# Engagement Letter\n\nDate: {{currentDate}}\n\nDear {{clientName}},\n\n{{if:isCompany}}We act for your company in all statutory matters.{{endif}}\n\nYour annual fee is {{currency:annualFee:GBP}}, with accounts due {{date:nextAccountsDue:DD MMMM YYYY}}.\n";

fn client(id: &str, name: &str, accounts_due: Option<NaiveDate>) -> ClientRecord {
    ClientRecord {
        id: id.into(),
        name: name.into(),
        first_name: None,
        last_name: None,
        company_name: Some(name.into()),
        is_company: true,
        email: Some(format!("{}@example.com", id)),
        phone: Some("07700900123".into()),
        address: Address {
            line1: Some("1 High Street".into()),
            line2: None,
            city: Some("Leeds".into()),
            county: None,
            postcode: Some("LS1 1AA".into()),
            country: None,
        },
        company_number: Some("01234567".into()),
        utr: None,
        vat_number: None,
        accounting_period_end: None,
        next_accounts_due: accounts_due,
        directors: vec!["J Smith".into()],
        shareholders: Vec::new(),
    }
}

fn template(id: &str, name: &str, file_id: &str, body: &str, active: bool) -> Template {
    // stored placeholder metadata mirrors what the parser extracts, with the
    // accounts-due date marked required
    let mut placeholders = parse::extract_placeholders(body);
    for p in &mut placeholders {
        if p.key == "nextAccountsDue" {
            p.required = true;
        }
    }
    Template {
        id: id.into(),
        name: name.into(),
        category: "engagement".into(),
        file_id: file_id.into(),
        placeholders,
        active,
        version: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct Fixture {
    generator: LetterGenerator,
    documents: Arc<InMemoryDocumentStore>,
    letters: Arc<InMemoryLetterStore>,
    audit: Arc<RecordingAuditSink>,
}

fn fixture(clients: Vec<ClientRecord>, templates: Vec<Template>, bodies: &[(&str, &str)]) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let documents = Arc::new(InMemoryDocumentStore::default());
    for (file_id, body) in bodies {
        documents.seed(file_id, body.as_bytes().to_vec());
    }
    let letters = Arc::new(InMemoryLetterStore::default());
    let audit = Arc::new(RecordingAuditSink::default());
    let generator = LetterGenerator::new(
        Arc::new(InMemoryTemplateStore::with_templates(templates)),
        Arc::new(InMemoryClientDirectory::with_clients(clients)),
        Arc::new(InMemoryServiceDirectory::default()),
        documents.clone(),
        letters.clone(),
        audit.clone(),
        PracticeDetails::from_env(),
    );
    Fixture {
        generator,
        documents,
        letters,
        audit,
    }
}

fn due() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 11, 25)
}

fn read_zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[test]
fn single_generation_produces_letter_and_document() {
    let f = fixture(
        vec![client("c1", "Acme Trading Ltd", due())],
        vec![template("t1", "Engagement Letter", "f1", LEGACY_BODY, true)],
        &[("f1", LEGACY_BODY)],
    );

    let outcome = f
        .generator
        .generate(&GenerateLetterRequest {
            template_id: "t1".into(),
            client_id: "c1".into(),
            service_id: None,
            user_id: "u1".into(),
            manual_values: [("annualFee".to_string(), serde_json::json!(1500))]
                .into_iter()
                .collect(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap();

    let letter = &outcome.letter;
    assert_eq!(letter.status, LetterStatus::Generated);
    assert_eq!(letter.client_name, "Acme Trading Ltd");
    assert_eq!(letter.placeholder_values["annualFee"], "£1,500");
    assert_eq!(letter.placeholder_values["nextAccountsDue"], "25 November 2025");
    assert_eq!(letter.placeholder_values["clientName"], "Acme Trading Ltd");

    // the persisted letter matches the outcome
    let stored = f.letters.find_one(&letter.id).unwrap().unwrap();
    assert_eq!(stored.document_id, letter.document_id);

    // the primary document is retrievable and is a DOCX package containing
    // the populated text
    let bytes = f
        .documents
        .get_document_file(&letter.document_id)
        .unwrap()
        .unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document_xml)
        .unwrap();
    assert!(document_xml.contains("Dear Acme Trading Ltd,"));
    assert!(document_xml.contains("£1,500"));
    assert!(document_xml.contains("We act for your company"));
    assert!(!document_xml.contains("{{"));

    let events = f.audit.events.lock().unwrap();
    assert!(matches!(events[0], AuditEvent::LetterGenerated { .. }));
}

#[test]
fn download_updates_counter_and_status() {
    let f = fixture(
        vec![client("c1", "Acme Trading Ltd", due())],
        vec![template("t1", "Engagement Letter", "f1", LEGACY_BODY, true)],
        &[("f1", LEGACY_BODY)],
    );
    let outcome = f
        .generator
        .generate(&GenerateLetterRequest {
            template_id: "t1".into(),
            client_id: "c1".into(),
            service_id: None,
            user_id: "u1".into(),
            manual_values: [("annualFee".to_string(), serde_json::json!(900))]
                .into_iter()
                .collect(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap();

    let (letter, bytes) = f
        .generator
        .download_letter(&outcome.letter.id, "u1")
        .unwrap();
    assert_eq!(letter.download_count, 1);
    assert_eq!(letter.status, LetterStatus::Downloaded);
    assert_eq!(bytes, outcome.documents[0].bytes);

    let err = f.generator.download_letter("no-such-letter", "u1").unwrap_err();
    assert_eq!(err.code(), "LETTER_NOT_FOUND");
}

#[test]
fn inactive_template_aborts() {
    let f = fixture(
        vec![client("c1", "Acme Trading Ltd", due())],
        vec![template("t1", "Engagement Letter", "f1", LEGACY_BODY, false)],
        &[("f1", LEGACY_BODY)],
    );
    let err = f
        .generator
        .generate(&GenerateLetterRequest {
            template_id: "t1".into(),
            client_id: "c1".into(),
            service_id: None,
            user_id: "u1".into(),
            manual_values: Default::default(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap_err();
    assert_eq!(err.code(), "TEMPLATE_INACTIVE");
}

#[test]
fn bulk_isolates_failures_and_still_packs_archive() {
    // client 2 has no accounts-due date; the template requires it
    let f = fixture(
        vec![
            client("c1", "Acme Trading Ltd", due()),
            client("c2", "Beta Consulting Ltd", None),
            client("c3", "Gamma Retail Ltd", due()),
        ],
        vec![template("t1", "Engagement Letter", "f1", LEGACY_BODY, true)],
        &[("f1", LEGACY_BODY)],
    );

    let result = f
        .generator
        .generate_bulk(&BulkGenerateRequest {
            template_id: "t1".into(),
            client_ids: vec!["c1".into(), "c2".into(), "c3".into()],
            user_id: "u1".into(),
            manual_values: [("annualFee".to_string(), serde_json::json!(1500))]
                .into_iter()
                .collect(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap();

    assert_eq!(result.total_requested, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.results.len(), 3);
    assert_eq!(
        result.success_count + result.failure_count,
        result.total_requested
    );

    let failed = &result.results[1];
    assert_eq!(failed.client_id, "c2");
    assert!(failed.error.as_deref().unwrap().contains("nextAccountsDue"));

    // the archive holds exactly the two successful primary documents
    let zip_id = result.zip_file_id.as_deref().expect("archive expected");
    let bytes = f.documents.get_document_file(zip_id).unwrap().unwrap();
    let names = read_zip_entry_names(&bytes);
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with("Acme_Trading_Ltd_")));
    assert!(names.iter().any(|n| n.starts_with("Gamma_Retail_Ltd_")));
    assert!(names.iter().all(|n| n.ends_with(".docx")));

    // both successful letters are persisted
    for item in result.results.iter().filter(|r| r.succeeded()) {
        let letter_id = item.letter_id.as_deref().unwrap();
        assert!(f.letters.find_one(letter_id).unwrap().is_some());
    }

    let events = f.audit.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, AuditEvent::BulkRunCompleted { succeeded: 2, failed: 1, .. })));
}

#[test]
fn bulk_with_unknown_client_records_failure_item() {
    let f = fixture(
        vec![client("c1", "Acme Trading Ltd", due())],
        vec![template("t1", "Engagement Letter", "f1", LEGACY_BODY, true)],
        &[("f1", LEGACY_BODY)],
    );
    let result = f
        .generator
        .generate_bulk(&BulkGenerateRequest {
            template_id: "t1".into(),
            client_ids: vec!["ghost".into(), "c1".into()],
            user_id: "u1".into(),
            manual_values: [("annualFee".to_string(), serde_json::json!(100))]
                .into_iter()
                .collect(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap();
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    assert!(result.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Client not found"));
    // a single success still produces an archive
    assert!(result.zip_file_id.is_some());
}

#[test]
fn handlebars_template_renders_through_pipeline() {
    let body = "Dear {{clientName}}, {{#if isCompany}}your company{{else}}you{{/if}} owe {{currency annualFee}}.";
    let f = fixture(
        vec![client("c1", "Acme Trading Ltd", due())],
        vec![template("t2", "Fee Reminder", "f2", body, true)],
        &[("f2", body)],
    );
    let outcome = f
        .generator
        .generate(&GenerateLetterRequest {
            template_id: "t2".into(),
            client_id: "c1".into(),
            service_id: None,
            user_id: "u1".into(),
            manual_values: [("annualFee".to_string(), serde_json::json!(750))]
                .into_iter()
                .collect(),
            formats: vec![OutputFormat::Docx],
        })
        .unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(outcome.documents[0].bytes.clone())).unwrap();
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document_xml)
        .unwrap();
    assert!(document_xml.contains("Dear Acme Trading Ltd, your company owe £750."));
}
