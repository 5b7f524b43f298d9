//! Letter and document generation core for the practice-management backend.
//!
//! The pipeline: the placeholder parser extracts typed placeholders from
//! raw template text; the resolver turns them into formatted values from
//! client/service/system data bundles plus manual overrides; the evaluation
//! engine populates the body (legacy bracket blocks or Handlebars syntax);
//! the renderers produce PDF and DOCX buffers; the bulk coordinator drives
//! the whole chain sequentially across many clients and packs the results
//! into a zip archive.
//!
//! Persistence, file storage, record lookup and audit logging are external
//! collaborators, consumed through the traits in [`stores`].

pub mod config;
pub mod error;
pub mod services;
pub mod stores;

pub use error::GenerationError;
