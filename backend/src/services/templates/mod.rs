//! Template-side services: placeholder extraction, the dual evaluation
//! engine and the document renderers.
//!
//! ## Sub-modules:
//! - `parse`: scans raw template text and extracts the typed placeholder set.
//! - `evaluate`: populates a template body from resolved values, through the
//!   legacy bracket-block engine or the Handlebars-compatible engine.
//! - `pdf` / `docx`: render populated text into the two output formats.

pub mod docx;
pub mod evaluate;
mod layout;
pub mod parse;
pub mod pdf;
