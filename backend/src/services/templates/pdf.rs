//! PDF rendering of populated letter text.
//!
//! The populated text uses a fixed lightweight markup: `# ` titles, `## `
//! headings, a distinguished `Date:` line, blank lines separating
//! paragraphs. Inline emphasis markers are not interpreted here; paragraphs
//! render as plain styled blocks.

use genpdf::elements::{Break, Paragraph};
use genpdf::style::{Style, StyledString};
use genpdf::Document;
use std::env;

use crate::config::PracticeDetails;
use crate::error::GenerationError;
use crate::services::templates::layout::{classify_line, LineKind};

const TITLE_SIZE: u8 = 16;
const HEADING_SIZE: u8 = 13;
const BODY_SIZE: u8 = 10;

/// Load the font family from the fonts directory (override with
/// `LETTER_FONTS_DIR`). Tries Arial first, then falls back to
/// LiberationSans in the same directory.
fn load_font() -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, GenerationError> {
    let fonts_dir = env::var("LETTER_FONTS_DIR").unwrap_or_else(|_| "./fonts".to_string());
    if let Ok(family) = genpdf::fonts::from_files(&fonts_dir, "Arial", None) {
        return Ok(family);
    }
    genpdf::fonts::from_files(&fonts_dir, "LiberationSans", None)
        .map_err(|e| GenerationError::DocumentGenerationFailed(format!("font load: {}", e)))
}

/// Configure a document with fonts, sizing and margins.
fn configure_document(title: &str) -> Result<Document, GenerationError> {
    let font_family = load_font()?;
    let mut doc = Document::new(font_family);
    doc.set_title(title);
    doc.set_font_size(BODY_SIZE);
    doc.set_line_spacing(1.2);

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(15);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

fn push_styled_line(doc: &mut Document, text: &str, style: Style) {
    let mut paragraph = Paragraph::new("");
    paragraph.push(StyledString::new(text.to_string(), style));
    doc.push(paragraph);
}

/// Flush buffered body lines as a single paragraph.
fn flush_paragraph(doc: &mut Document, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let mut paragraph = Paragraph::new("");
    paragraph.push(StyledString::new(buffer.join(" "), Style::new()));
    doc.push(paragraph);
    buffer.clear();
}

fn push_branding_header(doc: &mut Document, practice: &PracticeDetails) {
    push_styled_line(
        doc,
        &practice.name,
        Style::new().bold().with_font_size(HEADING_SIZE),
    );
    push_styled_line(doc, &practice.address, Style::new());
    push_styled_line(
        doc,
        &format!("{} | {}", practice.phone, practice.email),
        Style::new(),
    );
    doc.push(Break::new(1));
}

fn push_footer(doc: &mut Document, template_name: &str) {
    doc.push(Break::new(1));
    let stamp = chrono::Local::now().format("%d/%m/%Y %H:%M");
    push_styled_line(
        doc,
        &format!("{} - generated {}", template_name, stamp),
        Style::new().italic().with_font_size(8),
    );
}

/// Renders populated letter text to a PDF buffer.
///
/// On any underlying engine failure the partial buffer is dropped and a
/// generation error is returned instead.
pub fn render_pdf(
    text: &str,
    template_name: &str,
    practice: &PracticeDetails,
) -> Result<Vec<u8>, GenerationError> {
    let mut doc = configure_document(template_name)?;
    push_branding_header(&mut doc, practice);

    let mut buffer: Vec<String> = Vec::new();
    for line in text.lines() {
        match classify_line(line) {
            LineKind::Blank => {
                flush_paragraph(&mut doc, &mut buffer);
                doc.push(Break::new(1));
            }
            LineKind::Title(title) => {
                flush_paragraph(&mut doc, &mut buffer);
                push_styled_line(
                    &mut doc,
                    title,
                    Style::new().bold().with_font_size(TITLE_SIZE),
                );
            }
            LineKind::Heading(heading) => {
                flush_paragraph(&mut doc, &mut buffer);
                push_styled_line(
                    &mut doc,
                    heading,
                    Style::new().bold().with_font_size(HEADING_SIZE),
                );
            }
            // sub-headings are a DOCX refinement; here the line stays body text
            LineKind::SubHeading(_) => buffer.push(line.trim_end().to_string()),
            LineKind::DateLine(date_line) => {
                flush_paragraph(&mut doc, &mut buffer);
                push_styled_line(&mut doc, date_line, Style::new().italic());
            }
            LineKind::Text(body_line) => buffer.push(body_line.trim_end().to_string()),
        }
    }
    flush_paragraph(&mut doc, &mut buffer);
    push_footer(&mut doc, template_name);

    let mut out = Vec::new();
    doc.render(&mut out)
        .map_err(|e| GenerationError::DocumentGenerationFailed(e.to_string()))?;
    Ok(out)
}
