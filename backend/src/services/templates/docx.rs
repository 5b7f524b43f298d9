//! DOCX rendering of populated letter text.
//!
//! A DOCX file is an OOXML package: a zip container holding the content
//! types manifest, the package relationships and the WordprocessingML
//! document and styles parts. The same line classification as the PDF
//! renderer applies, plus inline `**bold**` spans which become bold runs.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::PracticeDetails;
use crate::error::GenerationError;
use crate::services::templates::layout::{classify_line, split_bold_runs, LineKind, TextRun};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="20"/><w:szCs w:val="20"/></w:rPr></w:rPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:rPr><w:b/><w:sz w:val="22"/></w:rPr></w:style>
</w:styles>"#;

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn run(text: &str, bold: bool, italic: bool) -> String {
    let mut props = String::new();
    if bold {
        props.push_str("<w:b/>");
    }
    if italic {
        props.push_str("<w:i/>");
    }
    let run_props = if props.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{}</w:rPr>", props)
    };
    format!(
        "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        run_props,
        escape_xml(text)
    )
}

fn styled_paragraph(style_id: &str, text: &str) -> String {
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>{}</w:p>",
        style_id,
        run(text, false, false)
    )
}

/// Body paragraph with `**bold**` spans rendered as bold runs.
fn text_paragraph(text: &str) -> String {
    let runs: String = split_bold_runs(text)
        .into_iter()
        .map(|r| match r {
            TextRun::Regular(s) => run(s, false, false),
            TextRun::Bold(s) => run(s, true, false),
        })
        .collect();
    format!("<w:p>{}</w:p>", runs)
}

fn simple_paragraph(text: &str, bold: bool, italic: bool) -> String {
    format!("<w:p>{}</w:p>", run(text, bold, italic))
}

fn empty_paragraph() -> String {
    "<w:p/>".to_string()
}

fn flush_paragraph(body: &mut Vec<String>, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    body.push(text_paragraph(&buffer.join(" ")));
    buffer.clear();
}

fn build_document_xml(text: &str, template_name: &str, practice: &PracticeDetails) -> String {
    let mut body: Vec<String> = Vec::new();

    // branding header
    body.push(simple_paragraph(&practice.name, true, false));
    body.push(simple_paragraph(&practice.address, false, false));
    body.push(simple_paragraph(
        &format!("{} | {}", practice.phone, practice.email),
        false,
        false,
    ));
    body.push(empty_paragraph());

    let mut buffer: Vec<String> = Vec::new();
    for line in text.lines() {
        match classify_line(line) {
            LineKind::Blank => {
                flush_paragraph(&mut body, &mut buffer);
                body.push(empty_paragraph());
            }
            LineKind::Title(title) => {
                flush_paragraph(&mut body, &mut buffer);
                body.push(styled_paragraph("Title", title));
            }
            LineKind::Heading(heading) => {
                flush_paragraph(&mut body, &mut buffer);
                body.push(styled_paragraph("Heading1", heading));
            }
            LineKind::SubHeading(heading) => {
                flush_paragraph(&mut body, &mut buffer);
                body.push(styled_paragraph("Heading2", heading));
            }
            LineKind::DateLine(date_line) => {
                flush_paragraph(&mut body, &mut buffer);
                body.push(simple_paragraph(date_line, false, true));
            }
            LineKind::Text(body_line) => buffer.push(body_line.trim_end().to_string()),
        }
    }
    flush_paragraph(&mut body, &mut buffer);

    // footer
    let stamp = chrono::Local::now().format("%d/%m/%Y %H:%M");
    body.push(empty_paragraph());
    body.push(simple_paragraph(
        &format!("{} - generated {}", template_name, stamp),
        false,
        true,
    ));

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}<w:sectPr/></w:body></w:document>",
        body.concat()
    )
}

/// Renders populated letter text to a DOCX buffer.
pub fn render_docx(
    text: &str,
    template_name: &str,
    practice: &PracticeDetails,
) -> Result<Vec<u8>, GenerationError> {
    let document_xml = build_document_xml(text, template_name, practice);
    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/styles.xml", STYLES),
        ("word/document.xml", &document_xml),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in parts {
        zip.start_file(name, options)
            .map_err(|e| GenerationError::DocumentGenerationFailed(e.to_string()))?;
        zip.write_all(contents.as_bytes())
            .map_err(|e| GenerationError::DocumentGenerationFailed(e.to_string()))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| GenerationError::DocumentGenerationFailed(e.to_string()))?;
    Ok(cursor.into_inner())
}
