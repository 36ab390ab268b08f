//! Text extraction from uploaded documents.
//!
//! PDF goes through pdf-extract. A .docx is a zip archive whose body lives in
//! word/document.xml; the character content of `<w:t>` runs is collected, one
//! line per paragraph. Plain text passes through unchanged.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::AppError;

/// Dispatches on the uploaded file's extension.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, AppError> {
    let extension = filename
        .rsplit('.')
        .next()
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "txt" | "md" => Ok(String::from_utf8_lossy(bytes).trim().to_string()),
        _ => Err(AppError::Validation("Unsupported file type".to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, AppError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map(|text| text.trim().to_string())
        .map_err(|e| AppError::Document(format!("PDF extraction failed: {e}")))
}

fn extract_docx(bytes: &[u8]) -> Result<String, AppError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Document(format!("DOCX archive unreadable: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::Document(format!("DOCX missing document body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Document(format!("DOCX body unreadable: {e}")))?;

    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut text = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let fragment = t
                    .unescape()
                    .map_err(|e| AppError::Document(format!("DOCX text decode failed: {e}")))?;
                text.push_str(&fragment);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(AppError::Document(format!("DOCX parse error: {e}"))),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(document_xml: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_extract_docx_joins_runs_and_splits_paragraphs() {
        let bytes = docx_with_body(concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>",
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>second paragraph</w:t></w:r></w:p>",
            "</w:body></w:document>",
        ));

        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "Hello world\nsecond paragraph");
    }

    #[test]
    fn test_extract_docx_unescapes_entities() {
        let bytes = docx_with_body(concat!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body><w:p><w:r><w:t>a &amp; b</w:t></w:r></w:p></w:body></w:document>",
        ));

        assert_eq!(extract_docx(&bytes).unwrap(), "a & b");
    }

    #[test]
    fn test_extract_rejects_unknown_extension() {
        let result = extract_text("notes.xlsx", b"irrelevant");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_extract_plain_text_passthrough() {
        let text = extract_text("notes.txt", b"  requirement text \n").unwrap();
        assert_eq!(text, "requirement text");
    }

    #[test]
    fn test_extract_docx_garbage_bytes_is_document_error() {
        let result = extract_text("broken.docx", b"not a zip archive");
        assert!(matches!(result, Err(AppError::Document(_))));
    }
}
