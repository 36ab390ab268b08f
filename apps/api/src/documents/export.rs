//! Rendering stored test-case text into downloadable documents.

use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run};
use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::errors::AppError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const FONT_SIZE_PT: f32 = 11.0;
const TITLE_SIZE_PT: f32 = 16.0;
/// Rough character budget per line for Helvetica 11pt on A4 with margins.
const WRAP_COLUMNS: usize = 95;

/// Renders the text as a paginated A4 PDF using the builtin Helvetica fonts.
pub fn render_pdf(title: &str, body: &str) -> Result<Vec<u8>, AppError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Document(format!("PDF font setup failed: {e}")))?;
    let title_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::Document(format!("PDF font setup failed: {e}")))?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    layer.use_text(title, TITLE_SIZE_PT, Mm(MARGIN_MM), Mm(y), &title_font);
    y -= 2.0 * LINE_HEIGHT_MM;

    for line in body.lines().flat_map(|line| wrap_line(line, WRAP_COLUMNS)) {
        if y < MARGIN_MM {
            let (page, page_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }

        if !line.is_empty() {
            layer.use_text(&line, FONT_SIZE_PT, Mm(MARGIN_MM), Mm(y), &font);
        }
        y -= LINE_HEIGHT_MM;
    }

    doc.save_to_bytes()
        .map_err(|e| AppError::Document(format!("PDF rendering failed: {e}")))
}

/// Renders the text as a DOCX: bold title paragraph, one paragraph per line.
pub fn render_docx(title: &str, body: &str) -> Result<Vec<u8>, AppError> {
    let mut docx = Docx::new().add_paragraph(
        Paragraph::new().add_run(Run::new().add_text(title).bold().size(32)),
    );

    for line in body.lines() {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
    }

    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|e| AppError::Document(format!("DOCX rendering failed: {e}")))?;

    Ok(cursor.into_inner())
}

/// Greedy word wrap. Blank lines survive as spacing; a single over-long word
/// is left unsplit.
fn wrap_line(line: &str, columns: usize) -> Vec<String> {
    if line.chars().count() <= columns {
        return vec![line.to_string()];
    }

    let mut wrapped = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > columns {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        wrapped.push(current);
    }
    if wrapped.is_empty() {
        wrapped.push(String::new());
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pdf_produces_pdf_bytes() {
        let bytes = render_pdf("Test Cases", "Scenario (1): login works.\n\nSteps follow.")
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_pdf_paginates_long_input() {
        let body = (0..200)
            .map(|i| format!("Line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let bytes = render_pdf("Test Cases", &body).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_docx_produces_zip_bytes() {
        let bytes = render_docx("Test Cases", "Scenario (1): login works.").unwrap();
        // A .docx is a zip archive.
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_wrap_line_respects_column_budget() {
        let line = "alpha beta gamma delta epsilon";
        let wrapped = wrap_line(line, 12);
        assert!(wrapped.len() > 1);
        for piece in &wrapped {
            assert!(piece.chars().count() <= 12, "piece too wide: {piece:?}");
        }
        assert_eq!(wrapped.join(" "), line);
    }

    #[test]
    fn test_wrap_line_keeps_short_and_blank_lines() {
        assert_eq!(wrap_line("short", 95), vec!["short".to_string()]);
        assert_eq!(wrap_line("", 95), vec![String::new()]);
    }
}
