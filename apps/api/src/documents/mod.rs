// Document I/O: text extraction from uploads and PDF/DOCX export of
// generated test cases.

pub mod export;
pub mod extract;
pub mod handlers;
