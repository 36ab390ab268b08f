//! Axum route handlers for upload extraction and document export.

use axum::{
    extract::Multipart,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::documents::export::{render_docx, render_pdf};
use crate::documents::extract::extract_text;
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub test_cases: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "Test Cases".to_string()
}

/// POST /upload
///
/// Multipart upload; returns the extracted plain text of the first `file`
/// field. Nothing is kept server-side.
pub async fn upload(mut multipart: Multipart) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read failed: {e}")))?;

        let text = extract_text(&filename, &bytes)?;

        return Ok(Json(json!({ "text": text, "filename": filename })));
    }

    Err(AppError::Validation("No file provided".to_string()))
}

/// POST /download_pdf
pub async fn download_pdf(Json(request): Json<DownloadRequest>) -> Result<Response, AppError> {
    if request.test_cases.trim().is_empty() {
        return Err(AppError::Validation("No test cases provided".to_string()));
    }

    let bytes = render_pdf(&request.title, &request.test_cases)?;
    Ok(attachment(bytes, "application/pdf", "test_cases.pdf"))
}

/// POST /download_docx
pub async fn download_docx(Json(request): Json<DownloadRequest>) -> Result<Response, AppError> {
    if request.test_cases.trim().is_empty() {
        return Err(AppError::Validation("No test cases provided".to_string()));
    }

    let bytes = render_docx(&request.title, &request.test_cases)?;
    Ok(attachment(
        bytes,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "test_cases.docx",
    ))
}

fn attachment(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
