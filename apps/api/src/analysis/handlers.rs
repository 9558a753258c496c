//! Axum route handlers for the Analysis API.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::analysis::analyze_document;
use crate::document::resolve_mime;
use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::state::AppState;

/// Multipart field carrying the resume file.
pub const FILE_FIELD: &str = "file";

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

/// POST /api/v1/analyze
///
/// Accepts a resume as multipart field `file` (PDF, DOCX or plain text) and
/// returns the aggregated analysis. Partial results are returned when some
/// sections could not be processed.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let upload = read_upload(&mut multipart, state.pipeline.max_file_size).await?;

    let mime = resolve_mime(upload.content_type.as_deref(), upload.file_name.as_deref())
        .ok_or_else(|| {
            AppError::UnsupportedMediaType(format!(
                "Unsupported file type {}; upload a PDF, DOCX or TXT file",
                upload
                    .content_type
                    .as_deref()
                    .or(upload.file_name.as_deref())
                    .unwrap_or("(unknown)")
            ))
        })?;

    info!(
        "Analyzing '{}' ({} bytes, {mime})",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.bytes.len()
    );

    let result = analyze_document(
        state.completion.clone(),
        &state.pipeline,
        upload.bytes,
        mime,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(result))
}

async fn read_upload(multipart: &mut Multipart, max_size: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.len() > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File is {} bytes; the limit is {max_size} bytes",
                bytes.len()
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::Validation(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(error.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", error.body_text()))
    }
}
