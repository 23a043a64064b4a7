//! File handlers for Web API.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::file::{Download, FileService};
use crate::web::dto::{FileInfoResponse, UploadResponse};
use crate::web::error::{ApiError, ErrorCode};
use crate::web::handlers::{blocking, AppState};
use crate::web::view::render_info_page;

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

/// Query parameters for downloads.
#[derive(Debug, serde::Deserialize)]
pub struct DownloadQuery {
    /// Filename presented to the client instead of the stored name.
    pub originalname: Option<String>,
}

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are removed and quotes/backslashes replaced in the
/// plain `filename` parameter; non-ASCII or special names also get an RFC 5987
/// `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Base URL for links handed back to the uploader.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(ref base_url) = state.public_base_url {
        return base_url.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("X-Forwarded-Proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

fn multipart_error(files: &FileService, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return files.size_limit_error().into();
    }
    tracing::warn!("Failed to read multipart data: {}", e);
    ApiError::bad_request("Invalid multipart data")
}

/// POST /upload - Upload a file.
///
/// Request body: multipart/form-data with a "file" field.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let files = &state.files;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(files, e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        // Stop reading as soon as the limit is crossed
        let mut content = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(files, e))? {
            content.extend_from_slice(&chunk);
            files.check_size(content.len() as u64)?;
        }

        upload = Some((filename, content));
        break;
    }

    let (filename, content) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let base_url = base_url(&state, &headers);

    let service = state.files.clone();
    let uploaded = blocking(move || service.upload(&content, &filename, &base_url)).await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(uploaded))))
}

/// GET /file/:id - HTML info page.
pub async fn file_page(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let files = state.files.clone();
    match blocking(move || files.info(&id)).await {
        Ok(info) => Html(render_info_page(&info)).into_response(),
        Err(e) if e.code() == ErrorCode::NotFound => {
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/files/:id - File metadata.
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileInfoResponse>, ApiError> {
    let files = state.files.clone();
    let info = blocking(move || files.info(&id)).await?;
    Ok(Json(FileInfoResponse::from(info)))
}

/// GET /download/:id - Download a file, optionally under another name.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let files = state.files.clone();
    let download = blocking(move || files.download(&id, query.originalname.as_deref())).await?;
    download_response(download)
}

/// GET /files/:id - Download a file under its stored name.
pub async fn download_stored(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let files = state.files.clone();
    let download = blocking(move || files.download(&id, None)).await?;
    download_response(download)
}

fn download_response(download: Download) -> Result<Response, ApiError> {
    let stream = ReaderStream::new(tokio::fs::File::from_std(download.file));

    Response::builder()
        .header(header::CONTENT_TYPE, download.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&download.filename),
        )
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .body(Body::from_stream(stream))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("An internal error occurred")
        })
}
