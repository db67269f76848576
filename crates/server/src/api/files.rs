//! File upload and progress API handlers.

use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use accounts_core::{FileId, FileRecord};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub id: FileId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub message: String,
    pub file: FileRecord,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub message: String,
    pub files: HashMap<FileId, FileRecord>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn read_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        api_error(StatusCode::PAYLOAD_TOO_LARGE, "File size is too large")
    } else {
        api_error(StatusCode::BAD_REQUEST, "Failed to get file")
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Accepts a CSV upload, stores it and ingests its rows.
///
/// Depending on `upload.wait_for_completion` the response is sent after the
/// rows drained or right after the file was registered.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = &state.config().upload;

    let mut received = None;
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(read_error)?;
        received = Some((file_name, data));
        break;
    }

    let (file_name, data) =
        received.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Failed to get file"))?;

    if data.len() > upload.max_file_size {
        return Err(api_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "File size is too large",
        ));
    }

    // Only the final path component is kept.
    let file_name = FsPath::new(&file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    let allowed = upload.allowed_extension.trim_start_matches('.');
    let extension_ok = FsPath::new(&file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(allowed));
    if !extension_ok {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid file extension"));
    }

    if let Err(e) = tokio::fs::create_dir_all(&upload.dir).await {
        warn!("Failed to create upload dir {:?}: {}", upload.dir, e);
        return Err(api_error(StatusCode::BAD_REQUEST, e.to_string()));
    }

    let stored_path = upload
        .dir
        .join(format!("{}_{}", Uuid::new_v4().simple(), file_name));
    if let Err(e) = tokio::fs::write(&stored_path, &data).await {
        warn!("Failed to store upload {:?}: {}", stored_path, e);
        return Err(api_error(StatusCode::BAD_REQUEST, e.to_string()));
    }
    info!(
        "Stored upload {} ({} bytes) at {:?}",
        file_name,
        data.len(),
        stored_path
    );

    let ingestor = state.ingestor();
    let ingested = if upload.wait_for_completion {
        ingestor.ingest_path(&stored_path, &file_name).await
    } else {
        ingestor.spawn_ingest_path(&stored_path, &file_name).await
    };
    let file_id = ingested.map_err(|e| {
        warn!("Failed to ingest {:?}: {}", stored_path, e);
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            id: file_id,
            name: file_name,
        }),
    ))
}

/// Lists every file with its progress.
pub async fn list_files(State(state): State<Arc<AppState>>) -> Json<FileListResponse> {
    Json(FileListResponse {
        message: "success".to_string(),
        files: state.ingestor().list_files(),
    })
}

/// Gets one file's progress.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let id = Uuid::parse_str(&file_id)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid fileId format"))?;

    match state.ingestor().get_file(&id) {
        Some(file) => Ok(Json(FileResponse {
            message: "success".to_string(),
            file,
        })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", id),
        )),
    }
}
