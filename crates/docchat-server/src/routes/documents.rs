//! Document upload and lookup.

use std::path::Path as FsPath;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use docchat_core::DocumentId;
use docchat_core::chunking::chunk_text;
use docchat_store::NewDocument;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::errors::ApiError;
use crate::server::AppState;

#[derive(Default)]
struct UploadForm {
    user_id: String,
    email: String,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("user_id") => form.user_id = field_text(field).await?,
            Some("email") => form.email = field_text(field).await?,
            Some("file") => {
                form.file_name = field.file_name().map(ToOwned::to_owned);
                form.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?
                    .to_vec();
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map(|s| s.trim().to_owned())
        .map_err(|e| ApiError::bad_request(format!("Invalid form field: {e}")))
}

fn is_text_file(name: &str) -> bool {
    FsPath::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// `POST /upload`
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_form(multipart).await?;
    if form.user_id.is_empty() || form.email.is_empty() {
        return Err(ApiError::bad_request(
            "Invalid request parameters: user_id and email are required",
        ));
    }
    let Some(file_name) = form.file_name else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    if !is_text_file(&file_name) {
        return Err(ApiError::bad_request("Only TXT files are supported"));
    }
    let text = String::from_utf8(form.bytes)
        .map_err(|_| ApiError::bad_request("File is not valid UTF-8 text"))?;
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("No text content found in the file"));
    }

    let document_id = DocumentId::new();
    let uploads_dir = &state.config.uploads_dir;
    let storage_path = uploads_dir.join(format!("{document_id}.txt"));
    tokio::fs::create_dir_all(uploads_dir).await.map_err(|e| {
        error!(dir = %uploads_dir.display(), error = %e, "failed to create uploads directory");
        ApiError::internal("Failed to create uploads directory")
    })?;
    tokio::fs::write(&storage_path, text.as_bytes())
        .await
        .map_err(|e| {
            error!(path = %storage_path.display(), error = %e, "failed to save upload");
            ApiError::internal("Failed to save file")
        })?;

    let chunks = chunk_text(&text, state.config.chunk_size);
    let chunk_count = chunks.len();
    let doc = NewDocument {
        id: document_id,
        user_id: form.user_id.into(),
        email: form.email,
        file_name,
        storage_path: storage_path.to_string_lossy().into_owned(),
        size_bytes: i64::try_from(text.len()).unwrap_or(i64::MAX),
    };
    let row = match state
        .store
        .blocking(move |store| store.ingest_document(&doc, &chunks))
        .await
    {
        Ok(row) => row,
        Err(e) => {
            discard_upload(&storage_path).await;
            return Err(e.into());
        }
    };

    info!(document_id = %row.id, user_id = %row.user_id, chunks = chunk_count, "document uploaded");
    Ok(Json(json!({
        "success": true,
        "message": format!("Document uploaded successfully. Extracted {chunk_count} chunks of text."),
        "document_id": row.id,
        "document": row,
    })))
}

/// Remove a saved upload whose document never made it into the store.
async fn discard_upload(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove orphaned upload");
    }
}

/// `GET /users/{user_id}/documents`
pub async fn list_user_documents(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let documents = state
        .store
        .blocking(move |store| store.list_documents(&user_id))
        .await?;
    Ok(Json(json!({ "success": true, "documents": documents })))
}

/// `GET /documents/{document_id}`
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let document = state
        .store
        .blocking(move |store| store.require_document(&document_id))
        .await?;
    Ok(Json(json!({ "success": true, "document": document })))
}

/// `GET /documents/{document_id}/chunks`
pub async fn list_chunks(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chunks = state
        .store
        .blocking(move |store| store.list_segments(&document_id))
        .await?;
    Ok(Json(json!({ "success": true, "chunks": chunks })))
}
