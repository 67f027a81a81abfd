//! HTTP handlers for the document lifecycle and the secure download
//! proxy. Lifecycle sequencing lives in `DocumentService`; this layer
//! parses multipart forms, enforces the admin gate, and builds responses.

use crate::{
    auth::AdminUser,
    errors::AppError,
    models::document::Document,
    services::document_service::{DocumentFields, UploadPayload},
    services::naming,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

/// Replace response: the updated record plus any suppressed cleanup
/// warnings (an old blob that could not be deleted, for example).
#[derive(Serialize)]
pub struct ReplaceResponse {
    pub document: Document,
    pub warnings: Vec<String>,
}

/// Parsed multipart form shared by upload and replace.
struct DocumentForm {
    payload: Option<UploadPayload>,
    fields: DocumentFields,
}

async fn read_document_form(mut multipart: Multipart) -> Result<DocumentForm, AppError> {
    let mut form = DocumentForm {
        payload: None,
        fields: DocumentFields::default(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {}", err)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|ct| ct.to_string());
                let data = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read file field: {}", err))
                })?;
                form.payload = Some(UploadPayload {
                    filename,
                    content_type,
                    data,
                });
            }
            "note" => {
                let text = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read note field: {}", err))
                })?;
                if !text.is_empty() {
                    form.fields.note = Some(text);
                }
            }
            "ticket_id" => {
                let text = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read ticket_id field: {}", err))
                })?;
                if !text.is_empty() {
                    let id = text
                        .parse::<Uuid>()
                        .map_err(|_| AppError::bad_request("ticket_id must be a UUID"))?;
                    form.fields.ticket_id = Some(id);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST `/documents` — multipart upload (`file`, `note?`, `ticket_id?`).
pub async fn upload_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_document_form(multipart).await?;
    let payload = form
        .payload
        .ok_or_else(|| AppError::bad_request("a non-empty `file` field is required"))?;

    let document = state.documents.upload(payload, form.fields).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET `/documents` — all documents, newest upload first.
pub async fn list_documents(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.documents.list().await?))
}

/// GET `/documents/{id}` — metadata for a single document.
pub async fn get_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.documents.get(id).await?))
}

/// PUT `/documents/{id}` — replace payload and/or metadata fields.
/// The `file` part is optional; `note`/`ticket_id` always apply.
pub async fn replace_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ReplaceResponse>, AppError> {
    let form = read_document_form(multipart).await?;
    let outcome = state.documents.replace(id, form.payload, form.fields).await?;
    Ok(Json(ReplaceResponse {
        document: outcome.document,
        warnings: outcome.warnings,
    }))
}

/// DELETE `/documents/{id}` — remove blob, then metadata.
pub async fn delete_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/documents/{id}/download` — secure download proxy.
///
/// Buffers the blob through the server and responds with the stored
/// content type (or `application/octet-stream`) and a sanitized RFC 5987
/// `Content-Disposition`, so hostile filenames can never inject headers.
pub async fn download_document(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (document, data) = state.documents.download(id).await?;

    let content_type = document
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    let disposition = naming::content_disposition_value(&document.original_filename);
    let length = data.len();

    let mut response = Response::new(Body::from(data));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&length.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    // The sanitized value contains no control bytes, so this parse holds.
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
