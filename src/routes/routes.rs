//! Defines routes for document and ticket operations.
//!
//! ## Structure
//! - **Document endpoints** (admin token required)
//!   - `POST   /documents` — multipart upload (`file`, `note?`, `ticket_id?`)
//!   - `GET    /documents` — list, newest upload first
//!   - `GET    /documents/{id}` — metadata only
//!   - `PUT    /documents/{id}` — replace payload and/or fields
//!   - `DELETE /documents/{id}` — remove blob and record
//!   - `GET    /documents/{id}/download` — secure download proxy
//!
//! - **Ticket endpoints** (admin token required)
//!   - `GET /tickets` — list
//!   - `PUT /tickets/{id}/status` — update status
//!
//! Health probes are mounted at the root and need no token.

use crate::{
    handlers::{
        document_handlers::{
            delete_document, download_document, get_document, list_documents, replace_document,
            upload_document,
        },
        health_handlers::{healthz, readyz},
        ticket_handlers::{list_tickets, update_ticket_status},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};

/// Uploads are fully buffered in memory, so the request body cap is what
/// bounds per-request memory use.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build and return the router for all document, ticket, and health routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Document routes
        .route("/documents", get(list_documents).post(upload_document))
        .route(
            "/documents/{id}",
            get(get_document).put(replace_document).delete(delete_document),
        )
        .route("/documents/{id}/download", get(download_document))
        // Ticket routes
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}/status", put(update_ticket_status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
