//! HTTP handlers for service-ticket listing and status updates.

use crate::{auth::AdminUser, errors::AppError, models::ticket::ServiceTicket, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// GET `/tickets` — all tickets, newest first.
pub async fn list_tickets(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceTicket>>, AppError> {
    Ok(Json(state.documents.list_tickets().await?))
}

/// PUT `/tickets/{id}/status` — change a ticket's status.
pub async fn update_ticket_status(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ServiceTicket>, AppError> {
    if req.status.trim().is_empty() {
        return Err(AppError::bad_request("status must not be empty"));
    }
    let ticket = state
        .documents
        .update_ticket_status(id, req.status.trim())
        .await?;
    Ok(Json(ticket))
}
