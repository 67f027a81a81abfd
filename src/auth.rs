//! Administrator gate for all document and ticket operations.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::state::AppState;

/// Administrator capability extracted from `Authorization: Bearer <token>`.
///
/// Add this as a handler parameter to gate an operation. Extraction runs
/// before the handler body, so the check always precedes any storage
/// mutation. Every mutating and data-exposing route carries it.
pub struct AdminUser;

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::forbidden("administrator credentials required"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::forbidden("malformed authorization header"))?;

        if token != state.admin_token {
            return Err(AppError::forbidden("administrator credentials required"));
        }

        Ok(AdminUser)
    }
}
