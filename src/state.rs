//! Shared application state handed to every handler.

use crate::services::document_service::DocumentService;

#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentService,

    /// Token an administrator must present to touch any document or
    /// ticket route.
    pub admin_token: String,
}
