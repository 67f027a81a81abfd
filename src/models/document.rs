//! Represents a managed document: metadata here, payload in the blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata record for a single uploaded document.
///
/// The binary payload lives in the blob store under `storage_key`; this
/// struct never carries the content bytes.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Document {
    /// Internal UUID, assigned on creation and immutable after.
    pub id: Uuid,

    /// Filename exactly as the uploader supplied it. Stored verbatim;
    /// sanitized only when embedded in a download response header.
    pub original_filename: String,

    /// Blob store key holding the payload. Never empty in a persisted
    /// record, and never reused across distinct documents.
    pub storage_key: String,

    /// MIME type declared at upload time.
    pub content_type: Option<String>,

    /// Set when the blob write committed, not before. Always UTC.
    pub uploaded_at: DateTime<Utc>,

    /// Free-text annotation, mutable without touching the blob.
    pub note: Option<String>,

    /// Optional association to a service ticket.
    pub ticket_id: Option<Uuid>,
}
