//! Represents a service ticket that documents can be attached to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A client service ticket. Documents reference tickets via `ticket_id`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ServiceTicket {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Name of the client the ticket belongs to.
    pub client_name: String,

    /// Current ticket status (free-form, e.g. "Pendiente", "Completado").
    pub status: String,

    /// When the ticket was opened.
    pub created_at: DateTime<Utc>,
}
