//! Core data models for the document management service.
//!
//! These entities map to SQLite tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod document;
pub mod ticket;
