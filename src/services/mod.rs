//! Service layer: the blob store boundary, naming helpers, and the
//! document lifecycle orchestrator.

pub mod blob_store;
pub mod document_service;
pub mod naming;
