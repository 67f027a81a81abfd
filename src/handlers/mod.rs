pub mod document_handlers;
pub mod health_handlers;
pub mod ticket_handlers;
