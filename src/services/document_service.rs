//! Document lifecycle orchestration across the two stores.
//!
//! The hard invariants live here: blob writes always precede metadata
//! mutations, best-effort cleanup never aborts an operation, and no
//! partial record is ever persisted. Metadata lives in SQLite; payloads
//! go through the [`BlobStore`] trait.
//!
//! Known consistency gap, kept deliberately: if the metadata insert fails
//! *after* a blob write committed during upload, the blob is left
//! orphaned (logged, not compensated). The reverse never happens — a blob
//! failure aborts before any metadata mutation.

use crate::models::{document::Document, ticket::ServiceTicket};
use crate::services::blob_store::{BlobError, BlobStore};
use crate::services::naming;
use bytes::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document `{0}` not found")]
    DocumentNotFound(Uuid),
    #[error("ticket `{0}` not found")]
    TicketNotFound(Uuid),
    #[error("uploaded file is missing or empty")]
    EmptyUpload,
    #[error("document `{0}` has no storage key")]
    MissingStorageKey(Uuid),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// A file payload arriving with an upload or replace request, fully
/// buffered in memory for the duration of the request.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Metadata-only fields accepted alongside (or instead of) a payload.
#[derive(Debug, Default, Clone)]
pub struct DocumentFields {
    pub note: Option<String>,
    pub ticket_id: Option<Uuid>,
}

/// Result of a replace: the updated record plus warnings from
/// best-effort cleanup steps that failed without aborting the operation.
#[derive(Debug)]
pub struct ReplaceOutcome {
    pub document: Document,
    pub warnings: Vec<String>,
}

const DOCUMENT_COLUMNS: &str =
    "id, original_filename, storage_key, content_type, uploaded_at, note, ticket_id";

/// Sequences blob and metadata operations for the document lifecycle.
#[derive(Clone)]
pub struct DocumentService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Blob backend holding the document payloads.
    pub blobs: Arc<dyn BlobStore>,

    /// Bucket all document blobs are written into.
    pub bucket: String,
}

impl DocumentService {
    pub fn new(db: Arc<SqlitePool>, blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            db,
            blobs,
            bucket: bucket.into(),
        }
    }

    /// Upload a new document: blob write first, metadata insert after.
    ///
    /// An empty payload is rejected before either store is touched. A
    /// blob failure aborts with no record created. A metadata failure
    /// after the blob committed leaves the blob orphaned; the key is
    /// logged so an operator can reclaim it.
    pub async fn upload(
        &self,
        payload: UploadPayload,
        fields: DocumentFields,
    ) -> DocumentResult<Document> {
        if payload.data.is_empty() {
            return Err(DocumentError::EmptyUpload);
        }

        let storage_key = naming::storage_key_for(&payload.filename);
        self.blobs
            .put(
                &self.bucket,
                &storage_key,
                payload.content_type.as_deref(),
                payload.data,
            )
            .await?;

        let document = Document {
            id: Uuid::new_v4(),
            original_filename: payload.filename,
            storage_key,
            content_type: payload.content_type,
            uploaded_at: Utc::now(),
            note: fields.note,
            ticket_id: fields.ticket_id,
        };

        let insert = sqlx::query(
            "INSERT INTO documents (id, original_filename, storage_key, content_type, uploaded_at, note, ticket_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id)
        .bind(&document.original_filename)
        .bind(&document.storage_key)
        .bind(&document.content_type)
        .bind(document.uploaded_at)
        .bind(&document.note)
        .bind(document.ticket_id)
        .execute(&*self.db)
        .await;

        if let Err(err) = insert {
            warn!(
                "metadata insert failed after blob write; blob `{}` left orphaned: {}",
                document.storage_key, err
            );
            return Err(DocumentError::Sqlx(err));
        }

        debug!("uploaded document {} -> {}", document.id, document.storage_key);
        Ok(document)
    }

    /// Replace a document's payload and/or its metadata fields.
    ///
    /// With a payload: the new blob is written first (a failure here
    /// leaves record and old blob untouched), then the old blob is
    /// deleted best-effort, then the record is updated. The old-blob
    /// delete failing is a suppressed warning, never an error — the
    /// operation's success is the metadata update. Without a payload only
    /// note/ticket change and the blob store is never called.
    pub async fn replace(
        &self,
        id: Uuid,
        payload: Option<UploadPayload>,
        fields: DocumentFields,
    ) -> DocumentResult<ReplaceOutcome> {
        let mut document = self.fetch_document(id).await?;
        let mut warnings = Vec::new();

        if let Some(payload) = payload {
            if payload.data.is_empty() {
                return Err(DocumentError::EmptyUpload);
            }

            let new_key = naming::storage_key_for(&payload.filename);
            self.blobs
                .put(
                    &self.bucket,
                    &new_key,
                    payload.content_type.as_deref(),
                    payload.data,
                )
                .await?;

            let old_key = std::mem::replace(&mut document.storage_key, new_key);
            document.original_filename = payload.filename;
            document.content_type = payload.content_type;
            document.uploaded_at = Utc::now();

            if let Err(err) = self.blobs.delete(&self.bucket, &old_key).await {
                warn!("failed to delete superseded blob `{}`: {}", old_key, err);
                warnings.push(format!("superseded blob `{}` was not deleted: {}", old_key, err));
            }
        }

        document.note = fields.note;
        document.ticket_id = fields.ticket_id;

        sqlx::query(
            "UPDATE documents
             SET original_filename = ?, storage_key = ?, content_type = ?,
                 uploaded_at = ?, note = ?, ticket_id = ?
             WHERE id = ?",
        )
        .bind(&document.original_filename)
        .bind(&document.storage_key)
        .bind(&document.content_type)
        .bind(document.uploaded_at)
        .bind(&document.note)
        .bind(document.ticket_id)
        .bind(document.id)
        .execute(&*self.db)
        .await?;

        Ok(ReplaceOutcome {
            document,
            warnings,
        })
    }

    /// Delete a document: blob first, metadata after.
    ///
    /// An already-absent blob is fine (the trait tolerates it), but any
    /// other blob failure aborts so the record is never dropped while a
    /// blob might still exist unaccounted for.
    pub async fn delete(&self, id: Uuid) -> DocumentResult<Document> {
        let document = self.fetch_document(id).await?;

        self.blobs.delete(&self.bucket, &document.storage_key).await?;

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        debug!("deleted document {} ({})", document.id, document.storage_key);
        Ok(document)
    }

    /// Fetch a document's payload for the download proxy.
    ///
    /// Returns the record alongside the fully-buffered bytes; the handler
    /// owns header construction.
    pub async fn download(&self, id: Uuid) -> DocumentResult<(Document, Bytes)> {
        let document = self.fetch_document(id).await?;
        if document.storage_key.is_empty() {
            return Err(DocumentError::MissingStorageKey(id));
        }
        let data = self.blobs.get(&self.bucket, &document.storage_key).await?;
        Ok((document, data))
    }

    /// All documents, newest upload first.
    pub async fn list(&self) -> DocumentResult<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY uploaded_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(docs)
    }

    /// A single document's metadata.
    pub async fn get(&self, id: Uuid) -> DocumentResult<Document> {
        self.fetch_document(id).await
    }

    /// All service tickets, newest first.
    pub async fn list_tickets(&self) -> DocumentResult<Vec<ServiceTicket>> {
        let tickets = sqlx::query_as::<_, ServiceTicket>(
            "SELECT id, client_name, status, created_at FROM tickets ORDER BY created_at DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(tickets)
    }

    /// Change a ticket's status.
    pub async fn update_ticket_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> DocumentResult<ServiceTicket> {
        sqlx::query_as::<_, ServiceTicket>(
            "UPDATE tickets SET status = ? WHERE id = ?
             RETURNING id, client_name, status, created_at",
        )
        .bind(status)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(DocumentError::TicketNotFound(id))
    }

    async fn fetch_document(&self, id: Uuid) -> DocumentResult<Document> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DocumentError::DocumentNotFound(id),
            other => DocumentError::Sqlx(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob_store::BlobResult;
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory blob store double with switchable failure modes and
    /// per-operation call counters.
    #[derive(Default)]
    struct MemoryBlobStore {
        objects: Mutex<HashMap<String, Bytes>>,
        fail_puts: bool,
        fail_deletes: bool,
        put_calls: AtomicUsize,
        get_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl MemoryBlobStore {
        fn failing_puts() -> Self {
            Self {
                fail_puts: true,
                ..Self::default()
            }
        }

        fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::default()
            }
        }

        fn remove_out_of_band(&self, key: &str) {
            self.objects.lock().unwrap().remove(key);
        }

        fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(
            &self,
            _bucket: &str,
            key: &str,
            _content_type: Option<&str>,
            payload: Bytes,
        ) -> BlobResult<()> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts {
                return Err(BlobError::Io(io::Error::other("simulated put failure")));
            }
            self.objects.lock().unwrap().insert(key.to_string(), payload);
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> BlobResult<Bytes> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| BlobError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn delete(&self, _bucket: &str, key: &str) -> BlobResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes {
                return Err(BlobError::Io(io::Error::other("simulated delete failure")));
            }
            // Absent keys are tolerated, matching the trait contract.
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }

    async fn service_with(store: Arc<MemoryBlobStore>) -> DocumentService {
        // A single connection keeps every query on the same in-memory DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE tickets (
                id TEXT PRIMARY KEY,
                client_name TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE documents (
                id TEXT PRIMARY KEY,
                original_filename TEXT NOT NULL,
                storage_key TEXT NOT NULL UNIQUE,
                content_type TEXT,
                uploaded_at TEXT NOT NULL,
                note TEXT,
                ticket_id TEXT REFERENCES tickets(id)
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        DocumentService::new(Arc::new(pool), store, "admin-docs")
    }

    fn pdf_payload() -> UploadPayload {
        UploadPayload {
            filename: "reporte.pdf".into(),
            content_type: Some("application/pdf".into()),
            data: Bytes::from_static(b"0123456789"),
        }
    }

    async fn count_documents(service: &DocumentService) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(&*service.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_populates_record_after_blob_commit() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;

        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        assert!(doc.storage_key.starts_with("admin_documents/"));
        assert!(doc.storage_key.ends_with("_reporte.pdf"));
        assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
        assert!(store.contains(&doc.storage_key));
        assert_eq!(service.get(doc.id).await.unwrap().storage_key, doc.storage_key);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_before_any_store_call() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;

        let payload = UploadPayload {
            filename: "empty.bin".into(),
            content_type: None,
            data: Bytes::new(),
        };
        let err = service.upload(payload, DocumentFields::default()).await.unwrap_err();

        assert!(matches!(err, DocumentError::EmptyUpload));
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 0);
        assert_eq!(count_documents(&service).await, 0);
    }

    #[tokio::test]
    async fn failed_blob_write_leaves_no_record() {
        let store = Arc::new(MemoryBlobStore::failing_puts());
        let service = service_with(store.clone()).await;

        let err = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentError::Blob(_)));
        assert_eq!(count_documents(&service).await, 0);
    }

    #[tokio::test]
    async fn replace_without_file_touches_no_blobs() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();
        let puts_after_upload = store.put_calls.load(Ordering::SeqCst);

        let fields = DocumentFields {
            note: Some("revised".into()),
            ticket_id: None,
        };
        let outcome = service.replace(doc.id, None, fields).await.unwrap();

        assert_eq!(outcome.document.note.as_deref(), Some("revised"));
        assert_eq!(outcome.document.storage_key, doc.storage_key);
        assert_eq!(outcome.document.uploaded_at, doc.uploaded_at);
        assert!(outcome.warnings.is_empty());
        assert_eq!(store.put_calls.load(Ordering::SeqCst), puts_after_upload);
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn replace_swaps_blob_and_removes_old_key() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        let new_payload = UploadPayload {
            filename: "reporte-v2.pdf".into(),
            content_type: Some("application/pdf".into()),
            data: Bytes::from_static(b"updated"),
        };
        let outcome = service
            .replace(doc.id, Some(new_payload), DocumentFields::default())
            .await
            .unwrap();

        assert_ne!(outcome.document.storage_key, doc.storage_key);
        assert!(outcome.document.storage_key.ends_with("_reporte-v2.pdf"));
        assert!(store.contains(&outcome.document.storage_key));
        assert!(!store.contains(&doc.storage_key));
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn old_blob_delete_failure_does_not_abort_replace() {
        let store = Arc::new(MemoryBlobStore::failing_deletes());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        let new_payload = UploadPayload {
            filename: "reporte-v2.pdf".into(),
            content_type: Some("application/pdf".into()),
            data: Bytes::from_static(b"updated"),
        };
        let outcome = service
            .replace(doc.id, Some(new_payload), DocumentFields::default())
            .await
            .unwrap();

        // The delete was attempted against the previous key, its failure
        // suppressed, and the metadata update still went through.
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains(&doc.storage_key));
        let reloaded = service.get(doc.id).await.unwrap();
        assert_eq!(reloaded.storage_key, outcome.document.storage_key);
    }

    #[tokio::test]
    async fn failed_new_blob_write_leaves_replace_untouched() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        let failing = Arc::new(MemoryBlobStore::failing_puts());
        let broken = DocumentService::new(service.db.clone(), failing, "admin-docs");
        let new_payload = UploadPayload {
            filename: "reporte-v2.pdf".into(),
            content_type: None,
            data: Bytes::from_static(b"updated"),
        };
        let err = broken
            .replace(doc.id, Some(new_payload), DocumentFields::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentError::Blob(_)));
        let reloaded = service.get(doc.id).await.unwrap();
        assert_eq!(reloaded.storage_key, doc.storage_key);
        assert!(store.contains(&doc.storage_key));
    }

    #[tokio::test]
    async fn delete_succeeds_when_blob_already_removed_out_of_band() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        store.remove_out_of_band(&doc.storage_key);
        service.delete(doc.id).await.unwrap();

        assert_eq!(count_documents(&service).await, 0);
    }

    #[tokio::test]
    async fn delete_preserves_metadata_when_blob_delete_fails() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        let failing = Arc::new(MemoryBlobStore::failing_deletes());
        let broken = DocumentService::new(service.db.clone(), failing, "admin-docs");
        let err = broken.delete(doc.id).await.unwrap_err();

        assert!(matches!(err, DocumentError::Blob(_)));
        assert_eq!(count_documents(&service).await, 1);
    }

    #[tokio::test]
    async fn download_returns_record_and_payload() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let doc = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();

        let (record, data) = service.download(doc.id).await.unwrap();
        assert_eq!(record.original_filename, "reporte.pdf");
        assert_eq!(&data[..], b"0123456789");

        let missing = Uuid::new_v4();
        let err = service.download(missing).await.unwrap_err();
        assert!(matches!(err, DocumentError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;
        let first = service
            .upload(pdf_payload(), DocumentFields::default())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .upload(
                UploadPayload {
                    filename: "later.txt".into(),
                    content_type: Some("text/plain".into()),
                    data: Bytes::from_static(b"later"),
                },
                DocumentFields::default(),
            )
            .await
            .unwrap();

        let docs = service.list().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, second.id);
        assert_eq!(docs[1].id, first.id);
    }

    #[tokio::test]
    async fn ticket_status_update_round_trips() {
        let store = Arc::new(MemoryBlobStore::default());
        let service = service_with(store.clone()).await;

        let ticket_id = Uuid::new_v4();
        sqlx::query("INSERT INTO tickets (id, client_name, status, created_at) VALUES (?, ?, ?, ?)")
            .bind(ticket_id)
            .bind("Acme S.A.")
            .bind("Pendiente")
            .bind(Utc::now())
            .execute(&*service.db)
            .await
            .unwrap();

        let updated = service
            .update_ticket_status(ticket_id, "Completado")
            .await
            .unwrap();
        assert_eq!(updated.status, "Completado");

        let err = service
            .update_ticket_status(Uuid::new_v4(), "Completado")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::TicketNotFound(_)));
    }
}
