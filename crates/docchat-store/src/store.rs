//! [`DocumentStore`]: the pooled `SQLite` facade used by the server.
//!
//! Synchronous methods are for callers already on a blocking thread; the
//! [`DocumentBackend`] impl hops onto `spawn_blocking` so async callers never
//! hold a runtime worker during `SQLite` I/O.

use std::path::Path;

use async_trait::async_trait;
use docchat_core::{DocumentId, Exchange, UserId};
use tracing::{debug, info};

use crate::backend::DocumentBackend;
use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::now_rfc3339;
use crate::sqlite::{
    DocumentRepo, DocumentRow, ExchangeRepo, SegmentRepo, SegmentRow, UserRepo,
};

/// A document to ingest together with its owner.
#[derive(Clone, Debug)]
pub struct NewDocument {
    /// ID to store the document under.
    pub id: DocumentId,
    /// Owner, created if absent.
    pub user_id: UserId,
    /// Owner email, used only when the user is created.
    pub email: String,
    /// Original file name.
    pub file_name: String,
    /// Where the uploaded bytes were written.
    pub storage_path: String,
    /// Upload size in bytes.
    pub size_bytes: i64,
}

/// Pooled `SQLite` store for users, documents, segments and exchanges.
#[derive(Clone)]
pub struct DocumentStore {
    pool: ConnectionPool,
}

impl DocumentStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let pool = connection::new_file(path, config)?;
        let applied = run_migrations(&*pool.get()?)?;
        info!(path = %path.display(), applied, "document store ready");
        Ok(Self { pool })
    }

    /// A migrated single-connection in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig {
            pool_size: 1,
            ..ConnectionConfig::default()
        })?;
        let _ = run_migrations(&*pool.get()?)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Insert a document, its owner (if new) and all segments atomically.
    pub fn ingest_document(&self, doc: &NewDocument, segments: &[String]) -> Result<DocumentRow> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let _ = UserRepo::get_or_create(&tx, &doc.user_id, &doc.email)?;
        let row = DocumentRow {
            id: doc.id.to_string(),
            user_id: doc.user_id.to_string(),
            file_name: doc.file_name.clone(),
            storage_path: doc.storage_path.clone(),
            size_bytes: doc.size_bytes,
            uploaded_at: now_rfc3339(),
        };
        DocumentRepo::insert(&tx, &row)?;
        let count = SegmentRepo::insert_all(&tx, &doc.id, segments)?;
        tx.commit()?;

        debug!(document_id = %doc.id, segments = count, "document ingested");
        Ok(row)
    }

    /// Get a document by ID.
    pub fn get_document(&self, document_id: &str) -> Result<Option<DocumentRow>> {
        let conn = self.conn()?;
        DocumentRepo::get(&conn, document_id)
    }

    /// Get a document by ID, failing with [`StoreError::DocumentNotFound`].
    pub fn require_document(&self, document_id: &str) -> Result<DocumentRow> {
        self.get_document(document_id)?
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_owned()))
    }

    /// Documents owned by `user_id`, newest first.
    pub fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentRow>> {
        let conn = self.conn()?;
        DocumentRepo::list_for_user(&conn, user_id)
    }

    /// Full segment rows of a document in index order.
    pub fn list_segments(&self, document_id: &str) -> Result<Vec<SegmentRow>> {
        let conn = self.conn()?;
        SegmentRepo::list(&conn, document_id)
    }

    /// Segment texts of a document in index order.
    pub fn segment_texts(&self, document_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        SegmentRepo::contents(&conn, document_id)
    }

    /// Whether `document_id` exists and belongs to `user_id`.
    pub fn owns_document(&self, document_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        DocumentRepo::exists_for_user(&conn, document_id, user_id)
    }

    /// Append one exchange.
    pub fn record_exchange(&self, exchange: &Exchange) -> Result<()> {
        let conn = self.conn()?;
        ExchangeRepo::append(&conn, exchange)
    }

    /// Chat log between a user and a document, oldest first.
    pub fn conversation(&self, document_id: &str, user_id: &str) -> Result<Vec<Exchange>> {
        let conn = self.conn()?;
        ExchangeRepo::list_conversation(&conn, document_id, user_id)
    }

    /// Run a synchronous store call on the blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Internal(format!("blocking store task failed: {e}")))?
    }
}

#[async_trait]
impl DocumentBackend for DocumentStore {
    async fn segments(&self, document_id: &DocumentId) -> Result<Vec<String>> {
        let document_id = document_id.clone();
        self.blocking(move |store| store.segment_texts(&document_id))
            .await
    }

    async fn document_exists(&self, document_id: &DocumentId, user_id: &UserId) -> Result<bool> {
        let (document_id, user_id) = (document_id.clone(), user_id.clone());
        self.blocking(move |store| store.owns_document(&document_id, &user_id))
            .await
    }

    async fn append_exchange(&self, exchange: &Exchange) -> Result<()> {
        let exchange = exchange.clone();
        self.blocking(move |store| store.record_exchange(&exchange))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use docchat_core::Role;

    fn new_doc(id: &str, user: &str) -> NewDocument {
        NewDocument {
            id: id.into(),
            user_id: user.into(),
            email: format!("{user}@example.com"),
            file_name: "notes.txt".into(),
            storage_path: format!("/uploads/{id}.txt"),
            size_bytes: 31,
        }
    }

    #[test]
    fn ingest_creates_user_document_and_segments() {
        let store = DocumentStore::open_in_memory().unwrap();
        let segments = vec!["Paris is the capital of France.".to_string()];
        let row = store.ingest_document(&new_doc("d1", "u1"), &segments).unwrap();

        assert_eq!(row.id, "d1");
        assert!(store.owns_document("d1", "u1").unwrap());
        assert_eq!(store.segment_texts("d1").unwrap(), segments);
        assert_eq!(store.list_documents("u1").unwrap().len(), 1);
    }

    #[test]
    fn failed_ingest_leaves_nothing_behind() {
        let store = DocumentStore::open_in_memory().unwrap();
        let _ = store.ingest_document(&new_doc("d1", "u1"), &[]).unwrap();
        // Same document ID again violates the primary key after the user upsert.
        assert!(store.ingest_document(&new_doc("d1", "u2"), &["x".into()]).is_err());
        assert!(store.list_documents("u2").unwrap().is_empty());
        assert!(store.segment_texts("d1").unwrap().is_empty());
    }

    #[test]
    fn require_document_reports_not_found() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert_matches!(store.require_document("nope"), Err(StoreError::DocumentNotFound(id)) if id == "nope");
    }

    #[test]
    fn open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docchat.db");
        let store = DocumentStore::open(&path, &ConnectionConfig::default()).unwrap();
        let _ = store.ingest_document(&new_doc("d1", "u1"), &[]).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn backend_roundtrip() {
        let store = DocumentStore::open_in_memory().unwrap();
        let _ = store
            .ingest_document(&new_doc("d1", "u1"), &["a".into(), "b".into()])
            .unwrap();
        let backend: &dyn DocumentBackend = &store;

        let doc = DocumentId::from("d1");
        let user = UserId::from("u1");
        assert_eq!(backend.segments(&doc).await.unwrap(), ["a", "b"]);
        assert!(backend.document_exists(&doc, &user).await.unwrap());
        assert!(!backend.document_exists(&doc, &UserId::from("u2")).await.unwrap());

        let ex = Exchange::new(doc.clone(), user.clone(), Role::Assistant, "answer");
        backend.append_exchange(&ex).await.unwrap();
        let log = store.conversation("d1", "u1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "answer");
    }
}
