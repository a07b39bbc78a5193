//! Row types returned by the repositories.

use serde::Serialize;

/// A row in the `users` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserRow {
    /// User ID.
    pub id: String,
    /// Contact email.
    pub email: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// A row in the `documents` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentRow {
    /// Document ID.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Original upload file name.
    pub file_name: String,
    /// Where the uploaded bytes were written.
    pub storage_path: String,
    /// Upload size in bytes.
    pub size_bytes: i64,
    /// RFC 3339 upload time.
    pub uploaded_at: String,
}

/// A row in the `segments` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SegmentRow {
    /// Segment ID.
    pub id: String,
    /// Parent document.
    pub document_id: String,
    /// Zero-based position within the document.
    pub segment_index: i64,
    /// Segment text.
    pub content: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}
