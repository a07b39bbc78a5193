//! Document repository.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::sqlite::row_types::DocumentRow;

const COLUMNS: &str = "id, user_id, file_name, storage_path, size_bytes, uploaded_at";

/// Document repository. Stateless; every method takes `&Connection`.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Insert a document row. The owning user must already exist.
    pub fn insert(conn: &Connection, doc: &DocumentRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO documents (id, user_id, file_name, storage_path, size_bytes, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.id,
                doc.user_id,
                doc.file_name,
                doc.storage_path,
                doc.size_bytes,
                doc.uploaded_at
            ],
        )?;
        Ok(())
    }

    /// Get a document by ID regardless of owner.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<DocumentRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Documents owned by `user_id`, newest first.
    pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<DocumentRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM documents WHERE user_id = ?1 ORDER BY uploaded_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether `document_id` exists and is owned by `user_id`.
    pub fn exists_for_user(conn: &Connection, document_id: &str, user_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1 AND user_id = ?2)",
            params![document_id, user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
        Ok(DocumentRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            file_name: row.get(2)?,
            storage_path: row.get(3)?,
            size_bytes: row.get(4)?,
            uploaded_at: row.get(5)?,
        })
    }
}
