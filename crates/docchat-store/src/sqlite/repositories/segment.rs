//! Segment repository.

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::SegmentRow;

use super::now_rfc3339;

/// Segment repository. Stateless; every method takes `&Connection`.
pub struct SegmentRepo;

impl SegmentRepo {
    /// Insert `contents` as segments `0..n` of `document_id`.
    pub fn insert_all(conn: &Connection, document_id: &str, contents: &[String]) -> Result<usize> {
        let now = now_rfc3339();
        let mut stmt = conn.prepare(
            "INSERT INTO segments (id, document_id, segment_index, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (index, content) in contents.iter().enumerate() {
            let index = i64::try_from(index).unwrap_or(i64::MAX);
            let _ = stmt.execute(params![
                Uuid::now_v7().to_string(),
                document_id,
                index,
                content,
                now
            ])?;
        }
        Ok(contents.len())
    }

    /// All segments of a document in index order.
    pub fn list(conn: &Connection, document_id: &str) -> Result<Vec<SegmentRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, document_id, segment_index, content, created_at
             FROM segments WHERE document_id = ?1 ORDER BY segment_index ASC",
        )?;
        let rows = stmt
            .query_map(params![document_id], |row| {
                Ok(SegmentRow {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    segment_index: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Segment texts of a document in index order.
    pub fn contents(conn: &Connection, document_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT content FROM segments WHERE document_id = ?1 ORDER BY segment_index ASC",
        )?;
        let rows = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
