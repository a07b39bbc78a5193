//! Exchange repository: the append-only chat log.

use chrono::{DateTime, SecondsFormat, Utc};
use docchat_core::{Exchange, Role};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use crate::errors::Result;

/// Exchange repository. Stateless; every method takes `&Connection`.
pub struct ExchangeRepo;

impl ExchangeRepo {
    /// Append one exchange.
    pub fn append(conn: &Connection, exchange: &Exchange) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO exchanges (id, document_id, user_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exchange.id.as_str(),
                exchange.document_id.as_str(),
                exchange.user_id.as_str(),
                exchange.role.as_str(),
                exchange.content,
                exchange
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;
        Ok(())
    }

    /// The conversation between `user_id` and `document_id`, oldest first.
    pub fn list_conversation(
        conn: &Connection,
        document_id: &str,
        user_id: &str,
    ) -> Result<Vec<Exchange>> {
        let mut stmt = conn.prepare(
            "SELECT id, document_id, user_id, role, content, created_at
             FROM exchanges WHERE document_id = ?1 AND user_id = ?2
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![document_id, user_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Exchange> {
        let role: String = row.get(3)?;
        let role: Role = role
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        let created_at: String = row.get(5)?;
        let timestamp = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        Ok(Exchange {
            id: row.get::<_, String>(0)?.into(),
            document_id: row.get::<_, String>(1)?.into(),
            user_id: row.get::<_, String>(2)?.into(),
            role,
            content: row.get(4)?,
            timestamp,
        })
    }
}
