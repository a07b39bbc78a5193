//! User repository.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::UserRow;

use super::now_rfc3339;

/// User repository. Stateless; every method takes `&Connection`.
pub struct UserRepo;

impl UserRepo {
    /// Return the user with `id`, inserting it with `email` first if absent.
    pub fn get_or_create(conn: &Connection, id: &str, email: &str) -> Result<UserRow> {
        if let Some(existing) = Self::get(conn, id)? {
            return Ok(existing);
        }
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![id, email, now],
        )?;
        Ok(UserRow {
            id: id.to_owned(),
            email: email.to_owned(),
            created_at: now,
        })
    }

    /// Get a user by ID.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
        let row = conn
            .query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
