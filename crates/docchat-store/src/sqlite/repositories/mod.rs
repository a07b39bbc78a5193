//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! parameter, so they compose inside a caller's transaction.

pub mod document;
pub mod exchange;
pub mod segment;
pub mod user;

/// Current time in the fixed-width RFC 3339 form used for every stored
/// timestamp, so text ordering matches time ordering.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    use crate::sqlite::migrations::run_migrations;

    pub fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    pub fn seed_document(conn: &Connection, doc: &str, user: &str) {
        let _ = conn
            .execute(
                "INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?1, 'x@y.z', '2024-01-01T00:00:00.000000Z')",
                [user],
            )
            .unwrap();
        let _ = conn
            .execute(
                "INSERT INTO documents (id, user_id, file_name, storage_path, size_bytes, uploaded_at)
                 VALUES (?1, ?2, 'f.txt', '/tmp/f.txt', 10, '2024-01-01T00:00:00.000000Z')",
                [doc, user],
            )
            .unwrap();
    }
}
