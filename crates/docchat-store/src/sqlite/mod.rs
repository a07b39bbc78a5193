//! `SQLite` backend: pooled connections, migrations, row types and
//! repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use repositories::document::DocumentRepo;
pub use repositories::exchange::ExchangeRepo;
pub use repositories::segment::SegmentRepo;
pub use repositories::user::UserRepo;
pub use row_types::{DocumentRow, SegmentRow, UserRow};
