//! # docchat-store
//!
//! `SQLite` persistence for the docchat gateway.
//!
//! - **Connection pool**: `r2d2` + `r2d2_sqlite` with WAL and foreign keys
//! - **Migrations**: embedded SQL, versioned through `schema_version`
//! - **Repositories**: stateless `UserRepo`, `DocumentRepo`, `SegmentRepo`, `ExchangeRepo`
//! - **[`DocumentStore`]**: pooled facade used by REST handlers
//! - **[`DocumentBackend`]**: async collaborator trait consumed by the query pipeline

#![deny(unsafe_code)]

pub mod backend;
pub mod errors;
pub mod sqlite;
pub mod store;

pub use backend::DocumentBackend;
pub use errors::{Result, StoreError};
pub use sqlite::{ConnectionConfig, DocumentRow, SegmentRow, UserRow};
pub use store::{DocumentStore, NewDocument};
