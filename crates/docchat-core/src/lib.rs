//! # docchat-core
//!
//! Shared vocabulary for the docchat gateway crates:
//!
//! - **Branded IDs**: `DocumentId`, `UserId`, `ConnectionId`, `ExchangeId` as newtypes
//! - **Exchanges**: persisted chat records with a [`Role`](exchange::Role)
//! - **Chunking**: splitting extracted document text into ordered segments
//! - **Logging**: `tracing` subscriber setup shared by the binary and tests

#![deny(unsafe_code)]

pub mod chunking;
pub mod exchange;
pub mod ids;
pub mod logging;

pub use exchange::{Exchange, Role};
pub use ids::{ConnectionId, DocumentId, ExchangeId, UserId};
