//! The storage collaborator consumed by the gateway.

use async_trait::async_trait;
use docchat_core::{DocumentId, Exchange, UserId};

use crate::errors::Result;

/// Read segments, check document access, and append chat exchanges.
///
/// The gateway only ever reads segments and appends exchanges; it never
/// mutates stored rows.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Segment texts of `document_id` in index order. Empty if the document
    /// has no segments.
    async fn segments(&self, document_id: &DocumentId) -> Result<Vec<String>>;

    /// Whether `document_id` exists and belongs to `user_id`.
    async fn document_exists(&self, document_id: &DocumentId, user_id: &UserId) -> Result<bool>;

    /// Append one exchange to the chat log.
    async fn append_exchange(&self, exchange: &Exchange) -> Result<()>;
}
