//! Chat history, manual exchange logging, and one-shot questions.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use docchat_core::{DocumentId, Exchange, ExchangeId, Role, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::errors::ApiError;
use crate::pipeline::PipelineError;
use crate::server::AppState;

/// One chat message as `POST /chat` accepts it and the history route
/// returns it.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    /// Exchange ID.
    pub id: ExchangeId,
    /// Document the message belongs to.
    pub document_id: DocumentId,
    /// Conversation owner.
    pub user_id: UserId,
    /// `user` or `assistant`.
    pub message_type: Role,
    /// Message text.
    pub message_content: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

impl From<Exchange> for ChatMessage {
    fn from(exchange: Exchange) -> Self {
        Self {
            id: exchange.id,
            document_id: exchange.document_id,
            user_id: exchange.user_id,
            message_type: exchange.role,
            message_content: exchange.content,
            timestamp: exchange.timestamp,
        }
    }
}

/// Query string of `GET /documents/{id}/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    /// Whose side of the conversation to return.
    pub user_id: Option<String>,
}

/// `GET /documents/{document_id}/chat?userId=`
pub async fn history(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let Some(user_id) = params.user_id.filter(|u| !u.trim().is_empty()) else {
        return Err(ApiError::bad_request("userId is required"));
    };
    let messages = state
        .store
        .blocking(move |store| store.conversation(&document_id, &user_id))
        .await?;
    let messages: Vec<ChatMessage> = messages.into_iter().map(ChatMessage::from).collect();
    Ok(Json(json!({ "success": true, "messages": messages })))
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    /// Document the message belongs to.
    pub document_id: String,
    /// Author's user.
    pub user_id: String,
    /// `user`, `assistant` or `bot`.
    pub message_type: String,
    /// Message text.
    pub message_content: String,
}

/// `POST /chat`
pub async fn save_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.document_id.is_empty() || req.user_id.is_empty() {
        return Err(ApiError::bad_request("document_id and user_id are required"));
    }
    let role: Role = req
        .message_type
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
    let exchange = Exchange::new(
        req.document_id.into(),
        req.user_id.into(),
        role,
        req.message_content,
    );
    let saved = exchange.clone();
    state
        .store
        .blocking(move |store| store.record_exchange(&saved))
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to save chat message");
            ApiError::internal("Failed to save chat message")
        })?;
    let id = exchange.id.clone();
    Ok(Json(json!({
        "success": true,
        "id": id,
        "message": ChatMessage::from(exchange),
    })))
}

/// Body of `POST /ask`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Document to answer from.
    #[serde(default)]
    pub document_id: String,
    /// The question.
    #[serde(default)]
    pub query: String,
    /// Caller, for logs only.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /ask`: answer once, persist nothing.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.document_id.trim().is_empty() || req.query.trim().is_empty() {
        return Err(ApiError::bad_request("document_id and query are required"));
    }

    let lookup = req.document_id.clone();
    let known = state
        .store
        .blocking(move |store| store.get_document(&lookup))
        .await?;
    if known.is_none() {
        return Err(ApiError::not_found("Document not found"));
    }

    let document_id = DocumentId::from(req.document_id);
    info!(%document_id, user_id = req.user_id.as_deref().unwrap_or("-"), "one-shot question");
    match state.pipeline.generate(&document_id, &req.query).await {
        Ok(answer) => Ok(Json(json!({ "success": true, "answer": answer }))),
        Err(err @ PipelineError::NoContent) => Err(ApiError::not_found(err.to_string())),
        Err(err) => {
            warn!(%document_id, kind = err.kind(), error = %err, "one-shot question failed");
            Err(ApiError::internal(err.to_string()))
        }
    }
}
