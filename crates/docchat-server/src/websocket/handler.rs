//! `GET /ws`: channel admission.
//!
//! The document/user pair is checked before the upgrade; a rejected request
//! never reaches the registry.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use docchat_core::{ConnectionId, DocumentId, UserId};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::session::{SessionIdentity, run_session};
use crate::routes::errors::ApiError;
use crate::server::AppState;

/// Query parameters identifying the channel.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionParams {
    /// Document to chat about.
    pub document_id: Option<String>,
    /// Who is chatting.
    pub user_id: Option<String>,
}

impl AdmissionParams {
    /// Both identifiers, if present and non-empty.
    pub fn identity(&self) -> Option<(DocumentId, UserId)> {
        let document_id = self.document_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let user_id = self.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((document_id.into(), user_id.into()))
    }
}

/// Verify the document, then upgrade and hand the socket to a new session.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<AdmissionParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some((document_id, user_id)) = params.identity() else {
        warn!("websocket admission without documentId/userId");
        return ApiError::bad_request("documentId and userId are required").into_response();
    };

    match state
        .pipeline
        .backend()
        .document_exists(&document_id, &user_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(%document_id, %user_id, "websocket admission rejected");
            return ApiError::not_found("Document not found or access denied").into_response();
        }
        Err(e) => {
            error!(%document_id, error = %e, "document access check failed");
            return ApiError::internal("Failed to verify document access").into_response();
        }
    }

    let identity = SessionIdentity {
        connection_id: ConnectionId::new(),
        document_id,
        user_id,
    };
    info!(connection_id = %identity.connection_id, "admitting websocket session");

    let hub = state.hub.clone();
    let pipeline = state.pipeline.clone();
    let config = state.config.session;
    ws.max_message_size(config.max_frame_bytes)
        .on_upgrade(move |socket| run_session(socket, identity, hub, pipeline, config))
}
