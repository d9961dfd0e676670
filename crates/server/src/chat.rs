//! Chat endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use folio_agent::runtime::ChatRuntime;
use folio_core::domain::chat::{ChatReply, ChatRequest};
use folio_core::errors::{ChatError, InterfaceError};

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<ChatRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

type ChatFailure = (StatusCode, Json<ErrorEnvelope>);

pub fn router(runtime: Arc<ChatRuntime>) -> Router {
    Router::new().route("/api/v1/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ChatFailure> {
    let correlation_id = format!("req-{}", Uuid::new_v4().simple());

    let Json(request) = payload.map_err(|rejection| {
        warn!(
            event_name = "http.chat.rejected_body",
            correlation_id = %correlation_id,
            error = %rejection,
            "chat request body could not be decoded"
        );
        failure(
            ChatError::InvalidArgument(
                "Request body must be a JSON object with a 'message' field.".to_string(),
            )
            .into_interface(correlation_id.as_str()),
        )
    })?;

    state
        .runtime
        .handle_with_correlation(request, &correlation_id)
        .await
        .map(Json)
        .map_err(|error| failure(error.into_interface(correlation_id.as_str())))
}

fn failure(error: InterfaceError) -> ChatFailure {
    let status = match error {
        InterfaceError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody { status: error.status(), message: error.user_message() };
    (status, Json(ErrorEnvelope { error: body }))
}
