//! `POST /chat` and `GET /chat/models`.
//!
//! The server keeps no conversation state: the client sends the history it
//! got back from the previous turn along with each new message.

use super::{ChatGateway, ChatMessage, ChatSession, INTRO};
use crate::error::ChatError;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: Option<String>,
    /// Model the history was produced with; a different `model` starts over.
    pub previous_model: Option<String>,
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub model: String,
    pub reply: String,
    pub tools_used: Vec<String>,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
    pub intro: &'static str,
}

type HandlerError = (StatusCode, Json<Value>);

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, HandlerError> {
    let gateway = gateway(&state)?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let default_model = gateway.default_model().await.map_err(chat_failure)?;
    let starting_model = request
        .previous_model
        .clone()
        .or_else(|| request.model.clone())
        .unwrap_or_else(|| default_model.clone());
    let mut session =
        ChatSession::new(starting_model).with_history(request.session_id, request.history);
    if let Some(model) = request.model {
        session.change_model(model);
    }

    let turn = gateway
        .process_chat_turn(&mut session, message)
        .await
        .map_err(chat_failure)?;
    info!(
        "Session {} answered with {} tools used",
        session.id,
        turn.tools_used.len()
    );

    Ok(Json(ChatResponse {
        session_id: session.id,
        model: session.model().to_string(),
        reply: turn.reply,
        tools_used: turn.tools_used,
        history: session.into_history(),
    }))
}

pub async fn models_handler(
    State(state): State<AppState>,
) -> Result<Json<ModelsResponse>, HandlerError> {
    let gateway = gateway(&state)?;
    let models = gateway.list_models().await.map_err(chat_failure)?;
    let default_model = gateway.default_model().await.map_err(chat_failure)?;
    Ok(Json(ModelsResponse {
        models,
        default_model,
        intro: INTRO,
    }))
}

fn gateway(state: &AppState) -> Result<Arc<dyn ChatGateway>, HandlerError> {
    state.chat.clone().ok_or_else(|| {
        chat_failure(ChatError::NotConfigured(
            "set OPENAI_API_KEY to enable chat".into(),
        ))
    })
}

fn chat_failure(err: ChatError) -> HandlerError {
    error!("Chat request failed: {}", err);
    let status = match err {
        ChatError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::ModelNotFound(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    failure(status, &err.to_string())
}

fn failure(status: StatusCode, message: &str) -> HandlerError {
    (status, Json(json!({ "error": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatTurn;
    use crate::error::ChatError;
    use async_trait::async_trait;

    /// Echoes the question and reports how much history it was given.
    struct EchoGateway;

    #[async_trait]
    impl ChatGateway for EchoGateway {
        async fn connect(&self) -> Result<(), ChatError> {
            Ok(())
        }

        async fn list_models(&self) -> Result<Vec<String>, ChatError> {
            Ok(vec!["gpt-4".into(), "llama3.2:3b".into()])
        }

        fn preferred_default_model(&self) -> &str {
            "gpt-4"
        }

        fn configured_default_model(&self) -> Option<&str> {
            None
        }

        async fn process_chat_turn(
            &self,
            session: &mut ChatSession,
            user_input: &str,
        ) -> Result<ChatTurn, ChatError> {
            let reply = format!("{} ({} prior)", user_input, session.history().len());
            session.record_turn(user_input, &reply);
            Ok(ChatTurn {
                reply,
                tools_used: vec!["find_mlb_baseball_teams".into()],
            })
        }
    }

    fn state(chat: Option<Arc<dyn ChatGateway>>) -> AppState {
        AppState {
            tools: crate::tests::fixture_toolbox(),
            chat,
        }
    }

    fn request(body: Value) -> Json<ChatRequest> {
        Json(serde_json::from_value(body).unwrap())
    }

    #[tokio::test]
    async fn answers_with_default_model_and_history() {
        let Json(response) = chat_handler(
            State(state(Some(Arc::new(EchoGateway)))),
            request(json!({"message": "Who plays in Atlanta?"})),
        )
        .await
        .unwrap();
        assert_eq!(response.model, "gpt-4");
        assert_eq!(response.reply, "Who plays in Atlanta? (0 prior)");
        assert_eq!(response.tools_used, vec!["find_mlb_baseball_teams"]);
        assert_eq!(response.history.len(), 2);
    }

    #[tokio::test]
    async fn switching_models_drops_history() {
        let body = json!({
            "message": "And in 1995?",
            "model": "llama3.2:3b",
            "previous_model": "gpt-4",
            "history": [
                {"role": "user", "content": "Who plays in Atlanta?"},
                {"role": "assistant", "content": "The Braves."}
            ]
        });
        let Json(response) = chat_handler(State(state(Some(Arc::new(EchoGateway)))), request(body))
            .await
            .unwrap();
        assert_eq!(response.model, "llama3.2:3b");
        assert_eq!(response.reply, "And in 1995? (0 prior)");

        let body = json!({
            "message": "And in 1995?",
            "model": "gpt-4",
            "previous_model": "gpt-4",
            "history": [
                {"role": "user", "content": "Who plays in Atlanta?"},
                {"role": "assistant", "content": "The Braves."}
            ]
        });
        let Json(response) = chat_handler(State(state(Some(Arc::new(EchoGateway)))), request(body))
            .await
            .unwrap();
        assert_eq!(response.reply, "And in 1995? (2 prior)");
        assert_eq!(response.history.len(), 4);
    }

    #[tokio::test]
    async fn unconfigured_chat_is_unavailable() {
        let err = chat_handler(State(state(None)), request(json!({"message": "hi"})))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);

        let err = models_handler(State(state(None))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let err = chat_handler(
            State(state(Some(Arc::new(EchoGateway)))),
            request(json!({"message": "   "})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_models_with_default() {
        let Json(response) = models_handler(State(state(Some(Arc::new(EchoGateway)))))
            .await
            .unwrap();
        assert_eq!(response.models.len(), 2);
        assert_eq!(response.default_model, "gpt-4");
        assert_eq!(response.intro, INTRO);
    }
}
