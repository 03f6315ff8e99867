//! Chat front-end: an LLM gateway that answers baseball questions and may
//! call the local tools while doing so.

pub mod agent;
pub mod completions;
pub mod handlers;

use crate::config::{ChatBackend, ChatConfig};
use crate::error::ChatError;
use crate::tools::Toolbox;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const AGENT_SYSTEM_PROMPT: &str = "You are knowledgeable in the sport of baseball and specialize in Major League Baseball.

Provide concise responses where possible.

Use the find_mlb_baseball_teams tool to lookup team information such as names, locations, and leagues if the user is asking questions about or is trying to find teams.

Use the search_mlb_rosters tool when the user is asking questions about team rosters or players.

Use the search_mlb_games tool for questions about individual games, and the get_schedule_and_record tool for a team's schedule or record in a season.

Use the get_temperature_on_past_date tool if the user asks what the temperature was on a specific date in a specific location.

Use the get_current_temperature tool if the user asks for the current temperature of a location.

Only invoke a tool if a question is being asked that a specific tool can answer. Never make assumptions about invoking tools or their associated parameters. Always ask the user for clarification if you are not sure about the parameters to use.

Do not comment about tool use when they are used, not used, or ignored.";

pub const INTRO: &str = "Welcome to the Major League!!! What may I help you with?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation context owned by the caller and passed to every turn.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    model: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, id: Option<Uuid>, history: Vec<ChatMessage>) -> Self {
        if let Some(id) = id {
            self.id = id;
        }
        self.history = history;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Switching models starts the conversation over.
    pub fn change_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if model != self.model {
            info!("Session {} model change from {} to {}", self.id, self.model, model);
            self.model = model;
            self.history.clear();
        }
    }

    pub fn record_turn(&mut self, user_input: &str, reply: &str) {
        self.history.push(ChatMessage::user(user_input));
        self.history.push(ChatMessage::assistant(reply));
    }

    pub fn into_history(self) -> Vec<ChatMessage> {
        self.history
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub reply: String,
    pub tools_used: Vec<String>,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Verify the provider is reachable and the configured model exists.
    async fn connect(&self) -> Result<(), ChatError>;

    async fn list_models(&self) -> Result<Vec<String>, ChatError>;

    fn preferred_default_model(&self) -> &str;

    fn configured_default_model(&self) -> Option<&str>;

    async fn default_model(&self) -> Result<String, ChatError> {
        if let Some(model) = self.configured_default_model() {
            return Ok(model.to_string());
        }
        let models = self.list_models().await?;
        resolve_default_model(None, self.preferred_default_model(), &models)
    }

    async fn process_chat_turn(
        &self,
        session: &mut ChatSession,
        user_input: &str,
    ) -> Result<ChatTurn, ChatError>;
}

/// Configured model wins, then the preferred model if offered, then the
/// first offered model.
pub fn resolve_default_model(
    configured: Option<&str>,
    preferred: &str,
    available: &[String],
) -> Result<String, ChatError> {
    if let Some(model) = configured {
        return Ok(model.to_string());
    }
    warn!("Default model has not been set via configuration");
    if available.iter().any(|model| model == preferred) {
        return Ok(preferred.to_string());
    }
    available.first().cloned().ok_or(ChatError::NoModels)
}

pub fn build_gateway(config: &ChatConfig, toolbox: Arc<Toolbox>) -> Arc<dyn ChatGateway> {
    info!("Initializing {:?} chat gateway", config.backend);
    match config.backend {
        ChatBackend::Completions => {
            Arc::new(completions::CompletionsGateway::new(config, toolbox))
        }
        ChatBackend::Rig => Arc::new(agent::RigGateway::new(config, toolbox)),
    }
}
