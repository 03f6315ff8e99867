use super::{ChatGateway, ChatSession, ChatTurn, Role, AGENT_SYSTEM_PROMPT};
use crate::config::ChatConfig;
use crate::error::{ChatError, ToolError};
use crate::registries::{self, TOOL_REGISTRY};
use crate::tools::Toolbox;
use async_trait::async_trait;
use rig::completion::{Prompt, ToolDefinition};
use rig::message::Message;
use rig::providers::openai;
use rig::tool::Tool;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

pub const PREFERRED_DEFAULT_MODEL: &str = "gpt-4";

const TEMPERATURE: f64 = 0.3;
const MAX_TURNS: usize = 10;

/// rig-core agent over an OpenAI-compatible endpoint, with every registry
/// tool attached and dispatched through the shared [`Toolbox`].
pub struct RigGateway {
    client: openai::Client,
    toolbox: Arc<Toolbox>,
    default_model: Option<String>,
}

impl RigGateway {
    pub fn new(config: &ChatConfig, toolbox: Arc<Toolbox>) -> Self {
        Self {
            client: openai::Client::from_url(&config.api_key, &config.base_url),
            toolbox,
            default_model: config.default_model.clone(),
        }
    }
}

#[async_trait]
impl ChatGateway for RigGateway {
    async fn connect(&self) -> Result<(), ChatError> {
        info!("rig agent ready with model {}", self.default_model().await?);
        Ok(())
    }

    /// rig has no model listing; the configured model is the only choice.
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let model = self
            .default_model
            .clone()
            .unwrap_or_else(|| PREFERRED_DEFAULT_MODEL.to_string());
        Ok(vec![model])
    }

    fn preferred_default_model(&self) -> &str {
        PREFERRED_DEFAULT_MODEL
    }

    fn configured_default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn process_chat_turn(
        &self,
        session: &mut ChatSession,
        user_input: &str,
    ) -> Result<ChatTurn, ChatError> {
        info!("Session {} question for {}: {}", session.id, session.model(), user_input);
        let used = ToolsUsed::default();
        let agent = TOOL_REGISTRY
            .iter()
            .fold(self.client.agent(session.model()), |builder, tool| {
                builder.tool(ToolboxTool {
                    tool,
                    toolbox: self.toolbox.clone(),
                    used: used.clone(),
                })
            })
            .preamble(AGENT_SYSTEM_PROMPT)
            .temperature(TEMPERATURE)
            .build();

        let mut history = history(session);
        let reply = agent
            .prompt(user_input)
            .with_history(&mut history)
            .multi_turn(MAX_TURNS)
            .await
            .map_err(|e| ChatError::Completion(e.to_string()))?;

        session.record_turn(user_input, &reply);
        Ok(ChatTurn {
            reply,
            tools_used: used.names(),
        })
    }
}

/// Names of the tools called during one turn, in first-use order.
#[derive(Clone, Default)]
struct ToolsUsed(Arc<Mutex<Vec<String>>>);

impl ToolsUsed {
    fn record(&self, name: &str) {
        if let Ok(mut names) = self.0.lock() {
            if !names.iter().any(|used| used == name) {
                names.push(name.to_string());
            }
        }
    }

    fn names(&self) -> Vec<String> {
        self.0.lock().map(|names| names.clone()).unwrap_or_default()
    }
}

/// One registry tool exposed to rig. Failures go back to the model as text.
struct ToolboxTool {
    tool: &'static registries::Tool,
    toolbox: Arc<Toolbox>,
    used: ToolsUsed,
}

impl Tool for ToolboxTool {
    const NAME: &'static str = "mlb_tool";

    type Error = ToolError;
    type Args = Value;
    type Output = Value;

    fn name(&self) -> String {
        self.tool.name.to_string()
    }

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: self.tool.name.to_string(),
            description: format!("{} {}", self.tool.title, self.tool.description),
            parameters: self.tool.input_schema.clone(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let name = self.tool.name;
        self.used.record(name);
        // The toolbox future is not Sync; running it as a task keeps this one Sync.
        let toolbox = self.toolbox.clone();
        let outcome = tokio::spawn(async move { toolbox.call(name, &args).await }).await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => Err(ToolError::UpstreamData(e.to_string())),
        };
        Ok(result.unwrap_or_else(|e| {
            error!("Tool {} returned an error to the model: {}", name, e);
            Value::String(format!("Error: {}", e))
        }))
    }
}

fn history(session: &ChatSession) -> Vec<Message> {
    session
        .history()
        .iter()
        .map(|message| match message.role {
            Role::User => Message::user(message.content.clone()),
            Role::Assistant => Message::assistant(message.content.clone()),
        })
        .collect()
}
