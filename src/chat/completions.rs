use super::{ChatGateway, ChatSession, ChatTurn, Role, AGENT_SYSTEM_PROMPT};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::registries::TOOL_REGISTRY;
use crate::tools::Toolbox;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const PREFERRED_DEFAULT_MODEL: &str = "gpt-4";
pub const MAX_INFER_ITERS: usize = 10;

const TEMPERATURE: f64 = 0.1;
const TOP_P: f64 = 0.1;
const MAX_TOKENS: u32 = 1000;

/// OpenAI-compatible `/chat/completions` gateway that executes tool calls
/// locally through the [`Toolbox`].
pub struct CompletionsGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: Option<String>,
    toolbox: Arc<Toolbox>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl CompletionsGateway {
    pub fn new(config: &ChatConfig, toolbox: Arc<Toolbox>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
            toolbox,
        }
    }

    async fn complete(&self, model: &str, messages: &[Value]) -> Result<Value, ChatError> {
        let tools: Vec<Value> = TOOL_REGISTRY.iter().map(|tool| tool.to_function()).collect();
        let body = json!({
            "model": model,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto",
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
            "max_tokens": MAX_TOKENS,
        });

        let response: Value = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["choices"][0]["message"]
            .as_object()
            .map(|message| Value::Object(message.clone()))
            .ok_or_else(|| ChatError::Protocol("completion has no message".into()))
    }

    async fn run_tool_call(&self, call: &ToolCall) -> Value {
        let content = match self.toolbox.call(&call.name, &call.arguments).await {
            Ok(result) => result.to_string(),
            Err(e) => {
                error!("Tool {} returned an error to the model: {}", call.name, e);
                format!("Error: {}", e)
            }
        };
        json!({
            "role": "tool",
            "tool_call_id": call.id,
            "content": content,
        })
    }
}

#[async_trait]
impl ChatGateway for CompletionsGateway {
    async fn connect(&self) -> Result<(), ChatError> {
        let models = self.list_models().await?;
        info!("Connected to {} with {} models", self.base_url, models.len());
        if let Some(model) = &self.default_model {
            if !models.contains(model) {
                return Err(ChatError::ModelNotFound(model.clone()));
            }
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let response: Value = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        model_ids(&response)
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
        let mut messages = request_messages(session, user_input);
        let mut tools_used = Vec::new();

        for iteration in 0..MAX_INFER_ITERS {
            let message = self.complete(session.model(), &messages).await?;
            let calls = tool_calls(&message)?;
            if calls.is_empty() {
                let reply = message["content"].as_str().unwrap_or_default().to_string();
                session.record_turn(user_input, &reply);
                return Ok(ChatTurn { reply, tools_used });
            }

            debug!("Iteration {} requested {} tool calls", iteration + 1, calls.len());
            messages.push(message);
            for call in &calls {
                messages.push(self.run_tool_call(call).await);
                if !tools_used.contains(&call.name) {
                    tools_used.push(call.name.clone());
                }
            }
        }

        warn!("Session {} hit the inference limit", session.id);
        Err(ChatError::Completion(format!(
            "no answer after {} inference iterations",
            MAX_INFER_ITERS
        )))
    }
}

pub(crate) fn request_messages(session: &ChatSession, user_input: &str) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": AGENT_SYSTEM_PROMPT})];
    messages.extend(session.history().iter().map(|message| {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        json!({"role": role, "content": message.content})
    }));
    messages.push(json!({"role": "user", "content": user_input}));
    messages
}

/// Tool calls requested by an assistant message. Arguments arrive as a JSON
/// string; an empty string means no arguments.
pub(crate) fn tool_calls(message: &Value) -> Result<Vec<ToolCall>, ChatError> {
    let Some(calls) = message["tool_calls"].as_array() else {
        return Ok(Vec::new());
    };
    calls
        .iter()
        .map(|call| {
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| ChatError::Protocol("tool call without a name".into()))?;
            let raw = call["function"]["arguments"].as_str().unwrap_or_default();
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw).map_err(|e| {
                    ChatError::Protocol(format!("bad arguments for {}: {}", name, e))
                })?
            };
            Ok(ToolCall {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: name.to_string(),
                arguments,
            })
        })
        .collect()
}

fn model_ids(response: &Value) -> Result<Vec<String>, ChatError> {
    let data = response["data"]
        .as_array()
        .ok_or_else(|| ChatError::Protocol("model listing has no data".into()))?;
    let mut ids: Vec<String> = data
        .iter()
        .filter_map(|model| model["id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}
