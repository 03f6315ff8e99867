use crate::error::{INTERNAL_ERROR, INVALID_PARAMS};
use crate::query::{hand_description, league_name};
use crate::registries::{
    find_tool, prompt_text, PROMPT_REGISTRY, RESOURCE_REGISTRY, TOOL_REGISTRY,
};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

const METHOD_NOT_FOUND: i64 = -32601;
const RESOURCE_NOT_FOUND: i64 = -32001;
const PROMPT_NOT_FOUND: i64 = -32003;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    pub id: Option<Value>, // Optional for notifications
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: Option<ListChanged>,
    pub resources: Option<ResourcesCapability>,
    pub prompts: Option<ListChanged>,
}

#[derive(Debug, Serialize)]
pub struct ListChanged {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Serialize)]
pub struct ResourcesCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
    pub subscribe: bool,
}

#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

fn rpc_error(code: i64, message: impl Into<String>) -> Value {
    json!({ "code": code, "message": message.into() })
}

pub async fn mcp_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    info!("MCP request: method={}, id={:?}", req.method, req.id);

    // Notifications get no response body
    if req.id.is_none() {
        return handle_notification(req).await;
    }

    let outcome = match req.method.as_str() {
        "initialize" => Ok(initialize()),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools: Vec<Value> = TOOL_REGISTRY.iter().map(|tool| tool.to_mcp()).collect();
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => handle_tool_call(&state, req.params).await,
        "resources/list" => {
            let resources: Vec<Value> = RESOURCE_REGISTRY
                .iter()
                .map(|resource| {
                    json!({
                        "uri": resource.uri,
                        "name": resource.name,
                        "description": resource.description,
                        "mimeType": resource.mime_type
                    })
                })
                .collect();
            Ok(json!({ "resources": resources }))
        }
        "resources/read" => required_str(&req.params, "uri").and_then(handle_resource_read),
        "prompts/list" => {
            let prompts: Vec<Value> = PROMPT_REGISTRY
                .iter()
                .map(|prompt| {
                    let arguments: Vec<Value> = prompt
                        .arguments
                        .iter()
                        .map(|arg| {
                            json!({
                                "name": arg.name,
                                "description": arg.description,
                                "required": arg.required
                            })
                        })
                        .collect();
                    json!({
                        "name": prompt.name,
                        "description": prompt.description,
                        "arguments": arguments
                    })
                })
                .collect();
            Ok(json!({ "prompts": prompts }))
        }
        "prompts/get" => required_str(&req.params, "name").and_then(|name| {
            handle_prompt_get(name, req.params.as_ref().and_then(|p| p.get("arguments")))
        }),
        _ => {
            error!("Unknown method: {}", req.method);
            Err(rpc_error(METHOD_NOT_FOUND, "Method not found"))
        }
    };

    let (result, error) = match outcome {
        Ok(result) => (Some(result), None),
        Err(error) => (None, Some(error)),
    };
    let response = JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result,
        error,
        id: req.id,
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn initialize() -> Value {
    let init_result = InitializeResult {
        protocol_version: "2024-11-05".to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ListChanged { list_changed: false }),
            resources: Some(ResourcesCapability {
                list_changed: false,
                subscribe: false,
            }),
            prompts: Some(ListChanged { list_changed: false }),
        },
        server_info: ServerInfo {
            name: "MLB Baseball Agents".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };
    json!(init_result)
}

async fn handle_notification(req: JsonRpcRequest) -> Response {
    match req.method.as_str() {
        "notifications/initialized" => info!("Client initialized successfully"),
        "exit" => info!("Client exiting"),
        _ => info!("Unknown notification: {}", req.method),
    }
    StatusCode::NO_CONTENT.into_response()
}

fn required_str<'a>(params: &'a Option<Value>, field: &str) -> Result<&'a str, Value> {
    let params = params
        .as_ref()
        .ok_or_else(|| rpc_error(INVALID_PARAMS, "Missing params"))?;
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(INVALID_PARAMS, format!("Invalid params: missing '{}'", field)))
}

async fn handle_tool_call(state: &AppState, params: Option<Value>) -> Result<Value, Value> {
    let tool_name = required_str(&params, "name")?;
    let tool = find_tool(tool_name)
        .ok_or_else(|| rpc_error(INVALID_PARAMS, format!("Tool not found: {}", tool_name)))?;

    let arguments = params
        .as_ref()
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let result = state
        .tools
        .call(tool.name, &arguments)
        .await
        .map_err(|e| e.to_rpc_error())?;
    let text = serde_json::to_string_pretty(&result)
        .map_err(|e| rpc_error(INTERNAL_ERROR, e.to_string()))?;

    Ok(json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "isError": false
    }))
}

fn handle_resource_read(uri: &str) -> Result<Value, Value> {
    let resource = RESOURCE_REGISTRY
        .iter()
        .find(|r| r.uri == uri)
        .ok_or_else(|| rpc_error(RESOURCE_NOT_FOUND, "Resource not found"))?;

    let lookup: serde_json::Map<String, Value> = match uri {
        "lookup://hand-codes" => ["L", "R", "B"]
            .iter()
            .map(|&code| (code.to_string(), Value::from(hand_description(Some(code)))))
            .collect(),
        "lookup://league-codes" => ["A", "N"]
            .iter()
            .map(|&code| (code.to_string(), Value::from(league_name(code))))
            .collect(),
        _ => return Err(rpc_error(RESOURCE_NOT_FOUND, "Resource handler not implemented")),
    };

    let text = serde_json::to_string_pretty(&lookup)
        .map_err(|e| rpc_error(INTERNAL_ERROR, e.to_string()))?;
    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": resource.mime_type,
            "text": text
        }]
    }))
}

fn handle_prompt_get(name: &str, arguments: Option<&Value>) -> Result<Value, Value> {
    let prompt = PROMPT_REGISTRY
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| rpc_error(PROMPT_NOT_FOUND, "Prompt not found"))?;

    let question = arguments
        .and_then(|args| args.get("question"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|question| !question.is_empty());

    Ok(json!({
        "description": prompt.description,
        "messages": [{
            "role": "user",
            "content": {
                "type": "text",
                "text": prompt_text(question)
            }
        }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixture_toolbox;

    fn state() -> AppState {
        AppState {
            tools: fixture_toolbox(),
            chat: None,
        }
    }

    async fn call(body: Value) -> Value {
        let req: JsonRpcRequest = serde_json::from_value(body).unwrap();
        let response = mcp_handler(State(state()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn initialize_names_the_server() {
        let response = call(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).await;
        assert_eq!(response["result"]["serverInfo"]["name"], "MLB Baseball Agents");
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn lists_every_registered_tool() {
        let response = call(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), TOOL_REGISTRY.len());
        assert!(tools.iter().any(|t| t["name"] == "get_schedule_and_record"));
    }

    #[tokio::test]
    async fn tool_call_returns_records_as_text() {
        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "find_mlb_baseball_teams", "arguments": {"city": "Atlanta"}}
        }))
        .await;
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let records: Value = serde_json::from_str(text).unwrap();
        assert_eq!(records[0]["Name"], "Braves");
        assert_eq!(records[0]["League"], "National League");
    }

    #[tokio::test]
    async fn tool_failures_become_rpc_errors() {
        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "find_mlb_baseball_teams", "arguments": {}}
        }))
        .await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert!(response["result"].is_null());

        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "user_stats"}
        }))
        .await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn reads_lookup_resources() {
        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "resources/read",
            "params": {"uri": "lookup://league-codes"}
        }))
        .await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        let lookup: Value = serde_json::from_str(text).unwrap();
        assert_eq!(lookup, json!({"A": "American League", "N": "National League"}));

        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "resources/read",
            "params": {}
        }))
        .await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn prompt_includes_the_question() {
        let response = call(json!({
            "jsonrpc": "2.0",
            "id": 8,
            "method": "prompts/get",
            "params": {"name": "baseball_assistant", "arguments": {"question": "Who won in 1995?"}}
        }))
        .await;
        let text = response["result"]["messages"][0]["content"]["text"]
            .as_str()
            .unwrap();
        assert!(text.ends_with("Question:\nWho won in 1995?"));
    }

    #[tokio::test]
    async fn notifications_get_no_content() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        let response = mcp_handler(State(state()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let response = call(json!({"jsonrpc": "2.0", "id": 9, "method": "sampling/create"})).await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }
}
