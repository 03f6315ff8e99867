use serde_json::{json, Value};
use thiserror::Error;

/// JSON-RPC code for invalid tool arguments.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC code for configuration faults on the server side.
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined code for a failing data store or third-party API.
pub const UPSTREAM_FAILURE: i64 = -32002;

/// Failure of a single tool invocation.
///
/// Validation and configuration failures are never caught inside the tools;
/// they travel to the MCP / chat boundary so the caller gets a clear reason.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing required argument, empty criteria, or a value out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The data store or a third-party API failed while executing.
    #[error("upstream data error: {0}")]
    UpstreamData(String),

    /// The upstream understood the request but refused one of its values.
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::InvalidInput(_) => INVALID_PARAMS,
            Self::UpstreamData(_) | Self::UpstreamRejected(_) => UPSTREAM_FAILURE,
            Self::Configuration(_) => INTERNAL_ERROR,
        }
    }

    /// JSON-RPC error object for this failure.
    pub fn to_rpc_error(&self) -> Value {
        json!({
            "code": self.rpc_code(),
            "message": self.to_string()
        })
    }
}

impl From<sqlx::Error> for ToolError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Configuration(_) => Self::Configuration(err.to_string()),
            // SQLSTATE class 22 is "data exception": the store refused a value.
            sqlx::Error::Database(db)
                if db.code().is_some_and(|code| code.starts_with("22")) =>
            {
                Self::UpstreamRejected(db.message().to_string())
            }
            _ => Self::UpstreamData(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.is_client_error() => Self::UpstreamRejected(err.to_string()),
            _ => Self::UpstreamData(err.to_string()),
        }
    }
}

/// A required setting is absent or blank at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is a required setting but was not provided")]
    Missing(&'static str),

    #[error("{name} has an unsupported value: {value}")]
    Unsupported { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend is not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned an unexpected payload: {0}")]
    Protocol(String),

    #[error("no models are available from the LLM provider")]
    NoModels,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("LLM completion failed: {0}")]
    Completion(String),
}
