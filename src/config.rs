use crate::error::ConfigError;
use shuttle_runtime::SecretStore;
use tracing::{info, warn};

pub const ENV_DB_CONNECTION_STRING: &str = "DB_CONNECTION_STRING";
pub const ENV_CHAT_BACKEND: &str = "CHAT_BACKEND";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_DEFAULT_MODEL: &str = "DEFAULT_MODEL";
pub const ENV_GEOCODER_URL: &str = "GEOCODER_URL";
pub const ENV_FORECAST_URL: &str = "FORECAST_URL";
pub const ENV_ARCHIVE_URL: &str = "ARCHIVE_URL";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatBackend {
    /// OpenAI-compatible `/chat/completions` with local tool execution.
    Completions,
    /// rig-core agent without tool access.
    Rig,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub backend: ChatBackend,
    pub base_url: String,
    pub api_key: String,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub geocoder_url: String,
    pub forecast_url: String,
    pub archive_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
        }
    }
}

/// Process-wide settings, resolved once before the router is built.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// `None` when no API key is configured; chat routes then answer 503.
    pub chat: Option<ChatConfig>,
    pub weather: WeatherConfig,
}

impl Config {
    /// Shuttle secrets first, then the process environment.
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secrets.get(key).or_else(|| std::env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as absent.
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url =
            get(ENV_DB_CONNECTION_STRING).ok_or(ConfigError::Missing(ENV_DB_CONNECTION_STRING))?;

        let backend = match get(ENV_CHAT_BACKEND).as_deref() {
            None | Some("completions") => ChatBackend::Completions,
            Some("rig") => ChatBackend::Rig,
            Some(other) => {
                return Err(ConfigError::Unsupported {
                    name: ENV_CHAT_BACKEND,
                    value: other.to_string(),
                })
            }
        };

        let chat = match get(ENV_OPENAI_API_KEY) {
            Some(api_key) => {
                let base_url = get(ENV_OPENAI_BASE_URL).unwrap_or_else(|| {
                    warn!("OpenAI endpoint has not been set, using OpenAI directly");
                    DEFAULT_OPENAI_BASE_URL.to_string()
                });
                info!("Chat backend {:?} at {}", backend, base_url);
                Some(ChatConfig {
                    backend,
                    base_url: base_url.trim_end_matches('/').to_string(),
                    api_key,
                    default_model: get(ENV_DEFAULT_MODEL),
                })
            }
            None => {
                warn!("{} not set, chat endpoints are disabled", ENV_OPENAI_API_KEY);
                None
            }
        };

        let defaults = WeatherConfig::default();
        let weather = WeatherConfig {
            geocoder_url: get(ENV_GEOCODER_URL).unwrap_or(defaults.geocoder_url),
            forecast_url: get(ENV_FORECAST_URL).unwrap_or(defaults.forecast_url),
            archive_url: get(ENV_ARCHIVE_URL).unwrap_or(defaults.archive_url),
        };

        Ok(Self {
            database_url,
            chat,
            weather,
        })
    }
}
