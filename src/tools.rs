//! Tool implementations and the dispatcher shared by `/mcp` and `/chat`.

pub mod games;
pub mod rosters;
pub mod teams;
pub mod utils;
pub mod weather;

use crate::database::RowSource;
use crate::error::ToolError;
use crate::query::OutputRecord;
use chrono::Datelike;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use weather::WeatherClient;

/// First season of major league play.
pub const FIRST_SEASON: i32 = 1871;

/// Routes a named tool call to its implementation.
///
/// Holds no mutable state; every call acquires and releases its own
/// data-store connection through the [`RowSource`].
pub struct Toolbox {
    source: Arc<dyn RowSource>,
    weather: WeatherClient,
}

impl Toolbox {
    pub fn new(source: Arc<dyn RowSource>, weather: WeatherClient) -> Self {
        Self { source, weather }
    }

    pub fn source(&self) -> &dyn RowSource {
        self.source.as_ref()
    }

    pub async fn call(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        info!("Calling tool {}", name);
        let result = match name {
            "find_mlb_baseball_teams" => {
                records(teams::find_teams(self.source(), parse(arguments)?).await)
            }
            "search_mlb_rosters" => {
                records(rosters::search_rosters(self.source(), parse(arguments)?).await)
            }
            "search_mlb_games" => {
                records(games::search_games(self.source(), parse(arguments)?).await)
            }
            "get_schedule_and_record" => {
                records(games::schedule_and_record(self.source(), parse(arguments)?).await)
            }
            "get_current_temperature" => self
                .weather
                .current_temperature(parse(arguments)?)
                .await
                .map(Value::from),
            "get_temperature_on_past_date" => self
                .weather
                .temperature_on_date(parse(arguments)?)
                .await
                .map(Value::from),
            "get_current_date_and_time" => Ok(Value::from(utils::current_date_and_time())),
            _ => Err(ToolError::invalid(format!("Tool not found: {}", name))),
        };
        if let Err(e) = &result {
            error!("Tool {} failed: {}", name, e);
        }
        result
    }
}

fn records(result: Result<Vec<OutputRecord>, ToolError>) -> Result<Value, ToolError> {
    let records = result?;
    serde_json::to_value(records).map_err(|e| ToolError::UpstreamData(e.to_string()))
}

fn parse<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    // A missing argument object is the same as an empty one.
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(e.to_string()))
}

/// Accepts `2023` or `"2023"`; LLMs send either.
pub(crate) fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Int(i32),
        Text(String),
    }

    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Int(value)) => Ok(Some(value)),
        Some(Lenient::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid year: {}", text))),
    }
}

/// Seasons from the first major league season through next year.
pub(crate) fn season_in_range(year: i32) -> Result<i32, ToolError> {
    let last = chrono::Local::now().year() + 1;
    if (FIRST_SEASON..=last).contains(&year) {
        Ok(year)
    } else {
        error!("Illegal value for year: {}", year);
        Err(ToolError::invalid(format!(
            "Illegal value for year: {}. Seasons run from {} to {}",
            year, FIRST_SEASON, last
        )))
    }
}

/// Three-letter team code, upper-cased.
pub(crate) fn team_code(field: &str, code: Option<&str>) -> Result<String, ToolError> {
    match code.map(str::trim) {
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(code.to_ascii_uppercase())
        }
        other => {
            error!("Illegal value for {}: {:?}", field, other);
            Err(ToolError::invalid(format!(
                "Illegal value for {}: {:?}. Expected a three letter team code such as ATL",
                field, other
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeatherConfig;
    use crate::query::fixture::{row, text, FixtureSource};
    use crate::query::Cell;
    use serde_json::json;

    fn toolbox() -> Toolbox {
        let source = FixtureSource::new(vec![row(&[
            ("season_year", Cell::Int(2023)),
            ("team_code", text("ATL")),
            ("league", text("N")),
            ("team_location", text("Atlanta")),
            ("team_name", text("Braves")),
        ])]);
        Toolbox::new(Arc::new(source), WeatherClient::new(WeatherConfig::default()))
    }

    #[tokio::test]
    async fn dispatches_team_search() {
        let value = toolbox()
            .call("find_mlb_baseball_teams", &json!({"team_name": "braves", "year": "2023"}))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!([{
                "Season": 2023,
                "Team Code": "ATL",
                "League": "National League",
                "Location": "Atlanta",
                "Name": "Braves"
            }])
        );
    }

    #[tokio::test]
    async fn missing_arguments_are_invalid_input() {
        let err = toolbox()
            .call("find_mlb_baseball_teams", &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = toolbox()
            .call("search_mlb_games", &json!({"year": "twenty", "team_code_1": "ATL"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = toolbox().call("text_length", &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Tool not found"));
    }

    #[tokio::test]
    async fn date_and_time_needs_no_arguments() {
        let value = toolbox()
            .call("get_current_date_and_time", &json!({}))
            .await
            .unwrap();
        assert!(value.as_str().is_some());
    }

    #[test]
    fn team_codes_are_normalised() {
        assert_eq!(team_code("team_code", Some(" atl ")).unwrap(), "ATL");
        assert!(team_code("team_code", Some("AT")).is_err());
        assert!(team_code("team_code", Some("A'L")).is_err());
        assert!(team_code("team_code", None).is_err());
    }

    #[test]
    fn seasons_start_in_1871() {
        assert!(season_in_range(1870).is_err());
        assert_eq!(season_in_range(1871).unwrap(), 1871);
        assert_eq!(season_in_range(2023).unwrap(), 2023);
        assert!(season_in_range(9999).is_err());
    }
}
