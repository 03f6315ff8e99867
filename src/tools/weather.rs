use crate::config::WeatherConfig;
use crate::error::ToolError;
use chrono::{Duration, Local, NaiveDate};
use moka::future::Cache;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "mlb-agents";
const MAX_RETRIES: u32 = 5;
const BACKOFF_BASE_MS: u64 = 200;
const CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);
const CACHE_CAPACITY: u64 = 1_000;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m-%d-%Y", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

#[derive(Debug, Default, Deserialize)]
pub struct CurrentTemperature {
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PastTemperature {
    pub location: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Geocoding plus Open-Meteo lookups, with retry on transient failures.
///
/// Successful responses are cached for an hour per URL and query string;
/// clones share the cache.
#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    config: WeatherConfig,
    responses: Cache<String, Value>,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            responses: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Current temperature in °F.
    pub async fn current_temperature(&self, args: CurrentTemperature) -> Result<f64, ToolError> {
        info!("Getting current temperature. Location={:?}", args.location);
        let location = required("Location", args.location.as_deref())?;
        let (latitude, longitude) = self.geocode(location).await?;

        let response = self
            .get_json(
                &self.config.forecast_url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("current", "temperature_2m".to_string()),
                    ("temperature_unit", "fahrenheit".to_string()),
                    ("wind_speed_unit", "mph".to_string()),
                    ("precipitation_unit", "inch".to_string()),
                ],
            )
            .await?;
        let temperature = response["current"]["temperature_2m"]
            .as_f64()
            .ok_or_else(|| ToolError::UpstreamData("forecast response has no temperature".into()))?;

        info!("Temp at {} is currently {}", location, temperature);
        Ok(temperature)
    }

    /// Daily maximum temperature in °F on a past date.
    pub async fn temperature_on_date(&self, args: PastTemperature) -> Result<f64, ToolError> {
        info!(
            "Getting temperature. Location={:?} Date={:?}",
            args.location, args.date
        );
        let location = required("Location", args.location.as_deref())?;
        let date = parse_date(required("Date", args.date.as_deref())?)?;
        let (latitude, longitude) = self.geocode(location).await?;

        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .get_json(
                &self.config.archive_url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("start_date", day.clone()),
                    ("end_date", day),
                    ("daily", "temperature_2m_max".to_string()),
                    ("temperature_unit", "fahrenheit".to_string()),
                    ("wind_speed_unit", "mph".to_string()),
                    ("precipitation_unit", "inch".to_string()),
                ],
            )
            .await?;
        let temperature = response["daily"]["temperature_2m_max"][0]
            .as_f64()
            .ok_or_else(|| {
                ToolError::UpstreamData(format!("no archived temperature for {}", date))
            })?;

        info!("Temp at {} on {} is {}", location, date, temperature);
        Ok(temperature)
    }

    async fn geocode(&self, location: &str) -> Result<(f64, f64), ToolError> {
        let response = self
            .get_json(
                &self.config.geocoder_url,
                &[
                    ("q", location.to_string()),
                    ("format", "json".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        let places: Vec<Place> = serde_json::from_value(response)
            .map_err(|e| ToolError::UpstreamData(format!("unexpected geocoder payload: {}", e)))?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| {
                ToolError::UpstreamRejected(format!("location not found: {}", location))
            })?;

        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| ToolError::UpstreamData(format!("bad coordinate: {}", value)))
        };
        let position = (parse(&place.lat)?, parse(&place.lon)?);
        info!(
            "Location {} has a latitude, longitude position of {}, {}",
            location, position.0, position.1
        );
        Ok(position)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let key = cache_key(url, query);
        if let Some(cached) = self.responses.get(&key).await {
            debug!("Cache hit for {}", key);
            return Ok(cached);
        }
        let response = self.fetch_json(url, query).await?;
        self.responses.insert(key, response.clone()).await;
        Ok(response)
    }

    async fn fetch_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let mut attempt = 0;
        loop {
            debug!("GET {} {:?} (attempt {})", url, query, attempt + 1);
            let result = self
                .http
                .get(url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(query)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(response) => return Ok(response.json::<Value>().await?),
                Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                    let delay = backoff(attempt);
                    warn!("Request to {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn cache_key(url: &str, query: &[(&str, String)]) -> String {
    let params: Vec<String> = query
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    format!("{}?{}", url, params.join("&"))
}

fn is_transient(err: &reqwest::Error) -> bool {
    match err.status() {
        Some(status) => status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        None => err.is_connect() || err.is_timeout() || err.is_request(),
    }
}

fn backoff(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ToolError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ToolError::invalid(format!("{} is required but is empty!", field)))
}

pub fn parse_date(text: &str) -> Result<NaiveDate, ToolError> {
    let text = text.trim();
    let today = Local::now().date_naive();
    match text.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| ToolError::invalid(format!("Unrecognised date: {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves canned geocoder and forecast payloads, counting requests.
    async fn weather_server(hits: Arc<AtomicUsize>) -> WeatherConfig {
        let geocoder_hits = hits.clone();
        let forecast_hits = hits;
        let app = Router::new()
            .route(
                "/search",
                get(move || {
                    geocoder_hits.fetch_add(1, Ordering::SeqCst);
                    async { Json(json!([{ "lat": "33.749", "lon": "-84.388" }])) }
                }),
            )
            .route(
                "/forecast",
                get(move || {
                    forecast_hits.fetch_add(1, Ordering::SeqCst);
                    async { Json(json!({ "current": { "temperature_2m": 71.5 } })) }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        WeatherConfig {
            geocoder_url: format!("http://{}/search", address),
            forecast_url: format!("http://{}/forecast", address),
            ..WeatherConfig::default()
        }
    }

    #[test]
    fn dates_in_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        for text in [
            "2025-02-01",
            "02-01-2025",
            "2-1-2025",
            "02/01/2025",
            "February 1, 2025",
            "Feb 1, 2025",
        ] {
            assert_eq!(parse_date(text).unwrap(), expected, "{}", text);
        }
        assert!(matches!(
            parse_date("the day after opening day"),
            Err(ToolError::InvalidInput(_))
        ));
    }

    #[test]
    fn relative_dates() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date("Today").unwrap(), today);
        assert_eq!(parse_date("yesterday").unwrap(), today - Duration::days(1));
    }

    #[tokio::test]
    async fn repeated_lookups_are_served_from_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let client = WeatherClient::new(weather_server(hits.clone()).await);
        let args = || CurrentTemperature {
            location: Some("Atlanta".into()),
        };

        assert_eq!(client.current_temperature(args()).await.unwrap(), 71.5);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let again = client.clone().current_temperature(args()).await.unwrap();
        assert_eq!(again, 71.5);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        client
            .current_temperature(CurrentTemperature {
                location: Some("Boston".into()),
            })
            .await
            .unwrap();
        // New geocoder query; the canned coordinates repeat, so the forecast is cached.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cache_key_covers_url_and_query() {
        let query = [("q", "Atlanta".to_string()), ("limit", "1".to_string())];
        assert_eq!(
            cache_key("http://geo/search", &query),
            "http://geo/search?q=Atlanta&limit=1"
        );
    }

    #[test]
    fn backoff_doubles_from_200ms() {
        assert_eq!(backoff(0).as_millis(), 200);
        assert_eq!(backoff(1).as_millis(), 400);
        assert_eq!(backoff(4).as_millis(), 3200);
    }

    #[tokio::test]
    async fn blank_location_fails_before_any_request() {
        let client = WeatherClient::new(WeatherConfig {
            geocoder_url: "http://127.0.0.1:9/unreachable".into(),
            ..WeatherConfig::default()
        });
        let err = client
            .current_temperature(CurrentTemperature {
                location: Some("  ".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let err = client
            .temperature_on_date(PastTemperature {
                location: Some("Atlanta".into()),
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
