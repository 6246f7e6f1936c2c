//! Current-conditions lookup against an OpenWeatherMap-compatible API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdapterError, Result};

pub const DEFAULT_WEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl WeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_WEATHER_API_BASE.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

// Upstream payload, reduced to the fields we read.

#[derive(Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    weather: Vec<Condition>,
    wind: Wind,
}

#[derive(Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct Wind {
    speed: f64,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl TryFrom<CurrentWeather> for Weather {
    type Error = AdapterError;

    fn try_from(raw: CurrentWeather) -> Result<Self> {
        let description = raw
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .ok_or_else(|| AdapterError::Malformed("no weather conditions".into()))?;
        Ok(Weather {
            city: raw.name,
            temperature: raw.main.temp,
            feels_like: raw.main.feels_like,
            description,
            humidity: raw.main.humidity,
            wind_speed: raw.wind.speed,
        })
    }
}

pub struct WeatherClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub async fn get_weather(&self, city: &str) -> Result<Weather> {
        let url = format!("{}/weather", self.config.base_url.trim_end_matches('/'));
        debug!(%city, "fetching weather");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(format!("weather request for {city}"))
                } else {
                    AdapterError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Failed to fetch weather data".to_string());
            return Err(AdapterError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let raw: CurrentWeather = serde_json::from_str(&body)
            .map_err(|e| AdapterError::Malformed(format!("Failed to parse weather data: {e}")))?;
        Weather::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::new(WeatherConfig {
            api_key: "test-key".into(),
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn maps_current_conditions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "London",
                "main": {"temp": 11.5, "feels_like": 10.2, "humidity": 81},
                "weather": [{"description": "light rain"}],
                "wind": {"speed": 4.1}
            })))
            .mount(&server)
            .await;

        let weather = client_for(&server).get_weather("London").await.unwrap();
        assert_eq!(weather.city, "London");
        assert_eq!(weather.temperature, 11.5);
        assert_eq!(weather.feels_like, 10.2);
        assert_eq!(weather.description, "light rain");
        assert_eq!(weather.humidity, 81.0);
        assert_eq!(weather.wind_speed, 4.1);

        let json = serde_json::to_value(&weather).unwrap();
        assert_eq!(json["feelsLike"], 10.2);
        assert_eq!(json["windSpeed"], 4.1);
    }

    #[tokio::test]
    async fn unknown_city_keeps_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_weather("Atlantis").await.unwrap_err();
        assert!(err.is_not_found());
        match err {
            AdapterError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "city not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_key_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_weather("Paris").await.unwrap_err();
        assert!(matches!(err, AdapterError::Status { status: 401, .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn garbage_payload_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_weather("Oslo").await.unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = WeatherClient::new(WeatherConfig {
            api_key: "k".into(),
            base_url: server.uri(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        let err = client.get_weather("Rome").await.unwrap_err();
        assert!(matches!(err, AdapterError::Timeout(_)));
    }
}
