use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    Units, WeatherError,
    model::{Conditions, SunTimes, Temperature, WeatherRecord, Wind},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenWeatherMap "current weather" client.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new() -> Result<Self, WeatherError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Point the client at another endpoint, e.g. a mock server.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        if timeout.is_zero() {
            return Err(WeatherError::validation("HTTP timeout must be greater than zero"));
        }

        let http = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    weather: Vec<OwWeather>,
    main: Option<OwMain>,
    visibility: Option<u32>,
    wind: Option<OwWind>,
    dt: Option<i64>,
    sys: Option<OwSys>,
    timezone: Option<i32>,
    name: Option<String>,
}

impl From<OwCurrentResponse> for WeatherRecord {
    fn from(parsed: OwCurrentResponse) -> Self {
        WeatherRecord {
            weather: parsed.weather.into_iter().next().map(|w| Conditions {
                main: w.main,
                description: w.description,
            }),
            temperature: parsed.main.map(|m| Temperature {
                temp: m.temp,
                feels_like: m.feels_like,
            }),
            visibility: parsed.visibility,
            wind: parsed.wind.map(|w| Wind { speed: w.speed }),
            datetime: parsed.dt,
            sys: parsed.sys.map(|s| SunTimes {
                sunrise: s.sunrise,
                sunset: s.sunset,
            }),
            timezone: parsed.timezone,
            name: parsed.name,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(
        &self,
        location: &str,
        credential: &str,
        units: Units,
    ) -> Result<WeatherRecord, WeatherError> {
        debug!(city = %location, units = %units, "Requesting current weather from OpenWeather");

        let res = self
            .http
            .get(&self.base_url)
            .query(&[("q", location), ("appid", credential), ("units", units.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::transport(format!("Failed to reach OpenWeather: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| WeatherError::transport(format!("Failed to read OpenWeather response body: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status, location, &body));
        }

        if body.trim().is_empty() {
            return Err(WeatherError::parse("OpenWeather returned an empty body"));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;
        Ok(parsed.into())
    }
}

fn status_error(status: StatusCode, location: &str, body: &str) -> WeatherError {
    match status {
        StatusCode::NOT_FOUND => WeatherError::CityNotFound(location.to_string()),
        StatusCode::UNAUTHORIZED => WeatherError::Auth,
        StatusCode::TOO_MANY_REQUESTS => WeatherError::RateLimited,
        other => WeatherError::api(other.as_u16(), truncate_body(body)),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let head: String = body.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}
