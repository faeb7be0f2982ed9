use serde::{Deserialize, Serialize};

use crate::WeatherError;

/// Weather for one city as returned to SDK callers.
///
/// Every field is optional: the upstream API omits blocks it has no data for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub weather: Option<Conditions>,
    pub temperature: Option<Temperature>,
    /// Visibility in meters.
    pub visibility: Option<u32>,
    pub wind: Option<Wind>,
    /// Observation time, unix seconds.
    pub datetime: Option<i64>,
    pub sys: Option<SunTimes>,
    /// Shift from UTC in seconds.
    pub timezone: Option<i32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub main: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

/// Measurement units understood by OpenWeatherMap.
///
/// - `Metric`: Celsius, meters per second
/// - `Imperial`: Fahrenheit, miles per hour
/// - `Standard`: Kelvin, meters per second (API default)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }

    /// Suffix for temperatures in these units.
    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = WeatherError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(WeatherError::validation(format!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            ))),
        }
    }
}

/// How a session keeps its cache fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Fetch only when a caller asks and the cache has nothing fresh.
    #[serde(alias = "on_demand", alias = "ondemand")]
    OnDemand,
    /// Additionally refresh every cached city in the background.
    Polling,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::OnDemand => "on-demand",
            Mode::Polling => "polling",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Mode {
    type Error = WeatherError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "on-demand" | "on_demand" | "ondemand" => Ok(Mode::OnDemand),
            "polling" => Ok(Mode::Polling),
            "" => Err(WeatherError::validation("Mode must not be blank")),
            _ => Err(WeatherError::validation(format!(
                "Unknown mode '{value}'. Supported modes: on-demand, polling."
            ))),
        }
    }
}

/// Trim `value` and reject it if nothing is left.
pub(crate) fn normalize<'a>(value: &'a str, what: &str) -> Result<&'a str, WeatherError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::validation(format!("{what} must not be blank")));
    }
    Ok(trimmed)
}
