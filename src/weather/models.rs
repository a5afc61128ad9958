use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::prediction::models::Climate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Thunderstorm,
    Mist,
    Fog,
}

impl WeatherCondition {
    /// Map OpenWeatherMap's `weather[].main` group
    pub fn from_provider(main: &str) -> Self {
        match main {
            "Clear" => Self::Clear,
            "Clouds" => Self::Clouds,
            "Rain" => Self::Rain,
            "Drizzle" => Self::Drizzle,
            "Thunderstorm" => Self::Thunderstorm,
            "Mist" | "Haze" | "Smoke" | "Dust" | "Sand" => Self::Mist,
            "Fog" => Self::Fog,
            _ => Self::Clouds,
        }
    }
}

/// Where a weather value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DataSource {
    Provider,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSnapshot {
    /// °C
    pub temperature: f64,
    /// %, 0–100
    pub humidity: f64,
    /// mm over the last hour
    pub rainfall: f64,
    /// kph
    pub wind_speed: f64,
    pub condition: WeatherCondition,
    /// Provider icon code, e.g. "10d"
    pub icon: String,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub source: DataSource,
}

impl WeatherSnapshot {
    pub fn climate(&self) -> Climate {
        Climate {
            temperature: self.temperature,
            humidity: self.humidity,
            rainfall: self.rainfall,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.source == DataSource::Simulated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyForecast {
    /// Local calendar day
    pub date: NaiveDate,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    /// mm
    pub rainfall: f64,
    pub condition: WeatherCondition,
    pub icon: String,
    /// kph
    pub wind_speed: f64,
}

/// Seven-day outlook as one shared, refreshed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherOutlook {
    pub generated_at: DateTime<Utc>,
    pub source: DataSource,
    pub days: Vec<DailyForecast>,
}

impl WeatherOutlook {
    pub fn is_simulated(&self) -> bool {
        self.source == DataSource::Simulated
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn mps_to_kph(speed: f64) -> f64 {
    speed * 3.6
}

// ============================================================================
// OpenWeatherMap 2.5 payloads (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OwmCurrentResponse {
    pub main: OwmMain,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    #[serde(default)]
    pub wind: Option<OwmWind>,
    #[serde(default)]
    pub rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
pub struct OwmForecastResponse {
    #[serde(default)]
    pub list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
pub struct OwmForecastItem {
    pub dt: i64,
    pub main: OwmMain,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    #[serde(default)]
    pub wind: Option<OwmWind>,
    #[serde(default)]
    pub rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
    pub humidity: f64,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub main: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwmWind {
    /// m/s
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmRain {
    #[serde(rename = "1h", default)]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    pub three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmErrorBody {
    pub message: String,
}
