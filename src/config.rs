use std::time::Duration;

use chrono_tz::Tz;
use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the dengue prediction backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// OpenWeatherMap API key. Without it the simulated generator is used.
    #[serde(default)]
    pub openweathermap_api_key: Option<String>,

    /// OpenWeatherMap 2.5 API root
    #[serde(default = "default_openweathermap_url")]
    pub openweathermap_url: String,

    /// Daily call allowance for the weather provider (free plan is 1000)
    #[serde(default = "default_weather_daily_limit")]
    pub weather_daily_limit: u32,

    /// Overpass interpreter used for barangay boundaries
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Barangay enumeration. Empty means the built-in Naga City set.
    #[serde(default)]
    pub barangays: Vec<BarangayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    /// Display label for weather snapshots
    #[serde(default = "default_location_name")]
    pub name: String,

    /// City name as known to OpenStreetMap, used to scope the boundary query
    #[serde(default = "default_area_name")]
    pub area: String,

    #[serde(default = "default_lat")]
    pub lat: f64,

    #[serde(default = "default_lon")]
    pub lon: f64,

    /// IANA timezone used for hour-of-day, season and calendar-day logic
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: default_location_name(),
            area: default_area_name(),
            lat: default_lat(),
            lon: default_lon(),
            timezone: default_timezone(),
        }
    }
}

impl LocationConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Message(format!("invalid timezone: {}", self.timezone)))
    }
}

/// Refresh intervals, in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_weather_secs")]
    pub weather_secs: u64,

    #[serde(default = "default_predictions_secs")]
    pub predictions_secs: u64,

    /// The 7-day outlook changes slowly and costs a provider call per refresh
    #[serde(default = "default_forecast_secs")]
    pub forecast_secs: u64,

    #[serde(default = "default_boundaries_secs")]
    pub boundaries_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            weather_secs: default_weather_secs(),
            predictions_secs: default_predictions_secs(),
            forecast_secs: default_forecast_secs(),
            boundaries_secs: default_boundaries_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn weather_interval(&self) -> Duration {
        Duration::from_secs(self.weather_secs)
    }

    pub fn predictions_interval(&self) -> Duration {
        Duration::from_secs(self.predictions_secs)
    }

    pub fn forecast_interval(&self) -> Duration {
        Duration::from_secs(self.forecast_secs)
    }

    pub fn boundaries_interval(&self) -> Duration {
        Duration::from_secs(self.boundaries_secs)
    }
}

/// Upper bounds for external calls, in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Whole prediction batch across all barangays
    #[serde(default = "default_batch_secs")]
    pub batch_secs: u64,

    /// Any single weather, prediction or boundary call
    #[serde(default = "default_call_secs")]
    pub call_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            batch_secs: default_batch_secs(),
            call_secs: default_call_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BarangayConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_openweathermap_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_weather_daily_limit() -> u32 {
    1000
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_location_name() -> String {
    "Naga City, Camarines Sur".to_string()
}

fn default_area_name() -> String {
    "Naga City".to_string()
}

fn default_lat() -> f64 {
    13.6192
}

fn default_lon() -> f64 {
    123.1814
}

fn default_timezone() -> String {
    "Asia/Manila".to_string()
}

fn default_weather_secs() -> u64 {
    15 * 60
}

fn default_predictions_secs() -> u64 {
    5 * 60
}

fn default_forecast_secs() -> u64 {
    3 * 60 * 60
}

fn default_boundaries_secs() -> u64 {
    24 * 60 * 60
}

fn default_batch_secs() -> u64 {
    10
}

fn default_call_secs() -> u64 {
    5
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port())?
            .set_default("backend_url", default_backend_url())?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config.local").required(false))
            // MOSKITA_BACKEND_URL, MOSKITA_REFRESH__WEATHER_SECS, ...
            .add_source(
                Environment::with_prefix("MOSKITA")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(Case::Snake)
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.location.tz()?;

        if self.refresh.weather_secs == 0
            || self.refresh.predictions_secs == 0
            || self.refresh.forecast_secs == 0
            || self.refresh.boundaries_secs == 0
        {
            return Err(ConfigError::Message(
                "refresh intervals must be greater than zero".to_string(),
            ));
        }

        if self.timeouts.call_secs == 0 || self.timeouts.batch_secs == 0 {
            return Err(ConfigError::Message(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// API key with blank values treated as absent
    pub fn weather_api_key(&self) -> Option<&str> {
        self.openweathermap_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
