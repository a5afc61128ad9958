use std::collections::HashSet;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use thiserror::Error;

use super::models::*;
use super::simulated::{simulate_current, simulate_forecast};
use crate::api_budget::ProviderBudget;
use crate::fallback::{record_fallback, settle, with_deadline, DeadlineElapsed, FallbackKind};

const FORECAST_DAYS: usize = 7;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Failed to fetch weather data: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Weather provider returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid weather response: {0}")]
    InvalidResponse(String),

    #[error("Daily weather provider allowance exhausted")]
    BudgetExhausted,

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),
}

/// Everything the weather source needs besides the HTTP client
pub struct WeatherSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
    pub tz: Tz,
    pub timeout: Duration,
    pub daily_limit: u32,
}

/// Current conditions and the 7-day outlook for one fixed coordinate.
///
/// Never fails: without a key, or on any provider problem, the simulated
/// generator answers instead.
pub struct WeatherService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    location: String,
    lat: f64,
    lon: f64,
    tz: Tz,
    timeout: Duration,
    budget: ProviderBudget,
}

impl WeatherService {
    pub fn new(client: Client, settings: WeatherSettings) -> Self {
        Self {
            client,
            api_key: settings.api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            location: settings.location,
            lat: settings.lat,
            lon: settings.lon,
            tz: settings.tz,
            timeout: settings.timeout,
            budget: ProviderBudget::new(settings.daily_limit, settings.tz),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn has_provider(&self) -> bool {
        self.api_key.is_some()
    }

    /// Provider calls left today; `None` when running on simulated weather only
    pub fn calls_remaining(&self) -> Option<u32> {
        self.api_key.as_ref().map(|_| self.budget.remaining())
    }

    pub async fn current_weather(&self) -> WeatherSnapshot {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("No weather provider key, using simulated weather");
            return self.simulated_snapshot();
        };

        let outcome = with_deadline("weather provider", self.timeout, self.fetch_current(api_key))
            .await
            .map_err(WeatherError::from)
            .and_then(|r| r);

        settle(FallbackKind::Weather, outcome, || self.simulated_snapshot())
    }

    /// Seven-day outlook. Spends one provider call, so it is meant to be
    /// refreshed on a timer and shared rather than fetched per request.
    pub async fn forecast(&self) -> WeatherOutlook {
        let Some(api_key) = self.api_key.as_deref() else {
            return self.simulated_outlook();
        };

        let outcome = with_deadline("weather forecast", self.timeout, self.fetch_forecast(api_key))
            .await
            .map_err(WeatherError::from)
            .and_then(|r| r);

        match outcome {
            Ok(days) => WeatherOutlook {
                generated_at: Utc::now(),
                source: DataSource::Provider,
                days,
            },
            Err(e) => {
                record_fallback(FallbackKind::Forecast, &e);
                self.simulated_outlook()
            }
        }
    }

    /// Simulated reading for right now; also the bootstrap value before the first refresh
    pub fn simulated_snapshot(&self) -> WeatherSnapshot {
        simulate_current(Utc::now(), self.tz, &self.location, &mut rand::thread_rng())
    }

    pub fn simulated_outlook(&self) -> WeatherOutlook {
        let now = Utc::now();
        WeatherOutlook {
            generated_at: now,
            source: DataSource::Simulated,
            days: simulate_forecast(now, self.tz, &mut rand::thread_rng()),
        }
    }

    async fn fetch_current(&self, api_key: &str) -> Result<WeatherSnapshot, WeatherError> {
        if !self.budget.try_spend() {
            return Err(WeatherError::BudgetExhausted);
        }

        tracing::debug!(lat = %self.lat, lon = %self.lon, "Fetching current weather");

        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("lat", self.lat.to_string()),
                ("lon", self.lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let data: OwmCurrentResponse = response.json().await?;
        let snapshot = snapshot_from_provider(data, &self.location);

        tracing::info!(
            temp = %snapshot.temperature,
            humidity = %snapshot.humidity,
            rainfall = %snapshot.rainfall,
            "Weather fetched from provider"
        );

        Ok(snapshot)
    }

    async fn fetch_forecast(&self, api_key: &str) -> Result<Vec<DailyForecast>, WeatherError> {
        if !self.budget.try_spend() {
            return Err(WeatherError::BudgetExhausted);
        }

        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("lat", self.lat.to_string()),
                ("lon", self.lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
                ("cnt", "40".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let data: OwmForecastResponse = response.json().await?;
        let days = daily_from_provider(data.list, self.tz);
        if days.is_empty() {
            return Err(WeatherError::InvalidResponse(
                "forecast list is empty".to_string(),
            ));
        }

        Ok(days)
    }
}

async fn api_error(response: reqwest::Response) -> WeatherError {
    let status = response.status();
    let message = response
        .json::<OwmErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| format!("HTTP {}", status));

    WeatherError::ApiError {
        status: status.as_u16(),
        message,
    }
}

fn snapshot_from_provider(data: OwmCurrentResponse, location: &str) -> WeatherSnapshot {
    let condition = data.weather.first();

    WeatherSnapshot {
        temperature: round1(data.main.temp),
        humidity: data.main.humidity,
        rainfall: data.rain.and_then(|r| r.one_hour).unwrap_or(0.0).max(0.0),
        wind_speed: round1(data.wind.map(|w| mps_to_kph(w.speed)).unwrap_or(0.0)),
        condition: condition
            .map(|c| WeatherCondition::from_provider(&c.main))
            .unwrap_or(WeatherCondition::Clear),
        icon: condition
            .and_then(|c| c.icon.clone())
            .unwrap_or_else(|| "01d".to_string()),
        location: location.to_string(),
        captured_at: Utc::now(),
        source: DataSource::Provider,
    }
}

/// First 3-hour slot of each local calendar day, at most seven days
fn daily_from_provider(list: Vec<OwmForecastItem>, tz: Tz) -> Vec<DailyForecast> {
    let mut seen = HashSet::new();
    let mut days = Vec::with_capacity(FORECAST_DAYS);

    for item in list {
        if days.len() == FORECAST_DAYS {
            break;
        }

        let Some(at) = Utc.timestamp_opt(item.dt, 0).single() else {
            continue;
        };
        let date = at.with_timezone(&tz).date_naive();
        if !seen.insert(date) {
            continue;
        }

        let condition = item.weather.first();
        days.push(DailyForecast {
            date,
            temp: item.main.temp.round(),
            temp_min: item.main.temp_min.unwrap_or(item.main.temp).round(),
            temp_max: item.main.temp_max.unwrap_or(item.main.temp).round(),
            humidity: item.main.humidity,
            rainfall: item.rain.and_then(|r| r.three_hours).unwrap_or(0.0),
            condition: condition
                .map(|c| WeatherCondition::from_provider(&c.main))
                .unwrap_or(WeatherCondition::Clear),
            icon: condition
                .and_then(|c| c.icon.clone())
                .unwrap_or_else(|| "01d".to_string()),
            wind_speed: item.wind.map(|w| mps_to_kph(w.speed)).unwrap_or(0.0).round(),
        });
    }

    days
}
