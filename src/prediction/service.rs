use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Tz;
use futures_util::stream::{FuturesUnordered, StreamExt};

use super::client::{PredictionBackend, PredictionError};
use super::models::*;
use crate::barangay::BarangayRegistry;
use crate::cache::WeeklyCache;
use crate::fallback::{record_fallback, settle, with_deadline, FallbackKind, FallbackPolicy};
use crate::weather::{WeatherService, WeatherSnapshot};

/// Orchestrates calls to the prediction backend. Reads never fail: anything the
/// backend cannot answer in time becomes the Low / 0.2 default.
pub struct PredictionService {
    backend: Arc<dyn PredictionBackend>,
    weather: Arc<WeatherService>,
    registry: Arc<BarangayRegistry>,
    policy: FallbackPolicy,
    weekly_cache: WeeklyCache,
    tz: Tz,
}

impl PredictionService {
    pub fn new(
        backend: Arc<dyn PredictionBackend>,
        weather: Arc<WeatherService>,
        registry: Arc<BarangayRegistry>,
        policy: FallbackPolicy,
        weekly_cache: WeeklyCache,
    ) -> Self {
        let tz = weather.timezone();
        Self {
            backend,
            weather,
            registry,
            policy,
            weekly_cache,
            tz,
        }
    }

    /// Forecast for one barangay, or the default when the backend fails, rejects
    /// the request or does not answer within the call timeout.
    pub async fn predict_risk(
        &self,
        barangay: &str,
        climate: Climate,
        date: NaiveDate,
    ) -> BarangayForecast {
        let outcome = with_deadline(
            "prediction backend",
            self.policy.call_timeout,
            self.backend.predict(barangay, climate, date),
        )
        .await
        .map_err(PredictionError::from)
        .and_then(|r| r)
        .and_then(|outcome| match outcome {
            PredictionOutcome::Forecast(weeks) => Ok(weeks),
            PredictionOutcome::Rejected { reason } => Err(PredictionError::Rejected(reason)),
        })
        .map(|weeks| BarangayForecast::from_weeks(barangay, weeks));

        settle(FallbackKind::Prediction, outcome, || {
            BarangayForecast::fallback(barangay)
        })
    }

    /// Fetch the weather once, then predict every barangay from it
    pub async fn predict_all_barangays(&self) -> PredictionSnapshot {
        let weather = self.weather.current_weather().await;
        self.predict_all_for(&weather).await
    }

    /// Concurrent prediction of every enumerated barangay from one weather
    /// snapshot. The batch is bounded by the batch timeout; whatever is still
    /// outstanding then gets the default.
    pub async fn predict_all_for(&self, weather: &WeatherSnapshot) -> PredictionSnapshot {
        let climate = weather.climate();
        let date = weather.captured_at.with_timezone(&self.tz).date_naive();

        let mut pending: FuturesUnordered<_> = self
            .registry
            .names()
            .map(|name| async move { (name, self.predict_risk(name, climate, date).await) })
            .collect();

        let mut resolved = HashMap::with_capacity(self.registry.len());
        let collect = async {
            while let Some((name, forecast)) = pending.next().await {
                resolved.insert(name.to_string(), forecast);
            }
        };

        if let Err(elapsed) = with_deadline(
            "prediction batch",
            self.policy.batch_timeout,
            collect,
        )
        .await
        {
            record_fallback(FallbackKind::PredictionBatch, &elapsed);
        }

        let snapshot =
            PredictionSnapshot::complete(&self.registry, resolved, climate, weather.source);

        tracing::info!(
            barangays = snapshot.forecasts.len(),
            degraded = snapshot.forecasts.values().filter(|f| f.degraded).count(),
            "Prediction batch complete"
        );

        snapshot
    }

    /// Weekly risk labels from `start`, cached per (barangay, start).
    ///
    /// Prefers the backend's weekly endpoint; otherwise derives the weeks from a
    /// `/predict` call with the reference climate. Degraded answers are not cached.
    pub async fn weekly_predictions(&self, barangay: &str, start: NaiveDate) -> WeeklyPredictions {
        let key = (barangay.to_string(), start);
        if let Some(hit) = self.weekly_cache.get(&key) {
            tracing::debug!(barangay = %barangay, start = %start, "Weekly prediction cache hit");
            return hit;
        }

        let outcome = match self.fetch_weekly(barangay, start).await {
            Ok(weekly) => Ok(weekly),
            Err(e) => {
                tracing::debug!(
                    barangay = %barangay,
                    error = %e,
                    "Weekly endpoint unavailable, deriving from /predict"
                );
                self.weekly_from_predict(barangay, start).await
            }
        };

        let weekly = settle(FallbackKind::WeeklyPrediction, outcome, || WeeklyPredictions {
            barangay: barangay.to_string(),
            weekly_predictions: BTreeMap::new(),
            degraded: true,
        });

        if !weekly.degraded {
            self.weekly_cache.insert(key, weekly.clone());
        }

        weekly
    }

    /// Today on the local calendar
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Backend enumeration; only logged against the configured registry
    pub async fn log_backend_barangays(&self) {
        let result = with_deadline(
            "prediction backend",
            self.policy.call_timeout,
            self.backend.barangays(),
        )
        .await
        .map_err(PredictionError::from)
        .and_then(|r| r);

        match result {
            Ok(names) => {
                let unknown: Vec<&str> = names
                    .iter()
                    .map(String::as_str)
                    .filter(|n| !self.registry.contains(n))
                    .collect();
                tracing::info!(
                    backend = names.len(),
                    configured = self.registry.len(),
                    not_configured = ?unknown,
                    "Prediction backend barangays"
                );
            }
            Err(e) => tracing::info!(error = %e, "Prediction backend barangay list unavailable"),
        }
    }

    async fn fetch_weekly(
        &self,
        barangay: &str,
        start: NaiveDate,
    ) -> Result<WeeklyPredictions, PredictionError> {
        let weekly = with_deadline(
            "weekly prediction",
            self.policy.call_timeout,
            self.backend.weekly(barangay, start),
        )
        .await??;

        if weekly.weekly_predictions.is_empty() {
            return Err(PredictionError::Rejected(
                "weekly endpoint returned no weeks".to_string(),
            ));
        }

        Ok(weekly)
    }

    async fn weekly_from_predict(
        &self,
        barangay: &str,
        start: NaiveDate,
    ) -> Result<WeeklyPredictions, PredictionError> {
        let outcome = with_deadline(
            "prediction backend",
            self.policy.call_timeout,
            self.backend.predict(barangay, Climate::REFERENCE, start),
        )
        .await??;

        let weeks = match outcome {
            PredictionOutcome::Forecast(weeks) if !weeks.is_empty() => weeks,
            PredictionOutcome::Forecast(_) => {
                return Err(PredictionError::Rejected("no weeks returned".to_string()))
            }
            PredictionOutcome::Rejected { reason } => return Err(PredictionError::Rejected(reason)),
        };

        let weekly_predictions = weeks
            .into_iter()
            .enumerate()
            .filter_map(|(i, week)| {
                let offset = Days::new(7 * u64::try_from(i).ok()?);
                Some((start.checked_add_days(offset)?, week.risk))
            })
            .collect();

        Ok(WeeklyPredictions {
            barangay: barangay.to_string(),
            weekly_predictions,
            degraded: false,
        })
    }
}
