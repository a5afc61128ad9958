//! Shared snapshots every display surface reads from.
//!
//! The hub seeds each store with fallback data so reads work from the first
//! request, then keeps them current through periodic refreshes.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::barangay::{BarangayRegistry, Centroid};
use crate::boundary::{BoundaryPolygon, BoundaryService, BoundarySnapshot};
use crate::config::RefreshConfig;
use crate::prediction::models::{BarangayForecast, PredictionSnapshot, RiskLevel};
use crate::prediction::PredictionService;
use crate::refresh::{subscribe, Snapshot, SnapshotStore, Subscription};
use crate::weather::{WeatherOutlook, WeatherService, WeatherSnapshot};

impl Snapshot for WeatherSnapshot {
    fn is_degraded(&self) -> bool {
        self.is_simulated()
    }

    fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl Snapshot for WeatherOutlook {
    fn is_degraded(&self) -> bool {
        self.is_simulated()
    }

    fn captured_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

impl Snapshot for PredictionSnapshot {
    fn is_degraded(&self) -> bool {
        self.is_fully_degraded()
    }

    fn captured_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

impl Snapshot for BoundarySnapshot {
    fn is_degraded(&self) -> bool {
        self.approximate_count() == self.polygons.len()
    }

    fn captured_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BarangayOverview {
    pub name: String,
    pub centroid: Centroid,
    pub current_risk: RiskLevel,
    pub display_tier: RiskLevel,
    pub probability: f64,
    pub degraded: bool,
    pub boundary: BoundaryPolygon,
}

/// Everything the heatmap and the dashboard need in one read
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Overview {
    pub weather: WeatherSnapshot,
    pub predictions_generated_at: DateTime<Utc>,
    pub barangays: Vec<BarangayOverview>,
}

pub struct ForecastHub {
    registry: Arc<BarangayRegistry>,
    weather_source: Arc<WeatherService>,
    prediction_source: Arc<PredictionService>,
    boundary_source: Arc<BoundaryService>,
    weather: Arc<SnapshotStore<WeatherSnapshot>>,
    outlook: Arc<SnapshotStore<WeatherOutlook>>,
    predictions: Arc<SnapshotStore<PredictionSnapshot>>,
    boundaries: Arc<SnapshotStore<BoundarySnapshot>>,
}

impl ForecastHub {
    pub fn new(
        registry: Arc<BarangayRegistry>,
        weather_source: Arc<WeatherService>,
        prediction_source: Arc<PredictionService>,
        boundary_source: Arc<BoundaryService>,
    ) -> Self {
        let weather_seed = weather_source.simulated_snapshot();
        let outlook_seed = weather_source.simulated_outlook();
        let predictions_seed = PredictionSnapshot::fallback(
            &registry,
            weather_seed.climate(),
            weather_seed.source,
        );
        let boundaries_seed = boundary_source.approximate();

        Self {
            weather: Arc::new(SnapshotStore::new(
                "weather",
                weather_seed,
                Duration::hours(1),
            )),
            outlook: Arc::new(SnapshotStore::new(
                "outlook",
                outlook_seed,
                Duration::hours(12),
            )),
            predictions: Arc::new(SnapshotStore::new(
                "predictions",
                predictions_seed,
                Duration::hours(1),
            )),
            boundaries: Arc::new(SnapshotStore::new(
                "boundaries",
                boundaries_seed,
                Duration::days(7),
            )),
            registry,
            weather_source,
            prediction_source,
            boundary_source,
        }
    }

    /// Start the four refreshes. Keep the returned subscriptions alive for as
    /// long as the snapshots should stay current.
    pub fn start(&self, refresh: &RefreshConfig) -> Vec<Subscription> {
        let weather = Arc::clone(&self.weather_source);
        let outlook = Arc::clone(&self.weather_source);
        let predictions = Arc::clone(&self.prediction_source);
        let boundaries = Arc::clone(&self.boundary_source);

        vec![
            refresh_into(
                "weather",
                refresh.weather_interval(),
                Arc::clone(&self.weather),
                move || {
                    let weather = Arc::clone(&weather);
                    async move { weather.current_weather().await }
                },
            ),
            refresh_into(
                "outlook",
                refresh.forecast_interval(),
                Arc::clone(&self.outlook),
                move || {
                    let outlook = Arc::clone(&outlook);
                    async move { outlook.forecast().await }
                },
            ),
            refresh_into(
                "predictions",
                refresh.predictions_interval(),
                Arc::clone(&self.predictions),
                move || {
                    let predictions = Arc::clone(&predictions);
                    async move { predictions.predict_all_barangays().await }
                },
            ),
            refresh_into(
                "boundaries",
                refresh.boundaries_interval(),
                Arc::clone(&self.boundaries),
                move || {
                    let boundaries = Arc::clone(&boundaries);
                    async move { boundaries.boundaries().await }
                },
            ),
        ]
    }

    pub fn weather(&self) -> Arc<WeatherSnapshot> {
        self.weather.current()
    }

    pub fn outlook(&self) -> Arc<WeatherOutlook> {
        self.outlook.current()
    }

    pub fn predictions(&self) -> Arc<PredictionSnapshot> {
        self.predictions.current()
    }

    pub fn boundaries(&self) -> Arc<BoundarySnapshot> {
        self.boundaries.current()
    }

    pub fn overview(&self) -> Overview {
        let weather = self.weather();
        let predictions = self.predictions();
        let boundaries = self.boundaries();

        let barangays = self
            .registry
            .iter()
            .map(|(name, centroid)| {
                let forecast = predictions
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| BarangayForecast::fallback(name));
                let boundary = boundaries
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| BoundaryPolygon::approximate(name, centroid));

                BarangayOverview {
                    name: name.to_string(),
                    centroid,
                    current_risk: forecast.current_risk,
                    display_tier: forecast.display_tier(),
                    probability: forecast.probability,
                    degraded: forecast.degraded,
                    boundary,
                }
            })
            .collect();

        Overview {
            weather: weather.as_ref().clone(),
            predictions_generated_at: predictions.generated_at,
            barangays,
        }
    }
}

/// Periodically run `fetch` and store its result. The token is taken when the
/// cycle starts, so results of overlapping cycles land in start order or not at all.
fn refresh_into<T, F, Fut>(
    name: &'static str,
    interval: std::time::Duration,
    store: Arc<SnapshotStore<T>>,
    fetch: F,
) -> Subscription
where
    T: Snapshot,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let issuer = Arc::clone(&store);

    subscribe(
        name,
        interval,
        move || {
            let token = issuer.issue_token();
            let cycle = fetch();
            async move { (token, cycle.await) }
        },
        move |(token, value)| {
            store.apply(token, value);
        },
    )
}
