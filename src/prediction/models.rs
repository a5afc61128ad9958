use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::barangay::BarangayRegistry;
use crate::weather::models::DataSource;

/// Probability reported for a barangay whose prediction could not be obtained
pub const FALLBACK_PROBABILITY: f64 = 0.2;

// ============================================================================
// Domain types
// ============================================================================

/// Climate inputs the prediction model is fed with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Climate {
    /// °C
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// mm
    pub rainfall: f64,
}

impl Climate {
    /// Climate used when no observation is at hand (weekly lookups without weather)
    pub const REFERENCE: Climate = Climate {
        temperature: 28.0,
        humidity: 75.0,
        rainfall: 100.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
    Unknown,
}

impl RiskLevel {
    /// Position in the severity ordering; `Unknown` has none
    pub fn severity(self) -> Option<u8> {
        match self {
            Self::Low => Some(0),
            Self::Moderate => Some(1),
            Self::Elevated => Some(2),
            Self::High => Some(3),
            Self::Unknown => None,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "moderate" => Self::Moderate,
            "elevated" => Self::Elevated,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Display bucket on top of the backend's Low/Moderate/High label.
///
/// The probability picks the bucket; between 0.4 and 0.6 a Moderate label is
/// shown as Elevated. A missing prediction stays Unknown. The model
/// probability itself is never re-derived.
pub fn display_tier(risk: RiskLevel, probability: f64) -> RiskLevel {
    if risk == RiskLevel::Unknown || !probability.is_finite() {
        return RiskLevel::Unknown;
    }

    if probability > 0.6 {
        RiskLevel::High
    } else if probability > 0.4 {
        if risk == RiskLevel::Moderate {
            RiskLevel::Elevated
        } else {
            RiskLevel::Moderate
        }
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClimateOrigin {
    Current,
    Historical,
}

impl ClimateOrigin {
    fn from_wire(source: &str) -> Self {
        if source.eq_ignore_ascii_case("current") {
            Self::Current
        } else {
            Self::Historical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClimateUsed {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub source: ClimateOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeekPrediction {
    /// Date range label, e.g. "June 01–07"
    pub week_label: String,
    pub risk: RiskLevel,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub climate_used: Option<ClimateUsed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BarangayForecast {
    pub barangay: String,
    /// Chronological, normally four weeks
    pub weekly_forecast: Vec<WeekPrediction>,
    pub current_risk: RiskLevel,
    /// Probability behind `current_risk`
    pub probability: f64,
    /// Set when this is a substitute for a failed or late prediction
    #[serde(default)]
    pub degraded: bool,
}

impl BarangayForecast {
    pub fn from_weeks(barangay: impl Into<String>, weeks: Vec<WeekPrediction>) -> Self {
        let (current_risk, probability) = weeks
            .first()
            .map(|w| (w.risk, w.probability))
            .unwrap_or((RiskLevel::Unknown, FALLBACK_PROBABILITY));

        Self {
            barangay: barangay.into(),
            weekly_forecast: weeks,
            current_risk,
            probability,
            degraded: false,
        }
    }

    pub fn fallback(barangay: impl Into<String>) -> Self {
        Self {
            barangay: barangay.into(),
            weekly_forecast: Vec::new(),
            current_risk: RiskLevel::Low,
            probability: FALLBACK_PROBABILITY,
            degraded: true,
        }
    }

    pub fn display_tier(&self) -> RiskLevel {
        display_tier(self.current_risk, self.probability)
    }
}

/// Forecasts for every enumerated barangay, replaced wholesale on refresh
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PredictionSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Climate every barangay was predicted with
    pub climate: Climate,
    pub climate_source: DataSource,
    pub forecasts: IndexMap<String, BarangayForecast>,
}

impl PredictionSnapshot {
    /// Complete snapshot from partial results; missing barangays get the fallback.
    /// Results for names outside the registry are dropped.
    pub fn complete(
        registry: &BarangayRegistry,
        mut resolved: HashMap<String, BarangayForecast>,
        climate: Climate,
        climate_source: DataSource,
    ) -> Self {
        let forecasts = registry
            .names()
            .map(|name| {
                let forecast = resolved
                    .remove(name)
                    .unwrap_or_else(|| BarangayForecast::fallback(name));
                (name.to_string(), forecast)
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            climate,
            climate_source,
            forecasts,
        }
    }

    pub fn fallback(registry: &BarangayRegistry, climate: Climate, source: DataSource) -> Self {
        Self::complete(registry, HashMap::new(), climate, source)
    }

    pub fn get(&self, barangay: &str) -> Option<&BarangayForecast> {
        self.forecasts.get(barangay)
    }

    pub fn is_fully_degraded(&self) -> bool {
        self.forecasts.values().all(|f| f.degraded)
    }
}

/// Risk label per week start date for one barangay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeeklyPredictions {
    pub barangay: String,
    pub weekly_predictions: BTreeMap<NaiveDate, RiskLevel>,
    #[serde(default)]
    pub degraded: bool,
}

// ============================================================================
// Backend wire format
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub barangay: &'a str,
    pub climate: Climate,
    /// YYYY-MM-DD
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictResponseBody {
    #[serde(default)]
    pub weekly_forecast: Option<Vec<WireWeek>>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireWeek {
    pub week: String,
    pub risk: String,
    pub probability: f64,
    #[serde(default)]
    pub climate_used: Option<WireClimateUsed>,
}

#[derive(Debug, Deserialize)]
pub struct WireClimateUsed {
    pub rainfall: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct BarangaysResponse {
    pub barangays: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyResponseBody {
    pub barangay: String,
    pub weekly_predictions: BTreeMap<NaiveDate, String>,
}

/// A `/predict` answer after validation
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Forecast(Vec<WeekPrediction>),
    Rejected { reason: String },
}

impl From<PredictResponseBody> for PredictionOutcome {
    fn from(body: PredictResponseBody) -> Self {
        let Some(weeks) = body.weekly_forecast else {
            return Self::Rejected {
                reason: body
                    .detail
                    .unwrap_or_else(|| "response carried no weekly_forecast".to_string()),
            };
        };

        let mut predictions = Vec::with_capacity(weeks.len());
        for week in weeks {
            if !week.probability.is_finite() || !(0.0..=1.0).contains(&week.probability) {
                return Self::Rejected {
                    reason: format!(
                        "probability {} out of range for week {}",
                        week.probability, week.week
                    ),
                };
            }

            predictions.push(WeekPrediction {
                week_label: week.week,
                risk: RiskLevel::from_label(&week.risk),
                probability: week.probability,
                climate_used: week.climate_used.map(|c| ClimateUsed {
                    temperature: c.temperature,
                    humidity: c.humidity,
                    rainfall: c.rainfall,
                    source: ClimateOrigin::from_wire(&c.source),
                }),
            });
        }

        Self::Forecast(predictions)
    }
}

impl From<WeeklyResponseBody> for WeeklyPredictions {
    fn from(body: WeeklyResponseBody) -> Self {
        Self {
            barangay: body.barangay,
            weekly_predictions: body
                .weekly_predictions
                .into_iter()
                .map(|(date, label)| (date, RiskLevel::from_label(&label)))
                .collect(),
            degraded: false,
        }
    }
}
