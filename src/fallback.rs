//! Shared timeout and fallback rules for every external read.
//!
//! Each call to the weather provider, the prediction backend or Overpass is raced
//! against a fixed deadline. An elapsed deadline is handled exactly like a failed
//! request: the caller substitutes a statically defined, lower-confidence value.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::TimeoutConfig;

#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    /// Bound for a whole prediction batch
    pub batch_timeout: Duration,
    /// Bound for a single weather, prediction or boundary call
    pub call_timeout: Duration,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&TimeoutConfig> for FallbackPolicy {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            batch_timeout: Duration::from_secs(config.batch_secs),
            call_timeout: Duration::from_secs(config.call_secs),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{what} did not respond within {after:?}")]
pub struct DeadlineElapsed {
    pub what: &'static str,
    pub after: Duration,
}

/// Race `fut` against `after`; whichever settles first wins.
pub async fn with_deadline<F, T>(
    what: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, DeadlineElapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| DeadlineElapsed { what, after })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Weather,
    Forecast,
    Prediction,
    PredictionBatch,
    WeeklyPrediction,
    Boundary,
    Insights,
}

impl FallbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Forecast => "forecast",
            Self::Prediction => "prediction",
            Self::PredictionBatch => "prediction_batch",
            Self::WeeklyPrediction => "weekly_prediction",
            Self::Boundary => "boundary",
            Self::Insights => "insights",
        }
    }
}

pub fn record_fallback(kind: FallbackKind, reason: &dyn Display) {
    tracing::warn!(kind = kind.as_str(), reason = %reason, "Using fallback data");
    metrics::counter!("moskita_fallback_total", "kind" => kind.as_str()).increment(1);
}

/// Absorb a read-path failure: the value on success, the fallback otherwise.
pub fn settle<T, E, F>(kind: FallbackKind, outcome: Result<T, E>, fallback: F) -> T
where
    E: Display,
    F: FnOnce() -> T,
{
    match outcome {
        Ok(value) => value,
        Err(e) => {
            record_fallback(kind, &e);
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_for_pending_future() {
        let started = tokio::time::Instant::now();
        let result = with_deadline(
            "never",
            Duration::from_secs(5),
            std::future::pending::<()>(),
        )
        .await;

        assert_eq!(
            result,
            Err(DeadlineElapsed {
                what: "never",
                after: Duration::from_secs(5)
            })
        );
        assert!(started.elapsed() < Duration::from_millis(5_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes_fast_result() {
        let result = with_deadline("fast", Duration::from_secs(5), async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_settle_uses_fallback_on_error() {
        let value = settle(FallbackKind::Weather, Err::<i32, _>("boom"), || 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_settle_keeps_success() {
        let value = settle(FallbackKind::Weather, Ok::<_, String>(3), || 7);
        assert_eq!(value, 3);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = FallbackPolicy::from(&TimeoutConfig {
            batch_secs: 12,
            call_secs: 3,
        });
        assert_eq!(policy.batch_timeout, Duration::from_secs(12));
        assert_eq!(policy.call_timeout, Duration::from_secs(3));
    }
}
