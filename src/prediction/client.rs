use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use super::models::*;
use crate::fallback::DeadlineElapsed;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to reach prediction backend: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Prediction backend returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Prediction rejected: {0}")]
    Rejected(String),

    #[error("Invalid prediction backend URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),
}

/// The opaque model service. Kept behind a trait so the orchestration can be
/// exercised against stubs.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    /// Four-week forecast for one barangay from the given climate
    async fn predict(
        &self,
        barangay: &str,
        climate: Climate,
        date: NaiveDate,
    ) -> Result<PredictionOutcome, PredictionError>;

    /// Risk label per week starting at `start`
    async fn weekly(
        &self,
        barangay: &str,
        start: NaiveDate,
    ) -> Result<WeeklyPredictions, PredictionError>;

    /// Barangays the model was trained on
    async fn barangays(&self) -> Result<Vec<String>, PredictionError>;
}

#[derive(Debug, Deserialize)]
struct DetailBody {
    detail: serde_json::Value,
}

pub struct HttpPredictionBackend {
    client: Client,
    base_url: String,
}

impl HttpPredictionBackend {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, PredictionError> {
        endpoint(&self.base_url, segments).map_err(PredictionError::InvalidUrl)
    }
}

/// `base_url` with `segments` appended as percent-encoded path segments
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base_url).map_err(|e| format!("{base_url}: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("{base_url}: cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Error for a non-2xx backend answer, using its `detail` when present
pub(crate) async fn backend_error(response: reqwest::Response) -> (u16, String) {
    let status = response.status();
    let message = match response.json::<DetailBody>().await {
        Ok(DetailBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(DetailBody { detail }) => detail.to_string(),
        Err(_) => format!("HTTP {}", status),
    };
    (status.as_u16(), message)
}

#[async_trait]
impl PredictionBackend for HttpPredictionBackend {
    async fn predict(
        &self,
        barangay: &str,
        climate: Climate,
        date: NaiveDate,
    ) -> Result<PredictionOutcome, PredictionError> {
        let request = PredictRequest {
            barangay,
            climate,
            date: date.format("%Y-%m-%d").to_string(),
        };

        let response = self
            .client
            .post(self.url(&["predict"])?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = backend_error(response).await;
            return Err(PredictionError::ApiError { status, message });
        }

        let body: PredictResponseBody = response.json().await?;
        Ok(PredictionOutcome::from(body))
    }

    async fn weekly(
        &self,
        barangay: &str,
        start: NaiveDate,
    ) -> Result<WeeklyPredictions, PredictionError> {
        let response = self
            .client
            .get(self.url(&["predict", "weekly", barangay])?)
            .query(&[("start_date", start.format("%Y-%m-%d").to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = backend_error(response).await;
            return Err(PredictionError::ApiError { status, message });
        }

        let body: WeeklyResponseBody = response.json().await?;
        Ok(WeeklyPredictions::from(body))
    }

    async fn barangays(&self) -> Result<Vec<String>, PredictionError> {
        let response = self.client.get(self.url(&["barangays"])?).send().await?;

        if !response.status().is_success() {
            let (status, message) = backend_error(response).await;
            return Err(PredictionError::ApiError { status, message });
        }

        let body: BarangaysResponse = response.json().await?;
        Ok(body.barangays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_predict_posts_climate_and_date() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(Matcher::Json(json!({
                "barangay": "Tinago",
                "climate": {"temperature": 28.0, "humidity": 75.0, "rainfall": 100.0},
                "date": "2024-06-01"
            })))
            .with_status(200)
            .with_body(
                json!({"weekly_forecast": [{"week": "June 01–07", "risk": "Moderate", "probability": 0.5}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let backend = HttpPredictionBackend::new(Client::new(), &server.url());
        let outcome = backend
            .predict("Tinago", Climate::REFERENCE, date())
            .await
            .unwrap();

        mock.assert_async().await;
        let PredictionOutcome::Forecast(weeks) = outcome else {
            panic!("expected forecast");
        };
        assert_eq!(weeks[0].risk, RiskLevel::Moderate);
    }

    #[tokio::test]
    async fn test_predict_error_carries_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict")
            .with_status(400)
            .with_body(r#"{"detail":"Unknown barangay: Atlantis"}"#)
            .create_async()
            .await;

        let backend = HttpPredictionBackend::new(Client::new(), &server.url());
        let err = backend
            .predict("Atlantis", Climate::REFERENCE, date())
            .await
            .unwrap_err();

        match err {
            PredictionError::ApiError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Unknown barangay: Atlantis");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_weekly_encodes_barangay_segment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                Matcher::Regex(r"^/predict/weekly/Bagumbayan(%20| )Norte$".to_string()),
            )
            .match_query(Matcher::UrlEncoded(
                "start_date".into(),
                "2024-06-01".into(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "barangay": "Bagumbayan Norte",
                    "weekly_predictions": {"2024-06-01": "High", "2024-06-08": "Low"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = HttpPredictionBackend::new(Client::new(), &server.url());
        let weekly = backend.weekly("Bagumbayan Norte", date()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(weekly.weekly_predictions.len(), 2);
        assert_eq!(weekly.weekly_predictions[&date()], RiskLevel::High);
        assert!(!weekly.degraded);
    }

    #[tokio::test]
    async fn test_barangays_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/barangays")
            .with_status(200)
            .with_body(r#"{"barangays":["Tinago","Balatas"]}"#)
            .create_async()
            .await;

        let backend = HttpPredictionBackend::new(Client::new(), &server.url());
        assert_eq!(
            backend.barangays().await.unwrap(),
            vec!["Tinago".to_string(), "Balatas".to_string()]
        );
    }

    #[test]
    fn test_url_with_base_path() {
        let backend = HttpPredictionBackend::new(Client::new(), "http://backend:8000/api/");
        let url = backend.url(&["predict", "weekly", "San Felipe"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://backend:8000/api/predict/weekly/San%20Felipe"
        );
    }
}
