use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use thiserror::Error;

use super::models::*;
use crate::barangay::BarangayRegistry;
use crate::error::{upstream_status, HttpError};
use crate::fallback::{settle, with_deadline, DeadlineElapsed, FallbackKind};
use crate::impl_into_response;
use crate::prediction::client::{backend_error, endpoint};

/// Retraining runs the whole training script on the backend
const RETRAIN_TIMEOUT: Duration = Duration::from_secs(55);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Prediction backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid prediction backend URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),
}

impl HttpError for BackendError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unreachable(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => upstream_status(*status),
            Self::InvalidUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Upstream { .. } => Some("BACKEND_ERROR"),
            Self::Unreachable(_) | Self::Timeout(_) => Some("BACKEND_UNAVAILABLE"),
            Self::InvalidUrl(_) => None,
        }
    }
}

impl_into_response!(BackendError);

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unknown upload kind: {0}")]
    UnknownUploadKind(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,
}

impl HttpError for AdminError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Report(e) => e.status_code(),
            Self::Backend(e) => e.status_code(),
            Self::UnknownUploadKind(_) => StatusCode::NOT_FOUND,
            Self::EmptyUpload => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Report(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
            Self::UnknownUploadKind(_) => Some("UNKNOWN_UPLOAD_KIND"),
            Self::EmptyUpload => Some("EMPTY_UPLOAD"),
        }
    }
}

impl_into_response!(AdminError);

/// Administrative write paths of the prediction backend.
///
/// Writes are forwarded once; a backend failure goes back to the caller as is.
pub struct AdminService {
    client: Client,
    base_url: String,
    registry: Arc<BarangayRegistry>,
    tz: Tz,
    call_timeout: Duration,
}

impl AdminService {
    pub fn new(
        client: Client,
        base_url: &str,
        registry: Arc<BarangayRegistry>,
        tz: Tz,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            registry,
            tz,
            call_timeout,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        endpoint(&self.base_url, segments).map_err(BackendError::InvalidUrl)
    }

    pub async fn submit_report(&self, report: CaseReport) -> Result<serde_json::Value, AdminError> {
        let report = report.validated(&self.registry)?;
        tracing::info!(barangay = %report.barangay, "Forwarding case report");

        let request = self.client.post(self.url(&["report-case"])?).json(&report);
        Ok(self.send(request, self.call_timeout).await?)
    }

    /// Reports plus the backend's analytics, passed through unchanged
    pub async fn case_reports(&self) -> Result<serde_json::Value, BackendError> {
        let request = self.client.get(self.url(&["case-reports"])?);
        self.send(request, self.call_timeout).await
    }

    pub async fn uploads(&self) -> Result<UploadsResponse, BackendError> {
        let request = self.client.get(self.url(&["uploads"])?);
        let body = self.send(request, self.call_timeout).await?;
        serde_json::from_value(body).map_err(|e| BackendError::Upstream {
            status: 502,
            message: format!("Unexpected uploads listing: {e}"),
        })
    }

    /// Forward a CSV as the multipart `file` field; the backend does the parsing
    pub async fn upload(
        &self,
        kind: UploadKind,
        filename: &str,
        contents: Bytes,
    ) -> Result<serde_json::Value, AdminError> {
        if contents.is_empty() {
            return Err(AdminError::EmptyUpload);
        }

        tracing::info!(
            kind = kind.as_str(),
            filename = %filename,
            size = contents.len(),
            "Forwarding upload"
        );

        let part = Part::bytes(contents.to_vec())
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .map_err(BackendError::from)?;
        let request = self
            .client
            .post(self.url(&["upload", kind.as_str()])?)
            .multipart(Form::new().part("file", part));

        Ok(self.send(request, self.call_timeout).await?)
    }

    pub async fn retrain(&self) -> Result<serde_json::Value, BackendError> {
        tracing::info!("Requesting model retraining");
        let request = self
            .client
            .post(self.url(&["model", "retrain"])?)
            .timeout(RETRAIN_TIMEOUT);
        self.send(request, RETRAIN_TIMEOUT).await
    }

    /// Backend insights, or a seasonal note when the backend is unavailable
    pub async fn insights(&self) -> Insights {
        let outcome = match self.url(&["insights"]) {
            Ok(url) => self
                .send(self.client.get(url), self.call_timeout)
                .await
                .and_then(|body| {
                    serde_json::from_value::<Insights>(body).map_err(|e| BackendError::Upstream {
                        status: 502,
                        message: format!("Unexpected insights payload: {e}"),
                    })
                }),
            Err(e) => Err(e),
        };

        settle(FallbackKind::Insights, outcome, || {
            Insights::seasonal(Utc::now().with_timezone(&self.tz))
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<serde_json::Value, BackendError> {
        let response = with_deadline("prediction backend", timeout, request.send()).await??;

        if !response.status().is_success() {
            let (status, message) = backend_error(response).await;
            return Err(BackendError::Upstream { status, message });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Manila;
    use mockito::Matcher;
    use serde_json::json;

    fn service(url: &str) -> AdminService {
        AdminService::new(
            Client::new(),
            url,
            Arc::new(BarangayRegistry::naga_city()),
            Manila,
            Duration::from_secs(5),
        )
    }

    fn report() -> CaseReport {
        CaseReport {
            barangay: "san felipe".to_string(),
            name: "Maria".to_string(),
            age: "12".to_string(),
            sex: "F".to_string(),
            address: "Purok 1".to_string(),
            date_reported: "2024-06-03".to_string(),
            reported_by: "Nurse".to_string(),
            rash: true,
            ..CaseReport::default()
        }
    }

    #[tokio::test]
    async fn test_report_forwarded_with_canonical_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report-case")
            .match_body(Matcher::PartialJson(json!({
                "barangay": "San Felipe",
                "dateReported": "2024-06-03",
                "rash": true
            })))
            .with_status(200)
            .with_body(r#"{"message":"Case report submitted successfully"}"#)
            .create_async()
            .await;

        let body = service(&server.url()).submit_report(report()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["message"], "Case report submitted successfully");
    }

    #[tokio::test]
    async fn test_invalid_report_never_reaches_backend() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report-case")
            .expect(0)
            .create_async()
            .await;

        let mut bad = report();
        bad.date_reported = "June 3".to_string();
        let err = service(&server.url()).submit_report(bad).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), Some("INVALID_REPORT"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/report-case")
            .with_status(500)
            .with_body(r#"{"detail":"Error saving report: disk full"}"#)
            .create_async()
            .await;

        let err = service(&server.url()).submit_report(report()).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Error saving report: disk full");
    }

    #[tokio::test]
    async fn test_upload_is_multipart_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/dengue")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="cases.csv""#.to_string()),
                Matcher::Regex("date,barangay,cases".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"message":"Dengue cases data uploaded successfully","rows":1}"#)
            .create_async()
            .await;

        let body = service(&server.url())
            .upload(
                UploadKind::Dengue,
                "cases.csv",
                Bytes::from_static(b"date,barangay,cases\n2024-06-01,Tinago,3\n"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body["rows"], 1);
    }

    #[tokio::test]
    async fn test_upload_rejection_keeps_client_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload/climate")
            .with_status(400)
            .with_body(r#"{"detail":"CSV must contain columns: date, rainfall, temperature, humidity"}"#)
            .create_async()
            .await;

        let err = service(&server.url())
            .upload(UploadKind::Climate, "c.csv", Bytes::from_static(b"x\n1\n"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("CSV must contain columns"));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected_locally() {
        let err = service("http://127.0.0.1:9")
            .upload(UploadKind::Climate, "c.csv", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::EmptyUpload));
    }

    #[tokio::test]
    async fn test_uploads_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/uploads")
            .with_status(200)
            .with_body(
                r#"{"uploads":[{"filename":"climate_20240601_120000.csv","size":2048,"modified":"2024-06-01T12:00:00"}]}"#,
            )
            .create_async()
            .await;

        let listing = service(&server.url()).uploads().await.unwrap();
        assert_eq!(listing.uploads.len(), 1);
        assert_eq!(listing.uploads[0].size, 2048);
    }

    #[tokio::test]
    async fn test_insights_pass_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/insights")
            .with_status(200)
            .with_body(r#"{"insights":["a","b"],"generated_at":"2024-06-01T09:00:00"}"#)
            .create_async()
            .await;

        let insights = service(&server.url()).insights().await;
        assert_eq!(insights.insights, vec!["a".to_string(), "b".to_string()]);
        assert!(!insights.degraded);
    }

    #[tokio::test]
    async fn test_insights_fall_back_to_season() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/insights")
            .with_status(503)
            .create_async()
            .await;

        let insights = service(&server.url()).insights().await;
        assert_eq!(insights.insights.len(), 1);
        assert!(insights.degraded);
    }

    #[tokio::test]
    async fn test_retrain_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/model/retrain")
            .with_status(200)
            .with_body(r#"{"message":"Model retrained successfully","model_loaded":true}"#)
            .create_async()
            .await;

        let body = service(&server.url()).retrain().await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["model_loaded"], true);
    }
}
