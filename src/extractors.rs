use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ErrorResponse;

#[derive(Debug, Deserialize)]
struct StartDateQuery {
    start_date: Option<String>,
}

/// Optional `start_date=YYYY-MM-DD` query parameter.
///
/// Absent or blank gives `None`; anything that is not a calendar date is
/// rejected with a 400.
#[derive(Debug)]
pub struct StartDateParam(pub Option<NaiveDate>);

impl<S> FromRequestParts<S> for StartDateParam
where
    S: Send + Sync,
{
    type Rejection = StartDateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(Query(query)) = Query::<StartDateQuery>::from_request_parts(parts, state).await
        else {
            return Ok(StartDateParam(None));
        };

        match query.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(StartDateParam(None)),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| StartDateParam(Some(date)))
                .map_err(|_| StartDateRejection(raw.to_string())),
        }
    }
}

/// Rejection for a malformed `start_date`
#[derive(Debug)]
pub struct StartDateRejection(pub String);

impl IntoResponse for StartDateRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_code(
                format!("start_date must be YYYY-MM-DD, got '{}'", self.0),
                "INVALID_DATE",
            )),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> Result<StartDateParam, StartDateRejection> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        StartDateParam::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_date() {
        let StartDateParam(date) = extract("/weekly?start_date=2024-06-01").await.unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[tokio::test]
    async fn test_missing_or_blank_date() {
        assert!(extract("/weekly").await.unwrap().0.is_none());
        assert!(extract("/weekly?start_date=").await.unwrap().0.is_none());
    }

    #[tokio::test]
    async fn test_malformed_date_is_rejected() {
        let rejection = extract("/weekly?start_date=06-01-2024").await.unwrap_err();
        assert_eq!(rejection.0, "06-01-2024");
        assert_eq!(rejection.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
