use axum::http::StatusCode;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::barangay::BarangayRegistry;
use crate::error::HttpError;
use crate::impl_into_response;

/// Anonymous dengue case / symptom report as sent by the report form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseReport {
    pub barangay: String,
    pub name: String,
    pub age: String,
    pub sex: String,
    pub address: String,
    /// YYYY-MM-DD
    pub date_reported: String,
    pub time_reported: String,
    pub reported_by: String,

    pub fever: bool,
    pub headache: bool,
    pub muscle_pain: bool,
    pub rash: bool,
    pub nausea: bool,
    pub abdominal_pain: bool,
    pub bleeding: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_onset_date: Option<String>,

    pub risk_red: bool,
    pub risk_yellow: bool,
    pub risk_green: bool,

    pub referred_to_facility: bool,
    pub advised_monitoring: bool,
    pub notified_family: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("Unknown barangay: {0}")]
    UnknownBarangay(String),

    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Field '{field}' must be a date in YYYY-MM-DD format, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
}

impl HttpError for ReportError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_code(&self) -> Option<&'static str> {
        Some("INVALID_REPORT")
    }
}

impl_into_response!(ReportError);

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ReportError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ReportError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CaseReport {
    /// Checked copy ready for the backend: trimmed, canonical barangay name,
    /// blank optionals dropped. The first problem found is reported.
    pub fn validated(mut self, registry: &BarangayRegistry) -> Result<Self, ReportError> {
        let required: [(&'static str, &mut String); 7] = [
            ("barangay", &mut self.barangay),
            ("name", &mut self.name),
            ("age", &mut self.age),
            ("sex", &mut self.sex),
            ("address", &mut self.address),
            ("dateReported", &mut self.date_reported),
            ("reportedBy", &mut self.reported_by),
        ];
        for (field, value) in required {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(ReportError::MissingField(field));
            }
        }

        self.barangay = registry
            .resolve(&self.barangay)
            .ok_or_else(|| ReportError::UnknownBarangay(self.barangay.clone()))?
            .to_string();

        parse_date("dateReported", &self.date_reported)?;

        self.symptom_onset_date = blank_to_none(self.symptom_onset_date);
        if let Some(onset) = &self.symptom_onset_date {
            parse_date("symptomOnsetDate", onset)?;
        }
        self.remarks = blank_to_none(self.remarks);
        self.time_reported = self.time_reported.trim().to_string();

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Climate,
    Dengue,
}

impl UploadKind {
    pub fn from_path(value: &str) -> Option<Self> {
        match value {
            "climate" => Some(Self::Climate),
            "dengue" => Some(Self::Dengue),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Climate => "climate",
            Self::Dengue => "dengue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadEntry {
    pub filename: String,
    /// bytes
    pub size: u64,
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadsResponse {
    #[serde(default)]
    pub uploads: Vec<UploadEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Insights {
    pub insights: Vec<String>,
    pub generated_at: String,
    /// Set when the backend could not be reached and a seasonal note is shown
    #[serde(default)]
    pub degraded: bool,
}

impl Insights {
    /// Static seasonal note for the given (local) moment
    pub fn seasonal<Tz: chrono::TimeZone>(now: DateTime<Tz>) -> Self {
        let message = match now.month() {
            5..=10 => {
                "Rainy season conditions are favorable for mosquito breeding. \
                 Increased rainfall creates more stagnant water sources."
            }
            3..=4 => {
                "Higher temperatures during summer months can accelerate mosquito \
                 development cycles."
            }
            _ => {
                "Current weather patterns suggest moderate mosquito activity. \
                 Monitor standing water sources."
            }
        };

        Self {
            insights: vec![message.to_string()],
            generated_at: now.with_timezone(&Utc).to_rfc3339(),
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Manila;

    fn report() -> CaseReport {
        CaseReport {
            barangay: "tinago".to_string(),
            name: "Juan Dela Cruz".to_string(),
            age: "34".to_string(),
            sex: "M".to_string(),
            address: "Purok 3".to_string(),
            date_reported: "2024-06-03".to_string(),
            time_reported: "09:30".to_string(),
            reported_by: "BHW".to_string(),
            fever: true,
            symptom_onset_date: Some("  ".to_string()),
            remarks: Some(" needs follow-up ".to_string()),
            ..CaseReport::default()
        }
    }

    #[test]
    fn test_valid_report_is_normalized() {
        let report = report()
            .validated(&BarangayRegistry::naga_city())
            .unwrap();

        assert_eq!(report.barangay, "Tinago");
        assert_eq!(report.symptom_onset_date, None);
        assert_eq!(report.remarks.as_deref(), Some("needs follow-up"));
        assert!(report.fever);
    }

    #[test]
    fn test_missing_field() {
        let mut bad = report();
        bad.reported_by = "   ".to_string();
        assert_eq!(
            bad.validated(&BarangayRegistry::naga_city()),
            Err(ReportError::MissingField("reportedBy"))
        );
    }

    #[test]
    fn test_unknown_barangay() {
        let mut bad = report();
        bad.barangay = "Zone II".to_string();
        assert_eq!(
            bad.validated(&BarangayRegistry::naga_city()),
            Err(ReportError::UnknownBarangay("Zone II".to_string()))
        );
    }

    #[test]
    fn test_bad_dates() {
        let mut bad = report();
        bad.date_reported = "06/03/2024".to_string();
        assert!(matches!(
            bad.validated(&BarangayRegistry::naga_city()),
            Err(ReportError::InvalidDate {
                field: "dateReported",
                ..
            })
        ));

        let mut bad = report();
        bad.symptom_onset_date = Some("yesterday".to_string());
        assert!(matches!(
            bad.validated(&BarangayRegistry::naga_city()),
            Err(ReportError::InvalidDate {
                field: "symptomOnsetDate",
                ..
            })
        ));
    }

    #[test]
    fn test_camel_case_wire_format() {
        let report: CaseReport = serde_json::from_value(serde_json::json!({
            "barangay": "Balatas",
            "dateReported": "2024-06-03",
            "musclePain": true,
            "referredToFacility": true
        }))
        .unwrap();

        assert!(report.muscle_pain);
        assert!(report.referred_to_facility);
        assert_eq!(report.date_reported, "2024-06-03");
        assert_eq!(report.name, "");
    }

    #[test]
    fn test_seasonal_insights() {
        let august = Manila.with_ymd_and_hms(2024, 8, 1, 9, 0, 0).unwrap();
        let april = Manila.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
        let january = Manila.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        assert!(Insights::seasonal(august).insights[0].starts_with("Rainy season"));
        assert!(Insights::seasonal(april).insights[0].contains("summer"));
        assert!(Insights::seasonal(january).insights[0].contains("moderate"));
        assert!(Insights::seasonal(january).degraded);
    }

    #[test]
    fn test_upload_kind_from_path() {
        assert_eq!(UploadKind::from_path("climate"), Some(UploadKind::Climate));
        assert_eq!(UploadKind::from_path("dengue"), Some(UploadKind::Dengue));
        assert_eq!(UploadKind::from_path("weather"), None);
    }
}
