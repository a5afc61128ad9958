use axum::http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::BarangayConfig;
use crate::error::HttpError;
use crate::impl_into_response;

#[derive(Error, Debug)]
pub enum BarangayError {
    #[error("Unknown barangay: {0}")]
    Unknown(String),
}

impl HttpError for BarangayError {
    fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    fn error_code(&self) -> Option<&'static str> {
        Some("UNKNOWN_BARANGAY")
    }
}

impl_into_response!(BarangayError);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BarangayInfo {
    pub name: String,
    pub centroid: Centroid,
}

/// The fixed set of barangays every snapshot must cover.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct BarangayRegistry {
    entries: IndexMap<String, Centroid>,
}

/// Naga City barangays and the centroids used for approximate boundaries
const NAGA_CITY: [(&str, f64, f64); 5] = [
    ("Bagumbayan Norte", 13.6250, 123.1850),
    ("Concepcion Grande", 13.6150, 123.1750),
    ("Tinago", 13.6100, 123.1800),
    ("Balatas", 13.6200, 123.1900),
    ("San Felipe", 13.6050, 123.1850),
];

impl BarangayRegistry {
    pub fn new(entries: impl IntoIterator<Item = (String, Centroid)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn naga_city() -> Self {
        Self::new(
            NAGA_CITY
                .iter()
                .map(|(name, lat, lon)| (name.to_string(), Centroid { lat: *lat, lon: *lon })),
        )
    }

    /// Registry from configuration, falling back to the built-in set when none is given
    pub fn from_config(barangays: &[BarangayConfig]) -> Self {
        if barangays.is_empty() {
            return Self::naga_city();
        }

        Self::new(barangays.iter().map(|b| {
            (
                b.name.trim().to_string(),
                Centroid {
                    lat: b.lat,
                    lon: b.lon,
                },
            )
        }))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Centroid)> {
        self.entries.iter().map(|(name, c)| (name.as_str(), *c))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Canonical name for user input (trimmed, case-insensitive)
    pub fn resolve(&self, input: &str) -> Option<&str> {
        let needle = input.trim();
        self.entries
            .keys()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .map(String::as_str)
    }

    pub fn require(&self, input: &str) -> Result<&str, BarangayError> {
        self.resolve(input)
            .ok_or_else(|| BarangayError::Unknown(input.trim().to_string()))
    }

    pub fn list(&self) -> Vec<BarangayInfo> {
        self.iter()
            .map(|(name, centroid)| BarangayInfo {
                name: name.to_string(),
                centroid,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
