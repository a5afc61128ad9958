use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::barangay::{BarangayRegistry, Centroid};

/// Half-width in degrees of the square drawn around a centroid
pub const APPROXIMATE_HALF_WIDTH: f64 = 0.008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Provenance {
    /// Administrative boundary from OpenStreetMap
    Real,
    /// Square around the barangay centroid
    Approximate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundaryPolygon {
    pub barangay: String,
    /// Closed ring of [lat, lon] points, first == last
    #[schema(value_type = Vec<Vec<f64>>)]
    pub ring: Vec<[f64; 2]>,
    pub provenance: Provenance,
}

impl BoundaryPolygon {
    pub fn approximate(barangay: impl Into<String>, centroid: Centroid) -> Self {
        let r = APPROXIMATE_HALF_WIDTH;
        let Centroid { lat, lon } = centroid;

        Self {
            barangay: barangay.into(),
            ring: vec![
                [lat + r, lon - r],
                [lat + r, lon + r],
                [lat - r, lon + r],
                [lat - r, lon - r],
                [lat + r, lon - r],
            ],
            provenance: Provenance::Approximate,
        }
    }

    pub fn real(barangay: impl Into<String>, ring: Vec<[f64; 2]>) -> Self {
        Self {
            barangay: barangay.into(),
            ring,
            provenance: Provenance::Real,
        }
    }
}

/// One polygon per enumerated barangay
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BoundarySnapshot {
    pub generated_at: DateTime<Utc>,
    pub polygons: IndexMap<String, BoundaryPolygon>,
}

impl BoundarySnapshot {
    /// Resolved rings where present, approximations for the rest
    pub fn from_rings(
        registry: &BarangayRegistry,
        mut rings: HashMap<String, Vec<[f64; 2]>>,
    ) -> Self {
        let polygons = registry
            .iter()
            .map(|(name, centroid)| {
                let polygon = match rings.remove(name) {
                    Some(ring) => BoundaryPolygon::real(name, ring),
                    None => BoundaryPolygon::approximate(name, centroid),
                };
                (name.to_string(), polygon)
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            polygons,
        }
    }

    pub fn approximate(registry: &BarangayRegistry) -> Self {
        Self::from_rings(registry, HashMap::new())
    }

    pub fn get(&self, barangay: &str) -> Option<&BoundaryPolygon> {
        self.polygons.get(barangay)
    }

    pub fn approximate_count(&self) -> usize {
        self.polygons
            .values()
            .filter(|p| p.provenance == Provenance::Approximate)
            .count()
    }
}

// ============================================================================
// Overpass payload (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub members: Vec<OverpassMember>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassMember {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub geometry: Option<Vec<OverpassPoint>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverpassPoint {
    pub lat: f64,
    pub lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_ring_is_closed_square() {
        let polygon = BoundaryPolygon::approximate(
            "Tinago",
            Centroid {
                lat: 13.61,
                lon: 123.18,
            },
        );

        assert_eq!(polygon.ring.len(), 5);
        assert_eq!(polygon.ring.first(), polygon.ring.last());
        assert_eq!(polygon.ring[1], [13.61 + 0.008, 123.18 + 0.008]);
        assert_eq!(polygon.ring[3], [13.61 - 0.008, 123.18 - 0.008]);
        assert_eq!(polygon.provenance, Provenance::Approximate);
    }

    #[test]
    fn test_snapshot_covers_registry() {
        let registry = BarangayRegistry::naga_city();
        let mut rings = HashMap::new();
        rings.insert(
            "Balatas".to_string(),
            vec![[1.0, 1.0], [1.0, 2.0], [2.0, 2.0], [1.0, 1.0]],
        );

        let snapshot = BoundarySnapshot::from_rings(&registry, rings);

        assert_eq!(snapshot.polygons.len(), registry.len());
        assert_eq!(snapshot.get("Balatas").unwrap().provenance, Provenance::Real);
        assert_eq!(snapshot.approximate_count(), registry.len() - 1);
        for polygon in snapshot.polygons.values() {
            assert!(polygon.ring.len() >= 4);
            assert_eq!(polygon.ring.first(), polygon.ring.last());
        }
    }
}
