use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use super::models::*;
use crate::barangay::BarangayRegistry;
use crate::fallback::{settle, with_deadline, DeadlineElapsed, FallbackKind};

#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Failed to query Overpass: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Overpass returned HTTP {0}")]
    ApiError(u16),

    #[error("Overpass returned no usable barangay relation")]
    NoRelations,

    #[error(transparent)]
    Timeout(#[from] DeadlineElapsed),
}

/// Barangay outlines from OpenStreetMap, with centroid squares for whatever
/// the geodata provider cannot supply.
pub struct BoundaryService {
    client: Client,
    overpass_url: String,
    area: String,
    registry: Arc<BarangayRegistry>,
    timeout: Duration,
}

impl BoundaryService {
    pub fn new(
        client: Client,
        overpass_url: impl Into<String>,
        area: impl Into<String>,
        registry: Arc<BarangayRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            overpass_url: overpass_url.into(),
            area: area.into(),
            registry,
            timeout,
        }
    }

    /// Complete polygon set; never fails
    pub async fn boundaries(&self) -> BoundarySnapshot {
        let outcome = with_deadline("overpass", self.timeout, self.fetch_rings())
            .await
            .map_err(BoundaryError::from)
            .and_then(|r| r);

        let rings = settle(FallbackKind::Boundary, outcome, HashMap::new);
        let snapshot = BoundarySnapshot::from_rings(&self.registry, rings);

        let approximate = snapshot.approximate_count();
        if approximate > 0 {
            tracing::info!(
                approximate,
                total = snapshot.polygons.len(),
                "Using approximate boundaries"
            );
        }

        snapshot
    }

    pub fn approximate(&self) -> BoundarySnapshot {
        BoundarySnapshot::approximate(&self.registry)
    }

    async fn fetch_rings(&self) -> Result<HashMap<String, Vec<[f64; 2]>>, BoundaryError> {
        let query = build_query(&self.area, self.registry.names());
        tracing::debug!(url = %self.overpass_url, "Querying Overpass for barangay boundaries");

        let response = self
            .client
            .post(&self.overpass_url)
            .form(&[("data", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BoundaryError::ApiError(response.status().as_u16()));
        }

        let data: OverpassResponse = response.json().await?;
        let rings = rings_from_overpass(data, &self.registry);
        if rings.is_empty() {
            return Err(BoundaryError::NoRelations);
        }

        Ok(rings)
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Overpass QL for the administrative relations of the given barangays
pub fn build_query<'a>(area: &str, names: impl Iterator<Item = &'a str>) -> String {
    let mut query = format!(
        "[out:json][timeout:25];\narea[\"name\"=\"{}\"]->.searchArea;\n(\n",
        quote(area)
    );
    for name in names {
        query.push_str(&format!(
            "  relation[\"boundary\"=\"administrative\"][\"admin_type:PH\"=\"barangay\"][\"name\"=\"{}\"](area.searchArea);\n",
            quote(name)
        ));
    }
    query.push_str(");\nout geom;");
    query
}

/// Outer way geometry per enumerated relation, de-duplicated and closed.
/// Relations with fewer than three distinct points are dropped.
pub fn rings_from_overpass(
    data: OverpassResponse,
    registry: &BarangayRegistry,
) -> HashMap<String, Vec<[f64; 2]>> {
    let mut rings = HashMap::new();

    for element in data.elements {
        if element.kind != "relation" {
            continue;
        }
        let Some(name) = element
            .tags
            .get("name")
            .and_then(|n| registry.resolve(n))
        else {
            continue;
        };

        let mut seen = HashSet::new();
        let mut ring: Vec<[f64; 2]> = element
            .members
            .into_iter()
            .filter(|m| m.kind == "way")
            .filter(|m| matches!(m.role.as_deref(), None | Some("") | Some("outer")))
            .flat_map(|m| m.geometry.unwrap_or_default())
            .filter(|p| seen.insert((p.lat.to_bits(), p.lon.to_bits())))
            .map(|p| [p.lat, p.lon])
            .collect();

        if ring.len() < 3 {
            tracing::debug!(barangay = %name, points = ring.len(), "Boundary relation too small");
            continue;
        }

        ring.push(ring[0]);
        rings.insert(name.to_string(), ring);
    }

    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn relation(name: &str, ways: serde_json::Value) -> serde_json::Value {
        json!({"type": "relation", "id": 1, "tags": {"name": name}, "members": ways})
    }

    fn way(role: &str, points: &[(f64, f64)]) -> serde_json::Value {
        json!({
            "type": "way",
            "ref": 1,
            "role": role,
            "geometry": points.iter().map(|(lat, lon)| json!({"lat": lat, "lon": lon})).collect::<Vec<_>>()
        })
    }

    fn service(url: String) -> BoundaryService {
        BoundaryService::new(
            Client::new(),
            url,
            "Naga City",
            Arc::new(BarangayRegistry::naga_city()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_query_lists_every_barangay() {
        let registry = BarangayRegistry::naga_city();
        let query = build_query("Naga City", registry.names());

        assert!(query.starts_with("[out:json]"));
        assert!(query.contains(r#"area["name"="Naga City"]->.searchArea;"#));
        assert!(query.contains(r#"["name"="Bagumbayan Norte"](area.searchArea);"#));
        assert_eq!(query.matches("relation[").count(), registry.len());
        assert!(query.ends_with("out geom;"));
    }

    #[test]
    fn test_query_escapes_quotes() {
        let query = build_query("Naga \"City\"", std::iter::once("A\\B"));
        assert!(query.contains(r#"area["name"="Naga \"City\""]"#));
        assert!(query.contains(r#"["name"="A\\B"]"#));
    }

    #[test]
    fn test_rings_dedupe_and_close() {
        let data: OverpassResponse = serde_json::from_value(json!({
            "elements": [
                relation("Tinago", json!([
                    way("outer", &[(1.0, 1.0), (1.0, 2.0)]),
                    way("", &[(1.0, 2.0), (2.0, 2.0), (1.0, 1.0)]),
                    way("inner", &[(5.0, 5.0), (6.0, 6.0), (7.0, 7.0)])
                ])),
                relation("Atlantis", json!([way("outer", &[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0)])])),
                relation("Balatas", json!([way("outer", &[(3.0, 3.0), (3.0, 4.0)])]))
            ]
        }))
        .unwrap();

        let rings = rings_from_overpass(data, &BarangayRegistry::naga_city());

        assert_eq!(rings.len(), 1);
        assert_eq!(
            rings["Tinago"],
            vec![[1.0, 1.0], [1.0, 2.0], [2.0, 2.0], [1.0, 1.0]]
        );
    }

    #[tokio::test]
    async fn test_mixes_real_and_approximate() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "elements": [relation("San Felipe", json!([
                way("outer", &[(13.60, 123.18), (13.60, 123.19), (13.61, 123.19), (13.61, 123.18)])
            ]))]
        });
        let mock = server
            .mock("POST", "/api/interpreter")
            .match_body(Matcher::Regex("^data=".to_string()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let snapshot = service(format!("{}/api/interpreter", server.url()))
            .boundaries()
            .await;

        mock.assert_async().await;
        assert_eq!(snapshot.polygons.len(), 5);
        assert_eq!(snapshot.get("San Felipe").unwrap().provenance, Provenance::Real);
        assert_eq!(snapshot.get("San Felipe").unwrap().ring.len(), 5);
        assert_eq!(snapshot.approximate_count(), 4);
    }

    #[tokio::test]
    async fn test_failure_gives_all_approximate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(504)
            .create_async()
            .await;

        let snapshot = service(format!("{}/api/interpreter", server.url()))
            .boundaries()
            .await;

        assert_eq!(snapshot.polygons.len(), 5);
        assert_eq!(snapshot.approximate_count(), 5);
        for polygon in snapshot.polygons.values() {
            assert!(polygon.ring.len() >= 4);
            assert_eq!(polygon.ring.first(), polygon.ring.last());
        }
    }

    #[tokio::test]
    async fn test_empty_result_gives_all_approximate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body(r#"{"elements":[]}"#)
            .create_async()
            .await;

        let snapshot = service(format!("{}/api/interpreter", server.url()))
            .boundaries()
            .await;

        assert_eq!(snapshot.approximate_count(), 5);
    }

    #[tokio::test]
    async fn test_unresponsive_overpass_times_out_to_approximate() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let service = BoundaryService::new(
            Client::new(),
            format!("http://{addr}/api/interpreter"),
            "Naga City",
            Arc::new(BarangayRegistry::naga_city()),
            Duration::from_millis(200),
        );

        let started = std::time::Instant::now();
        let snapshot = service.boundaries().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(snapshot.polygons.len(), 5);
        assert_eq!(snapshot.approximate_count(), 5);
    }
}
