// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GeoJSON ingestion for route and weather responses.
//!
//! Route responses are a FeatureCollection of timestamped Point features
//! (plus an optional LineString for the filed route). Weather responses are
//! a FeatureCollection of Polygon or MultiPolygon storm cells. Malformed
//! features are dropped individually; only a malformed collection is an
//! error.

use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors for route geometry that cannot produce a track.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a FeatureCollection, got {0}")]
    NotFeatureCollection(String),

    #[error("route contains no features")]
    NoFeatures,

    #[error("route contains no valid waypoints")]
    NoValidWaypoints,
}

/// A geographic position in degrees, with altitude in scene distance units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

impl GeoPosition {
    #[must_use]
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }

    /// Build from a GeoJSON coordinate array, rejecting non-finite values.
    fn from_coordinates(coords: &[f64]) -> Option<Self> {
        let (&lon, &lat) = (coords.first()?, coords.get(1)?);
        let alt = coords.get(2).copied().unwrap_or(0.0);
        let valid = lon.is_finite()
            && lat.is_finite()
            && alt.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        valid.then_some(Self { lon, lat, alt })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point {
        #[serde(default)]
        coordinates: Option<Vec<f64>>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// Check the collection type and return its raw feature list.
fn feature_list(value: &Value) -> Result<&[Value], RouteError> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => return Err(RouteError::NotFeatureCollection(other.to_string())),
        None => return Err(RouteError::NotFeatureCollection("nothing".to_string())),
    }
    Ok(value
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default())
}

/// A timestamped point along the route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteWaypoint {
    pub position: GeoPosition,
    pub timestamp: DateTime<Utc>,
    /// Renderer style hints from the `style` property.
    pub style: Map<String, Value>,
    /// Every other property of the feature.
    pub metadata: Map<String, Value>,
}

impl RouteWaypoint {
    /// Display label, from the `name` or `label` property.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        ["name", "label", "ident"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_str))
    }

    fn from_point(coords: &[f64], properties: Map<String, Value>) -> Option<Self> {
        let position = GeoPosition::from_coordinates(coords)?;
        let mut metadata = properties;
        let timestamp = parse_timestamp(metadata.remove("time")?)?;
        let style = match metadata.remove("style") {
            Some(Value::Object(style)) => style,
            _ => Map::new(),
        };
        Some(Self {
            position,
            timestamp,
            style,
            metadata,
        })
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}

/// Validated route geometry, waypoints sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    waypoints: Vec<RouteWaypoint>,
    filed_route: Option<Vec<GeoPosition>>,
    dropped: usize,
}

impl RouteGeometry {
    pub fn from_json_str(text: &str) -> Result<Self, RouteError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, RouteError> {
        let features = feature_list(value)?;
        if features.is_empty() {
            return Err(RouteError::NoFeatures);
        }

        let mut waypoints = Vec::new();
        let mut filed_route = None;
        let mut dropped = 0;

        for raw in features {
            let feature = match Feature::deserialize(raw) {
                Ok(feature) => feature,
                Err(e) => {
                    warn!("Dropping malformed route feature: {}", e);
                    dropped += 1;
                    continue;
                }
            };
            match feature.geometry {
                Some(Geometry::Point {
                    coordinates: Some(coords),
                }) => {
                    let properties = feature.properties.unwrap_or_default();
                    match RouteWaypoint::from_point(&coords, properties) {
                        Some(waypoint) => waypoints.push(waypoint),
                        None => dropped += 1,
                    }
                }
                Some(Geometry::LineString { coordinates }) if filed_route.is_none() => {
                    let line: Vec<_> = coordinates
                        .iter()
                        .filter_map(|c| GeoPosition::from_coordinates(c))
                        .collect();
                    if line.len() >= 2 {
                        filed_route = Some(line);
                    }
                }
                Some(Geometry::Point { coordinates: None }) => dropped += 1,
                _ => {}
            }
        }

        if waypoints.is_empty() {
            return Err(RouteError::NoValidWaypoints);
        }
        if dropped > 0 {
            warn!("Dropped {} route features with invalid coordinates or time", dropped);
        }
        waypoints.sort_by_key(|w| w.timestamp);

        Ok(Self {
            waypoints,
            filed_route,
            dropped,
        })
    }

    /// Waypoints in ascending time order (never empty).
    #[must_use]
    pub fn waypoints(&self) -> &[RouteWaypoint] {
        &self.waypoints
    }

    #[must_use]
    pub fn departure(&self) -> &RouteWaypoint {
        &self.waypoints[0]
    }

    #[must_use]
    pub fn destination(&self) -> &RouteWaypoint {
        &self.waypoints[self.waypoints.len() - 1]
    }

    /// Originally filed route line, if the response carried one.
    #[must_use]
    pub fn filed_route(&self) -> Option<&[GeoPosition]> {
        self.filed_route.as_deref()
    }

    /// Number of point features rejected during ingestion.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Outer boundary of a single storm cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StormCell {
    /// Open ring (the closing vertex is not repeated), at least 3 vertices.
    pub ring: Vec<GeoPosition>,
}

impl StormCell {
    fn from_ring(ring: &[Vec<f64>]) -> Option<Self> {
        let mut vertices: Vec<_> = ring
            .iter()
            .filter_map(|c| GeoPosition::from_coordinates(c))
            .collect();
        vertices.dedup();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        let distinct = vertices
            .iter()
            .enumerate()
            .filter(|(i, v)| !vertices[..*i].contains(v))
            .count();
        (distinct >= 3).then_some(Self { ring: vertices })
    }
}

/// Severe weather geometry for one time bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherGeometry {
    pub cells: Vec<StormCell>,
}

impl WeatherGeometry {
    /// Decode a weather response. Returns `None` when it holds no storm cells.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let features = match feature_list(value) {
            Ok(features) => features,
            Err(e) => {
                warn!("Ignoring weather response: {}", e);
                return None;
            }
        };

        let mut cells = Vec::new();
        for raw in features {
            let Ok(feature) = Feature::deserialize(raw) else {
                continue;
            };
            match feature.geometry {
                Some(Geometry::Polygon { coordinates }) => {
                    cells.extend(coordinates.first().and_then(|r| StormCell::from_ring(r)));
                }
                Some(Geometry::MultiPolygon { coordinates }) => {
                    cells.extend(
                        coordinates
                            .iter()
                            .filter_map(|polygon| StormCell::from_ring(polygon.first()?)),
                    );
                }
                _ => {}
            }
        }

        (!cells.is_empty()).then_some(Self { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(lon: f64, lat: f64, time: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": { "time": time, "name": "WPT", "style": { "color": "red" } }
        })
    }

    #[test]
    fn test_route_sorted_and_split() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                point(-100.0, 38.0, "2024-06-15T12:02:00Z"),
                point(-73.8, 40.6, "2024-06-15T12:00:00Z"),
                { "type": "Feature",
                  "geometry": { "type": "LineString", "coordinates": [[-73.8, 40.6], [-118.4, 33.9]] },
                  "properties": {} },
                point(-118.4, 33.9, "2024-06-15T12:04:00Z"),
            ]
        });
        let route = RouteGeometry::from_json(&value).unwrap();
        assert_eq!(route.waypoints().len(), 3);
        assert!((route.departure().position.lon - -73.8).abs() < 1e-9);
        assert!((route.destination().position.lon - -118.4).abs() < 1e-9);
        assert_eq!(route.filed_route().map(<[_]>::len), Some(2));
        assert_eq!(route.departure().label(), Some("WPT"));
        assert_eq!(route.departure().style.get("color"), Some(&json!("red")));
        assert!(!route.departure().metadata.contains_key("time"));
    }

    #[test]
    fn test_invalid_points_are_dropped() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                point(-73.8, 40.6, "2024-06-15T12:00:00Z"),
                point(-73.8, 95.0, "2024-06-15T12:01:00Z"),
                point(-73.8, 40.6, "not a time"),
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": null }, "properties": { "time": 0 } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": ["x", 1] } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }, "properties": { "time": 1718452800000_i64 } },
            ]
        });
        let route = RouteGeometry::from_json(&value).unwrap();
        assert_eq!(route.waypoints().len(), 2);
        assert_eq!(route.dropped(), 4);
        assert_eq!(
            route.departure().timestamp,
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_wrong_collection_type() {
        let value = json!({ "type": "Feature", "features": [] });
        assert!(matches!(
            RouteGeometry::from_json(&value),
            Err(RouteError::NotFeatureCollection(t)) if t == "Feature"
        ));
        assert!(matches!(
            RouteGeometry::from_json(&json!({ "type": "FeatureCollection", "features": [] })),
            Err(RouteError::NoFeatures)
        ));
        assert!(matches!(
            RouteGeometry::from_json_str("{not json"),
            Err(RouteError::Json(_))
        ));
    }

    #[test]
    fn test_no_valid_waypoints() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [point(500.0, 0.0, "2024-06-15T12:00:00Z")]
        });
        assert!(matches!(
            RouteGeometry::from_json(&value),
            Err(RouteError::NoValidWaypoints)
        ));
    }

    #[test]
    fn test_weather_cells() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Polygon",
                  "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] } },
                { "type": "Feature", "geometry": { "type": "MultiPolygon",
                  "coordinates": [
                    [[[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 3.0]]],
                    [[[5.0, 5.0], [6.0, 6.0]]]
                  ] } },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } }
            ]
        });
        let weather = WeatherGeometry::from_json(&value).unwrap();
        assert_eq!(weather.cells.len(), 2);
        assert_eq!(weather.cells[0].ring.len(), 3);
        assert_eq!(weather.cells[1].ring.len(), 4);
    }

    #[test]
    fn test_degenerate_cells_are_dropped() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Polygon",
                  "coordinates": [[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]] } },
                { "type": "Feature", "geometry": { "type": "Polygon",
                  "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [1.0, 0.0]]] } }
            ]
        });
        assert!(WeatherGeometry::from_json(&value).is_none());

        let repeated = json!({
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "geometry": { "type": "Polygon",
              "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] } }]
        });
        let weather = WeatherGeometry::from_json(&repeated).unwrap();
        assert_eq!(weather.cells[0].ring.len(), 3);
    }

    #[test]
    fn test_empty_weather_is_none() {
        assert!(WeatherGeometry::from_json(&json!({ "type": "FeatureCollection", "features": [] })).is_none());
        assert!(WeatherGeometry::from_json(&json!(null)).is_none());
    }
}
