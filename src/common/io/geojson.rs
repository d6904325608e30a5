use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

/// A single attributed polygon row. Every property is a string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Feature {
    pub properties: BTreeMap<String, String>,
    pub geometry: MultiPolygon<f64>,
}

impl Feature {
    /// Get a required property.
    pub(crate) fn property(&self, key: &str) -> Result<&str> {
        self.properties.get(key)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("[io::geojson] feature is missing property {key:?}"))
    }
}

/// Write features to GeoJSON bytes.
/// Property keys are emitted in sorted order, so equal inputs produce equal bytes.
pub(crate) fn write_to_geojson_bytes(features: &[Feature]) -> Result<Vec<u8>> {
    let features = features.iter()
        .map(|feature| {
            let polygons = feature.geometry.0.iter()
                .map(|polygon| std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>())
                    .collect::<Vec<_>>())
                .collect::<Vec<_>>();

            json!({
                "type": "Feature",
                "properties": feature.properties,
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": polygons,
                },
            })
        })
        .collect::<Vec<_>>();

    let feature_collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    serde_json::to_vec(&feature_collection).context("[io::geojson] Failed to serialize GeoJSON to bytes")
}

/// Read features from GeoJSON bytes.
/// Accepts Polygon and MultiPolygon geometries; non-string properties are coerced to strings.
pub(crate) fn read_from_geojson_bytes(bytes: &[u8]) -> Result<Vec<Feature>> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] Failed to parse GeoJSON bytes")?;
    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson] expected a FeatureCollection with a `features` array"))?;

    features.iter().enumerate()
        .map(|(i, feature)| {
            let properties = feature["properties"].as_object()
                .map(|props| props.iter()
                    .map(|(key, value)| (key.clone(), property_to_string(value)))
                    .collect())
                .unwrap_or_default();

            let geometry = parse_geometry(&feature["geometry"])
                .with_context(|| format!("[io::geojson] invalid geometry in feature {i}"))?;

            Ok(Feature { properties, geometry })
        })
        .collect()
}

/// Render a property value as a string.
fn property_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_geometry(geometry: &Value) -> Result<MultiPolygon<f64>> {
    let coords = geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("missing coordinates"))?;

    match geometry["type"].as_str() {
        Some("MultiPolygon") => Ok(MultiPolygon(
            coords.iter()
                .map(|polygon| parse_polygon(polygon))
                .collect::<Result<Vec<_>>>()?
        )),
        Some("Polygon") => Ok(MultiPolygon(vec![parse_polygon(&geometry["coordinates"])?])),
        other => bail!("unsupported geometry type {other:?}"),
    }
}

/// Parse `[exterior, hole, hole, ...]` into a polygon.
fn parse_polygon(rings: &Value) -> Result<Polygon<f64>> {
    let rings = rings.as_array()
        .ok_or_else(|| anyhow!("polygon must be an array of rings"))?
        .iter()
        .map(parse_ring)
        .collect::<Result<Vec<_>>>()?;

    let mut rings = rings.into_iter();
    let exterior = rings.next().ok_or_else(|| anyhow!("polygon is missing its exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Parse a ring `[[x, y], [x, y], ...]`, closing it if needed.
fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
    let mut points = ring.as_array()
        .ok_or_else(|| anyhow!("ring must be an array of positions"))?
        .iter()
        .map(|position| {
            let x = position[0].as_f64().ok_or_else(|| anyhow!("x must be a number"))?;
            let y = position[1].as_f64().ok_or_else(|| anyhow!("y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;

    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn properties_are_coerced_to_strings() {
        let bytes = br#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"id": 42101000100, "name": "Tract 1", "note": null},
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}
            }]
        }"#;

        let features = read_from_geojson_bytes(bytes).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].property("id").unwrap(), "42101000100");
        assert_eq!(features[0].property("name").unwrap(), "Tract 1");
        assert_eq!(features[0].property("note").unwrap(), "");
        // Ring was closed on read.
        assert_eq!(features[0].geometry.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn written_features_read_back() {
        let feature = Feature {
            properties: BTreeMap::from([("id".to_string(), "001".to_string())]),
            geometry: MultiPolygon(vec![polygon![
                (x: 0.5, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.25), (x: 0.5, y: 0.0),
            ]]),
        };

        let bytes = write_to_geojson_bytes(std::slice::from_ref(&feature)).unwrap();
        let back = read_from_geojson_bytes(&bytes).unwrap();
        assert_eq!(back, vec![feature]);
    }

    #[test]
    fn unsupported_geometry_is_an_error() {
        let bytes = br#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}
        ]}"#;
        assert!(read_from_geojson_bytes(bytes).is_err());
    }
}
