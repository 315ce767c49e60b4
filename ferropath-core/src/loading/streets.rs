use std::fs;
use std::path::Path;

use geojson::{Feature, GeoJson};
use log::info;
use serde_json::Value;

use crate::model::StreetSegment;
use crate::{EdgeId, Error};

/// Reads a GeoJSON file of street lines.
pub fn load_streets(path: &Path, id_property: &str) -> Result<Vec<StreetSegment>, Error> {
    let text = fs::read_to_string(path)?;
    let segments = parse_streets(&text, id_property)?;
    info!(
        "Read {} street segments from {}",
        segments.len(),
        path.display()
    );
    Ok(segments)
}

/// Parses a FeatureCollection (or a single Feature) of linear features.
///
/// The edge id comes from `id_property`, falling back to the feature id.
pub fn parse_streets(text: &str, id_property: &str) -> Result<Vec<StreetSegment>, Error> {
    features(text)?
        .into_iter()
        .enumerate()
        .map(|(position, feature)| segment_from_feature(feature, position, id_property))
        .collect()
}

pub(super) fn features(text: &str) -> Result<Vec<Feature>, Error> {
    match text
        .parse::<GeoJson>()
        .map_err(|e| Error::GeoJsonError(e.to_string()))?
    {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(Error::GeoJsonError(
            "expected a Feature or FeatureCollection, found a bare geometry".to_string(),
        )),
    }
}

fn segment_from_feature(
    feature: Feature,
    position: usize,
    id_property: &str,
) -> Result<StreetSegment, Error> {
    let external_id = feature
        .property(id_property)
        .and_then(integer_id)
        .or_else(|| match &feature.id {
            Some(geojson::feature::Id::Number(n)) => n.as_i64(),
            Some(geojson::feature::Id::String(s)) => s.parse().ok(),
            None => None,
        })
        .ok_or_else(|| {
            Error::InvalidData(format!(
                "street feature #{position} has no integer '{id_property}'"
            ))
        })?;

    let geometry = feature.geometry.ok_or_else(|| {
        Error::InvalidData(format!("street {external_id} has no geometry"))
    })?;
    let geometry = geo::Geometry::<f64>::try_from(geometry)
        .map_err(|e| Error::GeoJsonError(format!("street {external_id}: {e}")))?;

    let mut attributes = feature.properties.unwrap_or_default();
    attributes.remove(id_property);

    Ok(StreetSegment {
        external_id,
        geometry,
        attributes,
    })
}

// i64::MAX is not representable; 2^63 is the first float past it
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn integer_id(value: &Value) -> Option<EdgeId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREETS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "OBJECTID": 101, "NOM": "Rue Saint-Jean" },
                "geometry": { "type": "LineString", "coordinates": [[-71.21, 46.81], [-71.20, 46.81]] }
            },
            {
                "type": "Feature",
                "properties": { "OBJECTID": "102.0" },
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [[[-71.20, 46.81], [-71.19, 46.81]], [[0.0, 0.0], [1.0, 1.0]]]
                }
            },
            {
                "type": "Feature",
                "id": 103,
                "properties": {},
                "geometry": { "type": "LineString", "coordinates": [[-71.19, 46.81], [-71.18, 46.81]] }
            }
        ]
    }"#;

    #[test]
    fn reads_ids_geometry_and_attributes() {
        let result = parse_streets(STREETS, "OBJECTID");
        // "102.0" is not an integer string
        assert!(matches!(result, Err(Error::InvalidData(_))));

        let fixed = STREETS.replace("\"102.0\"", "102.0");
        let segments = parse_streets(&fixed, "OBJECTID").unwrap();
        let ids: Vec<_> = segments.iter().map(|s| s.external_id).collect();
        assert_eq!(ids, [101, 102, 103]);

        assert!(matches!(segments[0].geometry, geo::Geometry::LineString(_)));
        assert!(matches!(segments[1].geometry, geo::Geometry::MultiLineString(_)));
        assert_eq!(segments[0].attributes["NOM"], "Rue Saint-Jean");
        assert!(!segments[0].attributes.contains_key("OBJECTID"));
    }

    #[test]
    fn float_ids_outside_the_integer_range_are_rejected() {
        let huge = r#"{"type": "Feature", "properties": {"OBJECTID": 1e19},
            "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 0.0]]}}"#;
        assert!(matches!(
            parse_streets(huge, "OBJECTID"),
            Err(Error::InvalidData(_))
        ));

        let negative = huge.replace("1e19", "-1e19");
        assert!(matches!(
            parse_streets(&negative, "OBJECTID"),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn rejects_missing_geometry_and_bare_geometries() {
        let no_geometry = r#"{"type": "Feature", "properties": {"OBJECTID": 1}, "geometry": null}"#;
        assert!(parse_streets(no_geometry, "OBJECTID").is_err());

        let bare = r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#;
        assert!(matches!(
            parse_streets(bare, "OBJECTID"),
            Err(Error::GeoJsonError(_))
        ));
    }
}
