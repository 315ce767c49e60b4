use geojson::{Feature, FeatureCollection, Geometry, GeometryValue};
use serde_json::json;

use crate::Error;
use crate::model::{PathResult, PathStep};

impl PathResult {
    /// Converts the traversed edges to a `GeoJSON` `FeatureCollection`, one
    /// feature per edge in path order. An empty path gives an empty
    /// collection.
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let features = self
            .steps
            .iter()
            .filter(|step| step.edge.is_some())
            .map(create_step_feature)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_geojson()?).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}

fn create_step_feature(step: &PathStep) -> Result<Feature, Error> {
    let geometry = step
        .geometry
        .as_ref()
        .map(|line| Geometry::new(GeometryValue::from(line)));

    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "seq": step.seq,
            "path_seq": step.path_seq,
            "node": step.node,
            "edge": step.edge,
            "cost": step.cost,
        }
    });

    serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use geo::line_string;

    use super::*;

    #[test]
    fn one_feature_per_edge() {
        let path = PathResult::new(vec![
            PathStep {
                seq: 1,
                path_seq: 1,
                node: 1,
                edge: Some(10),
                cost: 100.0,
                geometry: Some(line_string![(x: -71.2, y: 46.8), (x: -71.2, y: 46.801)]),
            },
            PathStep {
                seq: 2,
                path_seq: 2,
                node: 2,
                edge: None,
                cost: 0.0,
                geometry: None,
            },
        ]);

        let collection = path.to_geojson().unwrap();
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.property("edge"), Some(&json!(10)));
        assert_eq!(feature.property("cost"), Some(&json!(100.0)));
        assert!(feature.geometry.is_some());

        let text = path.to_geojson_string().unwrap();
        assert!(text.contains("\"FeatureCollection\""));
    }

    #[test]
    fn empty_path_gives_empty_collection() {
        let collection = PathResult::empty().to_geojson().unwrap();
        assert!(collection.features.is_empty());
    }
}
