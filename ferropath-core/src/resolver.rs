use log::debug;

use crate::crs::CrsTransformer;
use crate::store::StoreSession;
use crate::{Error, NodeId};

/// Graph node nearest to a query point, in both reference systems
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub lon: f64,
    pub lat: f64,
    /// Distance from the query point in projected units
    pub distance: f64,
}

/// Snaps geographic points to the nearest graph node
#[derive(Debug, Clone, Copy)]
pub struct NodeResolver<'a> {
    transformer: &'a CrsTransformer,
}

impl<'a> NodeResolver<'a> {
    pub fn new(transformer: &'a CrsTransformer) -> Self {
        Self { transformer }
    }

    /// Nearest node to (`lat`, `lon`), `None` when the graph has no nodes.
    ///
    /// Equidistant nodes are resolved in whatever order the spatial index
    /// yields them.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCoordinate`] for a non-finite or out-of-range point,
    /// raised before the store is queried.
    pub fn resolve<S: StoreSession>(
        &self,
        session: &S,
        lat: f64,
        lon: f64,
    ) -> Result<Option<ResolvedNode>, Error> {
        let (x, y) = self.transformer.to_projected(lon, lat)?;
        let Some(nearest) = session.nearest_node(x, y)? else {
            debug!("No node near ({lon}, {lat}): empty graph");
            return Ok(None);
        };

        let (node_x, node_y) = (nearest.node.geometry.x(), nearest.node.geometry.y());
        let (node_lon, node_lat) = self.transformer.to_geographic(node_x, node_y)?;
        debug!(
            "Resolved ({lon}, {lat}) to node {} at {:.2} units",
            nearest.node.id, nearest.distance
        );

        Ok(Some(ResolvedNode {
            node_id: nearest.node.id,
            x: node_x,
            y: node_y,
            lon: node_lon,
            lat: node_lat,
            distance: nearest.distance,
        }))
    }
}

#[cfg(test)]
mod tests {
    use geo::LineString;

    use super::*;
    use crate::crs::{MTM_ZONE_7_EPSG, WGS84_EPSG};
    use crate::model::Edge;
    use crate::store::{Deadline, SpatialStore, SqliteStore};

    #[test]
    fn node_at_query_point_has_zero_distance() {
        let transformer = CrsTransformer::new(WGS84_EPSG, MTM_ZONE_7_EPSG).unwrap();
        let (ax, ay) = transformer.to_projected(-71.2080, 46.8139).unwrap();
        let (bx, by) = (ax + 150.0, ay);

        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = store.acquire(Deadline::none()).unwrap();
        session
            .replace_network(
                vec![Edge::new(1, LineString::from(vec![(ax, ay), (bx, by)]), 150.0)],
                1.0,
            )
            .unwrap();

        let resolver = NodeResolver::new(&transformer);
        let (lon, lat) = transformer.to_geographic(bx, by).unwrap();
        let node = resolver.resolve(&session, lat, lon).unwrap().unwrap();
        assert_eq!(node.node_id, 2);
        assert!(node.distance < 1e-6, "distance = {}", node.distance);
        assert!((node.lon - lon).abs() < 1e-9 && (node.lat - lat).abs() < 1e-9);

        let near_a = resolver.resolve(&session, 46.8139, -71.2080).unwrap().unwrap();
        assert_eq!(near_a.node_id, 1);
        assert!((near_a.x - ax).abs() < 1e-9);
    }

    #[test]
    fn empty_graph_and_bad_input() {
        let transformer = CrsTransformer::new(WGS84_EPSG, MTM_ZONE_7_EPSG).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.acquire(Deadline::none()).unwrap();
        let resolver = NodeResolver::new(&transformer);

        assert!(resolver.resolve(&session, 46.8, -71.2).unwrap().is_none());
        assert!(matches!(
            resolver.resolve(&session, f64::NAN, -71.2),
            Err(Error::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            resolver.resolve(&session, 95.0, -71.2),
            Err(Error::InvalidCoordinate { .. })
        ));
    }
}
