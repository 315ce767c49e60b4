use geo::{Coord, Euclidean, Geometry, Length, LineString, MultiLineString};
use hashbrown::HashSet;
use log::{info, warn};
use rayon::prelude::*;

use super::analysis::GraphAnalysis;
use crate::crs::{CrsKind, CrsTransformer};
use crate::model::{Edge, StreetSegment};
use crate::store::StoreSession;
use crate::Error;

/// Summary of a completed network build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub edges: usize,
    pub nodes: usize,
    pub repaired_geometries: usize,
    pub reduced_multipart: usize,
    pub analysis: GraphAnalysis,
}

/// Turns raw street segments into a routable edge set and has the store
/// build its topology.
///
/// A build always replaces the whole network. Running it twice on the same
/// input leaves the store with the same edges and nodes.
pub struct NetworkBuilder<'a> {
    transformer: &'a CrsTransformer,
    source_crs: CrsKind,
    snap_tolerance: f64,
}

struct PreparedEdge {
    edge: Edge,
    repaired: bool,
    reduced: bool,
}

impl<'a> NetworkBuilder<'a> {
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCrs`] if `source_epsg` is neither the
    /// transformer's projected system nor a geographic one.
    pub fn new(
        transformer: &'a CrsTransformer,
        source_epsg: u32,
        snap_tolerance: f64,
    ) -> Result<Self, Error> {
        Ok(Self {
            transformer,
            source_crs: transformer.classify(source_epsg)?,
            snap_tolerance,
        })
    }

    /// Prepares every segment, then replaces the stored network and its
    /// topology in one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IngestionFailure`] if any segment cannot be turned
    /// into an edge, ids are duplicated, or the store rejects the build. The
    /// previously stored network is left untouched in every error case.
    pub fn build<S: StoreSession>(
        &self,
        session: &mut S,
        segments: Vec<StreetSegment>,
    ) -> Result<BuildReport, Error> {
        if segments.is_empty() {
            return Err(Error::ingestion("street source contains no segments"));
        }
        info!("Preparing {} street segments", segments.len());

        let prepared = segments
            .into_par_iter()
            .map(|segment| self.prepare(segment))
            .collect::<Result<Vec<_>, _>>()?;

        let repaired_geometries = prepared.iter().filter(|p| p.repaired).count();
        let reduced_multipart = prepared.iter().filter(|p| p.reduced).count();
        if repaired_geometries > 0 {
            warn!("Repaired {repaired_geometries} invalid street geometries");
        }
        if reduced_multipart > 0 {
            warn!(
                "Reduced {reduced_multipart} multi-part street geometries to their first part"
            );
        }

        let edges: Vec<Edge> = prepared.into_iter().map(|p| p.edge).collect();
        check_unique_ids(&edges)?;

        let topology = session.replace_network(edges, self.snap_tolerance)?;
        let analysis = GraphAnalysis::from_edges(&topology.edges);
        info!(
            "Street network built: {} edges, {} nodes, {} components, {} dead ends, {} isolated segments",
            topology.edges.len(),
            topology.nodes.len(),
            analysis.components,
            analysis.dead_ends,
            analysis.isolated_segments
        );

        Ok(BuildReport {
            edges: topology.edges.len(),
            nodes: topology.nodes.len(),
            repaired_geometries,
            reduced_multipart,
            analysis,
        })
    }

    fn prepare(&self, segment: StreetSegment) -> Result<PreparedEdge, Error> {
        let id = segment.external_id;
        let repaired = !is_valid_geometry(&segment.geometry);
        let geometry = repair_geometry(segment.geometry);
        let reduced = matches!(&geometry, Geometry::MultiLineString(m) if m.0.len() > 1);

        let line = normalize_to_single_line(geometry)
            .filter(is_valid_line)
            .ok_or_else(|| {
                Error::ingestion(format!("street {id} has no usable linear geometry"))
            })?;

        let line = match self.source_crs {
            CrsKind::Projected => line,
            CrsKind::Geographic => self
                .transformer
                .line_to_projected(&line)
                .map_err(|e| Error::ingestion(format!("street {id}: {e}")))?,
        };

        let cost = compute_cost(&line);
        if !cost.is_finite() || cost < 0.0 {
            return Err(Error::ingestion(format!("street {id} has invalid cost {cost}")));
        }

        log::trace!("Prepared street {id} with cost {cost:.3}");
        Ok(PreparedEdge {
            edge: Edge::new(id, line, cost),
            repaired,
            reduced,
        })
    }
}

fn check_unique_ids(edges: &[Edge]) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(edges.len());
    for edge in edges {
        if !seen.insert(edge.id) {
            return Err(Error::ingestion(format!("duplicate street id {}", edge.id)));
        }
    }
    Ok(())
}

/// A line is valid when all vertices are finite and at least two differ.
pub fn is_valid_line(line: &LineString<f64>) -> bool {
    let finite = line.coords().all(|c| c.x.is_finite() && c.y.is_finite());
    finite
        && line
            .0
            .first()
            .is_some_and(|first| line.coords().any(|c| c != first))
}

fn is_valid_geometry(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::LineString(line) => is_valid_line(line),
        Geometry::MultiLineString(multi) => !multi.0.is_empty() && multi.0.iter().all(is_valid_line),
        _ => false,
    }
}

/// Zero-width cleanup: drops non-finite vertices and collapses repeated ones.
fn clean_line(line: &LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = line
        .coords()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .copied()
        .collect();
    coords.dedup();
    LineString::new(coords)
}

/// Returns valid linear geometry unchanged. Otherwise the geometry is
/// buffered by zero: vertices are cleaned and areal input is reduced to the
/// boundary of its shell, yielding a line derived from the polygon.
///
/// Deterministic: the same invalid input always yields the same output.
pub fn repair_geometry(geometry: Geometry<f64>) -> Geometry<f64> {
    if is_valid_geometry(&geometry) {
        return geometry;
    }
    match geometry {
        Geometry::LineString(line) => Geometry::LineString(clean_line(&line)),
        Geometry::Line(line) => Geometry::LineString(clean_line(&LineString::from(line))),
        Geometry::MultiLineString(multi) => MultiLineString::new(
            multi
                .0
                .iter()
                .map(clean_line)
                .filter(is_valid_line)
                .collect(),
        )
        .into(),
        Geometry::Polygon(polygon) => Geometry::LineString(clean_line(polygon.exterior())),
        Geometry::MultiPolygon(multi) => MultiLineString::new(
            multi
                .0
                .iter()
                .map(|polygon| clean_line(polygon.exterior()))
                .filter(is_valid_line)
                .collect(),
        )
        .into(),
        other => other,
    }
}

/// Reduces multi-part geometry to its first part, in input order. The other
/// parts are dropped, not merged. Non-linear geometry yields `None`.
pub fn normalize_to_single_line(geometry: Geometry<f64>) -> Option<LineString<f64>> {
    match geometry {
        Geometry::LineString(line) => Some(line),
        Geometry::MultiLineString(multi) => multi.0.into_iter().next(),
        _ => None,
    }
}

/// Planar length; the line must already be in the projected system.
pub fn compute_cost(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiLineString, Polygon, line_string};

    use super::*;
    use crate::crs::{MTM_ZONE_7_EPSG, WGS84_EPSG};
    use crate::store::{Deadline, SpatialStore, SqliteStore, StoreSession};

    fn segment(id: i64, geometry: Geometry<f64>) -> StreetSegment {
        StreetSegment {
            external_id: id,
            geometry,
            attributes: serde_json::Map::new(),
        }
    }

    fn transformer() -> CrsTransformer {
        CrsTransformer::new(WGS84_EPSG, MTM_ZONE_7_EPSG).unwrap()
    }

    #[test]
    fn valid_geometry_is_returned_unchanged() {
        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)].into();
        assert_eq!(repair_geometry(line.clone()), line);
    }

    #[test]
    fn invalid_line_is_cleaned() {
        let line: Geometry<f64> = LineString::from(vec![
            (0.0, 0.0),
            (0.0, 0.0),
            (f64::NAN, 1.0),
            (10.0, 0.0),
        ])
        .into();
        let repaired = repair_geometry(line.clone());
        assert_eq!(
            repaired,
            Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]))
        );
        assert_eq!(repair_geometry(line), repaired);
    }

    #[test]
    fn polygon_repairs_to_its_shell() {
        let polygon = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]),
            vec![],
        );
        let repaired = repair_geometry(polygon.into());
        let line = normalize_to_single_line(repaired).unwrap();
        assert_eq!(line.0.len(), 4);
    }

    #[test]
    fn multipart_keeps_first_part() {
        let multi = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
            LineString::from(vec![(5.0, 5.0), (6.0, 5.0)]),
        ]);
        let line = normalize_to_single_line(multi.into()).unwrap();
        assert_eq!(line, LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]));
    }

    #[test]
    fn points_are_not_streets() {
        let point: Geometry<f64> = geo::Point::new(1.0, 1.0).into();
        assert!(normalize_to_single_line(repair_geometry(point)).is_none());
    }

    #[test]
    fn cost_is_planar_length() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0), (x: 3.0, y: 10.0)];
        assert!((compute_cost(&line) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn geographic_input_is_measured_after_projection() {
        let transformer = transformer();
        let builder = NetworkBuilder::new(&transformer, WGS84_EPSG, 1.0).unwrap();
        // about 111 m of latitude near Québec City
        let line: Geometry<f64> =
            line_string![(x: -71.2, y: 46.8), (x: -71.2, y: 46.801)].into();
        let prepared = builder.prepare(segment(1, line)).unwrap();
        assert!(
            (prepared.edge.cost - 111.1).abs() < 1.0,
            "cost = {}",
            prepared.edge.cost
        );
        assert!(prepared.edge.geometry.0[0].x > 200_000.0);
    }

    #[test]
    fn build_links_every_edge() {
        let transformer = transformer();
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = store.acquire(Deadline::none()).unwrap();
        let builder = NetworkBuilder::new(&transformer, MTM_ZONE_7_EPSG, 1.0).unwrap();

        let report = builder
            .build(
                &mut session,
                vec![
                    segment(1, line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 100.0)].into()),
                    segment(2, line_string![(x: 0.0, y: 100.0), (x: 0.0, y: 200.0)].into()),
                ],
            )
            .unwrap();

        assert_eq!(report.edges, 2);
        assert_eq!(report.nodes, 3);
        assert_eq!(report.analysis.components, 1);
        assert!(session.edges().unwrap().iter().all(Edge::is_linked));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let transformer = transformer();
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = store.acquire(Deadline::none()).unwrap();
        let builder = NetworkBuilder::new(&transformer, MTM_ZONE_7_EPSG, 1.0).unwrap();
        let input = || {
            vec![
                segment(7, line_string![(x: 0.0, y: 0.0), (x: 30.0, y: 40.0)].into()),
                segment(8, line_string![(x: 30.0, y: 40.0), (x: 30.0, y: 90.0)].into()),
                segment(9, line_string![(x: 500.0, y: 500.0), (x: 510.0, y: 500.0)].into()),
            ]
        };

        builder.build(&mut session, input()).unwrap();
        let first = (session.edges().unwrap(), session.nodes().unwrap());
        builder.build(&mut session, input()).unwrap();
        let second = (session.edges().unwrap(), session.nodes().unwrap());

        assert_eq!(first.0.len(), 3);
        assert_eq!(first, second);
        assert!((second.0[0].cost - 50.0).abs() < 1e-9);
    }

    #[test]
    fn failed_build_keeps_previous_network() {
        let transformer = transformer();
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = store.acquire(Deadline::none()).unwrap();
        let builder = NetworkBuilder::new(&transformer, MTM_ZONE_7_EPSG, 1.0).unwrap();

        builder
            .build(
                &mut session,
                vec![segment(1, line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 10.0)].into())],
            )
            .unwrap();

        let duplicated = vec![
            segment(5, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into()),
            segment(5, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)].into()),
        ];
        assert!(matches!(
            builder.build(&mut session, duplicated),
            Err(Error::IngestionFailure(_))
        ));

        let degenerate = vec![segment(
            6,
            LineString::from(vec![(1.0, 1.0), (1.0, 1.0)]).into(),
        )];
        assert!(matches!(
            builder.build(&mut session, degenerate),
            Err(Error::IngestionFailure(_))
        ));

        let edges = session.edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, 1);
    }
}
