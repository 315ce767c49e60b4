//! Embedded SQLite implementation of the spatial store.
//!
//! Relations:
//! - `addresses(id, display_name, search_key, lon, lat)`, `search_key` being
//!   the lowercased label
//! - `streets(edge_id, source, target, cost, reverse_cost, geometry)`, the
//!   geometry stored as a JSON array of `[x, y]` pairs
//! - `streets_vertices(id, x, y)`
//!
//! Reads go through a [`RoutingGraph`] built from the last two relations on
//! first use and dropped whenever the network is replaced.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use geo::{LineString, Point};
use hashbrown::HashMap;
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::pool::{ConnectionPool, PooledConnection};
use super::{Deadline, NearestNode, Relation, RoutingGraph, SpatialStore, StoreSession};
use crate::model::{Address, Edge, Node, PathRow};
use crate::network::{TopologyBuild, build_topology};
use crate::routing::dijkstra::dijkstra_path;
use crate::{EdgeId, Error, NodeId};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: ConnectionPool,
    graph: RwLock<Option<Arc<RoutingGraph>>>,
    queries: AtomicU64,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` with `pool_size` connections.
    pub fn open(path: impl AsRef<Path>, pool_size: usize) -> Result<Self, Error> {
        let path = path.as_ref();
        let connections = (0..pool_size.max(1))
            .map(|_| open_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Opened spatial store {} with {} connections",
            path.display(),
            connections.len()
        );
        Ok(Self::with_connections(connections))
    }

    /// Private in-memory database behind a single connection
    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self::with_connections(vec![Connection::open_in_memory()?]))
    }

    fn with_connections(connections: Vec<Connection>) -> Self {
        Self {
            pool: ConnectionPool::new(connections),
            graph: RwLock::new(None),
            queries: AtomicU64::new(0),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Number of storage queries issued so far
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn routing_graph(&self, conn: &Connection) -> Result<Arc<RoutingGraph>, Error> {
        if let Some(graph) = self
            .graph
            .read()
            .map_err(|_| Error::unavailable("routing graph lock poisoned"))?
            .as_ref()
        {
            return Ok(Arc::clone(graph));
        }

        let mut slot = self
            .graph
            .write()
            .map_err(|_| Error::unavailable("routing graph lock poisoned"))?;
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }

        let nodes = load_nodes(conn)?;
        let edges = load_edges(conn)?;
        let graph = Arc::new(RoutingGraph::new(nodes, &edges));
        info!(
            "Routing graph loaded: {} nodes, {} edges",
            graph.node_count(),
            edges.len()
        );
        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    fn invalidate_graph(&self) {
        if let Ok(mut slot) = self.graph.write() {
            *slot = None;
        }
    }
}

impl SpatialStore for SqliteStore {
    type Session<'a> = SqliteSession<'a>;

    fn acquire(&self, deadline: Deadline) -> Result<SqliteSession<'_>, Error> {
        deadline.check()?;
        let conn = self.pool.get(deadline)?;
        Ok(SqliteSession {
            store: self,
            conn,
            deadline,
        })
    }
}

pub struct SqliteSession<'a> {
    store: &'a SqliteStore,
    conn: PooledConnection<'a>,
    deadline: Deadline,
}

impl SqliteSession<'_> {
    fn begin(&self) -> Result<(), Error> {
        self.deadline.check()?;
        self.store.queries.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl StoreSession for SqliteSession<'_> {
    fn deadline(&self) -> Deadline {
        self.deadline
    }

    fn relation_count(&self, relation: Relation) -> Result<u64, Error> {
        self.begin()?;
        if !table_exists(&self.conn, relation)? {
            return Ok(0);
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", relation.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn replace_addresses(&mut self, addresses: &[Address]) -> Result<usize, Error> {
        self.begin()?;
        write_addresses(&mut self.conn, addresses).map_err(Error::ingestion)?;
        info!("Address relation replaced with {} records", addresses.len());
        Ok(addresses.len())
    }

    fn search_addresses(
        &self,
        needle: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Address>, Error> {
        self.begin()?;
        if !table_exists(&self.conn, Relation::Addresses)? {
            return Ok(Vec::new());
        }
        // negative LIMIT means no limit
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare_cached(
            "SELECT display_name, lon, lat FROM addresses \
             WHERE instr(search_key, ?1) > 0 ORDER BY id LIMIT ?2",
        )?;
        let addresses = stmt
            .query_map(params![needle.to_lowercase(), limit], |row| {
                Ok(Address::new(
                    row.get::<_, String>(0)?,
                    row.get(1)?,
                    row.get(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Address search '{needle}' matched {}", addresses.len());
        Ok(addresses)
    }

    fn replace_network(
        &mut self,
        edges: Vec<Edge>,
        snap_tolerance: f64,
    ) -> Result<TopologyBuild, Error> {
        self.begin()?;
        let topology = build_topology(edges, snap_tolerance)?;
        let geometries = topology
            .edges
            .iter()
            .map(|edge| encode_line(&edge.geometry))
            .collect::<Result<Vec<_>, _>>()?;

        write_network(&mut self.conn, &topology, &geometries).map_err(Error::ingestion)?;
        self.store.invalidate_graph();
        info!(
            "Street relations replaced: {} edges, {} vertices",
            topology.edges.len(),
            topology.nodes.len()
        );
        Ok(topology)
    }

    fn nearest_node(&self, x: f64, y: f64) -> Result<Option<NearestNode>, Error> {
        self.begin()?;
        let graph = self.store.routing_graph(&self.conn)?;
        Ok(graph.nearest(x, y).map(|(node, distance_2)| NearestNode {
            node: node.clone(),
            distance: distance_2.sqrt(),
        }))
    }

    fn shortest_path(
        &self,
        start: NodeId,
        end: NodeId,
        directed: bool,
    ) -> Result<Vec<PathRow>, Error> {
        self.begin()?;
        let graph = self.store.routing_graph(&self.conn)?;
        dijkstra_path(&graph, start, end, directed, self.deadline)
    }

    fn edge_geometries(
        &self,
        ids: &[EdgeId],
    ) -> Result<HashMap<EdgeId, LineString<f64>>, Error> {
        self.begin()?;
        let mut geometries = HashMap::with_capacity(ids.len());
        if ids.is_empty() || !table_exists(&self.conn, Relation::Streets)? {
            return Ok(geometries);
        }

        let mut stmt = self
            .conn
            .prepare_cached("SELECT geometry FROM streets WHERE edge_id = ?1")?;
        for &id in ids {
            self.deadline.check()?;
            let encoded: Option<String> = stmt.query_row([id], |row| row.get(0)).optional()?;
            if let Some(encoded) = encoded {
                geometries.insert(id, decode_line(&encoded).map_err(Error::unavailable)?);
            }
        }
        Ok(geometries)
    }

    fn edges(&self) -> Result<Vec<Edge>, Error> {
        self.begin()?;
        load_edges(&self.conn)
    }

    fn nodes(&self) -> Result<Vec<Node>, Error> {
        self.begin()?;
        load_nodes(&self.conn)
    }
}

fn open_file(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous  = NORMAL;",
    )?;
    Ok(conn)
}

fn table_exists(conn: &Connection, relation: Relation) -> Result<bool, Error> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [relation.table_name()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn write_addresses(conn: &mut Connection, addresses: &[Address]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS addresses;
         CREATE TABLE addresses (
             id           INTEGER PRIMARY KEY,
             display_name TEXT NOT NULL,
             search_key   TEXT NOT NULL,
             lon          REAL NOT NULL,
             lat          REAL NOT NULL
         );",
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO addresses (display_name, search_key, lon, lat) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for address in addresses {
            stmt.execute(params![
                address.display_name,
                address.display_name.to_lowercase(),
                address.lon(),
                address.lat(),
            ])?;
        }
    }
    tx.commit()
}

fn write_network(
    conn: &mut Connection,
    topology: &TopologyBuild,
    geometries: &[String],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS streets;
         DROP TABLE IF EXISTS streets_vertices;
         CREATE TABLE streets (
             edge_id      INTEGER PRIMARY KEY,
             source       INTEGER,
             target       INTEGER,
             cost         REAL NOT NULL,
             reverse_cost REAL NOT NULL,
             geometry     TEXT NOT NULL
         );
         CREATE TABLE streets_vertices (
             id INTEGER PRIMARY KEY,
             x  REAL NOT NULL,
             y  REAL NOT NULL
         );
         CREATE INDEX streets_source_idx ON streets (source);
         CREATE INDEX streets_target_idx ON streets (target);",
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO streets (edge_id, source, target, cost, reverse_cost, geometry) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (edge, geometry) in topology.edges.iter().zip(geometries) {
            stmt.execute(params![
                edge.id,
                edge.source,
                edge.target,
                edge.cost,
                edge.reverse_cost,
                geometry,
            ])?;
        }

        let mut stmt = tx.prepare("INSERT INTO streets_vertices (id, x, y) VALUES (?1, ?2, ?3)")?;
        for node in &topology.nodes {
            stmt.execute(params![node.id, node.geometry.x(), node.geometry.y()])?;
        }
    }
    tx.commit()
}

fn load_edges(conn: &Connection) -> Result<Vec<Edge>, Error> {
    if !table_exists(conn, Relation::Streets)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT edge_id, source, target, cost, reverse_cost, geometry \
         FROM streets ORDER BY edge_id",
    )?;
    let edges = stmt
        .query_map([], edge_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let encoded: String = row.get(5)?;
    let geometry = decode_line(&encoded)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Edge {
        id: row.get(0)?,
        source: row.get(1)?,
        target: row.get(2)?,
        cost: row.get(3)?,
        reverse_cost: row.get(4)?,
        geometry,
    })
}

fn load_nodes(conn: &Connection) -> Result<Vec<Node>, Error> {
    if !table_exists(conn, Relation::Vertices)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare("SELECT id, x, y FROM streets_vertices ORDER BY id")?;
    let nodes = stmt
        .query_map([], |row| {
            Ok(Node {
                id: row.get(0)?,
                geometry: Point::new(row.get(1)?, row.get(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nodes)
}

fn encode_line(line: &LineString<f64>) -> Result<String, Error> {
    let coords: Vec<[f64; 2]> = line.coords().map(|c| [c.x, c.y]).collect();
    serde_json::to_string(&coords).map_err(Error::ingestion)
}

fn decode_line(encoded: &str) -> Result<LineString<f64>, serde_json::Error> {
    let coords: Vec<[f64; 2]> = serde_json::from_str(encoded)?;
    Ok(coords.into_iter().map(|[x, y]| (x, y)).collect())
}
