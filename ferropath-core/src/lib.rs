//! Street network ingestion and address-to-address routing over an
//! embedded spatial store.

pub mod address_index;
pub mod context;
pub mod crs;
mod error;
pub mod init;
pub mod loading;
pub mod model;
pub mod network;
pub mod prelude;
pub mod resolver;
pub mod routing;
pub mod store;

pub use address_index::AddressIndex;
pub use context::{AppContext, ContextConfig};
pub use crs::{CrsKind, CrsTransformer};
pub use error::Error;
pub use init::{InitReport, InitializationGuard};
pub use model::{Address, Edge, Node, PathResult, PathRow, PathStep, RouteOutcome, StreetSegment};
pub use resolver::{NodeResolver, ResolvedNode};

/// Node identifier assigned by the topology build
pub type NodeId = i64;
/// Edge identifier, equal to the source street id
pub type EdgeId = i64;

/// Endpoints closer than this (projected units) share a node
pub const DEFAULT_SNAP_TOLERANCE: f64 = 1.0;
