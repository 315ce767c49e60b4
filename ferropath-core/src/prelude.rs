pub use crate::DEFAULT_SNAP_TOLERANCE;

// Re-export key components
pub use crate::context::{AppContext, ContextConfig};
pub use crate::init::{InitReport, InitializationGuard};
pub use crate::loading::{DataSource, DataSourceConfig, FileDataSource};
pub use crate::network::{BuildReport, GraphAnalysis, NetworkBuilder};
pub use crate::routing::{RouteOrchestrator, RouteQuery, SelectionStrategy};
pub use crate::store::{Deadline, SpatialStore, SqliteStore, StoreSession};

// Core types for the street network
pub use crate::EdgeId;
pub use crate::NodeId;
pub use crate::model::{Address, Edge, Node, StreetSegment};

// Core types for routing results
pub use crate::model::{PathResult, PathStep, RouteOutcome};
pub use crate::resolver::ResolvedNode;
pub use crate::{CrsTransformer, Error};
