//! Street network ingestion: geometry repair, cost, topology and analysis

pub mod analysis;
pub mod builder;
pub mod topology;

pub use analysis::GraphAnalysis;
pub use builder::{
    BuildReport, NetworkBuilder, compute_cost, is_valid_line, normalize_to_single_line,
    repair_geometry,
};
pub use topology::{TopologyBuild, build_topology};
