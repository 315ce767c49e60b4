//! Data model for the street network, the address gazetteer and path results

pub mod address;
pub mod path;
pub mod streets;

pub use address::Address;
pub use path::{PathResult, PathRow, PathStep, RouteOutcome};
pub use streets::{Edge, Node, StreetSegment};
