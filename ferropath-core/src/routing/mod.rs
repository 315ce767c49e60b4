//! Shortest-path search and route request orchestration

pub(crate) mod dijkstra;
mod itinerary;
mod orchestrator;
mod selection;

pub use orchestrator::{RouteOrchestrator, RouteQuery};
pub use selection::SelectionStrategy;
