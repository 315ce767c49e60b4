//! Reading the address gazetteer and the street network from files

pub mod addresses;
mod source;
pub mod streets;

pub use addresses::load_addresses;
pub use source::{DataSource, DataSourceConfig, FileDataSource};
pub use streets::load_streets;
