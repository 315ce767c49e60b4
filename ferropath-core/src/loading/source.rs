use std::path::PathBuf;

use log::info;

use super::addresses::load_addresses;
use super::streets::load_streets;
use crate::Error;
use crate::crs::MTM_ZONE_7_EPSG;
use crate::model::{Address, StreetSegment};

/// External datasets the initialization guard ingests from
pub trait DataSource {
    fn load_addresses(&self) -> Result<Vec<Address>, Error>;

    fn load_streets(&self) -> Result<Vec<StreetSegment>, Error>;

    /// EPSG code of the street geometries
    fn streets_epsg(&self) -> u32;
}

/// Where the address and street files live and how to read them
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    pub addresses_path: PathBuf,
    pub streets_path: PathBuf,
    /// Property holding the address label
    pub label_property: String,
    /// Integer property holding the street id
    pub id_property: String,
    /// Defaults to the projected system; street files are stored in metres
    pub streets_epsg: u32,
}

impl DataSourceConfig {
    pub fn new(addresses_path: impl Into<PathBuf>, streets_path: impl Into<PathBuf>) -> Self {
        Self {
            addresses_path: addresses_path.into(),
            streets_path: streets_path.into(),
            label_property: "ADRESSE".to_string(),
            id_property: "OBJECTID".to_string(),
            streets_epsg: MTM_ZONE_7_EPSG,
        }
    }
}

/// Reads both datasets from local files
#[derive(Debug, Clone)]
pub struct FileDataSource {
    config: DataSourceConfig,
}

impl FileDataSource {
    /// # Errors
    ///
    /// Returns an error if either file does not exist or a property name is
    /// empty.
    pub fn new(config: DataSourceConfig) -> Result<Self, Error> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }
}

impl DataSource for FileDataSource {
    fn load_addresses(&self) -> Result<Vec<Address>, Error> {
        info!(
            "Loading addresses: {}",
            self.config.addresses_path.display()
        );
        load_addresses(&self.config.addresses_path, &self.config.label_property)
    }

    fn load_streets(&self) -> Result<Vec<StreetSegment>, Error> {
        info!("Loading streets: {}", self.config.streets_path.display());
        load_streets(&self.config.streets_path, &self.config.id_property)
    }

    fn streets_epsg(&self) -> u32 {
        self.config.streets_epsg
    }
}

fn validate_config(config: &DataSourceConfig) -> Result<(), Error> {
    for (kind, path) in [
        ("Address", &config.addresses_path),
        ("Street", &config.streets_path),
    ] {
        if !path.exists() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{kind} file not found: {}", path.display()),
            )));
        }
    }

    if config.label_property.is_empty() || config.id_property.is_empty() {
        return Err(Error::InvalidData(
            "Label and id property names must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_files_are_rejected() {
        let dir = TempDir::new().unwrap();
        let config = DataSourceConfig::new(dir.path().join("a.csv"), dir.path().join("s.geojson"));
        assert!(matches!(
            FileDataSource::new(config),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn loads_csv_addresses_and_geojson_streets() {
        let dir = TempDir::new().unwrap();
        let addresses = dir.path().join("addresses.CSV");
        let streets = dir.path().join("streets.geojson");
        fs::write(&addresses, "label,lon,lat\n1 Rue A,-71.2,46.8\n").unwrap();
        fs::write(
            &streets,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"OBJECTID": 5},
                 "geometry": {"type": "LineString", "coordinates": [[250000.0, 5150000.0], [250000.0, 5150100.0]]}}
            ]}"#,
        )
        .unwrap();

        let source = FileDataSource::new(DataSourceConfig::new(&addresses, &streets)).unwrap();
        assert_eq!(source.load_addresses().unwrap().len(), 1);
        assert_eq!(source.load_streets().unwrap()[0].external_id, 5);
        assert_eq!(source.streets_epsg(), MTM_ZONE_7_EPSG);
    }
}
