use std::fs::{self, File};
use std::path::Path;

use geo::Geometry;
use log::{info, warn};
use serde::Deserialize;

use super::streets::features;
use crate::Error;
use crate::model::Address;

#[derive(Debug, Deserialize)]
struct AddressRecord {
    label: String,
    lon: f64,
    lat: f64,
}

/// Reads a gazetteer file: CSV when the extension is `csv`, GeoJSON otherwise.
pub fn load_addresses(path: &Path, label_property: &str) -> Result<Vec<Address>, Error> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let addresses = if is_csv {
        read_addresses_csv(File::open(path)?)?
    } else {
        parse_addresses_geojson(&fs::read_to_string(path)?, label_property)?
    };
    info!("Read {} addresses from {}", addresses.len(), path.display());
    Ok(addresses)
}

/// CSV with a `label,lon,lat` header
pub fn read_addresses_csv(reader: impl std::io::Read) -> Result<Vec<Address>, Error> {
    csv::Reader::from_reader(reader)
        .deserialize::<AddressRecord>()
        .map(|record| -> Result<Address, Error> {
            let record = record?;
            Ok(Address::new(record.label, record.lon, record.lat))
        })
        .collect()
}

/// Point features labelled by `label_property`.
///
/// Features without a label or without point geometry are skipped.
pub fn parse_addresses_geojson(text: &str, label_property: &str) -> Result<Vec<Address>, Error> {
    let mut skipped = 0usize;
    let mut addresses = Vec::new();

    for feature in features(text)? {
        let label = feature
            .property(label_property)
            .and_then(|value| value.as_str())
            .map(str::to_owned);
        let point = feature
            .geometry
            .map(geo::Geometry::<f64>::try_from)
            .transpose()
            .map_err(|e| Error::GeoJsonError(e.to_string()))?
            .and_then(|geometry| match geometry {
                Geometry::Point(point) => Some(point),
                Geometry::MultiPoint(points) => points.0.first().copied(),
                _ => None,
            });

        match (label, point) {
            (Some(label), Some(point)) => addresses.push(Address::new(label, point.x(), point.y())),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {skipped} address features without '{label_property}' or point geometry");
    }
    Ok(addresses)
}
