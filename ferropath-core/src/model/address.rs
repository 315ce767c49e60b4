use geo::Point;

/// Gazetteer entry, immutable once ingested
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub display_name: String,
    /// Point in the geographic reference system (x = longitude)
    pub geometry: Point<f64>,
}

impl Address {
    pub fn new(display_name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            display_name: display_name.into(),
            geometry: Point::new(lon, lat),
        }
    }

    pub fn lon(&self) -> f64 {
        self.geometry.x()
    }

    pub fn lat(&self) -> f64 {
        self.geometry.y()
    }
}
