use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid coordinate ({x}, {y}): {reason}")]
    InvalidCoordinate {
        x: f64,
        y: f64,
        reason: &'static str,
    },
    #[error("Unsupported coordinate reference system EPSG:{0}")]
    UnsupportedCrs(u32),
    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),
    #[error("Spatial store unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error("Spatial store call exceeded its deadline")]
    CollaboratorTimeout,
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub(crate) fn invalid_coordinate(x: f64, y: f64, reason: &'static str) -> Self {
        Error::InvalidCoordinate { x, y, reason }
    }

    /// Query-path storage failure. Build paths use [`Error::ingestion`] instead.
    pub(crate) fn unavailable(err: impl std::fmt::Display) -> Self {
        Error::CollaboratorUnavailable(err.to_string())
    }

    pub(crate) fn ingestion(err: impl std::fmt::Display) -> Self {
        Error::IngestionFailure(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::unavailable(err)
    }
}
