use thiserror::Error;

pub type Result<T> = std::result::Result<T, FluxError>;

#[derive(Error, Debug)]
pub enum FluxError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized matrix file format: {0}")]
    FileFormat(String),

    #[error("Variable '{name}' not found in {path}")]
    VariableNotFound { name: String, path: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Shape mismatch: expected {expected} columns, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("'{0}' is a reserved collection name")]
    ReservedName(String),

    #[error("Duplicate document key '{key}' in collection '{collection}'")]
    DuplicateKey { collection: String, key: String },

    #[error("Duplicate coordinate pair ({lon}, {lat})")]
    DuplicateCoordinate { lon: f64, lat: f64 },

    #[error("Rename failed: {0}")]
    Rename(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Datastore error: {0}")]
    Store(#[from] sled::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Array container error: {0}")]
    Npz(#[from] ndarray_npy::ReadNpzError),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf3::error::ReadError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
