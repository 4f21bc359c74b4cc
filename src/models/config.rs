//! Layered model configuration.
//!
//! A transformation model's configuration is assembled from three layers, in
//! increasing precedence: shape defaults, a sidecar JSON file sitting next to
//! the data file (same base name, `.json` extension), and call-time overrides.
//! Every recognized key is an explicit struct field; unknown sidecar keys are
//! rejected rather than silently dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{FluxError, Result};

/// A pure per-column value transform applied before rounding and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Square root, e.g. to turn a variance column into a standard deviation.
    Sqrt,
    Square,
    Abs,
    Negate,
}

impl Transform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Transform::Sqrt => value.sqrt(),
            Transform::Square => value * value,
            Transform::Abs => value.abs(),
            Transform::Negate => -value,
        }
    }
}

/// Grid cell resolution, in the units given (degrees for all current data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub x: f64,
    pub y: f64,
    pub units: String,
}

impl GridSpec {
    pub fn degrees(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            units: "degrees".to_string(),
        }
    }
}

/// How point records group into persisted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySpec {
    /// One document holding a `features` array, rather than one per record.
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default = "GeometrySpec::default_kind")]
    pub kind: String,
}

impl GeometrySpec {
    fn default_kind() -> String {
        "Point".to_string()
    }
}

impl Default for GeometrySpec {
    fn default() -> Self {
        Self {
            is_collection: false,
            kind: Self::default_kind(),
        }
    }
}

/// Fully merged configuration for one transformation model instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub var_name: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub title: String,
    /// Raw matrix column names; the leading entries are coordinate columns.
    pub columns: Vec<String>,
    /// Human-readable headers, parallel to `columns`.
    pub header: Vec<String>,
    /// Per-column units, keyed by column name.
    pub units: BTreeMap<String, String>,
    /// Per-column decimal places applied during extraction.
    pub formats: BTreeMap<String, u32>,
    /// Decimal places applied to stored value arrays.
    pub precision: Option<u32>,
    /// Seconds between consecutive time-series columns.
    pub steps: Vec<i64>,
    /// Validity duration in seconds for a single-slice dataset.
    pub span: Option<i64>,
    pub grid: Option<GridSpec>,
    pub gridded: bool,
    pub geometry: Option<GeometrySpec>,
    /// Value-field names persisted for this dataset (`values`, `errors`, ...).
    pub parameters: Vec<String>,
    pub transforms: BTreeMap<String, Transform>,
}

impl ModelConfig {
    /// Defaults for the grid/time-series shape: two coordinate columns, then
    /// one column per 3-hour step.
    pub fn grid_defaults() -> Self {
        Self {
            var_name: None,
            timestamp: None,
            title: String::new(),
            columns: vec!["x".to_string(), "y".to_string()],
            header: vec!["lng".to_string(), "lat".to_string()],
            units: BTreeMap::from([
                ("x".to_string(), "degrees".to_string()),
                ("y".to_string(), "degrees".to_string()),
            ]),
            formats: BTreeMap::from([("x".to_string(), 5), ("y".to_string(), 5)]),
            precision: Some(2),
            steps: vec![10800],
            span: None,
            grid: Some(GridSpec::degrees(1.0, 1.0)),
            gridded: true,
            geometry: None,
            parameters: vec!["values".to_string()],
            transforms: BTreeMap::new(),
        }
    }

    /// Defaults for the point/single-slice shape: retrievals with a value, a
    /// day-of-year/year pair, and a retrieval error, spanning six days.
    pub fn point_defaults() -> Self {
        Self {
            var_name: None,
            timestamp: None,
            title: String::new(),
            columns: vec![
                "x".to_string(),
                "y".to_string(),
                "value".to_string(),
                "doy".to_string(),
                "year".to_string(),
                "error".to_string(),
            ],
            header: vec![
                "lng".to_string(),
                "lat".to_string(),
                "xco2_ppm".to_string(),
                "day".to_string(),
                "year".to_string(),
                "error_ppm".to_string(),
            ],
            units: BTreeMap::from([
                ("x".to_string(), "degrees".to_string()),
                ("y".to_string(), "degrees".to_string()),
                ("value".to_string(), "ppm".to_string()),
                ("error".to_string(), "ppm".to_string()),
            ]),
            formats: BTreeMap::from([
                ("x".to_string(), 5),
                ("y".to_string(), 5),
                ("value".to_string(), 2),
                ("error".to_string(), 4),
            ]),
            precision: Some(1),
            steps: Vec::new(),
            span: Some(518400),
            grid: None,
            gridded: false,
            geometry: Some(GeometrySpec::default()),
            parameters: vec!["value".to_string(), "error".to_string()],
            transforms: BTreeMap::new(),
        }
    }

    /// Folds a sidecar layer into this configuration.
    pub fn apply_sidecar(&mut self, sidecar: SidecarConfig) -> Result<()> {
        if let Some(var_name) = sidecar.var_name {
            self.var_name = Some(var_name);
        }
        if let Some(raw) = sidecar.timestamp {
            self.timestamp = Some(parse_timestamp(&raw)?);
        }
        if let Some(title) = sidecar.title {
            self.title = title;
        }
        if let Some(columns) = sidecar.columns {
            self.columns = columns;
        }
        if let Some(header) = sidecar.header {
            self.header = header;
        }
        if let Some(units) = sidecar.units {
            self.units = units;
        }
        if let Some(formats) = sidecar.formats {
            self.formats = formats;
        }
        if let Some(precision) = sidecar.precision {
            self.precision = Some(precision);
        }
        if let Some(steps) = sidecar.steps {
            self.steps = steps;
        }
        if let Some(span) = sidecar.span {
            self.span = Some(span);
        }
        if let Some(grid) = sidecar.grid {
            self.grid = Some(grid);
        }
        if let Some(gridded) = sidecar.gridded {
            self.gridded = gridded;
        }
        if let Some(geometry) = sidecar.geometry {
            self.geometry = Some(geometry);
        }
        if let Some(parameters) = sidecar.parameters {
            self.parameters = parameters;
        }
        if let Some(transforms) = sidecar.transforms {
            self.transforms = transforms;
        }
        Ok(())
    }

    /// Folds call-time overrides into this configuration. Overrides always
    /// win over sidecar and default values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref var_name) = overrides.var_name {
            self.var_name = Some(var_name.clone());
        }
        if let Some(timestamp) = overrides.timestamp {
            self.timestamp = Some(timestamp);
        }
        if let Some(ref title) = overrides.title {
            self.title = title.clone();
        }
        if let Some(precision) = overrides.precision {
            self.precision = Some(precision);
        }
    }

    pub fn require_timestamp(&self) -> Result<NaiveDateTime> {
        self.timestamp.ok_or_else(|| {
            FluxError::Configuration(
                "a timestamp is required but none was configured".to_string(),
            )
        })
    }

    pub fn step_seconds(&self) -> Result<i64> {
        self.steps.first().copied().ok_or_else(|| {
            FluxError::Configuration("no time step configured for time-series data".to_string())
        })
    }

    /// Decimal places for a named column, if declared.
    pub fn format_for(&self, column: &str) -> Option<u32> {
        self.formats.get(column).copied()
    }
}

/// Call-time configuration overrides, the highest-precedence layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub var_name: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub precision: Option<u32>,
}

/// The sidecar configuration file layer. Every field is optional; unknown
/// keys are a configuration error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SidecarConfig {
    pub var_name: Option<String>,
    pub timestamp: Option<String>,
    pub title: Option<String>,
    pub columns: Option<Vec<String>>,
    pub header: Option<Vec<String>>,
    pub units: Option<BTreeMap<String, String>>,
    pub formats: Option<BTreeMap<String, u32>>,
    pub precision: Option<u32>,
    pub steps: Option<Vec<i64>>,
    pub span: Option<i64>,
    pub grid: Option<GridSpec>,
    pub gridded: Option<bool>,
    pub geometry: Option<GeometrySpec>,
    pub parameters: Option<Vec<String>>,
    pub transforms: Option<BTreeMap<String, Transform>>,
}

impl SidecarConfig {
    /// Loads the sidecar layer for a data file.
    ///
    /// An explicit `config_file` must exist; otherwise the conventional
    /// sibling (`<data file base name>.json`) is used when present.
    pub fn locate(data_path: &Path, config_file: Option<&Path>) -> Result<Option<Self>> {
        let path = match config_file {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(FluxError::Configuration(format!(
                        "configuration file not found: {}",
                        explicit.display()
                    )));
                }
                explicit.to_path_buf()
            }
            None => {
                let sibling = sibling_config_path(data_path);
                if !sibling.exists() {
                    return Ok(None);
                }
                sibling
            }
        };

        let raw = std::fs::read_to_string(&path)?;
        let sidecar = serde_json::from_str(&raw).map_err(|e| {
            FluxError::Configuration(format!("invalid sidecar config {}: {}", path.display(), e))
        })?;
        Ok(Some(sidecar))
    }
}

fn sibling_config_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("json")
}

/// Parses a configured timestamp: full ISO 8601 or a bare date (midnight).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, crate::ISO_8601) {
        return Ok(ts);
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    Ok(date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}
