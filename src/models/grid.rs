//! The grid/time-series transformation model.
//!
//! Understands matrices whose leading columns are grid-cell centroid
//! coordinates and whose remaining columns each hold one time step of values,
//! e.g. inverted CO2 surface fluxes at 3-hour intervals on a 1-degree grid.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::error::{FluxError, Result};
use crate::models::config::{ConfigOverrides, ModelConfig, SidecarConfig};
use crate::models::frame::{round_to, CoordinateIndex, GridFrame};
use crate::models::metadata::{format_timestamp, DatasetMetadata};
use crate::readers::MatrixReader;
use crate::utils::timestamp_from_path;

pub struct GridModel {
    reader: MatrixReader,
    config: ModelConfig,
}

impl GridModel {
    /// Opens the data file and assembles the configuration layers: grid
    /// defaults, then any sidecar file, then a timestamp mined from the file
    /// name if none was configured.
    pub fn open(path: &Path, config_file: Option<&Path>) -> Result<Self> {
        let reader = MatrixReader::open(path)?;
        let mut config = ModelConfig::grid_defaults();
        if let Some(sidecar) = SidecarConfig::locate(path, config_file)? {
            config.apply_sidecar(sidecar)?;
        }
        if config.timestamp.is_none() {
            config.timestamp = timestamp_from_path(path);
        }
        Ok(Self { reader, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Reshapes the raw matrix into a labeled frame: coordinate columns
    /// become the coordinate index, remaining columns become a generated
    /// time axis anchored at the configured timestamp.
    pub fn extract(&mut self, overrides: &ConfigOverrides) -> Result<GridFrame> {
        self.config.apply_overrides(overrides);
        let anchor = self.config.require_timestamp()?;
        let step = self.config.step_seconds()?;

        let (name, matrix) = self.reader.read(self.config.var_name.as_deref())?;
        self.config.var_name = Some(name);

        let coord_cols = self.config.columns.len();
        if matrix.ncols() <= coord_cols {
            return Err(FluxError::ShapeMismatch {
                expected: coord_cols + 1,
                found: matrix.ncols(),
            });
        }

        let lon_col = self.coordinate_column("x")?;
        let lat_col = self.coordinate_column("y")?;
        let lon_places = self.config.format_for("x");
        let lat_places = self.config.format_for("y");

        let mut pairs = Vec::with_capacity(matrix.nrows());
        for row in matrix.rows() {
            let mut lon = row[lon_col];
            let mut lat = row[lat_col];
            if let Some(places) = lon_places {
                lon = round_to(lon, places);
            }
            if let Some(places) = lat_places {
                lat = round_to(lat, places);
            }
            pairs.push((lon, lat));
        }
        let coords = CoordinateIndex::new(pairs)?;

        let n_steps = matrix.ncols() - coord_cols;
        let times: Vec<NaiveDateTime> = (0..n_steps)
            .map(|j| anchor + Duration::seconds(step * j as i64))
            .collect();

        let transform = self.config.transforms.get("values").copied();
        let mut columns = Vec::with_capacity(n_steps);
        for j in 0..n_steps {
            let mut column = Vec::with_capacity(matrix.nrows());
            for i in 0..matrix.nrows() {
                let mut value = matrix[[i, coord_cols + j]];
                if let Some(transform) = transform {
                    value = transform.apply(value);
                }
                column.push(value);
            }
            columns.push(column);
        }

        GridFrame::new(coords, times, columns)
    }

    /// Metadata for this dataset; extracts first when no frame is supplied.
    pub fn describe(&mut self, frame: Option<&GridFrame>) -> Result<DatasetMetadata> {
        match frame {
            Some(frame) => self.describe_frame(frame),
            None => {
                let frame = self.extract(&ConfigOverrides::default())?;
                self.describe_frame(&frame)
            }
        }
    }

    fn describe_frame(&self, frame: &GridFrame) -> Result<DatasetMetadata> {
        let bbox = frame.coords().bbox()?;
        let first = frame.first_time().ok_or_else(|| {
            FluxError::Configuration("frame has no time columns to describe".to_string())
        })?;
        let last = frame.last_time().expect("non-empty checked above");

        Ok(DatasetMetadata {
            title: self.config.title.clone(),
            gridded: self.config.gridded,
            grid: self.config.grid.clone(),
            units: self.config.units.clone(),
            bbox: bbox.as_array(),
            bbox_md5: bbox.md5_hex(),
            dates: vec![format_timestamp(first), format_timestamp(last)],
            steps: Some(self.config.steps.clone()),
            span: None,
            precision: self.config.precision,
        })
    }

    fn coordinate_column(&self, name: &str) -> Result<usize> {
        self.config
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                FluxError::Configuration(format!(
                    "coordinate column '{}' is not declared in the column layout",
                    name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Two grid cells, four 3-hourly steps.
    fn fixture(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("casagfed.npz");
        let matrix = array![
            [-166.5, 65.5, 0.08129, 0.12, -0.5, 1.204],
            [-165.5, 61.5, 0.3333, 0.25, 0.75, -2.118],
        ];
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("casa_gfed_2004", &matrix).unwrap();
        npz.finish().unwrap();
        path
    }

    fn overrides(ts: &str) -> ConfigOverrides {
        ConfigOverrides {
            timestamp: Some(crate::models::config::parse_timestamp(ts).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_generates_time_axis() {
        let dir = TempDir::new().unwrap();
        let mut model = GridModel::open(&fixture(&dir), None).unwrap();

        let frame = model.extract(&overrides("2004-06-30T00:00:00")).unwrap();
        assert_eq!(frame.n_points(), 2);
        assert_eq!(frame.n_steps(), 4);
        assert_eq!(frame.times()[1].to_string(), "2004-06-30 03:00:00");
        assert_eq!(frame.coords().pairs()[1], (-165.5, 61.5));
        assert_eq!(frame.column(0), &[0.08129, 0.3333]);
    }

    #[test]
    fn test_extract_requires_timestamp() {
        let dir = TempDir::new().unwrap();
        let mut model = GridModel::open(&fixture(&dir), None).unwrap();

        let err = model.extract(&ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, FluxError::Configuration(_)));
    }

    #[test]
    fn test_describe_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut model = GridModel::open(&fixture(&dir), None).unwrap();
        model
            .extract(&overrides("2004-06-30T00:00:00"))
            .unwrap();

        let first = model.describe(None).unwrap();
        let second = model.describe(None).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.bbox, [-166.5, 61.5, -165.5, 65.5]);
        assert_eq!(
            first.dates,
            vec!["2004-06-30T00:00:00", "2004-06-30T09:00:00"]
        );
        assert_eq!(first.steps, Some(vec![10800]));
        assert!(first.gridded);
    }

    #[test]
    fn test_sidecar_var_name_and_call_time_precedence() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir);

        let mut sidecar = File::create(dir.path().join("casagfed.json")).unwrap();
        sidecar
            .write_all(br#"{"var_name": "casa_gfed_2004", "timestamp": "2004-06-30T00:00:00"}"#)
            .unwrap();

        // Sidecar var_name takes effect with no call-time override
        let mut model = GridModel::open(&path, None).unwrap();
        let frame = model.extract(&ConfigOverrides::default()).unwrap();
        assert_eq!(model.config().var_name.as_deref(), Some("casa_gfed_2004"));
        assert_eq!(frame.n_steps(), 4);

        // A call-time override supersedes the sidecar
        let mut model = GridModel::open(&path, None).unwrap();
        let err = model
            .extract(&ConfigOverrides {
                var_name: Some("missing_var".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, FluxError::VariableNotFound { .. }));
    }

    #[test]
    fn test_too_few_columns_is_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narrow.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("narrow", &array![[1.0, 2.0]]).unwrap();
        npz.finish().unwrap();

        let mut model = GridModel::open(&path, None).unwrap();
        let err = model.extract(&overrides("2004-06-30T00:00:00")).unwrap_err();
        assert!(matches!(err, FluxError::ShapeMismatch { .. }));
    }
}
