//! The point/single-slice transformation model.
//!
//! Understands matrices with a fixed column layout holding independent point
//! retrievals: longitude, latitude, value, day-of-year, year, and retrieval
//! error. The day-of-year/year pair combines into a per-row timestamp.

use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{FluxError, Result};
use crate::models::config::{ConfigOverrides, ModelConfig, SidecarConfig};
use crate::models::frame::{round_to, PointFrame, PointRecord};
use crate::models::metadata::{format_timestamp, DatasetMetadata};
use crate::readers::MatrixReader;
use crate::utils::timestamp_from_path;

pub struct PointModel {
    reader: MatrixReader,
    config: ModelConfig,
}

impl PointModel {
    pub fn open(path: &Path, config_file: Option<&Path>) -> Result<Self> {
        let reader = MatrixReader::open(path)?;
        let mut config = ModelConfig::point_defaults();
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

    /// Reshapes the raw matrix into point records, deriving each row's
    /// timestamp from its day-of-year/year columns when present, otherwise
    /// using the configured anchor.
    pub fn extract(&mut self, overrides: &ConfigOverrides) -> Result<PointFrame> {
        self.config.apply_overrides(overrides);
        let anchor = self.config.require_timestamp()?;

        let (name, matrix) = self.reader.read(self.config.var_name.as_deref())?;
        self.config.var_name = Some(name);

        if matrix.ncols() != self.config.columns.len() {
            return Err(FluxError::ShapeMismatch {
                expected: self.config.columns.len(),
                found: matrix.ncols(),
            });
        }

        let lon_col = self.column("x")?;
        let lat_col = self.column("y")?;
        let value_col = self.column("value")?;
        let error_col = self.column("error")?;
        let doy_col = self.optional_column("doy");
        let year_col = self.optional_column("year");

        let value_transform = self.config.transforms.get("value").copied();
        let error_transform = self.config.transforms.get("error").copied();

        let mut rows = Vec::with_capacity(matrix.nrows());
        for row in matrix.rows() {
            let mut value = row[value_col];
            let mut error = row[error_col];
            if let Some(transform) = value_transform {
                value = transform.apply(value);
            }
            if let Some(transform) = error_transform {
                error = transform.apply(error);
            }

            let timestamp = match (doy_col, year_col) {
                (Some(doy), Some(year)) => {
                    derive_timestamp(row[year] as i32, row[doy] as i64)?
                }
                _ => anchor,
            };

            rows.push(PointRecord {
                longitude: self.rounded("x", row[lon_col]),
                latitude: self.rounded("y", row[lat_col]),
                value: self.rounded("value", value),
                error: self.rounded("error", error),
                timestamp,
            });
        }

        PointFrame::new(rows)
    }

    /// Metadata for this dataset; extracts first when no frame is supplied.
    pub fn describe(&mut self, frame: Option<&PointFrame>) -> Result<DatasetMetadata> {
        match frame {
            Some(frame) => self.describe_frame(frame),
            None => {
                let frame = self.extract(&ConfigOverrides::default())?;
                self.describe_frame(&frame)
            }
        }
    }

    fn describe_frame(&self, frame: &PointFrame) -> Result<DatasetMetadata> {
        let anchor = self.config.require_timestamp()?;
        let bbox = frame.coordinate_index()?.bbox()?;

        Ok(DatasetMetadata {
            title: self.config.title.clone(),
            gridded: self.config.gridded,
            grid: self.config.grid.clone(),
            units: self.config.units.clone(),
            bbox: bbox.as_array(),
            bbox_md5: bbox.md5_hex(),
            dates: vec![format_timestamp(anchor)],
            steps: None,
            span: self.config.span,
            precision: self.config.precision,
        })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.optional_column(name).ok_or_else(|| {
            FluxError::Configuration(format!(
                "column '{}' is not declared in the column layout",
                name
            ))
        })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.config.columns.iter().position(|c| c == name)
    }

    fn rounded(&self, column: &str, value: f64) -> f64 {
        match self.config.format_for(column) {
            Some(places) => round_to(value, places),
            None => value,
        }
    }
}

fn derive_timestamp(year: i32, day_of_year: i64) -> Result<NaiveDateTime> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| FluxError::Configuration(format!("invalid year column value {}", year)))?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid");
    Ok(jan1 + Duration::days(day_of_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Three retrievals on day 166 of 2009: x, y, value, doy, year, error.
    fn fixture(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("XCO2_20090615_v3.npz");
        let matrix = array![
            [-120.5, 35.5, 386.789, 166.0, 2009.0, 1.44],
            [-119.5, 35.5, 388.123, 166.0, 2009.0, 2.25],
            [-118.5, 36.5, 384.555, 166.0, 2009.0, 0.81],
        ];
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("XCO2", &matrix).unwrap();
        npz.finish().unwrap();
        path
    }

    #[test]
    fn test_extract_derives_row_timestamps() {
        let dir = TempDir::new().unwrap();
        let mut model = PointModel::open(&fixture(&dir), None).unwrap();

        let frame = model.extract(&ConfigOverrides::default()).unwrap();
        assert_eq!(frame.len(), 3);

        let row = &frame.rows()[0];
        assert_eq!(row.value, 386.79);
        // day 166 counted from January 1st
        assert_eq!(row.timestamp.to_string(), "2009-06-16 00:00:00");
    }

    #[test]
    fn test_anchor_mined_from_filename() {
        let dir = TempDir::new().unwrap();
        let model = PointModel::open(&fixture(&dir), None).unwrap();
        assert_eq!(
            model.config().timestamp.unwrap().to_string(),
            "2009-06-15 00:00:00"
        );
    }

    #[test]
    fn test_error_transform_from_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir);
        let mut sidecar = File::create(dir.path().join("XCO2_20090615_v3.json")).unwrap();
        sidecar
            .write_all(br#"{"transforms": {"error": "sqrt"}}"#)
            .unwrap();

        let mut model = PointModel::open(&path, None).unwrap();
        let frame = model.extract(&ConfigOverrides::default()).unwrap();
        // variances become standard deviations
        assert_eq!(frame.rows()[0].error, 1.2);
        assert_eq!(frame.rows()[1].error, 1.5);
    }

    #[test]
    fn test_wrong_column_count_is_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide_20090615.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("XCO2", &array![[1.0, 2.0, 3.0]]).unwrap();
        npz.finish().unwrap();

        let mut model = PointModel::open(&path, None).unwrap();
        let err = model.extract(&ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, FluxError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_describe_reports_span_and_single_date() {
        let dir = TempDir::new().unwrap();
        let mut model = PointModel::open(&fixture(&dir), None).unwrap();

        let meta = model.describe(None).unwrap();
        assert!(!meta.gridded);
        assert_eq!(meta.span, Some(518400));
        assert_eq!(meta.dates, vec!["2009-06-15T00:00:00"]);
        assert_eq!(meta.bbox, [-120.5, 35.5, -118.5, 36.5]);
    }
}
