//! Tabular structures produced by the transformation models.
//!
//! The coordinate index and the value arrays that reference it positionally
//! are carried together in one type, so the ordering invariant between them
//! is enforced at construction instead of assumed across call sites.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{FluxError, Result};

/// Axis-aligned bounding box over longitude/latitude, `(min_x, min_y, max_x,
/// max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Content hash of the box, used to cheaply detect geometry changes
    /// between metadata updates.
    pub fn md5_hex(&self) -> String {
        let canonical = format!(
            "({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        );
        format!("{:x}", md5::compute(canonical.as_bytes()))
    }
}

/// The ordered list of (longitude, latitude) pairs shared by every time-slice
/// document of a dataset. Order is significant: value arrays are stored in
/// this order.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateIndex {
    pairs: Vec<(f64, f64)>,
}

impl CoordinateIndex {
    /// Builds an index, rejecting duplicate coordinate pairs.
    pub fn new(pairs: Vec<(f64, f64)>) -> Result<Self> {
        let mut seen = std::collections::HashSet::with_capacity(pairs.len());
        for &(lon, lat) in &pairs {
            if !seen.insert((lon.to_bits(), lat.to_bits())) {
                return Err(FluxError::DuplicateCoordinate { lon, lat });
            }
        }
        Ok(Self { pairs })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(f64, f64)] {
        &self.pairs
    }

    pub fn bbox(&self) -> Result<BoundingBox> {
        if self.pairs.is_empty() {
            return Err(FluxError::Configuration(
                "cannot compute a bounding box over zero coordinates".to_string(),
            ));
        }
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &(lon, lat) in &self.pairs {
            bbox.min_x = bbox.min_x.min(lon);
            bbox.min_y = bbox.min_y.min(lat);
            bbox.max_x = bbox.max_x.max(lon);
            bbox.max_y = bbox.max_y.max(lat);
        }
        Ok(bbox)
    }

    /// Serializable form: an array of `[lon, lat]` pairs.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.pairs
                .iter()
                .map(|(lon, lat)| serde_json::json!([lon, lat]))
                .collect(),
        )
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let rows = value.as_array().ok_or_else(|| {
            FluxError::Configuration("coordinate index document is not an array".to_string())
        })?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let pair = row.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                FluxError::Configuration("coordinate index entry is not a pair".to_string())
            })?;
            let lon = pair[0].as_f64().unwrap_or(f64::NAN);
            let lat = pair[1].as_f64().unwrap_or(f64::NAN);
            pairs.push((lon, lat));
        }
        Self::new(pairs)
    }
}

/// A grid/time-series tabular structure: one value column per time step, each
/// in coordinate-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFrame {
    coords: CoordinateIndex,
    times: Vec<NaiveDateTime>,
    columns: Vec<Vec<f64>>,
}

impl GridFrame {
    /// Builds a frame, checking every column against the coordinate count and
    /// the time axis length.
    pub fn new(
        coords: CoordinateIndex,
        times: Vec<NaiveDateTime>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if times.len() != columns.len() {
            return Err(FluxError::ShapeMismatch {
                expected: times.len(),
                found: columns.len(),
            });
        }
        for column in &columns {
            if column.len() != coords.len() {
                return Err(FluxError::ShapeMismatch {
                    expected: coords.len(),
                    found: column.len(),
                });
            }
        }
        Ok(Self {
            coords,
            times,
            columns,
        })
    }

    pub fn coords(&self) -> &CoordinateIndex {
        &self.coords
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn n_points(&self) -> usize {
        self.coords.len()
    }

    pub fn n_steps(&self) -> usize {
        self.times.len()
    }

    pub fn column(&self, step: usize) -> &[f64] {
        &self.columns[step]
    }

    /// All values across all time steps, column by column.
    pub fn flattened(&self) -> Vec<f64> {
        self.columns.iter().flatten().copied().collect()
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.times.last().copied()
    }
}

/// One point-feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PointRecord {
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    pub value: f64,
    pub error: f64,
    pub timestamp: NaiveDateTime,
}

/// A point/single-slice tabular structure.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFrame {
    rows: Vec<PointRecord>,
}

impl PointFrame {
    /// Builds a frame, validating each record's coordinates.
    pub fn new(rows: Vec<PointRecord>) -> Result<Self> {
        for row in &rows {
            row.validate()?;
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[PointRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The (lon, lat) pairs of the rows, in row order.
    pub fn coordinate_index(&self) -> Result<CoordinateIndex> {
        CoordinateIndex::new(
            self.rows
                .iter()
                .map(|r| (r.longitude, r.latitude))
                .collect(),
        )
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.value).collect()
    }

    pub fn errors(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.error).collect()
    }
}

/// Rounds to a fixed number of decimal places, the way values are persisted.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn test_duplicate_coordinates_rejected() {
        let err = CoordinateIndex::new(vec![(1.5, 2.5), (0.0, 0.0), (1.5, 2.5)]).unwrap_err();
        assert!(matches!(err, FluxError::DuplicateCoordinate { .. }));
    }

    #[test]
    fn test_bbox_and_hash_are_stable() {
        let coords = CoordinateIndex::new(vec![(-166.5, 65.5), (-50.5, 10.5)]).unwrap();
        let bbox = coords.bbox().unwrap();
        assert_eq!(bbox.as_array(), [-166.5, 10.5, -50.5, 65.5]);
        assert_eq!(bbox.md5_hex(), coords.bbox().unwrap().md5_hex());
        assert_eq!(bbox.md5_hex().len(), 32);
    }

    #[test]
    fn test_coordinate_index_json_round_trip() {
        let coords = CoordinateIndex::new(vec![(-165.5, 61.5), (-164.5, 61.5)]).unwrap();
        let restored = CoordinateIndex::from_json(&coords.to_json()).unwrap();
        assert_eq!(coords, restored);
    }

    #[test]
    fn test_grid_frame_shape_checks() {
        let coords = CoordinateIndex::new(vec![(0.5, 0.5), (1.5, 0.5)]).unwrap();

        // Column shorter than the coordinate index
        let err = GridFrame::new(
            coords.clone(),
            vec![t("2004-06-30T00:00:00")],
            vec![vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, FluxError::ShapeMismatch { .. }));

        // Time axis and column count disagree
        let err = GridFrame::new(coords.clone(), vec![t("2004-06-30T00:00:00")], vec![])
            .unwrap_err();
        assert!(matches!(err, FluxError::ShapeMismatch { .. }));

        let frame = GridFrame::new(
            coords,
            vec![t("2004-06-30T00:00:00")],
            vec![vec![1.0, 2.0]],
        )
        .unwrap();
        assert_eq!(frame.n_points(), 2);
        assert_eq!(frame.n_steps(), 1);
        assert_eq!(frame.flattened(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_point_frame_rejects_out_of_range_coordinates() {
        let bad = PointRecord {
            longitude: -181.0,
            latitude: 0.0,
            value: 1.0,
            error: 0.1,
            timestamp: t("2009-06-15T00:00:00"),
        };
        assert!(PointFrame::new(vec![bad]).is_err());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.08129, 2), 0.08);
        assert_eq!(round_to(386.789, 2), 386.79);
        assert_eq!(round_to(-1.005, 1), -1.0);
    }
}
