//! Transposed CSV export of a gridded frame: one row per timestamp, one
//! column per grid cell.

use std::path::Path;

use crate::error::Result;
use crate::models::frame::GridFrame;
use crate::models::metadata::format_timestamp;

pub struct CsvWriter;

impl CsvWriter {
    pub fn write_grid_frame(frame: &GridFrame, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["timestamp".to_string()];
        header.extend(
            frame
                .coords()
                .pairs()
                .iter()
                .map(|(lon, lat)| format!("{} {}", lon, lat)),
        );
        writer.write_record(&header)?;

        for (step, timestamp) in frame.times().iter().enumerate() {
            let mut record = vec![format_timestamp(*timestamp)];
            record.extend(frame.column(step).iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}
