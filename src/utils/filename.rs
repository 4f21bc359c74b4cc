use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

/// Mine an anchor timestamp from a data file name.
///
/// Upstream deliveries commonly embed the observation date as an eight-digit
/// `YYYYMMDD` run, e.g. `XCO2_20090615_v3.npz` or `Kriged_20090621.nc`. The
/// first parseable run wins. Returns midnight of that date.
pub fn timestamp_from_path(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;

    let bytes = stem.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 8 {
                if let Ok(date) = NaiveDate::parse_from_str(&stem[start..i], "%Y%m%d") {
                    return date.and_hms_opt(0, 0, 0);
                }
            }
        } else {
            i += 1;
        }
    }

    None
}
