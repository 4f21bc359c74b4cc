pub mod csv_writer;
pub mod geojson_writer;

pub use csv_writer::CsvWriter;
pub use geojson_writer::GeoJsonWriter;
