pub mod colors;
pub mod filename;
pub mod progress;

pub use filename::timestamp_from_path;
pub use progress::ProgressReporter;
