pub mod api;
pub mod cli;
pub mod error;
pub mod mediators;
pub mod models;
pub mod readers;
pub mod settings;
pub mod stats;
pub mod store;
pub mod utils;
pub mod writers;

pub use error::{FluxError, Result};

/// Timestamp format shared by documents, the read API, and the CLI.
pub const ISO_8601: &str = "%Y-%m-%dT%H:%M:%S";
