use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "flux-processor")]
#[command(about = "Carbon flux observation loader, database manager, and read API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Database directory (overrides settings)")]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a matrix file, or every matrix file in a directory, into a named collection
    Load {
        #[arg(short, long, help = "Input file (*.npz or *.nc) or directory")]
        path: PathBuf,

        #[arg(short, long, value_enum, default_value = "grid")]
        model: ModelKind,

        #[arg(short = 'n', long, help = "Collection name for the dataset")]
        collection: String,

        #[arg(short, long, help = "ISO 8601 timestamp of the first observation")]
        timestamp: Option<String>,

        #[arg(long, help = "Variable name inside the container")]
        var_name: Option<String>,

        #[arg(short = 'T', long, help = "Display title for the dataset")]
        title: Option<String>,

        #[arg(
            short,
            long,
            help = "Sidecar config path [default: input file with .json extension]"
        )]
        config_file: Option<PathBuf>,
    },

    /// Remove a collection together with its index and metadata entries
    Remove {
        #[arg(short = 'n', long)]
        collection: String,
    },

    /// Rename a collection together with its index and metadata entries
    Rename {
        #[arg(short = 'n', long)]
        collection: String,

        #[arg(short = 'r', long, help = "New collection name")]
        to: String,
    },

    /// Inspect the database
    Db {
        #[arg(short, long, value_enum, help = "List collections or reserved entries")]
        list: Option<ListTarget>,

        #[arg(short, long, help = "Show one metadata document")]
        name: Option<String>,

        #[arg(short = 'x', long, default_value = "false", help = "Include record counts")]
        counts: bool,

        #[arg(short, long, default_value = "false", help = "Run a consistency audit")]
        audit: bool,
    },

    /// Export a persisted time slice
    Export {
        #[arg(short = 'n', long)]
        collection: String,

        #[arg(short, long, help = "ISO 8601 timestamp of the slice")]
        time: String,

        #[arg(short, long, value_enum, default_value = "geojson")]
        format: ExportFormat,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Serve the read API
    Serve {
        #[arg(short, long, help = "Listen address (overrides settings)")]
        listen: Option<String>,

        #[arg(long, help = "CORS allow-origin host (overrides settings)")]
        cors_host: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Grid/time-series matrix: coordinate columns then one column per step
    Grid,
    /// Point retrievals: one row per observation with a derived timestamp
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Collections,
    Metadata,
    CoordIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Geojson,
    Csv,
}
