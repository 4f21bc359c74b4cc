use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cli::args::{Cli, Commands, ExportFormat, ListTarget, ModelKind};
use crate::error::{FluxError, Result};
use crate::mediators::{GridMediator, PointMediator, SaveOutcome, TimeQuery};
use crate::models::config::{parse_timestamp, ConfigOverrides};
use crate::models::frame::CoordinateIndex;
use crate::models::metadata::format_timestamp;
use crate::models::{GridModel, PointModel};
use crate::settings::Settings;
use crate::stats::Summary;
use crate::store::{Catalog, DocumentStore, COORD_INDEX, METADATA};
use crate::utils::colors::ColorRamp;
use crate::utils::ProgressReporter;
use crate::writers::{CsvWriter, GeoJsonWriter};

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);
    let settings = Settings::load()?;
    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| settings.database.clone());

    match cli.command {
        Commands::Load {
            path,
            model,
            collection,
            timestamp,
            var_name,
            title,
            config_file,
        } => {
            let store = DocumentStore::open(&database)?;
            let overrides = ConfigOverrides {
                var_name,
                timestamp: timestamp.as_deref().map(parse_timestamp).transpose()?,
                title,
                precision: None,
            };

            if path.is_dir() {
                load_directory(&store, model, &collection, &path, &overrides)?;
            } else {
                let outcome = load_file(
                    &store,
                    model,
                    &collection,
                    &path,
                    &overrides,
                    config_file.as_deref(),
                )?;
                report_outcome(&collection, &outcome);
            }
            println!("Upload complete!");
        }

        Commands::Remove { collection } => {
            let store = DocumentStore::open(&database)?;
            Catalog::new(&store).remove_dataset(&collection)?;
            println!("\"{}\" successfully removed", collection);
        }

        Commands::Rename { collection, to } => {
            let store = DocumentStore::open(&database)?;
            Catalog::new(&store).rename_dataset(&collection, &to)?;
            println!("Renamed \"{}\" to \"{}\"", collection, to);
        }

        Commands::Db {
            list,
            name,
            counts,
            audit,
        } => {
            let store = DocumentStore::open(&database)?;
            db_command(&store, list, name, counts, audit)?;
        }

        Commands::Export {
            collection,
            time,
            format,
            output,
        } => {
            let store = DocumentStore::open(&database)?;
            export_slice(&store, &collection, &time, format, &output)?;
            println!("Wrote {}", output.display());
        }

        Commands::Serve { listen, cors_host } => {
            let store = DocumentStore::open(&database)?;
            let listen = listen.unwrap_or(settings.listen);
            let cors_host = cors_host.unwrap_or(settings.cors_host);
            crate::api::serve(store, &listen, &cors_host).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_file(
    store: &DocumentStore,
    model: ModelKind,
    collection: &str,
    path: &Path,
    overrides: &ConfigOverrides,
    config_file: Option<&Path>,
) -> Result<SaveOutcome> {
    println!("Loading {} into \"{}\"", path.display(), collection);
    let progress = ProgressReporter::new_spinner("Writing time slices...");

    let outcome = match model {
        ModelKind::Grid => {
            let mut instance = GridModel::open(path, config_file)?;
            GridMediator::new(store).save(collection, &mut instance, overrides, Some(&progress))?
        }
        ModelKind::Point => {
            let mut instance = PointModel::open(path, config_file)?;
            PointMediator::new(store).save(collection, &mut instance, overrides)?
        }
    };

    progress.finish_with_message("done");
    Ok(outcome)
}

/// Bulk import: every matrix file in the directory, in name order. A bad
/// file is logged and skipped; the batch never aborts on a single record.
fn load_directory(
    store: &DocumentStore,
    model: ModelKind,
    collection: &str,
    dir: &Path,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("npz") | Some("nc")
            )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(FluxError::Configuration(format!(
            "no matrix files found in {}",
            dir.display()
        )));
    }

    let mut loaded = 0usize;
    let mut failed = 0usize;
    for path in &paths {
        match load_file(store, model, collection, path, overrides, None) {
            Ok(outcome) => {
                loaded += 1;
                report_outcome(collection, &outcome);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(file = %path.display(), error = %e, "skipping file");
            }
        }
    }

    println!("{} file(s) loaded, {} failed", loaded, failed);
    Ok(())
}

fn report_outcome(collection: &str, outcome: &SaveOutcome) {
    if outcome.skipped > 0 {
        println!(
            "\"{}\": {} document(s) written, {} already present",
            collection, outcome.written, outcome.skipped
        );
    } else {
        println!("\"{}\": {} document(s) written", collection, outcome.written);
    }
}

fn db_command(
    store: &DocumentStore,
    list: Option<ListTarget>,
    name: Option<String>,
    counts: bool,
    audit: bool,
) -> Result<()> {
    let catalog = Catalog::new(store);

    if let Some(target) = list {
        match target {
            ListTarget::Collections => {
                for collection in catalog.data_collections() {
                    if counts {
                        println!("{} ({} records)", collection, store.count(&collection)?);
                    } else {
                        println!("{}", collection);
                    }
                }
            }
            ListTarget::Metadata => {
                for (id, _) in store.find_all(METADATA)? {
                    println!("{}", id);
                }
            }
            ListTarget::CoordIndex => {
                for (id, _) in store.find_all(COORD_INDEX)? {
                    println!("{}", id);
                }
            }
        }
        return Ok(());
    }

    if let Some(name) = name {
        let doc = store
            .get(METADATA, &name)?
            .ok_or_else(|| FluxError::NotFound(format!("metadata for '{}'", name)))?;
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    if audit {
        println!("{}", catalog.audit()?.summary());
        return Ok(());
    }

    println!("Nothing to do: pass --list, --name, or --audit");
    Ok(())
}

fn export_slice(
    store: &DocumentStore,
    collection: &str,
    time: &str,
    format: ExportFormat,
    output: &Path,
) -> Result<()> {
    let timestamp = parse_timestamp(time)?;

    match format {
        ExportFormat::Csv => {
            let frame = GridMediator::new(store).load(collection, &TimeQuery::at(timestamp))?;
            CsvWriter::write_grid_frame(&frame, output)
        }
        ExportFormat::Geojson => {
            let id = format_timestamp(timestamp);
            let doc = store.get(collection, &id)?.ok_or_else(|| {
                FluxError::NotFound(format!("slice {} in '{}'", id, collection))
            })?;

            let features = match doc.get("features").and_then(Value::as_array) {
                Some(features) => features.clone(),
                None => {
                    let values: Vec<f64> = doc["values"]
                        .as_array()
                        .map(|a| a.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
                        .unwrap_or_default();
                    let index_doc = store.get(COORD_INDEX, collection)?.ok_or_else(|| {
                        FluxError::NotFound(format!("coordinate index for '{}'", collection))
                    })?;
                    let coords = CoordinateIndex::from_json(&index_doc["i"])?;
                    GeoJsonWriter::features_from_values(&coords, &values)
                }
            };

            // Exported overlays carry score classes for the color ramp
            let flux: Vec<f64> = features
                .iter()
                .filter_map(|f| {
                    f.get("flux")
                        .or_else(|| f.get("value"))
                        .and_then(Value::as_f64)
                })
                .collect();
            let summary = Summary::from_series(&flux)?;
            let body = GeoJsonWriter::styled_feature_collection(
                &features,
                &ColorRamp::brbg11(),
                &summary,
            );
            GeoJsonWriter::write(output, &body)
        }
    }
}
