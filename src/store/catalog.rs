//! Dataset-level (triple-wide) operations.
//!
//! Every dataset is represented by up to four pieces of persisted state: its
//! data collection plus one document each in `coord_index`, `metadata`, and
//! `summary_stats`. The catalog removes, renames, and audits those pieces as
//! a set so no operation leaves stale cross-references behind.

use serde_json::{json, Value};

use crate::error::{FluxError, Result};
use crate::store::document_store::DocumentStore;
use crate::store::{COORD_INDEX, METADATA, SUMMARY_STATS};

/// Identifiers that can never name a dataset's own collection.
pub const RESERVED_COLLECTION_NAMES: [&str; 3] = [COORD_INDEX, METADATA, SUMMARY_STATS];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_COLLECTION_NAMES.contains(&name)
}

pub fn ensure_not_reserved(name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(FluxError::ReservedName(name.to_string()));
    }
    Ok(())
}

pub struct Catalog {
    store: DocumentStore,
}

impl Catalog {
    pub fn new(store: &DocumentStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Dataset collection names: everything except the reserved collections.
    pub fn data_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .collection_names()
            .into_iter()
            .filter(|name| !is_reserved(name))
            .collect();
        names.sort();
        names
    }

    /// A dataset exists when it has data documents or a metadata entry.
    pub fn dataset_exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.count(name)? > 0 || self.store.contains(METADATA, name)?)
    }

    /// Drops the data collection and deletes the dataset's coordinate-index,
    /// metadata, and summary documents.
    pub fn remove_dataset(&self, name: &str) -> Result<()> {
        ensure_not_reserved(name)?;
        if !self.dataset_exists(name)? {
            return Err(FluxError::NotFound(format!("collection '{}'", name)));
        }
        self.delete_set(name)
    }

    /// Renames the dataset's collection triple as a set.
    ///
    /// The fully-copied target set doubles as the backup: a failure while
    /// copying rolls the target back; a failure while retiring the source
    /// restores the source from the copy. Either way the store never ends up
    /// with a half-renamed dataset.
    pub fn rename_dataset(&self, old: &str, new: &str) -> Result<()> {
        ensure_not_reserved(old)?;
        ensure_not_reserved(new)?;
        if !self.dataset_exists(old)? {
            return Err(FluxError::NotFound(format!("collection '{}'", old)));
        }
        if self.dataset_exists(new)? {
            return Err(FluxError::Rename(format!(
                "target collection '{}' already exists",
                new
            )));
        }

        if let Err(e) = self.copy_set(old, new) {
            let _ = self.delete_set(new);
            return Err(FluxError::Rename(format!(
                "could not copy '{}' to '{}': {}",
                old, new, e
            )));
        }

        if let Err(e) = self.delete_set(old) {
            // Bring back whatever was already retired, then drop the copy.
            let _ = self.copy_set(new, old);
            let _ = self.delete_set(new);
            return Err(FluxError::Rename(format!(
                "could not retire '{}' after copying, restored: {}",
                old, e
            )));
        }

        Ok(())
    }

    fn copy_set(&self, from: &str, to: &str) -> Result<()> {
        for (id, doc) in self.store.find_all(from)? {
            self.store.upsert(to, &id, &doc)?;
        }
        if self.store.count(to)? != self.store.count(from)? {
            return Err(FluxError::Rename(format!(
                "document count mismatch copying '{}'",
                from
            )));
        }

        for collection in RESERVED_COLLECTION_NAMES {
            if let Some(mut doc) = self.store.get(collection, from)? {
                doc["_id"] = json!(to);
                if collection == SUMMARY_STATS {
                    doc["about_collection"] = json!(to);
                }
                self.store.upsert(collection, to, &doc)?;
            }
        }
        Ok(())
    }

    fn delete_set(&self, name: &str) -> Result<()> {
        self.store.drop_collection(name)?;
        for collection in RESERVED_COLLECTION_NAMES {
            self.store.remove(collection, name)?;
        }
        Ok(())
    }

    /// Cross-checks every dataset's triple for missing or desynchronized
    /// pieces.
    pub fn audit(&self) -> Result<AuditReport> {
        let mut report = AuditReport::default();

        for name in self.data_collections() {
            if self.store.count(&name)? == 0 {
                continue;
            }
            report.datasets += 1;

            let coord_len = match self.store.get(COORD_INDEX, &name)? {
                Some(doc) => doc["i"].as_array().map(|a| a.len()),
                None => {
                    report.push(&name, "no coordinate-index document");
                    None
                }
            };
            if !self.store.contains(METADATA, &name)? {
                report.push(&name, "no metadata document");
            }

            if let Some(expected) = coord_len {
                for (id, doc) in self.store.find_all(&name)? {
                    let found = doc["values"]
                        .as_array()
                        .or_else(|| doc["features"].as_array())
                        .map(|a| a.len());
                    if let Some(found) = found {
                        if found != expected {
                            report.push(
                                &name,
                                &format!(
                                    "document '{}' holds {} values against a {}-entry coordinate index",
                                    id, found, expected
                                ),
                            );
                        }
                    }
                }
            }
        }

        // Orphaned references: index or metadata entries with no data.
        for collection in [COORD_INDEX, METADATA, SUMMARY_STATS] {
            for (id, _) in self.store.find_all(collection)? {
                if self.store.count(&id)? == 0 {
                    report.push(
                        collection,
                        &format!("entry '{}' references a collection with no data", id),
                    );
                }
            }
        }

        Ok(report)
    }
}

#[derive(Debug, Default)]
pub struct AuditReport {
    pub datasets: usize,
    pub issues: Vec<AuditIssue>,
}

#[derive(Debug)]
pub struct AuditIssue {
    pub collection: String,
    pub message: String,
}

impl AuditReport {
    fn push(&mut self, collection: &str, message: &str) {
        self.issues.push(AuditIssue {
            collection: collection.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Audited {} dataset(s)", self.datasets)];
        if self.is_clean() {
            lines.push("No consistency issues found".to_string());
        } else {
            lines.push(format!("{} issue(s):", self.issues.len()));
            for issue in &self.issues {
                lines.push(format!("  {}: {}", issue.collection, issue.message));
            }
        }
        lines.push("audit complete".to_string());
        lines.join("\n")
    }
}

/// Restores a coordinate index document's payload.
pub fn coord_index_doc(name: &str, coords: &Value) -> Value {
    json!({ "_id": name, "i": coords })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> DocumentStore {
        let store = DocumentStore::temporary().unwrap();
        store
            .insert_new(
                "casa_gfed",
                "2004-06-30T00:00:00",
                &json!({"_id": "2004-06-30T00:00:00", "values": [0.08, 0.33]}),
            )
            .unwrap();
        store
            .upsert(
                COORD_INDEX,
                "casa_gfed",
                &json!({"_id": "casa_gfed", "i": [[-166.5, 65.5], [-165.5, 61.5]]}),
            )
            .unwrap();
        store
            .upsert(
                METADATA,
                "casa_gfed",
                &json!({"_id": "casa_gfed", "title": "CASA GFED"}),
            )
            .unwrap();
        store
            .upsert(
                SUMMARY_STATS,
                "casa_gfed",
                &json!({"_id": "casa_gfed", "about_collection": "casa_gfed", "mean": 0.2}),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_reserved_names_rejected() {
        let store = DocumentStore::temporary().unwrap();
        let catalog = Catalog::new(&store);
        for name in RESERVED_COLLECTION_NAMES {
            assert!(matches!(
                catalog.remove_dataset(name),
                Err(FluxError::ReservedName(_))
            ));
        }
    }

    #[test]
    fn test_remove_leaves_no_residuals() {
        let store = seeded_store();
        let catalog = Catalog::new(&store);

        catalog.remove_dataset("casa_gfed").unwrap();
        assert_eq!(store.count("casa_gfed").unwrap(), 0);
        assert!(!store.contains(COORD_INDEX, "casa_gfed").unwrap());
        assert!(!store.contains(METADATA, "casa_gfed").unwrap());
        assert!(!store.contains(SUMMARY_STATS, "casa_gfed").unwrap());

        assert!(matches!(
            catalog.remove_dataset("casa_gfed"),
            Err(FluxError::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_moves_the_whole_triple() {
        let store = seeded_store();
        let catalog = Catalog::new(&store);

        catalog.rename_dataset("casa_gfed", "fancypants").unwrap();

        // New name holds everything
        assert_eq!(store.count("fancypants").unwrap(), 1);
        let meta = store.get(METADATA, "fancypants").unwrap().unwrap();
        assert_eq!(meta["title"], "CASA GFED");
        assert_eq!(meta["_id"], "fancypants");
        let stats = store.get(SUMMARY_STATS, "fancypants").unwrap().unwrap();
        assert_eq!(stats["about_collection"], "fancypants");

        // Old name is gone everywhere
        assert_eq!(store.count("casa_gfed").unwrap(), 0);
        assert!(!store.contains(COORD_INDEX, "casa_gfed").unwrap());
        assert!(!store.contains(METADATA, "casa_gfed").unwrap());
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let store = seeded_store();
        store.upsert("occupied", "x", &json!({"v": 1})).unwrap();
        let catalog = Catalog::new(&store);

        assert!(matches!(
            catalog.rename_dataset("casa_gfed", "occupied"),
            Err(FluxError::Rename(_))
        ));
        // Source untouched
        assert_eq!(store.count("casa_gfed").unwrap(), 1);
    }

    #[test]
    fn test_audit_flags_desync_and_orphans() {
        let store = seeded_store();
        let catalog = Catalog::new(&store);
        assert!(catalog.audit().unwrap().is_clean());

        // A document with the wrong number of values
        store
            .insert_new(
                "casa_gfed",
                "2004-06-30T03:00:00",
                &json!({"values": [1.0, 2.0, 3.0]}),
            )
            .unwrap();
        // An orphaned metadata entry
        store
            .upsert(METADATA, "ghost", &json!({"_id": "ghost"}))
            .unwrap();

        let report = catalog.audit().unwrap();
        assert_eq!(report.issues.len(), 2);
        assert!(report.summary().contains("audit complete"));
    }
}
