//! Embedded document persistence.
//!
//! Collections are sled trees; documents are JSON values keyed by their `_id`
//! string. Timestamp keys use `%Y-%m-%dT%H:%M:%S`, which sorts
//! chronologically under sled's lexicographic key order.

use std::path::Path;

use serde_json::Value;

use crate::error::{FluxError, Result};

#[derive(Clone)]
pub struct DocumentStore {
    db: sled::Db,
}

impl DocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// An in-memory store that vanishes on drop. Test use only.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(collection)?)
    }

    /// Inserts a document, failing if the key already exists.
    pub fn insert_new(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let tree = self.tree(collection)?;
        let bytes = serde_json::to_vec(doc)?;
        match tree.compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(bytes))? {
            Ok(()) => Ok(()),
            Err(_) => Err(FluxError::DuplicateKey {
                collection: collection.to_string(),
                key: id.to_string(),
            }),
        }
    }

    /// Inserts or replaces a document.
    pub fn upsert(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let tree = self.tree(collection)?;
        tree.insert(id.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let tree = self.tree(collection)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.tree(collection)?.contains_key(id.as_bytes())?)
    }

    /// All documents in a collection, in key order.
    pub fn find_all(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        let tree = self.tree(collection)?;
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (key, bytes) = entry?;
            let id = String::from_utf8_lossy(&key).to_string();
            docs.push((id, serde_json::from_slice(&bytes)?));
        }
        Ok(docs)
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.tree(collection)?.len())
    }

    /// Removes one document; returns whether it existed.
    pub fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.tree(collection)?.remove(id.as_bytes())?.is_some())
    }

    /// Drops an entire collection; returns whether it existed.
    pub fn drop_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.db.drop_tree(collection.as_bytes())?)
    }

    /// Names of all collections, including reserved ones, excluding sled's
    /// internal default tree.
    pub fn collection_names(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| String::from_utf8(name.to_vec()).ok())
            .filter(|name| name != "__sled__default")
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_new_rejects_duplicates() {
        let store = DocumentStore::temporary().unwrap();
        let doc = json!({"_id": "2004-06-30T00:00:00", "values": [1.0, 2.0]});

        store
            .insert_new("casa_gfed", "2004-06-30T00:00:00", &doc)
            .unwrap();
        let err = store
            .insert_new("casa_gfed", "2004-06-30T00:00:00", &doc)
            .unwrap_err();
        assert!(matches!(err, FluxError::DuplicateKey { .. }));

        // upsert is allowed to replace
        store
            .upsert("casa_gfed", "2004-06-30T00:00:00", &json!({"values": []}))
            .unwrap();
        assert_eq!(store.count("casa_gfed").unwrap(), 1);
    }

    #[test]
    fn test_find_all_returns_key_order() {
        let store = DocumentStore::temporary().unwrap();
        for ts in ["2004-07-01T00:00:00", "2004-06-30T00:00:00", "2004-06-30T03:00:00"] {
            store
                .insert_new("casa_gfed", ts, &json!({"_id": ts}))
                .unwrap();
        }

        let docs = store.find_all("casa_gfed").unwrap();
        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "2004-06-30T00:00:00",
                "2004-06-30T03:00:00",
                "2004-07-01T00:00:00"
            ]
        );
    }

    #[test]
    fn test_remove_and_drop() {
        let store = DocumentStore::temporary().unwrap();
        store.upsert("c", "a", &json!({"v": 1})).unwrap();
        store.upsert("c", "b", &json!({"v": 2})).unwrap();

        assert!(store.remove("c", "a").unwrap());
        assert!(!store.remove("c", "a").unwrap());
        assert!(store.drop_collection("c").unwrap());
        assert_eq!(store.count("c").unwrap(), 0);
    }
}
