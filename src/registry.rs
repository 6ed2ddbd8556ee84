use crate::error::Result;
use crate::feature_db::{self, QueryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Metadata describing one derived feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub description: String,
    pub source: String,
    pub version: String,
}

/// Name-keyed feature metadata registry persisted as a single JSON document.
///
/// Every mutation is a read-modify-write of the whole document; callers must
/// externally serialize concurrent writers.
pub struct FeatureRegistry {
    store_path: PathBuf,
    db_path: PathBuf,
}

impl FeatureRegistry {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(store_path: P, db_path: Q) -> Self {
        Self {
            store_path: store_path.into(),
            db_path: db_path.into(),
        }
    }

    /// Registers a feature; the last write for a given name wins.
    pub fn register(&self, name: &str, record: FeatureRecord) -> Result<()> {
        let mut store = self.load()?;
        store.insert(name.to_string(), record);
        self.save(&store)?;
        info!("Feature '{}' registered", name);
        Ok(())
    }

    /// Retrieves metadata for a single feature, or `None` when unregistered.
    pub fn get(&self, name: &str) -> Result<Option<FeatureRecord>> {
        Ok(self.load()?.remove(name))
    }

    /// Snapshot of the full registry.
    pub fn list(&self) -> Result<BTreeMap<String, FeatureRecord>> {
        self.load()
    }

    /// Ad-hoc read against the relational feature table. Fails with a
    /// not-found error when the transformation stage has not yet created the
    /// database.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        feature_db::query(&self.db_path, sql)
    }

    fn load(&self) -> Result<BTreeMap<String, FeatureRecord>> {
        if !self.store_path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.store_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, store: &BTreeMap<String, FeatureRecord>) -> Result<()> {
        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.store_path, serde_json::to_string_pretty(store)?)?;
        Ok(())
    }
}

/// Convenience constructor for a record with the standard source attribution.
pub fn transformed_feature(description: &str, version: &str) -> FeatureRecord {
    FeatureRecord {
        description: description.to_string(),
        source: "Transformed employee attrition data (preparation and transformation stages)"
            .to_string(),
        version: version.to_string(),
    }
}
