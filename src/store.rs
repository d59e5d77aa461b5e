use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{Flowchart, FlowchartListItem, MAX_NAME_LEN};

/// Errors surfaced by the persistence store. Validation failures never reach
/// the backing medium; backend failures leave the in-memory document intact.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("flowchart name must not be empty")]
    EmptyName,
    #[error("flowchart name exceeds {MAX_NAME_LEN} characters (got {len})")]
    NameTooLong { len: usize },
    #[error("no flowchart '{id}' saved for feature '{feature}'")]
    NotFound { feature: String, id: String },
    #[error("no flowchart is open")]
    NoDocument,
    #[error("stored data for feature '{feature}' is not valid JSON")]
    Corrupt {
        feature: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend failure")]
    Backend(#[from] anyhow::Error),
}

/// Validates a flowchart name at the edit boundary. Returns the trimmed name.
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(StoreError::NameTooLong { len });
    }
    Ok(name)
}

/// The persisted medium: one serialized blob per feature. Implementations
/// only need get/set/remove by key; the store handles the JSON shape.
pub trait StorageBackend: std::fmt::Debug {
    fn get(&self, feature: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, feature: &str, blob: &str) -> anyhow::Result<()>;
    fn remove(&mut self, feature: &str) -> anyhow::Result<()>;
}

/// Keyed storage of flowcharts: `feature id -> flowchart id -> Flowchart`.
/// Shared by every editor session in the process; last writer wins.
#[derive(Debug)]
pub struct FlowchartStore {
    backend: Box<dyn StorageBackend>,
}

impl FlowchartStore {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// A store over a throwaway in-memory backend.
    pub fn memory() -> Self {
        Self::new(Box::new(MemoryBackend::default()))
    }

    /// A store persisting one JSON file per feature under `dir`.
    pub fn on_disk(dir: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Box::new(FileBackend::new(dir)?)))
    }

    /// Saves a flowchart, overwriting any existing entry with the same id
    /// within the feature. Returns the refreshed `updated_at` timestamp.
    pub fn save(&mut self, chart: &Flowchart) -> Result<DateTime<Utc>, StoreError> {
        validate_name(&chart.name)?;
        let mut charts = self.feature_map(&chart.feature_id)?;
        let now = Utc::now();
        let mut stored = chart.clone();
        stored.updated_at = now;
        charts.insert(stored.id.clone(), stored);
        self.write_feature_map(&chart.feature_id, &charts)?;
        Ok(now)
    }

    /// Loads a flowchart by id. Orphaned edges in the stored blob are dropped
    /// rather than failing the load.
    pub fn load(&self, feature: &str, id: &str) -> Result<Flowchart, StoreError> {
        let mut charts = self.feature_map(feature)?;
        let mut chart = charts.remove(id).ok_or_else(|| StoreError::NotFound {
            feature: feature.to_string(),
            id: id.to_string(),
        })?;
        chart.sanitize();
        Ok(chart)
    }

    pub fn delete(&mut self, feature: &str, id: &str) -> Result<(), StoreError> {
        let mut charts = self.feature_map(feature)?;
        if charts.remove(id).is_none() {
            return Err(StoreError::NotFound {
                feature: feature.to_string(),
                id: id.to_string(),
            });
        }
        if charts.is_empty() {
            self.backend.remove(feature)?;
        } else {
            self.write_feature_map(feature, &charts)?;
        }
        Ok(())
    }

    /// Summaries of every flowchart saved for a feature, most recent first.
    pub fn list(&self, feature: &str) -> Result<Vec<FlowchartListItem>, StoreError> {
        let charts = self.feature_map(feature)?;
        let mut items: Vec<FlowchartListItem> =
            charts.values().map(FlowchartListItem::of).collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    fn feature_map(&self, feature: &str) -> Result<BTreeMap<String, Flowchart>, StoreError> {
        match self.backend.get(feature)? {
            Some(blob) => {
                serde_json::from_str(&blob).map_err(|source| StoreError::Corrupt {
                    feature: feature.to_string(),
                    source,
                })
            }
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_feature_map(
        &mut self,
        feature: &str,
        charts: &BTreeMap<String, Flowchart>,
    ) -> Result<(), StoreError> {
        // Serialization of plain model types cannot fail; map the error
        // through anyway rather than panic.
        let blob = serde_json::to_string_pretty(charts)
            .context("serialize feature flowcharts")?;
        self.backend.set(feature, &blob)?;
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: HashMap<String, String>,
}

impl StorageBackend for MemoryBackend {
    fn get(&self, feature: &str) -> anyhow::Result<Option<String>> {
        Ok(self.blobs.get(feature).cloned())
    }

    fn set(&mut self, feature: &str, blob: &str) -> anyhow::Result<()> {
        self.blobs.insert(feature.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&mut self, feature: &str) -> anyhow::Result<()> {
        self.blobs.remove(feature);
        Ok(())
    }
}

/// On-disk backend: `<dir>/<feature>.json`, one file per feature. Survives
/// restarts; the directory is created eagerly so save failures surface here
/// rather than at the first write.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create storage directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, feature: &str) -> PathBuf {
        let safe: String = feature
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                    ch
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, feature: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(feature);
        if !path.is_file() {
            return Ok(None);
        }
        let blob = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        Ok(Some(blob))
    }

    fn set(&mut self, feature: &str, blob: &str) -> anyhow::Result<()> {
        let path = self.path_for(feature);
        fs::write(&path, blob).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, feature: &str) -> anyhow::Result<()> {
        let path = self.path_for(feature);
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Default on-disk location for the CLI.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "flowboard")
        .context("could not resolve a data directory for this platform")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeOverrides, Node, NodeKind, Position};

    fn sample_chart(feature: &str, name: &str) -> Flowchart {
        let mut chart = Flowchart::new(feature, name);
        let a = Node::create(NodeKind::Start, Position::new(100.0, 100.0), None);
        let b = Node::create(NodeKind::Process, Position::new(300.0, 100.0), None);
        chart
            .edges
            .push(Edge::create(&a.id, &b.id, EdgeOverrides::default()));
        chart.nodes.extend([a, b]);
        chart
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = FlowchartStore::memory();
        let chart = sample_chart("feat-cart", "Order Flow");
        let before = chart.updated_at;

        let saved_at = store.save(&chart).unwrap();
        assert!(saved_at >= before);

        let loaded = store.load("feat-cart", &chart.id).unwrap();
        assert_eq!(loaded.name, "Order Flow");
        assert_eq!(loaded.nodes, chart.nodes);
        assert_eq!(loaded.edges, chart.edges);
        assert!(loaded.updated_at >= before);
    }

    #[test]
    fn save_is_idempotent_on_id() {
        let mut store = FlowchartStore::memory();
        let mut chart = sample_chart("feat", "First");
        store.save(&chart).unwrap();
        chart.name = "Second".to_string();
        store.save(&chart).unwrap();

        let items = store.list("feat").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Second");
    }

    #[test]
    fn invalid_names_never_reach_the_backend() {
        let mut store = FlowchartStore::memory();
        let mut chart = sample_chart("feat", "ok");
        chart.name = String::new();
        assert!(matches!(store.save(&chart), Err(StoreError::EmptyName)));
        assert!(store.list("feat").unwrap().is_empty());

        chart.name = "x".repeat(51);
        assert!(matches!(
            store.save(&chart),
            Err(StoreError::NameTooLong { len: 51 })
        ));
        assert!(store.list("feat").unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_most_recent_first() {
        let mut store = FlowchartStore::memory();
        let older = sample_chart("feat", "Older");
        let newer = sample_chart("feat", "Newer");
        store.save(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save(&newer).unwrap();

        let items = store.list("feat").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Newer");
        assert_eq!(items[0].node_count, 2);
    }

    #[test]
    fn features_are_isolated() {
        let mut store = FlowchartStore::memory();
        let chart = sample_chart("feat-a", "A");
        store.save(&chart).unwrap();
        assert!(store.list("feat-b").unwrap().is_empty());
        assert!(matches!(
            store.load("feat-b", &chart.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_entry() {
        let mut store = FlowchartStore::memory();
        let chart = sample_chart("feat", "Doomed");
        store.save(&chart).unwrap();
        store.delete("feat", &chart.id).unwrap();
        assert!(matches!(
            store.load("feat", &chart.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("feat", &chart.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn load_drops_orphaned_edges_from_corrupted_blob() {
        let mut store = FlowchartStore::memory();
        let mut chart = sample_chart("feat", "Tampered");
        chart.edges.push(Edge::create(
            &chart.nodes[0].id,
            "node-removed-by-hand",
            EdgeOverrides::default(),
        ));
        store.save(&chart).unwrap();

        let loaded = store.load("feat", &chart.id).unwrap();
        assert_eq!(loaded.edges.len(), 1);
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let mut backend = MemoryBackend::default();
        backend.set("feat", "{ not json").unwrap();
        let store = FlowchartStore::new(Box::new(backend));
        assert!(matches!(
            store.list("feat"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let chart = sample_chart("feat/risky name", "Persisted");
        {
            let mut store = FlowchartStore::on_disk(dir.path()).unwrap();
            store.save(&chart).unwrap();
        }
        let store = FlowchartStore::on_disk(dir.path()).unwrap();
        let loaded = store.load("feat/risky name", &chart.id).unwrap();
        assert_eq!(loaded.name, "Persisted");
    }
}
