//! Sandbox registry: in-memory collection mirrored by on-disk records.
//!
//! One JSON file per sandbox, named after the sandbox, under the
//! configured boxes directory. After every successful operation the
//! in-memory collection and the directory agree.
//!
//! The registry takes no lock on the boxes directory: two processes
//! operating on the same root can interleave (both may pass an
//! availability check before either persists). Accepted property of a
//! single-operator tool, documented rather than fixed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::entity::SandboxRecord;
use crate::error::{Error, Result};

/// The collection of known sandboxes.
pub struct Registry {
    boxes_dir: PathBuf,
    records: Vec<SandboxRecord>,
}

impl Registry {
    /// Opens the registry rooted at `boxes_dir`, creating the directory
    /// if needed and loading every persisted record.
    pub fn open(boxes_dir: impl Into<PathBuf>) -> Result<Self> {
        let boxes_dir = boxes_dir.into();
        fs::create_dir_all(&boxes_dir)?;

        let mut registry = Self {
            boxes_dir,
            records: Vec::new(),
        };
        registry.records = registry.list_all()?;

        tracing::debug!(
            boxes_dir = %registry.boxes_dir.display(),
            count = registry.records.len(),
            "opened sandbox registry"
        );
        Ok(registry)
    }

    /// The directory backing this registry.
    pub fn boxes_dir(&self) -> &Path {
        &self.boxes_dir
    }

    /// Registered records, in registration order.
    pub fn records(&self) -> &[SandboxRecord] {
        &self.records
    }

    /// Number of registered sandboxes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no sandbox is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when a sandbox of that name is registered.
    pub fn contains_name(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.sandbox.name == name)
    }

    /// Reads every record file under the boxes directory.
    ///
    /// An unreadable directory is an IO error; a record that fails to
    /// parse is fatal. No skip-and-continue: a corrupt registry should
    /// be noticed, not silently shrunk.
    pub fn list_all(&self) -> Result<Vec<SandboxRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.boxes_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            records.push(self.read_record(&path)?);
        }

        records.sort_by(|a, b| a.sandbox.name.cmp(&b.sandbox.name));
        Ok(records)
    }

    /// Loads the single record named `name`; `None` when absent.
    pub fn import(&self, name: &str) -> Result<Option<SandboxRecord>> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }

    /// Inserts a record iff its id is not already present. The
    /// collection is unchanged on conflict; nothing touches disk here.
    pub fn register(&mut self, record: SandboxRecord) -> Result<()> {
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(Error::RegistryConflict { id: record.id });
        }

        tracing::info!(
            id = record.id,
            name = %record.sandbox.name,
            "registered sandbox"
        );
        self.records.push(record);
        Ok(())
    }

    /// Writes the registered record with this id to `<name>.json`,
    /// fully replacing any previous file. Unregistered ids are
    /// rejected so nothing unvetted reaches disk.
    pub fn export(&self, id: u32) -> Result<PathBuf> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("id {}", id)))?;

        let path = self.record_path(&record.sandbox.name);
        fs::write(&path, record.to_pretty_json()?)?;

        tracing::info!(
            id = record.id,
            path = %path.display(),
            "exported sandbox record"
        );
        Ok(path)
    }

    /// First record whose identity or named attribute matches `value`.
    pub fn find(&self, attribute: &str, value: &str) -> Option<&SandboxRecord> {
        self.records.iter().find(|record| match attribute {
            "_id" | "id" => value.parse::<u32>().map_or(false, |id| record.id == id),
            attr => record.sandbox.attribute(attr) == Some(value),
        })
    }

    /// Removes the record file and the in-memory entry. An already
    /// deleted file is skipped; the name must still be registered.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let index = self
            .records
            .iter()
            .position(|r| r.sandbox.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        let path = self.record_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
        } else {
            tracing::warn!(path = %path.display(), "record file already absent");
        }

        self.records.remove(index);
        tracing::info!(name = %name, "deleted sandbox record");
        Ok(())
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.boxes_dir.join(format!("{}.json", name))
    }

    fn read_record(&self, path: &Path) -> Result<SandboxRecord> {
        let raw = fs::read_to_string(path)?;
        SandboxRecord::from_json(&raw).map_err(|e| match e {
            Error::Schema(msg) => Error::Schema(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ProvisionedPaths, Sandbox};
    use tempfile::TempDir;

    fn record(name: &str, id: u32) -> SandboxRecord {
        let mut sandbox = Sandbox::new(name, "python3.6");
        sandbox.materialize(ProvisionedPaths {
            repository: format!("https://example.com/{}.git", name),
            location: format!("repositories/{}", name),
            environment: format!("environments/{}.yml", name),
            profile: format!("profiles/ipython/profile_{}", name),
        });
        SandboxRecord { id, sandbox }
    }

    #[test]
    fn open_creates_the_boxes_directory() {
        let dir = TempDir::new().unwrap();
        let boxes = dir.path().join("containers/boxes");

        let registry = Registry::open(&boxes).unwrap();

        assert!(boxes.is_dir());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_then_export_then_import_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        let original = record("demo", 4821);

        registry.register(original.clone()).unwrap();
        let path = registry.export(4821).unwrap();

        assert_eq!(path, dir.path().join("demo.json"));
        let imported = registry.import("demo").unwrap().unwrap();
        assert_eq!(imported, original);
    }

    #[test]
    fn import_of_absent_name_is_none() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::open(dir.path()).unwrap();

        assert!(registry.import("ghost").unwrap().is_none());
    }

    #[test]
    fn duplicate_id_is_rejected_and_collection_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();

        registry.register(record("demo", 4821)).unwrap();
        let err = registry.register(record("other", 4821)).unwrap_err();

        assert!(matches!(err, Error::RegistryConflict { id: 4821 }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn export_of_unregistered_id_fails() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::open(dir.path()).unwrap();

        let err = registry.export(9999).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(dir.path().read_dir().unwrap().next().is_none());
    }

    #[test]
    fn export_overwrites_an_existing_file() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        let mut updated = record("demo", 4821);

        registry.register(updated.clone()).unwrap();
        registry.export(4821).unwrap();

        updated.sandbox.language = "nodejs".to_string();
        registry.records[0] = updated;
        registry.export(4821).unwrap();

        let imported = registry.import("demo").unwrap().unwrap();
        assert_eq!(imported.sandbox.language, "nodejs");
    }

    #[test]
    fn open_loads_previously_exported_records() {
        let dir = TempDir::new().unwrap();
        {
            let mut registry = Registry::open(dir.path()).unwrap();
            registry.register(record("alpha", 1111)).unwrap();
            registry.register(record("beta", 2222)).unwrap();
            registry.export(1111).unwrap();
            registry.export(2222).unwrap();
        }

        let reopened = Registry::open(dir.path()).unwrap();

        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains_name("alpha"));
        assert!(reopened.contains_name("beta"));
    }

    #[test]
    fn list_all_fails_on_a_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let err = registry.list_all().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn list_all_ignores_non_json_files() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        fs::write(dir.path().join("README.md"), "notes").unwrap();

        assert!(registry.list_all().unwrap().is_empty());
    }

    #[test]
    fn find_matches_id_and_attributes() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register(record("demo", 4821)).unwrap();

        assert_eq!(registry.find("_id", "4821").unwrap().sandbox.name, "demo");
        assert_eq!(registry.find("name", "demo").unwrap().id, 4821);
        assert_eq!(
            registry.find("language", "python3.6").unwrap().sandbox.name,
            "demo"
        );
        assert!(registry.find("name", "ghost").is_none());
        assert!(registry.find("bogus", "x").is_none());
    }

    #[test]
    fn delete_removes_file_and_memory_entry() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register(record("demo", 4821)).unwrap();
        registry.export(4821).unwrap();

        registry.delete("demo").unwrap();

        assert!(!dir.path().join("demo.json").exists());
        assert!(registry.is_empty());
        assert!(registry.import("demo").unwrap().is_none());
    }

    #[test]
    fn delete_of_unknown_name_fails() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();

        let err = registry.delete("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn delete_tolerates_an_already_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::open(dir.path()).unwrap();
        registry.register(record("demo", 4821)).unwrap();

        // Never exported; only the in-memory entry exists.
        registry.delete("demo").unwrap();
        assert!(registry.is_empty());
    }
}
