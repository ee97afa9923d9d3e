//! Resource registry: identifier → metadata, persisted as a JSON snapshot.
//!
//! Every mutation writes the full snapshot to disk before reporting success,
//! via a temp-file-then-rename sequence so a crash mid-write leaves the
//! previous snapshot intact. When the snapshot write fails, the in-memory
//! state is rolled back so memory and disk never diverge.
//!
//! Records keep insertion order; listings are stable within and across
//! process lifetimes.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::lock;
use crate::error::{Error, Result};
use crate::models::{ResourceKind, ResourceRecord, ResourceStatus};

#[derive(Debug)]
pub struct ResourceRegistry {
    path: PathBuf,
    records: Mutex<Vec<ResourceRecord>>,
}

impl ResourceRegistry {
    /// Loads the registry from `path`, or starts empty if no snapshot exists.
    ///
    /// A snapshot that exists but fails to parse is a startup error; silently
    /// discarding it would orphan every previously registered resource.
    pub fn load(path: PathBuf) -> Result<Self> {
        let records = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                Error::Unavailable(format!(
                    "cannot read registry snapshot {}: {e}",
                    path.display()
                ))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Unavailable(format!(
                    "registry snapshot {} is corrupt: {e}",
                    path.display()
                ))
            })?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Registers a resource, or returns the existing record unchanged when the
    /// identifier is already taken. New records start as `pending`.
    pub fn create_or_get(&self, identifier: &str, kind: ResourceKind) -> Result<ResourceRecord> {
        let mut records = lock(&self.records);
        if let Some(existing) = records.iter().find(|r| r.identifier == identifier) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let record = ResourceRecord {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            kind,
            status: ResourceStatus::Pending,
            created_at: now,
            updated_at: now,
            chunk_count: None,
        };
        records.push(record.clone());
        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }
        tracing::info!(identifier, kind = record.kind.label(), "registered resource");
        Ok(record)
    }

    /// The record for `identifier`, or NotFound.
    pub fn get(&self, identifier: &str) -> Result<ResourceRecord> {
        let records = lock(&self.records);
        records
            .iter()
            .find(|r| r.identifier == identifier)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("resource '{identifier}'")))
    }

    /// Sets the status of an existing record.
    pub fn set_status(&self, identifier: &str, status: ResourceStatus) -> Result<ResourceRecord> {
        self.update(identifier, |record| {
            record.status = status;
        })
    }

    /// Marks a build as complete: status `indexed` plus the chunk count of
    /// the build, in one persisted mutation.
    pub fn mark_indexed(&self, identifier: &str, chunk_count: usize) -> Result<ResourceRecord> {
        self.update(identifier, |record| {
            record.status = ResourceStatus::Indexed;
            record.chunk_count = Some(chunk_count);
        })
    }

    /// Moves a record from `old` to `new`. The old identifier ceases to
    /// exist; the stable internal id is unchanged.
    pub fn rename(&self, old: &str, new: &str) -> Result<ResourceRecord> {
        let mut records = lock(&self.records);
        if records.iter().any(|r| r.identifier == new) {
            return Err(Error::Conflict(format!("identifier '{new}' already exists")));
        }
        let idx = records
            .iter()
            .position(|r| r.identifier == old)
            .ok_or_else(|| Error::NotFound(format!("resource '{old}'")))?;

        let previous = records[idx].clone();
        records[idx].identifier = new.to_string();
        records[idx].updated_at = Utc::now();
        if let Err(e) = self.persist(&records) {
            records[idx] = previous;
            return Err(e);
        }
        tracing::info!(old, new, "renamed resource");
        Ok(records[idx].clone())
    }

    /// Removes a record and returns it. The caller is responsible for
    /// releasing any live index handle in the same operation.
    pub fn delete(&self, identifier: &str) -> Result<ResourceRecord> {
        let mut records = lock(&self.records);
        let idx = records
            .iter()
            .position(|r| r.identifier == identifier)
            .ok_or_else(|| Error::NotFound(format!("resource '{identifier}'")))?;

        let removed = records.remove(idx);
        if let Err(e) = self.persist(&records) {
            records.insert(idx, removed);
            return Err(e);
        }
        tracing::info!(identifier, "deleted resource");
        Ok(removed)
    }

    /// All records, optionally filtered by kind label, in insertion order.
    pub fn list(&self, kind: Option<&str>) -> Vec<ResourceRecord> {
        let records = lock(&self.records);
        records
            .iter()
            .filter(|r| kind.map_or(true, |k| r.kind.label() == k))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(
        &self,
        identifier: &str,
        apply: impl FnOnce(&mut ResourceRecord),
    ) -> Result<ResourceRecord> {
        let mut records = lock(&self.records);
        let idx = records
            .iter()
            .position(|r| r.identifier == identifier)
            .ok_or_else(|| Error::NotFound(format!("resource '{identifier}'")))?;

        let previous = records[idx].clone();
        apply(&mut records[idx]);
        records[idx].updated_at = Utc::now();
        if let Err(e) = self.persist(&records) {
            records[idx] = previous;
            return Err(e);
        }
        Ok(records[idx].clone())
    }

    fn persist(&self, records: &[ResourceRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| Error::Unavailable(format!("cannot serialize registry: {e}")))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Unavailable(format!(
                    "cannot create storage directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| Error::Unavailable(format!("cannot write registry snapshot: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Unavailable(format!("cannot replace registry snapshot: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn package_kind(path: &str) -> ResourceKind {
        ResourceKind::Package {
            path: PathBuf::from(path),
        }
    }

    fn registry_in(dir: &Path) -> ResourceRegistry {
        ResourceRegistry::load(dir.join("registry.json")).unwrap()
    }

    #[test]
    fn test_create_starts_pending_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        let record = registry
            .create_or_get("tokio", package_kind("/pkgs/tokio"))
            .unwrap();
        assert_eq!(record.status, ResourceStatus::Pending);
        assert!(tmp.path().join("registry.json").exists());
        assert!(!tmp.path().join("registry.json.tmp").exists());
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        let first = registry
            .create_or_get("serde", package_kind("/pkgs/serde"))
            .unwrap();
        let second = registry
            .create_or_get("serde", package_kind("/pkgs/elsewhere"))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.kind, package_kind("/pkgs/serde"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_status_requires_existing_record() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        let err = registry
            .set_status("ghost", ResourceStatus::Indexed)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_mark_indexed_records_chunk_count() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        registry
            .create_or_get("axum", package_kind("/pkgs/axum"))
            .unwrap();
        let record = registry.mark_indexed("axum", 42).unwrap();
        assert_eq!(record.status, ResourceStatus::Indexed);
        assert_eq!(record.chunk_count, Some(42));
    }

    #[test]
    fn test_rename_moves_and_guards() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        registry
            .create_or_get("old-name", package_kind("/pkgs/a"))
            .unwrap();
        registry
            .create_or_get("taken", package_kind("/pkgs/b"))
            .unwrap();

        assert!(matches!(
            registry.rename("missing", "x").unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            registry.rename("old-name", "taken").unwrap_err(),
            Error::Conflict(_)
        ));

        let renamed = registry.rename("old-name", "new-name").unwrap();
        assert_eq!(renamed.identifier, "new-name");
        assert!(matches!(
            registry.get("old-name").unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(registry.get("new-name").is_ok());
    }

    #[test]
    fn test_delete_removes_record() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        registry
            .create_or_get("short-lived", package_kind("/pkgs/x"))
            .unwrap();
        registry.delete("short-lived").unwrap();
        assert!(matches!(
            registry.delete("short-lived").unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_keeps_insertion_order_and_filters() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_in(tmp.path());
        registry
            .create_or_get("first", package_kind("/pkgs/first"))
            .unwrap();
        registry
            .create_or_get(
                "docs-page",
                ResourceKind::Documentation {
                    url: "https://docs.example/guide".to_string(),
                },
            )
            .unwrap();
        registry
            .create_or_get("second", package_kind("/pkgs/second"))
            .unwrap();

        let all: Vec<String> = registry
            .list(None)
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(all, vec!["first", "docs-page", "second"]);

        let packages = registry.list(Some("package"));
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|r| r.kind.label() == "package"));
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let registry = registry_in(tmp.path());
            registry
                .create_or_get("persisted", package_kind("/pkgs/p"))
                .unwrap();
            registry.mark_indexed("persisted", 7).unwrap();
        }
        let reloaded = registry_in(tmp.path());
        let record = reloaded.get("persisted").unwrap();
        assert_eq!(record.status, ResourceStatus::Indexed);
        assert_eq!(record.chunk_count, Some(7));
    }

    #[test]
    fn test_corrupt_snapshot_is_a_startup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ResourceRegistry::load(path).unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }
}
