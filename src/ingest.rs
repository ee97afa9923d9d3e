//! Index build orchestration.
//!
//! Coordinates the full build flow for one resource: acquire the identifier's
//! build lock, fetch content appropriate to the resource kind, chunk it, feed
//! an index writer, and publish the finalized handle. The handle table is only
//! written after a confirmed full build, so a half-built index can never be
//! queried; any failure records an `error` status on the registry record
//! instead of raising past this component.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::OwnedMutexGuard;
use walkdir::WalkDir;

use crate::backend::{IndexBackend, SearchIndex};
use crate::cache::lock;
use crate::chunk;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch;
use crate::models::{Chunk, ResourceKind, ResourceRecord, ResourceStatus};
use crate::registry::ResourceRegistry;
use crate::repo;

/// Builds indexes and owns the identifier → live searcher handle table.
pub struct IndexBuilder {
    config: Config,
    backend: Box<dyn IndexBackend>,
    handles: RwLock<HashMap<String, Arc<dyn SearchIndex>>>,
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IndexBuilder {
    pub fn new(config: Config, backend: Box<dyn IndexBackend>) -> Self {
        Self {
            config,
            backend,
            handles: RwLock::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the index for `identifier` and publishes its handle.
    ///
    /// Re-running against an already indexed resource with a live handle is a
    /// no-op returning the current record. A second build while one is in
    /// flight is rejected as a conflict, never queued.
    pub async fn build(
        &self,
        registry: &ResourceRegistry,
        identifier: &str,
    ) -> Result<ResourceRecord> {
        let record = registry.get(identifier)?;

        if record.status == ResourceStatus::Indexed && self.handle(identifier).is_some() {
            tracing::debug!(identifier, "already indexed, skipping rebuild");
            return Ok(record);
        }

        let _guard = self.try_claim(identifier)?;

        match self.build_inner(&record).await {
            Ok(chunk_count) => registry.mark_indexed(identifier, chunk_count),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(identifier, error = %message, "index build failed");
                if let Err(status_err) = registry.set_status(
                    identifier,
                    ResourceStatus::Error {
                        message: message.clone(),
                    },
                ) {
                    tracing::error!(identifier, error = %status_err, "could not record build failure");
                }
                Err(e)
            }
        }
    }

    async fn build_inner(&self, record: &ResourceRecord) -> Result<usize> {
        let chunks = match &record.kind {
            ResourceKind::Repository { url, branch, path } => {
                let dir = if path.exists() {
                    path.clone()
                } else {
                    repo::ensure_clone(
                        url,
                        branch.as_deref(),
                        &self.config.storage.clones_dir(),
                    )?
                };
                self.collect_file_chunks(&dir)?
            }
            ResourceKind::Package { path } => self.collect_file_chunks(path)?,
            ResourceKind::Documentation { url } => {
                let text = fetch::fetch_documentation(url, &self.config.fetch).await?;
                let mut chunks = chunk::chunk_generic(&text, &self.config.chunking);
                chunks.truncate(self.config.chunking.max_chunks_per_doc);
                chunks
                    .into_iter()
                    .map(|c| c.with_source_path(url.clone()))
                    .collect()
            }
        };

        if chunks.is_empty() {
            return Err(Error::BuildFailure(format!(
                "no indexable content at {}",
                record.kind.location()
            )));
        }

        let chunk_count = chunks.len();
        let mut writer = self.backend.writer(&record.identifier);
        for chunk in chunks {
            writer.add(chunk);
        }
        let index = writer.finalize()?;

        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        handles.insert(record.identifier.clone(), index);
        tracing::info!(
            identifier = %record.identifier,
            chunks = chunk_count,
            "index build complete"
        );
        Ok(chunk_count)
    }

    /// The live handle for `identifier`, if one has been published.
    pub fn handle(&self, identifier: &str) -> Option<Arc<dyn SearchIndex>> {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        handles.get(identifier).cloned()
    }

    pub fn handle_count(&self) -> usize {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        handles.len()
    }

    /// Drops the handle for `identifier`; true if one existed.
    pub fn release(&self, identifier: &str) -> bool {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        handles.remove(identifier).is_some()
    }

    /// Moves a handle under a new identifier, keeping the index live.
    pub fn rename_handle(&self, old: &str, new: &str) {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = handles.remove(old) {
            handles.insert(new.to_string(), index);
        }
    }

    /// Claims the identifier's build lock without waiting.
    ///
    /// Used by `build` for its whole duration and by delete/rename so those
    /// mutations cannot race an in-flight build.
    pub fn try_claim(&self, identifier: &str) -> Result<OwnedMutexGuard<()>> {
        let slot = {
            let mut locks = lock(&self.build_locks);
            locks
                .entry(identifier.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        slot.try_lock_owned().map_err(|_| {
            Error::Conflict(format!("build already in progress for '{identifier}'"))
        })
    }

    fn collect_file_chunks(&self, root: &Path) -> Result<Vec<Chunk>> {
        if !root.exists() {
            return Err(Error::BuildFailure(format!(
                "location {} does not exist",
                root.display()
            )));
        }

        let include = build_globset(&self.config.walk.include_globs)?;
        let exclude = build_globset(&self.config.walk.exclude_globs)?;

        let mut chunks = Vec::new();
        let mut files = 0usize;
        let mut skipped = 0usize;
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::BuildFailure(format!("walk failed under {}: {e}", root.display()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().to_string();
            if exclude.is_match(&rel_str) || !include.is_match(&rel_str) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if size > self.config.walk.max_file_bytes {
                skipped += 1;
                continue;
            }
            // Binary or unreadable files are skipped, not fatal.
            let text = match std::fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            for chunk in chunk::chunk_file(entry.path(), &text, &self.config.chunking) {
                chunks.push(chunk.with_source_path(rel_str.clone()));
            }
            files += 1;
        }
        tracing::debug!(
            root = %root.display(),
            files,
            skipped,
            chunks = chunks.len(),
            "collected file chunks"
        );
        Ok(chunks)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::InvalidInput(format!("invalid glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidInput(format!("invalid glob set: {e}")))
}
