//! Storage for per-owner domain result lists.
//!
//! The check engine hands every batch to a [`PersistenceSink`], which merges
//! the new records into the owner's stored list by `url`: existing entries are
//! updated in place, unseen urls are appended.

use crate::error::DomainMonitorError;
use crate::types::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Destination for the results of a batch.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Merge `results` into the owner's stored list and persist it.
    ///
    /// Returns `Ok(true)` once the merged list is durable.
    async fn upsert_domains(
        &self,
        results: &[DomainResult],
        owner: &str,
    ) -> Result<bool, DomainMonitorError>;
}

/// Merge new records into a stored list: update by `url`, append otherwise.
///
/// Duplicate urls within `results` collapse onto one stored entry, last write wins.
pub fn merge_by_url(stored: &mut Vec<DomainResult>, results: &[DomainResult]) {
    for result in results {
        match stored.iter_mut().find(|existing| existing.url == result.url) {
            Some(existing) => *existing = result.clone(),
            None => stored.push(result.clone()),
        }
    }
}

/// On-disk shape of an owner's domain file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DomainFile {
    #[serde(default)]
    domains: Vec<DomainResult>,
}

/// JSON file store: one `<owner>_domains.json` per owner in a directory.
///
/// Writes go through a temporary file and a rename so a crash never leaves a
/// half-written list behind. A single lock serializes read-modify-write cycles
/// from concurrent batches.
pub struct JsonFileStore {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the owner's domain file.
    pub fn owner_path(&self, owner: &str) -> Result<PathBuf, DomainMonitorError> {
        validate_owner(owner)?;
        Ok(self.directory.join(format!("{}_domains.json", owner)))
    }

    /// Load the owner's stored domains, creating an empty file if none exists.
    pub async fn load_domains(&self, owner: &str) -> Result<Vec<DomainResult>, DomainMonitorError> {
        let _guard = self.lock.lock().await;
        self.read_or_create(owner).await
    }

    /// Remove the entry with the given `url`. Returns whether one was found.
    pub async fn remove_domain(&self, owner: &str, url: &str) -> Result<bool, DomainMonitorError> {
        let _guard = self.lock.lock().await;
        let mut domains = self.read_or_create(owner).await?;

        let Some(index) = domains.iter().position(|d| d.url == url) else {
            return Ok(false);
        };
        domains.remove(index);
        self.write(owner, domains).await?;
        debug!(owner = %owner, url = %url, "Removed stored domain");
        Ok(true)
    }

    async fn read_or_create(&self, owner: &str) -> Result<Vec<DomainResult>, DomainMonitorError> {
        let path = self.owner_path(owner)?;

        if !tokio::fs::try_exists(&path).await? {
            self.write(owner, Vec::new()).await?;
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            DomainMonitorError::file_error(path.to_string_lossy(), e.to_string())
        })?;
        let file: DomainFile = serde_json::from_str(&content).map_err(|e| {
            DomainMonitorError::file_error(
                path.to_string_lossy(),
                format!("Invalid domain file: {}", e),
            )
        })?;
        Ok(file.domains)
    }

    async fn write(&self, owner: &str, domains: Vec<DomainResult>) -> Result<(), DomainMonitorError> {
        let path = self.owner_path(owner)?;
        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            DomainMonitorError::file_error(self.directory.to_string_lossy(), e.to_string())
        })?;

        let json = serde_json::to_string_pretty(&DomainFile { domains })?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            DomainMonitorError::file_error(tmp_path.to_string_lossy(), e.to_string())
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            DomainMonitorError::file_error(path.to_string_lossy(), e.to_string())
        })?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for JsonFileStore {
    async fn upsert_domains(
        &self,
        results: &[DomainResult],
        owner: &str,
    ) -> Result<bool, DomainMonitorError> {
        let _guard = self.lock.lock().await;
        let mut domains = self
            .read_or_create(owner)
            .await
            .map_err(|e| DomainMonitorError::storage(owner, e.to_string()))?;

        merge_by_url(&mut domains, results);
        let total = domains.len();
        self.write(owner, domains)
            .await
            .map_err(|e| DomainMonitorError::storage(owner, e.to_string()))?;

        info!(owner = %owner, updated = results.len(), total, "Stored domain results");
        Ok(true)
    }
}

/// In-process store keyed by owner.
#[derive(Default)]
pub struct MemoryStore {
    domains: Mutex<HashMap<String, Vec<DomainResult>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the owner's stored domains.
    pub async fn domains(&self, owner: &str) -> Vec<DomainResult> {
        self.domains
            .lock()
            .await
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn upsert_domains(
        &self,
        results: &[DomainResult],
        owner: &str,
    ) -> Result<bool, DomainMonitorError> {
        let mut domains = self.domains.lock().await;
        merge_by_url(domains.entry(owner.to_string()).or_default(), results);
        Ok(true)
    }
}

/// Owner names become file names, so keep them to a safe alphabet.
fn validate_owner(owner: &str) -> Result<(), DomainMonitorError> {
    let valid = !owner.is_empty()
        && owner.len() <= 128
        && owner
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        && !owner.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(DomainMonitorError::storage(
            owner,
            "Owner name may only contain letters, digits, '-', '_', '.', '@'",
        ))
    }
}
