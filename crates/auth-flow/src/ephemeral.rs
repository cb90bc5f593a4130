//! Tab-scoped key/value storage
//!
//! Holds in-flight flow data across the external round trip. Two backings:
//! - process memory, gone when the process exits
//! - a per-tab JSON file, rewritten atomically on every change and removed
//!   as soon as the map is empty, so nothing lingers after a flow completes
//!
//! A tokio Mutex serializes mutations; reads clone out of the map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

pub struct EphemeralStore {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, String>>,
}

impl EphemeralStore {
    /// Memory-only store.
    pub fn in_process() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// File-backed store. A missing file is an empty store; the file is only
    /// created by the first `put`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Storage(format!("reading {}: {e}", path.display()))),
        };
        debug!(path = %path.display(), entries = entries.len(), "loaded tab storage");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Remove and return `key`. A second `take` of the same key returns
    /// `None`.
    pub async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let value = entries.remove(key);
        if value.is_some() {
            self.persist(&entries).await?;
        }
        Ok(value)
    }

    /// Drop every entry, including the backing file.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.persist(&entries).await
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if entries.is_empty() {
            return remove_file(path).await;
        }
        write_atomic(path, entries).await
    }
}

async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed empty tab storage");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Storage(format!("removing {}: {e}", path.display()))),
    }
}

/// Temp file + rename in the same directory, 0600 on unix. Shared with the
/// durable token file.
pub(crate) async fn write_atomic<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing {}: {e}", path.display())))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("{} has no parent directory", path.display())))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Storage(format!("creating {}: {e}", dir.display())))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing {}: {e}", tmp_path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| Error::Storage(format!("setting permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming into {}: {e}", path.display())))?;

    debug!(path = %path.display(), "persisted");
    Ok(())
}
