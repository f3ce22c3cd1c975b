use crate::audit::entry::RemediationLogEntry;
use crate::error::{EngineError, EngineResult};
use crate::remediation::dispatcher::EscalationRecord;
use crate::store::AlertStore;
use std::fs;
use std::path::{Path, PathBuf};

/// Repository seam over the flat-file store so the backend can later be
/// swapped for a transactional store without touching engine logic. The
/// file impls load the whole document into memory and rewrite it whole on
/// save; single writer only, no locking between concurrent instances.
pub trait AlertRepository {
    fn exists(&self) -> bool;
    fn load(&self) -> EngineResult<AlertStore>;
    fn save(&self, store: &AlertStore) -> EngineResult<()>;
}

pub trait AuditRepository {
    fn exists(&self) -> bool;
    fn load(&self) -> EngineResult<Vec<RemediationLogEntry>>;
    fn save(&self, entries: &[RemediationLogEntry]) -> EngineResult<()>;
}

pub struct FileAlertRepository {
    path: PathBuf,
}

impl FileAlertRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertRepository for FileAlertRepository {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> EngineResult<AlertStore> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            EngineError::StoreUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let store: AlertStore = serde_json::from_str(&text).map_err(|e| {
            EngineError::StoreUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(store)
    }

    fn save(&self, store: &AlertStore) -> EngineResult<()> {
        write_json(&self.path, store)
    }
}

pub struct FileAuditRepository {
    path: PathBuf,
}

impl FileAuditRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AuditRepository for FileAuditRepository {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> EngineResult<Vec<RemediationLogEntry>> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, entries: &[RemediationLogEntry]) -> EngineResult<()> {
        write_json(&self.path, &entries)
    }
}

/// One JSON document per escalated alert under a dedicated directory.
pub struct EscalationWriter {
    dir: PathBuf,
}

impl EscalationWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn write(&self, record: &EscalationRecord) -> EngineResult<PathBuf> {
        let path = self.dir.join(format!("escalation_{}.json", record.alert.id));
        write_json(&path, record)?;
        Ok(path)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| EngineError::Persistence(format!("{}: {}", parent.display(), e)))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)
        .map_err(|e| EngineError::Persistence(format!("{}: {}", path.display(), e)))
}
