use super::entry::RemediationLogEntry;

/// Append-style audit log. Entries are never edited or removed in memory;
/// persistence rewrites the full document on every mutating batch (a known
/// durability weakness of the file-as-database model, documented rather
/// than silently fixed).
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<RemediationLogEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<RemediationLogEntry>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, entry: RemediationLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RemediationLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{RemediationAction, RemediationResult};

    #[test]
    fn append_preserves_order() {
        let mut log = AuditLog::new();
        for i in 0..3 {
            log.append(RemediationLogEntry::new(
                "r_test",
                &format!("alert_{}", i),
                RemediationAction::Remediate,
                RemediationResult::Success,
                serde_json::json!({}),
            ));
        }
        assert_eq!(log.len(), 3);
        let ids: Vec<&str> = log.entries().iter().map(|e| e.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["alert_0", "alert_1", "alert_2"]);
    }
}
