use crate::model::{now_rfc3339_utc, Alert, AlertStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STORE_SCHEMA_VERSION: &str = "ALERT_STORE_V1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreMetadata {
    pub created_at: String,
    pub last_updated_at: String,
    pub schema_version: String,
}

/// Keyed collection of alerts owned exclusively by the engine process for
/// the duration of a run. Persisted as a full snapshot after every mutating
/// batch; there is no locking between concurrent engine instances, so two
/// simultaneous runs against the same store are last-writer-wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStore {
    pub metadata: StoreMetadata,
    pub alerts: BTreeMap<String, Alert>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub new: usize,
    pub updated: usize,
    /// Re-seen findings whose alert is already closed. Closed is terminal:
    /// these are dropped, not reopened, and the count is the only trace.
    pub dropped_closed: usize,
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore {
    pub fn new() -> Self {
        let now = now_rfc3339_utc();
        Self {
            metadata: StoreMetadata {
                created_at: now.clone(),
                last_updated_at: now,
                schema_version: STORE_SCHEMA_VERSION.to_string(),
            },
            alerts: BTreeMap::new(),
        }
    }

    /// Merge one ingestion batch. Idempotent against unchanged scanner
    /// output: the id set and count are stable, only `last_seen` advances.
    pub fn merge(&mut self, batch: Vec<Alert>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for incoming in batch {
            match self.alerts.get_mut(&incoming.id) {
                None => {
                    self.alerts.insert(incoming.id.clone(), incoming);
                    outcome.new += 1;
                }
                Some(existing) if existing.status == AlertStatus::Closed => {
                    outcome.dropped_closed += 1;
                }
                Some(existing) => {
                    // Observation fields refresh; lifecycle fields are owned
                    // by the state machine and must survive re-ingestion.
                    existing.last_seen = incoming.last_seen;
                    existing.title = incoming.title;
                    existing.description = incoming.description;
                    existing.evidence = incoming.evidence;
                    existing.severity = incoming.severity;
                    existing.normalized_severity = incoming.normalized_severity;
                    outcome.updated += 1;
                }
            }
        }
        self.metadata.last_updated_at = now_rfc3339_utc();
        outcome
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Alert> {
        self.alerts.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn ids_with_status(&self, status: AlertStatus) -> Vec<String> {
        self.alerts
            .values()
            .filter(|a| a.status == status)
            .map(|a| a.id.clone())
            .collect()
    }
}
