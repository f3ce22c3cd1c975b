use crate::model::now_rfc3339_utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    Investigate,
    Remediate,
    Escalate,
    Close,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemediationResult {
    Success,
    Preview,
    ManualRequired,
    Error,
}

/// One immutable audit record. The ordered sequence of these entries is the
/// sole audit trail: an alert's current status can be reconstructed by
/// replaying them, independent of the alert store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemediationLogEntry {
    pub ts_utc: String,
    pub run_id: String,
    pub alert_id: String,
    pub action: RemediationAction,
    pub result: RemediationResult,
    pub details: serde_json::Value,
}

impl RemediationLogEntry {
    pub fn new(
        run_id: &str,
        alert_id: &str,
        action: RemediationAction,
        result: RemediationResult,
        details: serde_json::Value,
    ) -> Self {
        Self {
            ts_utc: now_rfc3339_utc(),
            run_id: run_id.to_string(),
            alert_id: alert_id.to_string(),
            action,
            result,
            details,
        }
    }
}
