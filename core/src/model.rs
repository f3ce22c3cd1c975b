use crate::severity::normalize_severity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    StaticAnalysis,
    DependencyAudit,
    ComplianceAudit,
    Sarif,
}

impl AlertSource {
    pub fn tag(&self) -> &'static str {
        match self {
            AlertSource::StaticAnalysis => "static_analysis",
            AlertSource::DependencyAudit => "dependency_audit",
            AlertSource::ComplianceAudit => "compliance_audit",
            AlertSource::Sarif => "sarif",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Investigating,
    Escalated,
    Remediated,
    FalsePositive,
    Closed,
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 6] = [
        AlertStatus::New,
        AlertStatus::Investigating,
        AlertStatus::Escalated,
        AlertStatus::Remediated,
        AlertStatus::FalsePositive,
        AlertStatus::Closed,
    ];

    /// Label matching the serde wire encoding; tested against it.
    pub fn tag(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Escalated => "escalated",
            AlertStatus::Remediated => "remediated",
            AlertStatus::FalsePositive => "false_positive",
            AlertStatus::Closed => "closed",
        }
    }
}

/// A normalized, deduplicated record of one security or compliance finding,
/// independent of its originating scanner format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub source: AlertSource,
    pub severity: String,
    pub normalized_severity: u8,
    pub title: String,
    pub description: String,
    pub evidence: String,
    pub status: AlertStatus,
    pub created: String, // RFC3339 UTC string
    pub last_seen: String,
    pub status_changed_at: String,
    pub is_false_positive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_positive_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_details: Option<serde_json::Value>,
}

impl Alert {
    /// Build a fresh alert from one finding. The merge step decides whether
    /// any of this survives against an already-known alert with the same id.
    pub fn from_finding(
        source: AlertSource,
        natural_key: &str,
        severity: &str,
        title: String,
        description: String,
        evidence: String,
    ) -> Self {
        let now = now_rfc3339_utc();
        Self {
            id: alert_id(source, natural_key),
            source,
            severity: severity.to_string(),
            normalized_severity: normalize_severity(severity),
            title,
            description,
            evidence,
            status: AlertStatus::New,
            created: now.clone(),
            last_seen: now.clone(),
            status_changed_at: now,
            is_false_positive: false,
            false_positive_reason: None,
            escalation_reason: None,
            remediation_details: None,
        }
    }
}

/// Deterministic, content-derived alert identity: a pure function of the
/// source and the finding's natural key. Ingestion time, batch composition
/// and randomness must never leak into it.
pub fn alert_id(source: AlertSource, natural_key: &str) -> String {
    let mut h = Sha256::new();
    h.update(source.tag().as_bytes());
    h.update(b":");
    h.update(natural_key.as_bytes());
    hex::encode(h.finalize())[..32].to_string()
}

/// Parse the `key=value; key=value` evidence encoding the adapters emit.
/// Unknown segments are skipped, not errors.
pub fn evidence_fields(evidence: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for segment in evidence.split("; ") {
        if let Some((k, v)) = segment.split_once('=') {
            fields.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    fields
}

pub fn now_rfc3339_utc() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_id_is_deterministic() {
        let a = alert_id(AlertSource::StaticAnalysis, "RULE-1:src/main.rs:42");
        let b = alert_id(AlertSource::StaticAnalysis, "RULE-1:src/main.rs:42");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn alert_id_separates_sources() {
        let a = alert_id(AlertSource::StaticAnalysis, "CTRL-001");
        let b = alert_id(AlertSource::ComplianceAudit, "CTRL-001");
        assert_ne!(a, b);
    }

    #[test]
    fn evidence_fields_round_trip() {
        let fields =
            evidence_fields("control=CTRL-PWD-001; expected=enabled; actual=disabled; reference=CIS 1.1.1");
        assert_eq!(fields.get("control").map(String::as_str), Some("CTRL-PWD-001"));
        assert_eq!(fields.get("expected").map(String::as_str), Some("enabled"));
        assert_eq!(fields.get("reference").map(String::as_str), Some("CIS 1.1.1"));
        assert!(fields.get("missing").is_none());
    }

    #[test]
    fn evidence_fields_tolerates_free_text() {
        assert!(evidence_fields("no structured fields here").is_empty());
    }

    #[test]
    fn status_tags_match_the_wire_encoding() {
        for status in AlertStatus::ALL {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, serde_json::Value::String(status.tag().to_string()));
        }
    }

    #[test]
    fn new_alert_starts_in_new_status() {
        let a = Alert::from_finding(
            AlertSource::DependencyAudit,
            "lodash:GHSA-xxxx",
            "HIGH",
            "lodash vulnerable".to_string(),
            "prototype pollution".to_string(),
            "package=lodash; installed=4.17.20; fix=4.17.21".to_string(),
        );
        assert_eq!(a.status, AlertStatus::New);
        assert_eq!(a.normalized_severity, 8);
        assert_eq!(a.created, a.last_seen);
        assert!(!a.is_false_positive);
    }
}
