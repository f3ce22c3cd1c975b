use super::read_report;
use crate::error::EngineResult;
use crate::ingest::SourceAdapter;
use crate::model::{Alert, AlertSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const COMPLIANCE_AUDIT_REPORT: &str = "compliance_audit.json";

#[derive(Debug, Deserialize)]
struct ComplianceAuditReport {
    controls: Vec<ControlResult>,
}

#[derive(Debug, Deserialize)]
struct ControlResult {
    control_id: String,
    title: String,
    severity: String,
    status: String,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    actual: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

/// Compliance-control audit results. Only non-compliant controls become
/// alerts; the control id is the natural key. Expected/actual/reference go
/// into evidence so escalation records can generate next steps from them.
pub struct ComplianceAuditAdapter {
    reports_dir: PathBuf,
}

impl ComplianceAuditAdapter {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }
}

impl SourceAdapter for ComplianceAuditAdapter {
    fn source(&self) -> AlertSource {
        AlertSource::ComplianceAudit
    }

    fn collect(&self) -> EngineResult<Vec<Alert>> {
        let Some(report) = read_report::<ComplianceAuditReport>(
            &self.reports_dir,
            COMPLIANCE_AUDIT_REPORT,
            self.source().tag(),
        )?
        else {
            return Ok(Vec::new());
        };

        let alerts = report
            .controls
            .into_iter()
            .filter(|c| !c.status.eq_ignore_ascii_case("compliant"))
            .map(|c| {
                let evidence = format!(
                    "control={}; expected={}; actual={}; reference={}",
                    c.control_id,
                    c.expected.as_deref().unwrap_or("unspecified"),
                    c.actual.as_deref().unwrap_or("unspecified"),
                    c.reference.as_deref().unwrap_or("unspecified"),
                );
                Alert::from_finding(
                    AlertSource::ComplianceAudit,
                    &c.control_id,
                    &c.severity,
                    c.title,
                    format!("control {} reported {}", c.control_id, c.status),
                    evidence,
                )
            })
            .collect();
        Ok(alerts)
    }
}
