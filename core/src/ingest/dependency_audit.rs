use super::read_report;
use crate::error::EngineResult;
use crate::ingest::SourceAdapter;
use crate::model::{Alert, AlertSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEPENDENCY_AUDIT_REPORT: &str = "dependency_audit.json";

#[derive(Debug, Deserialize)]
struct DependencyAuditReport {
    vulnerabilities: Vec<DependencyVulnerability>,
}

#[derive(Debug, Deserialize)]
struct DependencyVulnerability {
    package: String,
    advisory_id: String,
    severity: String,
    installed: String,
    #[serde(default)]
    fix_version: Option<String>,
    description: String,
}

/// Dependency-vulnerability findings. Natural key: package + advisory id.
pub struct DependencyAuditAdapter {
    reports_dir: PathBuf,
}

impl DependencyAuditAdapter {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }
}

impl SourceAdapter for DependencyAuditAdapter {
    fn source(&self) -> AlertSource {
        AlertSource::DependencyAudit
    }

    fn collect(&self) -> EngineResult<Vec<Alert>> {
        let Some(report) = read_report::<DependencyAuditReport>(
            &self.reports_dir,
            DEPENDENCY_AUDIT_REPORT,
            self.source().tag(),
        )?
        else {
            return Ok(Vec::new());
        };

        let alerts = report
            .vulnerabilities
            .into_iter()
            .map(|v| {
                let natural_key = format!("{}:{}", v.package, v.advisory_id);
                let evidence = format!(
                    "package={}; advisory={}; installed={}; fix={}",
                    v.package,
                    v.advisory_id,
                    v.installed,
                    v.fix_version.as_deref().unwrap_or("none")
                );
                Alert::from_finding(
                    AlertSource::DependencyAudit,
                    &natural_key,
                    &v.severity,
                    format!("{} vulnerable ({})", v.package, v.advisory_id),
                    v.description,
                    evidence,
                )
            })
            .collect();
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "vulnerabilities": [
            {"package":"lodash","advisory_id":"GHSA-p6mc","severity":"HIGH","installed":"4.17.20","fix_version":"4.17.21","description":"prototype pollution"},
            {"package":"leftpad","advisory_id":"RUSTSEC-0001","severity":"LOW","installed":"0.1.0","description":"unmaintained"}
        ]
    }"#;

    #[test]
    fn collects_vulnerabilities_keyed_by_package_and_advisory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEPENDENCY_AUDIT_REPORT), SAMPLE).unwrap();
        let alerts = DependencyAuditAdapter::new(dir.path()).collect().unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].evidence.contains("fix=4.17.21"));
        assert!(alerts[1].evidence.contains("fix=none"));
        assert_ne!(alerts[0].id, alerts[1].id);
    }

    #[test]
    fn missing_report_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DependencyAuditAdapter::new(dir.path())
            .collect()
            .unwrap()
            .is_empty());
    }
}
