use super::read_report;
use crate::error::EngineResult;
use crate::ingest::SourceAdapter;
use crate::model::{Alert, AlertSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const STATIC_ANALYSIS_REPORT: &str = "static_analysis.json";

#[derive(Debug, Deserialize)]
struct StaticAnalysisReport {
    results: Vec<StaticAnalysisResult>,
}

#[derive(Debug, Deserialize)]
struct StaticAnalysisResult {
    check_id: String,
    path: String,
    line: u64,
    severity: String,
    confidence: String,
    message: String,
}

/// Static-analysis scanner results. Natural key: rule + path + line, so the
/// same finding re-reported across runs keeps its identity.
pub struct StaticAnalysisAdapter {
    reports_dir: PathBuf,
}

impl StaticAnalysisAdapter {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }
}

impl SourceAdapter for StaticAnalysisAdapter {
    fn source(&self) -> AlertSource {
        AlertSource::StaticAnalysis
    }

    fn collect(&self) -> EngineResult<Vec<Alert>> {
        let Some(report) = read_report::<StaticAnalysisReport>(
            &self.reports_dir,
            STATIC_ANALYSIS_REPORT,
            self.source().tag(),
        )?
        else {
            return Ok(Vec::new());
        };

        let alerts = report
            .results
            .into_iter()
            .map(|r| {
                let natural_key = format!("{}:{}:{}", r.check_id, r.path, r.line);
                let evidence = format!(
                    "path={}; line={}; severity={}; confidence={}",
                    r.path, r.line, r.severity, r.confidence
                );
                Alert::from_finding(
                    AlertSource::StaticAnalysis,
                    &natural_key,
                    &r.severity,
                    r.check_id,
                    r.message,
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
        "results": [
            {"check_id":"RS-SEC-001","path":"src/auth.rs","line":42,"severity":"LOW","confidence":"HIGH","message":"weak comparison"},
            {"check_id":"RS-SEC-002","path":"src/db.rs","line":7,"severity":"HIGH","confidence":"MEDIUM","message":"possible injection"}
        ]
    }"#;

    #[test]
    fn collects_findings_with_deterministic_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATIC_ANALYSIS_REPORT), SAMPLE).unwrap();
        let adapter = StaticAnalysisAdapter::new(dir.path());

        let first = adapter.collect().unwrap();
        let second = adapter.collect().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].normalized_severity, 2);
        assert!(first[0].evidence.contains("confidence=HIGH"));
    }

    #[test]
    fn missing_report_yields_zero_findings() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = StaticAnalysisAdapter::new(dir.path());
        assert!(adapter.collect().unwrap().is_empty());
    }

    #[test]
    fn malformed_report_yields_zero_findings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATIC_ANALYSIS_REPORT), "{ not json").unwrap();
        let adapter = StaticAnalysisAdapter::new(dir.path());
        assert!(adapter.collect().unwrap().is_empty());
    }
}
