pub mod compliance;
pub mod dependency_audit;
pub mod sarif;
pub mod static_analysis;

use crate::error::EngineResult;
use crate::model::{Alert, AlertSource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// One scanner source. Adapters are independent of each other: a missing or
/// malformed report is that adapter's problem alone and yields zero findings
/// plus a warning, never an error that aborts collection.
pub trait SourceAdapter {
    fn source(&self) -> AlertSource;
    fn collect(&self) -> EngineResult<Vec<Alert>>;
}

#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    pub alerts: Vec<Alert>,
    pub per_source: BTreeMap<&'static str, usize>,
    pub warnings: Vec<String>,
}

/// Run every adapter, isolating failures. An adapter that returns an error
/// (anything beyond the missing/malformed cases it absorbs itself) is
/// reported as a warning and contributes zero findings.
pub fn collect_all(adapters: &[Box<dyn SourceAdapter>]) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    for adapter in adapters {
        let tag = adapter.source().tag();
        match adapter.collect() {
            Ok(alerts) => {
                outcome.per_source.insert(tag, alerts.len());
                outcome.alerts.extend(alerts);
            }
            Err(e) => {
                warn!(source = tag, error = %e, "source collection failed; skipping");
                outcome.warnings.push(format!("{}: {}", tag, e));
                outcome.per_source.insert(tag, 0);
            }
        }
    }
    outcome
}

/// All four adapters against one reports directory.
pub fn default_adapters(reports_dir: &Path) -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(static_analysis::StaticAnalysisAdapter::new(reports_dir)),
        Box::new(dependency_audit::DependencyAuditAdapter::new(reports_dir)),
        Box::new(compliance::ComplianceAuditAdapter::new(reports_dir)),
        Box::new(sarif::SarifAdapter::new(reports_dir)),
    ]
}

/// Locate a report file by name anywhere under the reports directory.
/// Scanners drop their output in tool-specific subdirectories, so a flat
/// path join is not enough.
pub(crate) fn find_report(reports_dir: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(reports_dir)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|e| e.file_type().is_file() && e.file_name() == file_name)
        .map(|e| e.into_path())
}

/// Shared missing/malformed handling: returns the parsed report or None
/// (with a warning logged), per the source-unavailable contract.
pub(crate) fn read_report<T: serde::de::DeserializeOwned>(
    reports_dir: &Path,
    file_name: &str,
    source_tag: &str,
) -> EngineResult<Option<T>> {
    let Some(path) = find_report(reports_dir, file_name) else {
        warn!(source = source_tag, report = file_name, "report file missing; zero findings");
        return Ok(None);
    };
    let text = std::fs::read_to_string(&path)?;
    match serde_json::from_str::<T>(&text) {
        Ok(report) => Ok(Some(report)),
        Err(e) => {
            warn!(
                source = source_tag,
                report = %path.display(),
                error = %e,
                "report failed to parse; zero findings"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    struct FailingAdapter;

    impl SourceAdapter for FailingAdapter {
        fn source(&self) -> AlertSource {
            AlertSource::Sarif
        }
        fn collect(&self) -> EngineResult<Vec<Alert>> {
            Err(EngineError::InvalidInput("boom".to_string()))
        }
    }

    #[test]
    fn one_failing_adapter_does_not_abort_the_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("static_analysis.json"),
            r#"{"results":[{"check_id":"R1","path":"src/a.rs","line":1,"severity":"LOW","confidence":"HIGH","message":"m"}]}"#,
        )
        .unwrap();

        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(FailingAdapter),
            Box::new(static_analysis::StaticAnalysisAdapter::new(dir.path())),
        ];
        let outcome = collect_all(&adapters);
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.per_source.get("sarif"), Some(&0));
        assert_eq!(outcome.per_source.get("static_analysis"), Some(&1));
    }

    #[test]
    fn reports_are_found_in_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("scanner-output");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("marker.json"), "{}").unwrap();
        assert!(find_report(dir.path(), "marker.json").is_some());
        assert!(find_report(dir.path(), "absent.json").is_none());
    }
}
