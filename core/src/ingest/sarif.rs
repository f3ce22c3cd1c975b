use super::read_report;
use crate::error::EngineResult;
use crate::ingest::SourceAdapter;
use crate::model::{Alert, AlertSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const SARIF_REPORT: &str = "results.sarif";

// Minimal slice of SARIF v2.1.0 — only the fields this engine consumes.
#[derive(Debug, Deserialize)]
struct SarifLog {
    runs: Vec<SarifRun>,
}

#[derive(Debug, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    #[serde(default)]
    results: Vec<SarifResult>,
}

#[derive(Debug, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Debug, Deserialize)]
struct SarifDriver {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    #[serde(default = "default_level")]
    level: String,
    message: SarifMessage,
    #[serde(default)]
    locations: Vec<SarifLocation>,
}

fn default_level() -> String {
    "warning".to_string()
}

#[derive(Debug, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    physical_location: Option<SarifPhysicalLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifPhysicalLocation {
    artifact_location: Option<SarifArtifactLocation>,
    region: Option<SarifRegion>,
}

#[derive(Debug, Deserialize)]
struct SarifArtifactLocation {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    start_line: Option<u64>,
}

/// SARIF-style results (CodeQL and friends). Natural key: tool + rule +
/// location. These alerts are never auto-remediated; the adapter only
/// normalizes them for triage.
pub struct SarifAdapter {
    reports_dir: PathBuf,
}

impl SarifAdapter {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }
}

impl SourceAdapter for SarifAdapter {
    fn source(&self) -> AlertSource {
        AlertSource::Sarif
    }

    fn collect(&self) -> EngineResult<Vec<Alert>> {
        let Some(log) =
            read_report::<SarifLog>(&self.reports_dir, SARIF_REPORT, self.source().tag())?
        else {
            return Ok(Vec::new());
        };

        let mut alerts = Vec::new();
        for run in log.runs {
            let tool = run.tool.driver.name;
            for result in run.results {
                let (uri, line) = result
                    .locations
                    .first()
                    .and_then(|l| l.physical_location.as_ref())
                    .map(|p| {
                        (
                            p.artifact_location
                                .as_ref()
                                .and_then(|a| a.uri.clone())
                                .unwrap_or_else(|| "unknown".to_string()),
                            p.region.as_ref().and_then(|r| r.start_line).unwrap_or(0),
                        )
                    })
                    .unwrap_or_else(|| ("unknown".to_string(), 0));

                let natural_key = format!("{}:{}:{}:{}", tool, result.rule_id, uri, line);
                let evidence = format!(
                    "rule={}; uri={}; line={}; level={}",
                    result.rule_id, uri, line, result.level
                );
                alerts.push(Alert::from_finding(
                    AlertSource::Sarif,
                    &natural_key,
                    &result.level,
                    format!("{}: {}", tool, result.rule_id),
                    result.message.text,
                    evidence,
                ));
            }
        }
        Ok(alerts)
    }
}
