use crate::audit::entry::RemediationLogEntry;
use crate::error::{EngineError, EngineResult};
use crate::model::AlertStatus;
use crate::severity::severity_bucket;
use crate::store::AlertStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const HIGH_OPEN_WARNING_THRESHOLD: usize = 5;
const CLOSURE_RATE_WARNING_THRESHOLD: f64 = 0.5;
const FALSE_POSITIVE_WARNING_RATIO: f64 = 0.2;

/// Aggregate compliance statistics. Pure read-only function of the alert
/// store and the audit log; this struct is the sole interface handed to
/// external renderers (HTML/Excel/console).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub by_severity_bucket: BTreeMap<String, usize>,
    pub remediated: usize,
    pub escalated: usize,
    pub false_positives: usize,
    pub closed: usize,
    /// Alerts still ahead of a dispatch decision (`new` + `investigating`).
    pub pending: usize,
    pub critical_open: usize,
    pub high_open: usize,
    pub remediation_rate: f64,
    pub escalation_rate: f64,
    pub closure_rate: f64,
    pub audit_entries: usize,
    pub warnings: Vec<String>,
}

pub fn build_statistics(store: &AlertStore, log: &[RemediationLogEntry]) -> Statistics {
    let total = store.len();
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_severity_bucket: BTreeMap<String, usize> = BTreeMap::new();
    let mut remediated = 0;
    let mut escalated = 0;
    let mut false_positives = 0;
    let mut closed = 0;
    let mut pending = 0;
    let mut critical_open = 0;
    let mut high_open = 0;

    for alert in store.alerts.values() {
        *by_status.entry(alert.status.tag().to_string()).or_insert(0) += 1;
        *by_source.entry(alert.source.tag().to_string()).or_insert(0) += 1;
        *by_severity_bucket
            .entry(severity_bucket(alert.normalized_severity).to_string())
            .or_insert(0) += 1;

        match alert.status {
            AlertStatus::Remediated => remediated += 1,
            AlertStatus::Escalated => escalated += 1,
            AlertStatus::FalsePositive => false_positives += 1,
            AlertStatus::Closed => closed += 1,
            AlertStatus::New | AlertStatus::Investigating => pending += 1,
        }

        let open = matches!(
            alert.status,
            AlertStatus::New | AlertStatus::Investigating | AlertStatus::Escalated
        );
        if open {
            match alert.normalized_severity {
                9..=10 => critical_open += 1,
                7..=8 => high_open += 1,
                _ => {}
            }
        }
    }

    let rate = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let remediation_rate = rate(remediated);
    let escalation_rate = rate(escalated);
    let closure_rate = rate(remediated + closed);

    let mut warnings = Vec::new();
    if critical_open > 0 {
        warnings.push(format!("{} critical alerts remain open", critical_open));
    }
    if high_open > HIGH_OPEN_WARNING_THRESHOLD {
        warnings.push(format!(
            "{} high-severity alerts remain open (threshold {})",
            high_open, HIGH_OPEN_WARNING_THRESHOLD
        ));
    }
    if total > 0 && closure_rate < CLOSURE_RATE_WARNING_THRESHOLD {
        warnings.push(format!(
            "closure rate {:.0}% is below 50%",
            closure_rate * 100.0
        ));
    }
    if escalated > remediated {
        warnings.push(format!(
            "escalations ({}) outpace remediations ({})",
            escalated, remediated
        ));
    }
    if total > 0 && (false_positives as f64 / total as f64) > FALSE_POSITIVE_WARNING_RATIO {
        warnings.push(format!(
            "false positive rate {:.0}% exceeds 20%; review classifier rules",
            false_positives as f64 / total as f64 * 100.0
        ));
    }

    Statistics {
        total,
        by_status,
        by_source,
        by_severity_bucket,
        remediated,
        escalated,
        false_positives,
        closed,
        pending,
        critical_open,
        high_open,
        remediation_rate,
        escalation_rate,
        closure_rate,
        audit_entries: log.len(),
        warnings,
    }
}

/// Machine-readable metric,value summary for downstream renderers.
pub fn render_statistics_csv(stats: &Statistics) -> EngineResult<String> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["metric", "value"])?;
    w.write_record(["total", &stats.total.to_string()])?;
    w.write_record(["remediated", &stats.remediated.to_string()])?;
    w.write_record(["escalated", &stats.escalated.to_string()])?;
    w.write_record(["false_positives", &stats.false_positives.to_string()])?;
    w.write_record(["closed", &stats.closed.to_string()])?;
    w.write_record(["pending", &stats.pending.to_string()])?;
    w.write_record(["critical_open", &stats.critical_open.to_string()])?;
    w.write_record(["high_open", &stats.high_open.to_string()])?;
    w.write_record(["remediation_rate", &format!("{:.4}", stats.remediation_rate)])?;
    w.write_record(["escalation_rate", &format!("{:.4}", stats.escalation_rate)])?;
    w.write_record(["closure_rate", &format!("{:.4}", stats.closure_rate)])?;
    w.write_record(["audit_entries", &stats.audit_entries.to_string()])?;
    for (status, count) in &stats.by_status {
        w.write_record([&format!("status.{}", status), &count.to_string()])?;
    }
    for (source, count) in &stats.by_source {
        w.write_record([&format!("source.{}", source), &count.to_string()])?;
    }
    for (bucket, count) in &stats.by_severity_bucket {
        w.write_record([&format!("severity.{}", bucket), &count.to_string()])?;
    }
    let bytes = w
        .into_inner()
        .map_err(|e| EngineError::Persistence(format!("csv render: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| EngineError::Persistence(format!("csv render utf8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, AlertSource, AlertStatus};

    fn store_with(statuses: &[(AlertStatus, u8)]) -> AlertStore {
        let mut store = AlertStore::new();
        let batch = statuses
            .iter()
            .enumerate()
            .map(|(i, (status, sev))| {
                let mut a = Alert::from_finding(
                    AlertSource::StaticAnalysis,
                    &format!("k{}", i),
                    "LOW",
                    "t".to_string(),
                    String::new(),
                    String::new(),
                );
                a.status = *status;
                a.normalized_severity = *sev;
                a
            })
            .collect();
        store.merge(batch);
        store
    }

    #[test]
    fn empty_store_yields_zero_rates_and_no_warnings() {
        let stats = build_statistics(&AlertStore::new(), &[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.remediation_rate, 0.0);
        assert_eq!(stats.escalation_rate, 0.0);
        assert_eq!(stats.closure_rate, 0.0);
        assert!(stats.warnings.is_empty());
    }

    #[test]
    fn counts_partition_the_store() {
        let stats = build_statistics(
            &store_with(&[
                (AlertStatus::Remediated, 2),
                (AlertStatus::Escalated, 8),
                (AlertStatus::FalsePositive, 2),
                (AlertStatus::Investigating, 5),
                (AlertStatus::New, 5),
            ]),
            &[],
        );
        assert_eq!(stats.total, 5);
        assert_eq!(
            stats.remediated + stats.escalated + stats.false_positives + stats.pending,
            stats.total
        );
    }

    #[test]
    fn critical_open_triggers_warning() {
        let stats = build_statistics(&store_with(&[(AlertStatus::New, 10)]), &[]);
        assert_eq!(stats.critical_open, 1);
        assert!(stats.warnings.iter().any(|w| w.contains("critical")));
    }

    #[test]
    fn remediated_critical_is_not_open() {
        let stats = build_statistics(&store_with(&[(AlertStatus::Remediated, 10)]), &[]);
        assert_eq!(stats.critical_open, 0);
    }

    #[test]
    fn escalations_outpacing_remediations_warns() {
        let stats = build_statistics(
            &store_with(&[(AlertStatus::Escalated, 5), (AlertStatus::Escalated, 5)]),
            &[],
        );
        assert!(stats.warnings.iter().any(|w| w.contains("outpace")));
    }

    #[test]
    fn false_positive_ratio_warning_fires_above_twenty_percent() {
        let stats = build_statistics(
            &store_with(&[
                (AlertStatus::FalsePositive, 2),
                (AlertStatus::Remediated, 2),
                (AlertStatus::Remediated, 2),
            ]),
            &[],
        );
        assert!(stats.warnings.iter().any(|w| w.contains("false positive")));
    }

    #[test]
    fn csv_render_contains_headline_metrics() {
        let stats = build_statistics(&store_with(&[(AlertStatus::Remediated, 2)]), &[]);
        let csv = render_statistics_csv(&stats).unwrap();
        assert!(csv.starts_with("metric,value"));
        assert!(csv.contains("total,1"));
        assert!(csv.contains("remediation_rate,1.0000"));
        assert!(csv.contains("source.static_analysis,1"));
    }
}
