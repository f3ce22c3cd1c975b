use crate::model::{evidence_fields, Alert, AlertSource};
use crate::severity::normalize_severity;
use std::collections::BTreeSet;

/// Compliance controls considered safe to fix automatically. Everything off
/// this list escalates regardless of severity.
pub const SAFE_CONTROLS: &[&str] = &[
    "CTRL-AUDIT-001",
    "CTRL-LOG-002",
    "CTRL-PWD-003",
    "CTRL-SPF-004",
    "CTRL-TLS-005",
];

/// Per-source eligibility predicate. Built once at dispatcher construction
/// and never mutated: for an unchanged alert the answer never changes.
#[derive(Debug, Clone)]
pub struct RemediationPolicy {
    safe_controls: BTreeSet<String>,
}

impl RemediationPolicy {
    pub fn new(safe_controls: impl IntoIterator<Item = String>) -> Self {
        Self {
            safe_controls: safe_controls.into_iter().collect(),
        }
    }

    pub fn with_default_safe_controls() -> Self {
        Self::new(SAFE_CONTROLS.iter().map(|c| c.to_string()))
    }

    pub fn eligible(&self, alert: &Alert) -> bool {
        match alert.source {
            // Advisory-only: the handler emits an upgrade recommendation,
            // so auto-remediation is always safe.
            AlertSource::DependencyAudit => true,
            // Only controls on the fixed allow-list may be auto-fixed.
            AlertSource::ComplianceAudit => evidence_fields(&alert.evidence)
                .get("control")
                .map(|c| self.safe_controls.contains(c))
                .unwrap_or(false),
            // Lowest severity tier and highest confidence only.
            AlertSource::StaticAnalysis => {
                let fields = evidence_fields(&alert.evidence);
                let severity_ok = fields
                    .get("severity")
                    .map(|s| normalize_severity(s) <= 2)
                    .unwrap_or(false);
                let confidence_ok = fields
                    .get("confidence")
                    .map(|c| c.eq_ignore_ascii_case("high"))
                    .unwrap_or(false);
                severity_ok && confidence_ok
            }
            AlertSource::Sarif => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Alert;

    fn alert(source: AlertSource, evidence: &str) -> Alert {
        Alert::from_finding(
            source,
            "key",
            "HIGH",
            "t".to_string(),
            String::new(),
            evidence.to_string(),
        )
    }

    #[test]
    fn dependency_findings_are_always_eligible() {
        let p = RemediationPolicy::with_default_safe_controls();
        let a = alert(AlertSource::DependencyAudit, "package=x; fix=1.2.3");
        assert!(p.eligible(&a));
    }

    #[test]
    fn sarif_findings_are_never_eligible() {
        let p = RemediationPolicy::with_default_safe_controls();
        let a = alert(AlertSource::Sarif, "rule=r; uri=u; line=1; level=note");
        assert!(!p.eligible(&a));
    }

    #[test]
    fn compliance_eligibility_follows_the_allow_list() {
        let p = RemediationPolicy::with_default_safe_controls();
        let safe = alert(
            AlertSource::ComplianceAudit,
            "control=CTRL-LOG-002; expected=on; actual=off; reference=CIS",
        );
        let unsafe_ = alert(
            AlertSource::ComplianceAudit,
            "control=CTRL-DANGEROUS-999; expected=on; actual=off; reference=CIS",
        );
        assert!(p.eligible(&safe));
        assert!(!p.eligible(&unsafe_));
    }

    #[test]
    fn static_analysis_requires_low_severity_and_high_confidence() {
        let p = RemediationPolicy::with_default_safe_controls();
        let ok = alert(
            AlertSource::StaticAnalysis,
            "path=a; line=1; severity=LOW; confidence=HIGH",
        );
        let bad_sev = alert(
            AlertSource::StaticAnalysis,
            "path=a; line=1; severity=HIGH; confidence=HIGH",
        );
        let bad_conf = alert(
            AlertSource::StaticAnalysis,
            "path=a; line=1; severity=LOW; confidence=MEDIUM",
        );
        assert!(p.eligible(&ok));
        assert!(!p.eligible(&bad_sev));
        assert!(!p.eligible(&bad_conf));
    }

    #[test]
    fn eligibility_is_stable_across_evaluations() {
        let p = RemediationPolicy::with_default_safe_controls();
        let a = alert(
            AlertSource::StaticAnalysis,
            "path=a; line=1; severity=INFO; confidence=HIGH",
        );
        let first = p.eligible(&a);
        for _ in 0..10 {
            assert_eq!(p.eligible(&a), first);
        }
    }
}
