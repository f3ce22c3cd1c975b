use super::executor::{Executor, DEFAULT_EXECUTOR_TIMEOUT};
use super::policy::RemediationPolicy;
use crate::audit::entry::{RemediationAction, RemediationLogEntry, RemediationResult};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::apply_transition;
use crate::model::{evidence_fields, now_rfc3339_utc, Alert, AlertSource, AlertStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Apply,
    Preview,
}

/// Snapshot written for every escalated alert, consumed by human reviewers
/// or downstream ticketing. `next_steps` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub ts_utc: String,
    pub alert: Alert,
    pub normalized_severity: u8,
    pub reason: String,
    pub next_steps: Vec<String>,
}

/// A source-specific fix. Returns the structured details recorded on the
/// alert and in the audit log; an `Err` means the fix failed and the alert
/// must escalate.
pub trait RemediationHandler {
    fn remediate(&self, alert: &Alert) -> EngineResult<serde_json::Value>;
}

/// Advisory-only: emits an upgrade recommendation, no external process.
pub struct DependencyUpgradeHandler;

impl RemediationHandler for DependencyUpgradeHandler {
    fn remediate(&self, alert: &Alert) -> EngineResult<serde_json::Value> {
        let fields = evidence_fields(&alert.evidence);
        let package = fields.get("package").cloned().unwrap_or_default();
        let installed = fields.get("installed").cloned().unwrap_or_default();
        let fix = fields.get("fix").cloned().unwrap_or_else(|| "none".to_string());
        let recommendation = if fix == "none" {
            format!("no fixed release for {}; pin or replace the dependency", package)
        } else {
            format!("upgrade {} from {} to {}", package, installed, fix)
        };
        Ok(json!({
            "kind": "upgrade_recommendation",
            "package": package,
            "installed": installed,
            "fix_version": fix,
            "recommendation": recommendation,
        }))
    }
}

/// Low-risk static-analysis fix note, computed locally.
pub struct StaticAnalysisFixHandler;

impl RemediationHandler for StaticAnalysisFixHandler {
    fn remediate(&self, alert: &Alert) -> EngineResult<serde_json::Value> {
        let fields = evidence_fields(&alert.evidence);
        Ok(json!({
            "kind": "autofix_note",
            "rule": alert.title,
            "path": fields.get("path").cloned().unwrap_or_default(),
            "line": fields.get("line").cloned().unwrap_or_default(),
            "note": format!("applied suggested fix for {}", alert.title),
        }))
    }
}

/// Shells out to the external configuration script with the control id and
/// an apply flag. Non-zero exit or timeout is a remediation error.
pub struct ComplianceScriptHandler {
    executor: Box<dyn Executor>,
    program: String,
    timeout: Duration,
}

impl ComplianceScriptHandler {
    pub fn new(executor: Box<dyn Executor>, program: &str) -> Self {
        Self {
            executor,
            program: program.to_string(),
            timeout: DEFAULT_EXECUTOR_TIMEOUT,
        }
    }
}

impl RemediationHandler for ComplianceScriptHandler {
    fn remediate(&self, alert: &Alert) -> EngineResult<serde_json::Value> {
        let fields = evidence_fields(&alert.evidence);
        let control = fields
            .get("control")
            .cloned()
            .ok_or_else(|| EngineError::InvalidInput("alert has no control id".to_string()))?;
        let args = vec!["--control".to_string(), control.clone(), "--apply".to_string()];
        let output = self.executor.run(&self.program, &args, self.timeout)?;
        if output.exit_code != 0 {
            return Err(EngineError::Executor(format!(
                "{} exited {} for {}: {}",
                self.program,
                output.exit_code,
                control,
                output.stderr.trim()
            )));
        }
        Ok(json!({
            "kind": "compliance_script",
            "control": control,
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
        }))
    }
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub entry: RemediationLogEntry,
    pub escalation: Option<EscalationRecord>,
}

/// Safety-gated dispatcher. The handler registry is keyed by source and
/// resolved at construction; sources with no handler (SARIF) can only
/// escalate, which the policy already guarantees.
pub struct Dispatcher {
    policy: RemediationPolicy,
    handlers: BTreeMap<AlertSource, Box<dyn RemediationHandler>>,
    run_id: String,
}

impl Dispatcher {
    pub fn new(policy: RemediationPolicy, executor: Box<dyn Executor>, run_id: &str) -> Self {
        let mut handlers: BTreeMap<AlertSource, Box<dyn RemediationHandler>> = BTreeMap::new();
        handlers.insert(
            AlertSource::DependencyAudit,
            Box::new(DependencyUpgradeHandler),
        );
        handlers.insert(
            AlertSource::StaticAnalysis,
            Box::new(StaticAnalysisFixHandler),
        );
        handlers.insert(
            AlertSource::ComplianceAudit,
            Box::new(ComplianceScriptHandler::new(executor, "remediate-control")),
        );
        Self {
            policy,
            handlers,
            run_id: run_id.to_string(),
        }
    }

    pub fn policy(&self) -> &RemediationPolicy {
        &self.policy
    }

    /// Dispatch one alert. Preview never mutates the alert and never invokes
    /// a handler; apply transitions the alert to `Remediated` or `Escalated`
    /// and reports the outcome as an audit entry.
    pub fn dispatch(&self, alert: &mut Alert, mode: DispatchMode) -> DispatchOutcome {
        let eligible = self.policy.eligible(alert);

        if mode == DispatchMode::Preview {
            let would_take = if eligible { "remediate" } else { "escalate" };
            return DispatchOutcome {
                entry: RemediationLogEntry::new(
                    &self.run_id,
                    &alert.id,
                    RemediationAction::Remediate,
                    RemediationResult::Preview,
                    json!({
                        "eligible": eligible,
                        "would_take": would_take,
                        "source": alert.source.tag(),
                    }),
                ),
                escalation: None,
            };
        }

        if !eligible {
            let reason = format!(
                "source {} not eligible for automatic remediation",
                alert.source.tag()
            );
            return self.escalate(alert, reason, RemediationResult::ManualRequired);
        }

        let handler = match self.handlers.get(&alert.source) {
            Some(h) => h,
            None => {
                // Policy said eligible but no handler is registered; treat
                // as a failed remediation rather than panicking mid-batch.
                let reason = format!("no handler registered for {}", alert.source.tag());
                return self.escalate(alert, reason, RemediationResult::Error);
            }
        };

        match handler.remediate(alert) {
            Ok(details) => {
                apply_transition(alert, AlertStatus::Remediated);
                alert.remediation_details = Some(details.clone());
                info!(alert_id = %alert.id, source = alert.source.tag(), "alert remediated");
                DispatchOutcome {
                    entry: RemediationLogEntry::new(
                        &self.run_id,
                        &alert.id,
                        RemediationAction::Remediate,
                        RemediationResult::Success,
                        details,
                    ),
                    escalation: None,
                }
            }
            Err(e) => {
                let reason = format!("remediation failed: {}", e);
                self.escalate(alert, reason, RemediationResult::Error)
            }
        }
    }

    fn escalate(
        &self,
        alert: &mut Alert,
        reason: String,
        result: RemediationResult,
    ) -> DispatchOutcome {
        apply_transition(alert, AlertStatus::Escalated);
        alert.escalation_reason = Some(reason.clone());
        warn!(alert_id = %alert.id, reason = %reason, "alert escalated");
        let record = EscalationRecord {
            ts_utc: now_rfc3339_utc(),
            alert: alert.clone(),
            normalized_severity: alert.normalized_severity,
            reason: reason.clone(),
            next_steps: next_steps(alert),
        };
        DispatchOutcome {
            entry: RemediationLogEntry::new(
                &self.run_id,
                &alert.id,
                RemediationAction::Escalate,
                result,
                json!({ "reason": reason, "next_steps": record.next_steps }),
            ),
            escalation: Some(record),
        }
    }
}

/// Human next steps derived from the expected/actual/reference evidence
/// fields. The trailing triage step guarantees the list is never empty.
pub fn next_steps(alert: &Alert) -> Vec<String> {
    let fields = evidence_fields(&alert.evidence);
    let mut steps = Vec::new();
    if let Some(expected) = fields.get("expected") {
        steps.push(format!("Verify the expected configuration: {}", expected));
    }
    if let Some(actual) = fields.get("actual") {
        steps.push(format!("Review the current state: {}", actual));
    }
    if let Some(reference) = fields.get("reference") {
        steps.push(format!("Consult the control reference: {}", reference));
    }
    steps.push(format!(
        "Manually triage alert {} from {}",
        alert.id,
        alert.source.tag()
    ));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::executor::ExecOutput;

    struct FakeExecutor {
        exit_code: i32,
    }

    impl Executor for FakeExecutor {
        fn run(
            &self,
            _program: &str,
            args: &[String],
            _timeout: Duration,
        ) -> EngineResult<ExecOutput> {
            Ok(ExecOutput {
                exit_code: self.exit_code,
                stdout: format!("ran with {:?}", args),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "script failed".to_string()
                },
            })
        }
    }

    fn dispatcher(exit_code: i32) -> Dispatcher {
        Dispatcher::new(
            RemediationPolicy::with_default_safe_controls(),
            Box::new(FakeExecutor { exit_code }),
            "r_test",
        )
    }

    fn investigating(source: AlertSource, evidence: &str) -> Alert {
        let mut a = Alert::from_finding(
            source,
            "key",
            "HIGH",
            "t".to_string(),
            String::new(),
            evidence.to_string(),
        );
        a.status = AlertStatus::Investigating;
        a
    }

    #[test]
    fn preview_reports_without_mutating() {
        let d = dispatcher(0);
        let mut a = investigating(AlertSource::DependencyAudit, "package=x; installed=1; fix=2");
        let before = a.clone();
        let outcome = d.dispatch(&mut a, DispatchMode::Preview);
        assert_eq!(a, before);
        assert_eq!(outcome.entry.result, RemediationResult::Preview);
        assert!(outcome.escalation.is_none());
        assert_eq!(outcome.entry.details["would_take"], "remediate");
    }

    #[test]
    fn eligible_dependency_alert_is_remediated_with_recommendation() {
        let d = dispatcher(0);
        let mut a = investigating(
            AlertSource::DependencyAudit,
            "package=lodash; installed=4.17.20; fix=4.17.21",
        );
        let outcome = d.dispatch(&mut a, DispatchMode::Apply);
        assert_eq!(a.status, AlertStatus::Remediated);
        assert_eq!(outcome.entry.result, RemediationResult::Success);
        let details = a.remediation_details.unwrap();
        assert!(details["recommendation"]
            .as_str()
            .unwrap()
            .contains("4.17.21"));
    }

    #[test]
    fn ineligible_alert_escalates_with_next_steps() {
        let d = dispatcher(0);
        let mut a = investigating(
            AlertSource::ComplianceAudit,
            "control=CTRL-UNSAFE-99; expected=on; actual=off; reference=CIS 2.2",
        );
        let outcome = d.dispatch(&mut a, DispatchMode::Apply);
        assert_eq!(a.status, AlertStatus::Escalated);
        assert_eq!(outcome.entry.result, RemediationResult::ManualRequired);
        let record = outcome.escalation.unwrap();
        assert!(!record.next_steps.is_empty());
        assert!(record.next_steps.iter().any(|s| s.contains("CIS 2.2")));
        assert!(a.escalation_reason.is_some());
    }

    #[test]
    fn failing_script_escalates_with_error_result() {
        let d = dispatcher(1);
        let mut a = investigating(
            AlertSource::ComplianceAudit,
            "control=CTRL-LOG-002; expected=on; actual=off; reference=CIS",
        );
        let outcome = d.dispatch(&mut a, DispatchMode::Apply);
        assert_eq!(a.status, AlertStatus::Escalated);
        assert_eq!(outcome.entry.result, RemediationResult::Error);
        assert!(outcome.escalation.is_some());
    }

    #[test]
    fn successful_script_remediates_compliance_alert() {
        let d = dispatcher(0);
        let mut a = investigating(
            AlertSource::ComplianceAudit,
            "control=CTRL-LOG-002; expected=on; actual=off; reference=CIS",
        );
        let outcome = d.dispatch(&mut a, DispatchMode::Apply);
        assert_eq!(a.status, AlertStatus::Remediated);
        assert_eq!(outcome.entry.result, RemediationResult::Success);
        assert_eq!(
            a.remediation_details.unwrap()["control"],
            "CTRL-LOG-002"
        );
    }

    #[test]
    fn sarif_always_escalates() {
        let d = dispatcher(0);
        let mut a = investigating(AlertSource::Sarif, "rule=r; uri=u; line=1; level=error");
        let outcome = d.dispatch(&mut a, DispatchMode::Apply);
        assert_eq!(a.status, AlertStatus::Escalated);
        assert_eq!(outcome.entry.result, RemediationResult::ManualRequired);
    }

    #[test]
    fn next_steps_are_never_empty() {
        let a = investigating(AlertSource::Sarif, "no structured evidence");
        assert!(!next_steps(&a).is_empty());
    }
}
