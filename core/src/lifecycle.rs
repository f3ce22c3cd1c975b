use crate::classifier::Classifier;
use crate::model::{now_rfc3339_utc, Alert, AlertStatus};

/// Legal status transitions. `Closed` is terminal: no edge leads out of it.
pub fn valid_transition(from: AlertStatus, to: AlertStatus) -> bool {
    use AlertStatus::*;
    match (from, to) {
        (New, Investigating) => true,
        (Investigating, Remediated) => true,
        (Investigating, Escalated) => true,
        (Investigating, FalsePositive) => true,
        (Remediated, Closed) => true,
        (FalsePositive, Closed) => true,
        (Escalated, Closed) => true,
        _ => false,
    }
}

/// Apply a transition if it is legal. Illegal edges, including any attempt
/// to move out of `Closed`, are a no-op returning false, not an error.
pub fn apply_transition(alert: &mut Alert, to: AlertStatus) -> bool {
    if !valid_transition(alert.status, to) {
        return false;
    }
    alert.status = to;
    alert.status_changed_at = now_rfc3339_utc();
    if to == AlertStatus::FalsePositive {
        alert.is_false_positive = true;
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestigationVerdict {
    /// Alert moved to `Investigating` and is ready for dispatch.
    Investigating,
    /// A classifier rule matched; alert short-circuited to `FalsePositive`.
    FalsePositive,
    /// Alert was not in a state the investigate step acts on.
    Skipped,
}

/// The investigate step: `New -> Investigating`, then run the
/// false-positive classifier. A match transitions straight to
/// `FalsePositive` within the same step, short-circuiting remediation.
pub fn investigate(alert: &mut Alert, classifier: &Classifier) -> InvestigationVerdict {
    if !apply_transition(alert, AlertStatus::Investigating) {
        return InvestigationVerdict::Skipped;
    }
    if let Some(reason) = classifier.classify(alert) {
        let reason = reason.to_string();
        apply_transition(alert, AlertStatus::FalsePositive);
        alert.false_positive_reason = Some(reason);
        return InvestigationVerdict::FalsePositive;
    }
    InvestigationVerdict::Investigating
}
