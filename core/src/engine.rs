use crate::audit::entry::{RemediationAction, RemediationLogEntry, RemediationResult};
use crate::audit::log::AuditLog;
use crate::classifier::Classifier;
use crate::error::{EngineError, EngineResult};
use crate::ingest::{collect_all, default_adapters, SourceAdapter};
use crate::lifecycle::{self, apply_transition, InvestigationVerdict};
use crate::model::AlertStatus;
use crate::remediation::dispatcher::{DispatchMode, Dispatcher};
use crate::remediation::executor::{Executor, ProcessExecutor};
use crate::remediation::policy::RemediationPolicy;
use crate::report::{build_statistics, render_statistics_csv, Statistics};
use crate::storage::{
    AlertRepository, AuditRepository, EscalationWriter, FileAlertRepository, FileAuditRepository,
};
use crate::store::{AlertStore, MergeOutcome};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub reports_dir: PathBuf,
    pub store_path: PathBuf,
    pub audit_path: PathBuf,
    pub escalations_dir: PathBuf,
}

impl EngineConfig {
    /// Conventional layout under one root directory.
    pub fn under_root(root: &Path) -> Self {
        Self {
            reports_dir: root.join("reports"),
            store_path: root.join("alerts.json"),
            audit_path: root.join("remediation_log.json"),
            escalations_dir: root.join("escalations"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    pub merge: MergeOutcome,
    pub per_source: BTreeMap<&'static str, usize>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvestigateOutcome {
    pub investigated: usize,
    pub false_positives: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemediateOutcome {
    pub remediated: usize,
    pub escalated: usize,
    pub previewed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloseOutcome {
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetedOutcome {
    Done(RemediationResult),
    /// Requested id is not in the store; non-fatal, batch continues.
    NotFound,
    /// Alert exists but its status does not admit the requested operation.
    InvalidState(AlertStatus),
}

/// The single-run batch engine: collect -> investigate -> remediate ->
/// close -> report, as a linear sequence over the file-backed store.
pub struct Engine {
    adapters: Vec<Box<dyn SourceAdapter>>,
    classifier: Classifier,
    dispatcher: Dispatcher,
    store_repo: Box<dyn AlertRepository>,
    audit_repo: Box<dyn AuditRepository>,
    escalations: EscalationWriter,
    store: AlertStore,
    audit: AuditLog,
    run_id: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Open the engine, creating a fresh store if none exists yet. Used by
    /// runs that start with collection.
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        Self::build(config, Box::new(ProcessExecutor), false)
    }

    /// Open against an existing store only. Remediation without a prior
    /// collection run is a user error surfaced as `StoreUnavailable`.
    pub fn open_existing(config: &EngineConfig) -> EngineResult<Self> {
        Self::build(config, Box::new(ProcessExecutor), true)
    }

    pub fn open_with_executor(
        config: &EngineConfig,
        executor: Box<dyn Executor>,
    ) -> EngineResult<Self> {
        Self::build(config, executor, false)
    }

    pub fn open_existing_with_executor(
        config: &EngineConfig,
        executor: Box<dyn Executor>,
    ) -> EngineResult<Self> {
        Self::build(config, executor, true)
    }

    fn build(
        config: &EngineConfig,
        executor: Box<dyn Executor>,
        require_store: bool,
    ) -> EngineResult<Self> {
        let store_repo = FileAlertRepository::new(&config.store_path);
        let store = if store_repo.exists() {
            store_repo.load()?
        } else if require_store {
            return Err(EngineError::StoreUnavailable(format!(
                "{} not found; run collection before remediation",
                config.store_path.display()
            )));
        } else {
            AlertStore::new()
        };

        let audit_repo = FileAuditRepository::new(&config.audit_path);
        let audit = if audit_repo.exists() {
            AuditLog::from_entries(audit_repo.load()?)
        } else {
            AuditLog::new()
        };

        let run_id = format!("r_{}", Ulid::new());
        Ok(Self {
            adapters: default_adapters(&config.reports_dir),
            classifier: Classifier::with_default_rules()?,
            dispatcher: Dispatcher::new(
                RemediationPolicy::with_default_safe_controls(),
                executor,
                &run_id,
            ),
            store_repo: Box::new(store_repo),
            audit_repo: Box::new(audit_repo),
            escalations: EscalationWriter::new(&config.escalations_dir),
            store,
            audit,
            run_id,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Ingestion: run every adapter, merge the batch, persist the snapshot.
    pub fn collect(&mut self) -> EngineResult<CollectOutcome> {
        let collection = collect_all(&self.adapters);
        let merge = self.store.merge(collection.alerts);
        self.persist()?;
        info!(
            new = merge.new,
            updated = merge.updated,
            dropped_closed = merge.dropped_closed,
            "collection merged"
        );
        Ok(CollectOutcome {
            merge,
            per_source: collection.per_source,
            warnings: collection.warnings,
        })
    }

    /// Investigate every `new` alert: move it to `investigating` and run the
    /// false-positive classifier, short-circuiting matches.
    pub fn investigate_all(&mut self) -> EngineResult<InvestigateOutcome> {
        let mut outcome = InvestigateOutcome::default();
        for id in self.store.ids_with_status(AlertStatus::New) {
            let verdict = match self.store.get_mut(&id) {
                Some(alert) => lifecycle::investigate(alert, &self.classifier),
                None => continue,
            };
            match verdict {
                InvestigationVerdict::Investigating => {
                    outcome.investigated += 1;
                    self.audit.append(RemediationLogEntry::new(
                        &self.run_id,
                        &id,
                        RemediationAction::Investigate,
                        RemediationResult::Success,
                        json!({ "to": AlertStatus::Investigating.tag() }),
                    ));
                }
                InvestigationVerdict::FalsePositive => {
                    outcome.false_positives += 1;
                    let reason = self
                        .store
                        .get(&id)
                        .and_then(|a| a.false_positive_reason.clone());
                    // Two transitions happened, so two entries: the
                    // investigating hop and the classifier verdict.
                    self.audit.append(RemediationLogEntry::new(
                        &self.run_id,
                        &id,
                        RemediationAction::Investigate,
                        RemediationResult::Success,
                        json!({ "to": AlertStatus::Investigating.tag() }),
                    ));
                    self.audit.append(RemediationLogEntry::new(
                        &self.run_id,
                        &id,
                        RemediationAction::Investigate,
                        RemediationResult::Success,
                        json!({ "to": AlertStatus::FalsePositive.tag(), "reason": reason }),
                    ));
                }
                InvestigationVerdict::Skipped => {}
            }
        }
        self.persist()?;
        Ok(outcome)
    }

    /// Dispatch every `investigating` alert through the safety policy.
    /// Preview mode records what would happen without touching the store.
    pub fn remediate_all(&mut self, mode: DispatchMode) -> EngineResult<RemediateOutcome> {
        let mut outcome = RemediateOutcome::default();
        for id in self.store.ids_with_status(AlertStatus::Investigating) {
            let dispatch = match self.store.get_mut(&id) {
                Some(alert) => self.dispatcher.dispatch(alert, mode),
                None => continue,
            };
            match dispatch.entry.result {
                RemediationResult::Preview => outcome.previewed += 1,
                RemediationResult::Success => outcome.remediated += 1,
                RemediationResult::ManualRequired | RemediationResult::Error => {
                    outcome.escalated += 1
                }
            }
            if mode == DispatchMode::Apply {
                if let Some(record) = &dispatch.escalation {
                    self.escalations.write(record)?;
                }
            }
            self.audit.append(dispatch.entry);
        }
        if mode == DispatchMode::Apply {
            self.persist()?;
        } else {
            self.persist_audit()?;
        }
        Ok(outcome)
    }

    /// Dispatch one alert by id. Unknown ids and wrong-state alerts are
    /// reported, not raised, so batch callers keep going.
    pub fn dispatch_alert(&mut self, id: &str, mode: DispatchMode) -> EngineResult<TargetedOutcome> {
        let status = match self.store.get(id) {
            Some(alert) => alert.status,
            None => {
                warn!(alert_id = id, "dispatch requested for unknown alert");
                return Ok(TargetedOutcome::NotFound);
            }
        };
        if status != AlertStatus::Investigating {
            return Ok(TargetedOutcome::InvalidState(status));
        }
        let dispatch = match self.store.get_mut(id) {
            Some(alert) => self.dispatcher.dispatch(alert, mode),
            None => return Ok(TargetedOutcome::NotFound),
        };
        let result = dispatch.entry.result;
        if mode == DispatchMode::Apply {
            if let Some(record) = &dispatch.escalation {
                self.escalations.write(record)?;
            }
            self.audit.append(dispatch.entry);
            self.persist()?;
        } else {
            self.audit.append(dispatch.entry);
            self.persist_audit()?;
        }
        Ok(TargetedOutcome::Done(result))
    }

    /// The closure sweep: `remediated` and `false_positive` alerts are
    /// auto-eligible for closing. Escalated alerts need `close_manual`.
    pub fn close_resolved(&mut self) -> EngineResult<CloseOutcome> {
        let mut outcome = CloseOutcome::default();
        let mut resolved = self.store.ids_with_status(AlertStatus::Remediated);
        resolved.extend(self.store.ids_with_status(AlertStatus::FalsePositive));
        for id in resolved {
            let from = match self.store.get_mut(&id) {
                Some(alert) => {
                    let from = alert.status;
                    if !apply_transition(alert, AlertStatus::Closed) {
                        continue;
                    }
                    from
                }
                None => continue,
            };
            outcome.closed += 1;
            self.audit.append(RemediationLogEntry::new(
                &self.run_id,
                &id,
                RemediationAction::Close,
                RemediationResult::Success,
                json!({ "from": from, "sweep": true }),
            ));
        }
        self.persist()?;
        Ok(outcome)
    }

    /// Manual close with a human resolution note; the only way an
    /// `escalated` alert ever reaches `closed`.
    pub fn close_manual(&mut self, id: &str, note: &str) -> EngineResult<TargetedOutcome> {
        let alert = match self.store.get_mut(id) {
            Some(alert) => alert,
            None => {
                warn!(alert_id = id, "manual close requested for unknown alert");
                return Ok(TargetedOutcome::NotFound);
            }
        };
        let from = alert.status;
        if !apply_transition(alert, AlertStatus::Closed) {
            return Ok(TargetedOutcome::InvalidState(from));
        }
        self.audit.append(RemediationLogEntry::new(
            &self.run_id,
            id,
            RemediationAction::Close,
            RemediationResult::Success,
            json!({ "from": from, "note": note }),
        ));
        self.persist()?;
        Ok(TargetedOutcome::Done(RemediationResult::Success))
    }

    /// Read-only statistics over the store and audit log.
    pub fn report(&self) -> Statistics {
        build_statistics(&self.store, self.audit.entries())
    }

    pub fn report_csv(&self) -> EngineResult<String> {
        render_statistics_csv(&self.report())
    }

    fn persist(&self) -> EngineResult<()> {
        self.store_repo.save(&self.store)?;
        self.audit_repo.save(self.audit.entries())
    }

    fn persist_audit(&self) -> EngineResult<()> {
        self.audit_repo.save(self.audit.entries())
    }
}
