use triage_core::engine::{Engine, EngineConfig, TargetedOutcome};
use triage_core::error::EngineError;
use triage_core::model::AlertStatus;
use triage_core::remediation::dispatcher::DispatchMode;
use std::fs;
use std::path::Path;

// triage_runner drives a deterministic self-audit of the whole alert
// lifecycle against synthetic scanner reports in a temp workspace:
// collect -> investigate -> preview -> apply -> close -> report.
//
// It prints stable check IDs with PASS/FAIL and exits non-zero on any fail.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("workspace");
    write_reports(&root.join("reports"));

    let config = EngineConfig::under_root(&root);
    let mut failed = false;

    // Remediation before any collection must be a hard error.
    match Engine::open_existing(&config) {
        Err(EngineError::StoreUnavailable(_)) => {
            check("STORE_UNAVAILABLE_FATAL", true, "missing store rejected", &mut failed)
        }
        other => check(
            "STORE_UNAVAILABLE_FATAL",
            false,
            &format!("expected StoreUnavailable, got {:?}", other.is_ok()),
            &mut failed,
        ),
    }

    let mut engine = Engine::open(&config).expect("open engine");

    let first = engine.collect().expect("collect");
    check(
        "INGEST_ALL_SOURCES",
        first.merge.new == 6 && first.warnings.is_empty(),
        &format!("new={} warnings={}", first.merge.new, first.warnings.len()),
        &mut failed,
    );

    let second = engine.collect().expect("re-collect");
    check(
        "INGEST_IDEMPOTENT",
        second.merge.new == 0 && second.merge.updated == 6,
        &format!("new={} updated={}", second.merge.new, second.merge.updated),
        &mut failed,
    );

    let ids_before: Vec<String> = engine.store().alerts.keys().cloned().collect();
    {
        // A second engine over the same reports must mint the same ids.
        let other_root = tmp.path().join("replay");
        write_reports(&other_root.join("reports"));
        let mut replay = Engine::open(&EngineConfig::under_root(&other_root)).expect("open replay");
        replay.collect().expect("replay collect");
        let ids_replay: Vec<String> = replay.store().alerts.keys().cloned().collect();
        check(
            "IDENTITY_DETERMINISTIC",
            ids_before == ids_replay,
            &format!("{} ids", ids_before.len()),
            &mut failed,
        );
    }

    let investigated = engine.investigate_all().expect("investigate");
    check(
        "FALSE_POSITIVE_SHORT_CIRCUIT",
        investigated.false_positives == 1 && investigated.investigated == 5,
        &format!(
            "investigated={} false_positives={}",
            investigated.investigated, investigated.false_positives
        ),
        &mut failed,
    );

    let statuses_before_preview = status_snapshot(&engine);
    let preview = engine.remediate_all(DispatchMode::Preview).expect("preview");
    check(
        "PREVIEW_NON_MUTATING",
        preview.previewed == 5 && status_snapshot(&engine) == statuses_before_preview,
        &format!("previewed={}", preview.previewed),
        &mut failed,
    );

    let applied = engine.remediate_all(DispatchMode::Apply).expect("apply");
    check(
        "POLICY_GATES_DISPATCH",
        applied.remediated == 2 && applied.escalated == 3,
        &format!(
            "remediated={} escalated={}",
            applied.remediated, applied.escalated
        ),
        &mut failed,
    );

    let escalations = fs::read_dir(&config.escalations_dir)
        .map(|d| d.filter_map(Result::ok).count())
        .unwrap_or(0);
    check(
        "ESCALATION_RECORDS_WRITTEN",
        escalations == 3,
        &format!("{} records", escalations),
        &mut failed,
    );

    let closed = engine.close_resolved().expect("close sweep");
    check(
        "CLOSE_SWEEP_RESOLVED",
        closed.closed == 3,
        &format!("closed={}", closed.closed),
        &mut failed,
    );

    let escalated_ids = engine.store().ids_with_status(AlertStatus::Escalated);
    let first_escalated = escalated_ids.first().expect("escalated alert present");
    let manual = engine
        .close_manual(first_escalated, "patched by hand, verified in staging")
        .expect("manual close");
    check(
        "MANUAL_CLOSE_ESCALATED",
        matches!(manual, TargetedOutcome::Done(_)),
        "escalated alert closed with note",
        &mut failed,
    );

    // Re-seen findings for closed alerts must be dropped, not reopened.
    let third = engine.collect().expect("post-close collect");
    check(
        "CLOSED_IS_TERMINAL",
        third.merge.new == 0 && third.merge.dropped_closed == 4,
        &format!(
            "new={} dropped_closed={}",
            third.merge.new, third.merge.dropped_closed
        ),
        &mut failed,
    );

    let stats = engine.report();
    let partition = stats.remediated
        + stats.escalated
        + stats.false_positives
        + stats.closed
        + stats.pending;
    check(
        "STATS_PARTITION_STORE",
        partition == stats.total && stats.audit_entries == engine.audit().len(),
        &format!("total={} partition={}", stats.total, partition),
        &mut failed,
    );

    println!("{}", engine.report_csv().expect("render csv"));
    for w in &stats.warnings {
        println!("WARNING {}", w);
    }

    if failed {
        std::process::exit(1);
    }
}

fn check(id: &str, ok: bool, message: &str, failed: &mut bool) {
    println!("CHECK {} {} {}", id, if ok { "PASS" } else { "FAIL" }, message);
    if !ok {
        *failed = true;
    }
}

fn status_snapshot(engine: &Engine) -> Vec<(String, AlertStatus)> {
    engine
        .store()
        .alerts
        .values()
        .map(|a| (a.id.clone(), a.status))
        .collect()
}

// Six findings chosen to hit every dispatch branch without shelling out:
// - static analysis: one auto-fixable (LOW/HIGH), one escalating (HIGH sev)
// - static analysis in tests/: false positive
// - dependency audit: always remediable
// - compliance: control off the allow-list, escalates
// - sarif: advisory only, escalates
fn write_reports(dir: &Path) {
    fs::create_dir_all(dir).expect("reports dir");
    fs::write(
        dir.join("static_analysis.json"),
        r#"{
  "results": [
    {"check_id": "RS-1001", "path": "src/handlers/auth.rs", "line": 42, "severity": "LOW", "confidence": "HIGH", "message": "redundant clone"},
    {"check_id": "RS-2002", "path": "src/db/pool.rs", "line": 7, "severity": "HIGH", "confidence": "MEDIUM", "message": "possible SQL string concatenation"},
    {"check_id": "RS-1001", "path": "tests/fixtures/auth.rs", "line": 9, "severity": "LOW", "confidence": "HIGH", "message": "redundant clone"}
  ]
}"#,
    )
    .expect("static analysis report");
    fs::write(
        dir.join("dependency_audit.json"),
        r#"{
  "vulnerabilities": [
    {"package": "openssl", "advisory_id": "RUSTSEC-2025-0001", "severity": "HIGH", "installed": "0.10.50", "fix_version": "0.10.66", "description": "buffer over-read"}
  ]
}"#,
    )
    .expect("dependency report");
    fs::write(
        dir.join("compliance_audit.json"),
        r#"{
  "controls": [
    {"control_id": "CTRL-FW-101", "title": "Host firewall enabled", "severity": "CRITICAL", "status": "non_compliant", "expected": "firewall active", "actual": "firewall disabled", "reference": "CIS 3.5.1"}
  ]
}"#,
    )
    .expect("compliance report");
    fs::write(
        dir.join("results.sarif"),
        r#"{
  "version": "2.1.0",
  "runs": [
    {
      "tool": {"driver": {"name": "codeql"}},
      "results": [
        {"ruleId": "js/xss", "level": "error", "message": {"text": "reflected XSS"}, "locations": [{"physicalLocation": {"artifactLocation": {"uri": "web/render.js"}, "region": {"startLine": 88}}}]}
      ]
    }
  ]
}"#,
    )
    .expect("sarif report");
}
