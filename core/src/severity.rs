/// Map a source-native severity label onto the unified 1..=10 scale.
///
/// Total over every input string: unknown labels fall through to the floor
/// value 1 instead of erroring, so a scanner inventing a new vocabulary can
/// never abort ingestion. Used only for prioritization and statistical
/// thresholds.
pub fn normalize_severity(raw: &str) -> u8 {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => 10,
        "ERROR" => 9,
        "HIGH" => 8,
        "MEDIUM" | "MODERATE" => 5,
        "WARNING" | "WARN" => 3,
        "LOW" | "NOTE" => 2,
        "INFO" | "INFORMATIONAL" | "NONE" => 1,
        _ => 1,
    }
}

/// Bucket label for a normalized severity, used by the statistics report.
pub fn severity_bucket(normalized: u8) -> &'static str {
    match normalized {
        9..=10 => "critical",
        7..=8 => "high",
        4..=6 => "medium",
        _ => "low",
    }
}
