use crate::error::EngineResult;
use crate::model::Alert;
use regex::Regex;

/// One false-positive rule: a pattern over the alert's evidence/description
/// text and the reason reported when it matches. Rules are data, not code,
/// so tests and deployments can inject their own tables.
#[derive(Debug, Clone)]
pub struct FalsePositiveRule {
    pub pattern: Regex,
    pub reason: String,
}

impl FalsePositiveRule {
    pub fn new(pattern: &str, reason: &str) -> EngineResult<Self> {
        Ok(Self {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            reason: reason.to_string(),
        })
    }
}

/// Ordered rule evaluation: the first matching rule wins and supplies the
/// reason; no match means the alert is treated as a real finding.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<FalsePositiveRule>,
}

impl Classifier {
    pub fn new(rules: Vec<FalsePositiveRule>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> EngineResult<Self> {
        Ok(Self::new(default_rules()?))
    }

    pub fn classify(&self, alert: &Alert) -> Option<&str> {
        let haystack = format!("{}\n{}", alert.evidence, alert.description);
        self.rules
            .iter()
            .find(|r| r.pattern.is_match(&haystack))
            .map(|r| r.reason.as_str())
    }
}

pub fn default_rules() -> EngineResult<Vec<FalsePositiveRule>> {
    Ok(vec![
        FalsePositiveRule::new(
            r"(^|[/\\=\s])tests?([/\\]|$)|[/\\]test_|_test\.",
            "finding is located in a test directory",
        )?,
        FalsePositiveRule::new(
            r"not connected",
            "service is not connected in this environment",
        )?,
        FalsePositiveRule::new(
            r"module not found",
            "module is not installed; control not applicable",
        )?,
        FalsePositiveRule::new(
            r"manual review required",
            "flagged for manual review, not an automated issue",
        )?,
        FalsePositiveRule::new(
            r"(^|[/\\=\s])(vendor|third_party|node_modules)([/\\]|$)",
            "finding is in vendored third-party code",
        )?,
        FalsePositiveRule::new(r"generated (file|code)", "finding is in generated code")?,
    ])
}
