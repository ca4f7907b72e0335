//! Issue records shared by the validator and the CLI report.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Suggestion,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Suggestion => "suggestion",
        };
        f.write_str(s)
    }
}

/// One finding about the input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Node id or `pre -> post` pair the issue is about.
    pub subject: Option<String>,
    /// 1-based table row, when known.
    pub row: Option<usize>,
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(rule_id: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            severity,
            message: message.into(),
            subject: None,
            row: None,
            suggestion: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_row(mut self, row: Option<usize>) -> Self {
        self.row = row;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
    pub info: usize,
}

impl ValidationStats {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut stats = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Error => stats.errors += 1,
                Severity::Warning => stats.warnings += 1,
                Severity::Suggestion => stats.suggestions += 1,
                Severity::Info => stats.info += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.suggestions + self.info
    }
}
