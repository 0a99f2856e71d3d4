//! Keyword classification of collaborator failures.

use serde::Serialize;
use std::fmt;

/// Category of a stage failure; decides how the pipeline reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient AI-side failure. The stage is blocked and retried later.
    RateLimitOrTimeout,
    /// A required input (such as the linked pull request) does not exist.
    MissingDependency,
    /// Anything else; permanent until a new external event arrives.
    Unknown,
}

impl FailureKind {
    /// Returns the stable identifier used in notices and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimitOrTimeout => "rate_limit_or_timeout",
            Self::MissingDependency => "missing_dependency",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Includes the Uzbek wording some upstream clients report.
const MISSING_DEPENDENCY_KEYWORDS: &[&str] = &[
    "pr topilmadi",
    "pr not found",
    "no pr found",
    "pull request not found",
];

const RATE_LIMIT_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "429",
    "rate limit",
    "rate_limit",
    "overloaded",
    "quota",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
    "both keys failed",
];

/// Maps raw failure text to a [`FailureKind`].
///
/// Matching is case-insensitive substring search. Missing-dependency
/// keywords win over rate-limit keywords, and empty text is
/// [`FailureKind::Unknown`].
#[must_use]
pub fn classify(text: &str) -> FailureKind {
    let lowered = text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));
    if lowered.trim().is_empty() {
        FailureKind::Unknown
    } else if mentions(MISSING_DEPENDENCY_KEYWORDS) {
        FailureKind::MissingDependency
    } else if mentions(RATE_LIMIT_KEYWORDS) {
        FailureKind::RateLimitOrTimeout
    } else {
        FailureKind::Unknown
    }
}
