//! Pipeline configuration.
//!
//! [`PipelineConfig`] is built once at process start, either in code via
//! [`Default`] and the `with_*` builders or from a TOML file via
//! [`PipelineConfig::load`], and handed to every component by `Arc`.

mod file;

use crate::task::domain::ComplianceScore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Order in which the two stages run inside one gate hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingPolicy {
    /// Compliance, then generation if the gate allows it.
    #[default]
    Stage1First,
    /// Generation first when it can run without a score, then compliance.
    Stage2First,
    /// Both stages as one logical unit; runs in stage1-first order.
    Grouped,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The TOML document is malformed or has unexpected types.
    #[error("invalid configuration document: {0}")]
    Parse(Box<toml::de::Error>),
    /// The return threshold is above 100.
    #[error("return_threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(i64),
    /// An interval that drives a loop or pacer is zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    /// A duration exceeds [`MAX_DURATION_SECS`].
    #[error("{key} must be at most {MAX_DURATION_SECS} seconds, got {secs}")]
    DurationTooLong {
        /// Offending settings key.
        key: &'static str,
        /// Configured value.
        secs: u64,
    },
}

/// Upper bound, in seconds, for every duration in a settings document.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime settings for the orchestration engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    ordering: OrderingPolicy,
    return_threshold: ComplianceScore,
    task_wait_timeout: Duration,
    inter_stage_delay: Duration,
    min_ai_call_interval: Duration,
    blocked_retry_delay: Duration,
    blocked_check_interval: Duration,
    skip_code: String,
    max_comments_to_scan_for_skip: usize,
    returned_status_name: String,
    trigger_statuses: Vec<String>,
    generation_trigger_statuses: Vec<String>,
    transition_on_return: bool,
    degraded_fallback: bool,
}

/// Default compliance threshold below which a ticket is returned.
pub const DEFAULT_RETURN_THRESHOLD: u8 = 60;

/// Default external status used for returned tickets.
pub const DEFAULT_RETURNED_STATUS: &str = "NEED CLARIFICATION/RETURN TEST";

/// Default skip marker searched for in ticket comments.
pub const DEFAULT_SKIP_CODE: &str = "AI_SKIP";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            return_threshold: threshold_or_max(DEFAULT_RETURN_THRESHOLD),
            task_wait_timeout: Duration::from_secs(60),
            inter_stage_delay: Duration::from_secs(15),
            min_ai_call_interval: Duration::from_secs(6),
            blocked_retry_delay: Duration::from_secs(300),
            blocked_check_interval: Duration::from_secs(30),
            skip_code: DEFAULT_SKIP_CODE.to_owned(),
            max_comments_to_scan_for_skip: 5,
            returned_status_name: DEFAULT_RETURNED_STATUS.to_owned(),
            trigger_statuses: Vec::new(),
            generation_trigger_statuses: Vec::new(),
            transition_on_return: true,
            degraded_fallback: true,
        }
    }
}

fn threshold_or_max(value: u8) -> ComplianceScore {
    ComplianceScore::new(i64::from(value)).unwrap_or(ComplianceScore::MAX)
}

fn matches_any(candidates: &[String], status: &str) -> bool {
    let wanted = status.trim();
    candidates.is_empty()
        || candidates
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(wanted))
}

impl PipelineConfig {
    /// Sets the ordering policy.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the return threshold.
    #[must_use]
    pub const fn with_return_threshold(mut self, threshold: ComplianceScore) -> Self {
        self.return_threshold = threshold;
        self
    }

    /// Sets the bound on gate acquisition.
    #[must_use]
    pub const fn with_task_wait_timeout(mut self, timeout: Duration) -> Self {
        self.task_wait_timeout = timeout;
        self
    }

    /// Sets the sleep between the two stages.
    #[must_use]
    pub const fn with_inter_stage_delay(mut self, delay: Duration) -> Self {
        self.inter_stage_delay = delay;
        self
    }

    /// Sets the minimum spacing of AI calls.
    #[must_use]
    pub const fn with_min_ai_call_interval(mut self, interval: Duration) -> Self {
        self.min_ai_call_interval = interval;
        self
    }

    /// Sets the retry delay for blocked stages.
    #[must_use]
    pub const fn with_blocked_retry_delay(mut self, delay: Duration) -> Self {
        self.blocked_retry_delay = delay;
        self
    }

    /// Sets the retry scheduler tick.
    #[must_use]
    pub const fn with_blocked_check_interval(mut self, interval: Duration) -> Self {
        self.blocked_check_interval = interval;
        self
    }

    /// Sets the skip marker. An empty code disables skip detection.
    #[must_use]
    pub fn with_skip_code(mut self, code: impl Into<String>) -> Self {
        self.skip_code = code.into();
        self
    }

    /// Sets how many recent comments are scanned for the skip marker.
    #[must_use]
    pub const fn with_max_comments_to_scan_for_skip(mut self, count: usize) -> Self {
        self.max_comments_to_scan_for_skip = count;
        self
    }

    /// Sets the external status used for returned tickets.
    #[must_use]
    pub fn with_returned_status_name(mut self, name: impl Into<String>) -> Self {
        self.returned_status_name = name.into();
        self
    }

    /// Restricts which external statuses start a run.
    #[must_use]
    pub fn with_trigger_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts which external statuses plan the generation stage.
    #[must_use]
    pub fn with_generation_trigger_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generation_trigger_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Toggles the external status transition on a low score.
    #[must_use]
    pub const fn with_transition_on_return(mut self, enabled: bool) -> Self {
        self.transition_on_return = enabled;
        self
    }

    /// Toggles the degraded generation retry after a missing dependency.
    #[must_use]
    pub const fn with_degraded_fallback(mut self, enabled: bool) -> Self {
        self.degraded_fallback = enabled;
        self
    }

    /// Returns the ordering policy.
    #[must_use]
    pub const fn ordering(&self) -> OrderingPolicy {
        self.ordering
    }

    /// Returns the return threshold.
    #[must_use]
    pub const fn return_threshold(&self) -> ComplianceScore {
        self.return_threshold
    }

    /// Returns the bound on gate acquisition.
    #[must_use]
    pub const fn task_wait_timeout(&self) -> Duration {
        self.task_wait_timeout
    }

    /// Returns the sleep between the two stages.
    #[must_use]
    pub const fn inter_stage_delay(&self) -> Duration {
        self.inter_stage_delay
    }

    /// Returns the minimum spacing of AI calls.
    #[must_use]
    pub const fn min_ai_call_interval(&self) -> Duration {
        self.min_ai_call_interval
    }

    /// Returns the retry delay for blocked stages.
    #[must_use]
    pub const fn blocked_retry_delay(&self) -> Duration {
        self.blocked_retry_delay
    }

    /// Returns the retry scheduler tick.
    #[must_use]
    pub const fn blocked_check_interval(&self) -> Duration {
        self.blocked_check_interval
    }

    /// Returns the skip marker.
    #[must_use]
    pub fn skip_code(&self) -> &str {
        &self.skip_code
    }

    /// Returns how many recent comments are scanned for the skip marker.
    #[must_use]
    pub const fn max_comments_to_scan_for_skip(&self) -> usize {
        self.max_comments_to_scan_for_skip
    }

    /// Returns the external status used for returned tickets.
    #[must_use]
    pub fn returned_status_name(&self) -> &str {
        &self.returned_status_name
    }

    /// Returns whether a low score moves the ticket's external status.
    #[must_use]
    pub const fn transition_on_return(&self) -> bool {
        self.transition_on_return
    }

    /// Returns whether a missing-dependency generation failure retries in
    /// degraded mode.
    #[must_use]
    pub const fn degraded_fallback(&self) -> bool {
        self.degraded_fallback
    }

    /// Returns `true` when `status` starts a run.
    #[must_use]
    pub fn is_trigger(&self, status: &str) -> bool {
        matches_any(&self.trigger_statuses, status)
    }

    /// Returns `true` when a run for `status` includes the generation stage.
    #[must_use]
    pub fn is_generation_trigger(&self, status: &str) -> bool {
        matches_any(&self.generation_trigger_statuses, status)
    }
}
