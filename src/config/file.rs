//! TOML representation of [`PipelineConfig`] and file loading.

use super::{
    ConfigError, ConfigResult, DEFAULT_RETURN_THRESHOLD, DEFAULT_RETURNED_STATUS,
    DEFAULT_SKIP_CODE, MAX_DURATION_SECS, OrderingPolicy, PipelineConfig,
};
use crate::task::domain::ComplianceScore;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::time::Duration;

/// On-disk settings document; durations are whole seconds.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsDocument {
    ordering: OrderingPolicy,
    return_threshold: i64,
    task_wait_timeout_secs: u64,
    inter_stage_delay_secs: u64,
    min_ai_call_interval_secs: u64,
    blocked_retry_delay_secs: u64,
    blocked_check_interval_secs: u64,
    skip_code: String,
    max_comments_to_scan_for_skip: usize,
    returned_status_name: String,
    trigger_statuses: Vec<String>,
    generation_trigger_statuses: Vec<String>,
    transition_on_return: bool,
    degraded_fallback: bool,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::default(),
            return_threshold: i64::from(DEFAULT_RETURN_THRESHOLD),
            task_wait_timeout_secs: 60,
            inter_stage_delay_secs: 15,
            min_ai_call_interval_secs: 6,
            blocked_retry_delay_secs: 300,
            blocked_check_interval_secs: 30,
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

impl SettingsDocument {
    fn check_durations(&self) -> ConfigResult<()> {
        let durations = [
            ("task_wait_timeout_secs", self.task_wait_timeout_secs),
            ("inter_stage_delay_secs", self.inter_stage_delay_secs),
            ("min_ai_call_interval_secs", self.min_ai_call_interval_secs),
            ("blocked_retry_delay_secs", self.blocked_retry_delay_secs),
            ("blocked_check_interval_secs", self.blocked_check_interval_secs),
        ];
        match durations
            .into_iter()
            .find(|&(_, secs)| secs > MAX_DURATION_SECS)
        {
            Some((key, secs)) => Err(ConfigError::DurationTooLong { key, secs }),
            None => Ok(()),
        }
    }
}

impl TryFrom<SettingsDocument> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(doc: SettingsDocument) -> ConfigResult<Self> {
        let return_threshold = ComplianceScore::new(doc.return_threshold)
            .map_err(|_| ConfigError::InvalidThreshold(doc.return_threshold))?;
        if doc.min_ai_call_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("min_ai_call_interval_secs"));
        }
        if doc.blocked_check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("blocked_check_interval_secs"));
        }
        doc.check_durations()?;

        Ok(Self {
            ordering: doc.ordering,
            return_threshold,
            task_wait_timeout: Duration::from_secs(doc.task_wait_timeout_secs),
            inter_stage_delay: Duration::from_secs(doc.inter_stage_delay_secs),
            min_ai_call_interval: Duration::from_secs(doc.min_ai_call_interval_secs),
            blocked_retry_delay: Duration::from_secs(doc.blocked_retry_delay_secs),
            blocked_check_interval: Duration::from_secs(doc.blocked_check_interval_secs),
            skip_code: doc.skip_code.trim().to_owned(),
            max_comments_to_scan_for_skip: doc.max_comments_to_scan_for_skip,
            returned_status_name: doc.returned_status_name,
            trigger_statuses: doc.trigger_statuses,
            generation_trigger_statuses: doc.generation_trigger_statuses,
            transition_on_return: doc.transition_on_return,
            degraded_fallback: doc.degraded_fallback,
        })
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML settings document. Missing keys take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// a validation error for out-of-range values.
    pub fn from_toml_str(document: &str) -> ConfigResult<Self> {
        let doc: SettingsDocument =
            toml::from_str(document).map_err(|err| ConfigError::Parse(Box::new(err)))?;
        Self::try_from(doc)
    }

    /// Reads and validates a TOML settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`PipelineConfig::from_toml_str`].
    pub fn load(path: &Utf8Path) -> ConfigResult<Self> {
        let io_error = |source| ConfigError::Io {
            path: path.to_string(),
            source,
        };
        let file_name = path.file_name().ok_or_else(|| {
            io_error(std::io::Error::other("path must include a file name"))
        })?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
        let contents = dir.read_to_string(file_name).map_err(io_error)?;
        Self::from_toml_str(&contents)
    }
}
