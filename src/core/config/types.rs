use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) session: SessionSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) base_url: String,
    pub(crate) auth_token: String,
    pub(crate) request_timeout_seconds: u64,
}

/// Tuning knobs of one exam-taking session.
#[derive(Debug, Clone)]
pub(crate) struct SessionSettings {
    /// Number of counted violations that triggers the automatic submission.
    pub(crate) violation_threshold: u32,
    pub(crate) violation_submit_delay_ms: u64,
    pub(crate) blur_debounce_ms: u64,
    pub(crate) file_picker_grace_ms: u64,
    pub(crate) devtools_check_interval_ms: u64,
    pub(crate) devtools_threshold_px: u32,
    pub(crate) fallback_duration_minutes: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            violation_threshold: 1,
            violation_submit_delay_ms: 1000,
            blur_debounce_ms: 100,
            file_picker_grace_ms: 2000,
            devtools_check_interval_ms: 1000,
            devtools_threshold_px: 160,
            fallback_duration_minutes: 60,
        }
    }
}

impl SessionSettings {
    pub(crate) fn violation_submit_delay(&self) -> Duration {
        Duration::from_millis(self.violation_submit_delay_ms)
    }

    pub(crate) fn blur_debounce(&self) -> Duration {
        Duration::from_millis(self.blur_debounce_ms)
    }

    pub(crate) fn file_picker_grace(&self) -> Duration {
        Duration::from_millis(self.file_picker_grace_ms)
    }

    pub(crate) fn devtools_check_interval(&self) -> Duration {
        Duration::from_millis(self.devtools_check_interval_ms.max(1))
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}
