use super::parsing::{
    env_optional, env_or_default, parse_base_url, parse_bool, parse_environment, parse_u32,
    parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, RuntimeSettings, SessionSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("EXAM_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAM_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = parse_base_url(
            env_optional("EXAM_API_BASE_URL")
                .or_else(|| env_optional("VITE_API_BASE_URL"))
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
        )?;
        let auth_token = env_or_default("EXAM_AUTH_TOKEN", "");
        let request_timeout_seconds = parse_u64(
            "EXAM_REQUEST_TIMEOUT_SECONDS",
            env_or_default("EXAM_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;

        let defaults = SessionSettings::default();
        let violation_threshold = parse_u32(
            "EXAM_VIOLATION_THRESHOLD",
            env_or_default("EXAM_VIOLATION_THRESHOLD", &defaults.violation_threshold.to_string()),
        )?;
        let violation_submit_delay_ms = parse_u64(
            "EXAM_VIOLATION_SUBMIT_DELAY_MS",
            env_or_default(
                "EXAM_VIOLATION_SUBMIT_DELAY_MS",
                &defaults.violation_submit_delay_ms.to_string(),
            ),
        )?;
        let blur_debounce_ms = parse_u64(
            "EXAM_BLUR_DEBOUNCE_MS",
            env_or_default("EXAM_BLUR_DEBOUNCE_MS", &defaults.blur_debounce_ms.to_string()),
        )?;
        let file_picker_grace_ms = parse_u64(
            "EXAM_FILE_PICKER_GRACE_MS",
            env_or_default("EXAM_FILE_PICKER_GRACE_MS", &defaults.file_picker_grace_ms.to_string()),
        )?;
        let devtools_check_interval_ms = parse_u64(
            "EXAM_DEVTOOLS_CHECK_INTERVAL_MS",
            env_or_default(
                "EXAM_DEVTOOLS_CHECK_INTERVAL_MS",
                &defaults.devtools_check_interval_ms.to_string(),
            ),
        )?;
        let devtools_threshold_px = parse_u32(
            "EXAM_DEVTOOLS_THRESHOLD_PX",
            env_or_default(
                "EXAM_DEVTOOLS_THRESHOLD_PX",
                &defaults.devtools_threshold_px.to_string(),
            ),
        )?;
        let fallback_duration_minutes = parse_u32(
            "EXAM_FALLBACK_DURATION_MINUTES",
            env_or_default(
                "EXAM_FALLBACK_DURATION_MINUTES",
                &defaults.fallback_duration_minutes.to_string(),
            ),
        )?;

        let log_level = env_or_default("EXAM_LOG_LEVEL", "info");
        let json = env_optional("EXAM_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { base_url, auth_token, request_timeout_seconds },
            session: SessionSettings {
                violation_threshold,
                violation_submit_delay_ms,
                blur_debounce_ms,
                file_picker_grace_ms,
                devtools_check_interval_ms,
                devtools_threshold_px,
                fallback_duration_minutes,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.violation_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_VIOLATION_THRESHOLD",
                value: "0".to_string(),
            });
        }

        if self.session.fallback_duration_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_FALLBACK_DURATION_MINUTES",
                value: "0".to_string(),
            });
        }

        if self.session.devtools_check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_DEVTOOLS_CHECK_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.api.auth_token.is_empty() {
            return Err(ConfigError::MissingSecret("EXAM_AUTH_TOKEN"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::types::Environment;
    use crate::test_support;

    #[tokio::test]
    async fn load_uses_session_defaults() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.runtime().environment, Environment::Test);
        assert_eq!(settings.api().base_url, "http://127.0.0.1:5000");
        assert_eq!(settings.session().violation_threshold, 1);
        assert_eq!(settings.session().blur_debounce_ms, 100);
        assert_eq!(settings.session().file_picker_grace_ms, 2000);
        assert_eq!(settings.session().fallback_duration_minutes, 60);
    }

    #[tokio::test]
    async fn load_rejects_zero_threshold() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("EXAM_VIOLATION_THRESHOLD", "0");

        let result = Settings::load();
        std::env::remove_var("EXAM_VIOLATION_THRESHOLD");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "EXAM_VIOLATION_THRESHOLD", .. })
        ));
    }

    #[tokio::test]
    async fn strict_config_requires_token() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("EXAM_STRICT_CONFIG", "1");
        std::env::remove_var("EXAM_AUTH_TOKEN");

        let result = Settings::load();
        std::env::set_var("EXAM_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("EXAM_AUTH_TOKEN"))));
    }
}
