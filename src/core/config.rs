use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    api: ApiSettings,
    attempt: AttemptSettings,
    state: StateSettings,
    runtime: RuntimeSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) base_url: String,
    pub(crate) request_timeout_seconds: u64,
    pub(crate) connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptSettings {
    pub(crate) quiz_id: String,
    pub(crate) tick_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct StateSettings {
    pub(crate) dir: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
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

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("SOMA_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("SOMA_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = env_or_default("SOMA_API_BASE_URL", "http://localhost:8000");
        let request_timeout_seconds = parse_u64(
            "SOMA_API_TIMEOUT_SECONDS",
            env_or_default("SOMA_API_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "SOMA_API_CONNECT_TIMEOUT_SECONDS",
            env_or_default("SOMA_API_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let quiz_id = env_or_default("SOMA_QUIZ_ID", "");
        let tick_interval_seconds = parse_u64(
            "SOMA_TICK_INTERVAL_SECONDS",
            env_or_default("SOMA_TICK_INTERVAL_SECONDS", "1"),
        )?;

        let state_dir = env_or_default("SOMA_STATE_DIR", ".soma_state");

        let log_level = env_or_default("SOMA_LOG_LEVEL", "info");
        let json = env_optional("SOMA_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            api: ApiSettings { base_url, request_timeout_seconds, connect_timeout_seconds },
            attempt: AttemptSettings { quiz_id, tick_interval_seconds },
            state: StateSettings { dir: state_dir },
            runtime: RuntimeSettings { environment, strict_config },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn attempt(&self) -> &AttemptSettings {
        &self.attempt
    }

    pub(crate) fn state(&self) -> &StateSettings {
        &self.state
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.attempt.tick_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SOMA_TICK_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SOMA_API_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.state.dir.trim().is_empty() {
            return Err(ConfigError::MissingValue("SOMA_STATE_DIR"));
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.api.base_url.is_empty() || !self.api.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "SOMA_API_BASE_URL",
                value: self.api.base_url.clone(),
            });
        }

        if self.attempt.quiz_id.is_empty() {
            return Err(ConfigError::MissingValue("SOMA_QUIZ_ID"));
        }

        Ok(())
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}
