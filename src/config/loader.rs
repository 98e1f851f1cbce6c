use std::{env, str::FromStr, time::Duration};

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LoggingConfig, PipelineSettings, ServiceConfig,
    SimulationConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = PipelineSettings::default();

        let pipeline = PipelineSettings {
            max_batch_users: parse_limit(&var, "MAX_BATCH_USERS", defaults.max_batch_users)?,
            max_concurrent_classifications: parse_limit(
                &var,
                "MAX_CONCURRENT_CLASSIFICATIONS",
                defaults.max_concurrent_classifications,
            )?,
            batch_workers: parse_limit(&var, "BATCH_WORKERS", defaults.batch_workers)?,
            max_concurrent_resolutions: match var("MAX_CONCURRENT_RESOLUTIONS") {
                Some(_) => Some(parse_limit(&var, "MAX_CONCURRENT_RESOLUTIONS", 1)?),
                None => None,
            },
            stream_capacity: parse_limit(&var, "STREAM_CAPACITY", defaults.stream_capacity)?,
        };

        let service = ServiceConfig {
            base_url: var("SERVICE_BASE_URL"),
            timeout: Duration::from_millis(parse_or(&var, "SERVICE_TIMEOUT_MS", 10_000u64)?),
        };

        let simulation = SimulationConfig {
            latency: Duration::from_millis(parse_or(&var, "SIMULATED_LATENCY_MS", 0u64)?),
            spam_modulus: parse_limit(&var, "SIMULATED_SPAM_MODULUS", 3u64)?,
        };

        let directories = DirectoryConfig {
            logs_dir: var("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            pipeline,
            service,
            simulation,
            input_file: var("INPUT_FILE"),
            directories,
            logging,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_raw(key, raw),
        None => Ok(default),
    }
}

fn parse_raw<T: FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw,
        reason: "not a number",
    })
}

fn parse_limit<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    let value: T = parse_raw(key, raw.clone())?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be at least 1",
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.pipeline.batch_workers, 5);
        assert!(config.service.base_url.is_none());
        assert_eq!(config.simulation.spam_modulus, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn reads_pipeline_limits() {
        let config = config_from(&[
            ("MAX_BATCH_USERS", "10"),
            ("MAX_CONCURRENT_CLASSIFICATIONS", " 3 "),
            ("MAX_CONCURRENT_RESOLUTIONS", "8"),
            ("SERVICE_BASE_URL", "http://localhost:8080"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.max_batch_users, 10);
        assert_eq!(config.pipeline.max_concurrent_classifications, 3);
        assert_eq!(config.pipeline.max_concurrent_resolutions, Some(8));
        assert_eq!(
            config.service.base_url.as_deref(),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = config_from(&[("MAX_BATCH_USERS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_BATCH_USERS", .. }));

        let err = config_from(&[("BATCH_WORKERS", "five")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BATCH_WORKERS", .. }));
    }

    #[test]
    fn zero_limit_error_keeps_the_configured_text() {
        let err = config_from(&[("STREAM_CAPACITY", "00")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "STREAM_CAPACITY",
                value: "00".to_string(),
                reason: "must be at least 1",
            }
        );

        let err = config_from(&[("MAX_CONCURRENT_RESOLUTIONS", " 0 ")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "MAX_CONCURRENT_RESOLUTIONS", ref value, .. } if value == "0"
        ));
    }
}
