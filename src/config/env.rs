use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineSettings,
    pub service: ServiceConfig,
    pub simulation: SimulationConfig,
    pub input_file: Option<String>,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

/// Limits the pipeline stages run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_batch_users: usize,
    pub max_concurrent_classifications: usize,
    pub batch_workers: usize,
    pub max_concurrent_resolutions: Option<usize>,
    pub stream_capacity: usize,
}

impl PipelineSettings {
    pub const DEFAULT_BATCH_WORKERS: usize = 5;

    pub fn new(max_batch_users: usize, max_concurrent_classifications: usize) -> Self {
        Self {
            max_batch_users,
            max_concurrent_classifications,
            ..Self::default()
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_batch_users: 2,
            max_concurrent_classifications: 5,
            batch_workers: Self::DEFAULT_BATCH_WORKERS,
            max_concurrent_resolutions: None,
            stream_capacity: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub latency: Duration,
    pub spam_modulus: u64,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
