pub mod env;
mod loader;

pub use env::{
    AppConfig, ConfigError, DirectoryConfig, PipelineSettings, ServiceConfig, SimulationConfig,
};
pub use loader::load_config;
