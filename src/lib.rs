pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod input;
pub mod report;
pub mod services;
pub mod tasks;

pub use report::{run_spam_report, start_spam_report, RunningReport, SpamReport};
