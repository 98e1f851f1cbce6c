//! Pipeline stages and the orchestrator that chains them.

pub mod aggregator;
pub mod batcher;
pub mod classifier;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod stats;

pub use aggregator::ReportStage;
pub use batcher::MessageBatchingStage;
pub use classifier::SpamClassificationStage;
pub use orchestrator::{stage_fn, Completion, Pipeline, PipelineError, Stage};
pub use resolver::UserResolverStage;
pub use stats::{PipelineStats, StatsSnapshot};
