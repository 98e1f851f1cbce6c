use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    config::PipelineSettings,
    domain::ReportLine,
    services::Services,
    tasks::{
        Completion, MessageBatchingStage, Pipeline, PipelineError, PipelineStats, ReportStage,
        SpamClassificationStage, StatsSnapshot, UserResolverStage,
    },
};

#[derive(Debug, Clone)]
pub struct SpamReport {
    pub lines: Vec<ReportLine>,
    pub stats: StatsSnapshot,
}

/// A report pipeline whose stages are running.
pub struct RunningReport {
    lines: mpsc::Receiver<ReportLine>,
    completion: Completion,
    stats: Arc<PipelineStats>,
}

impl RunningReport {
    /// Next line in report order; `None` once the report stage has closed.
    pub async fn next_line(&mut self) -> Option<ReportLine> {
        self.lines.recv().await
    }

    /// Waits for every stage after the lines have been drained.
    pub async fn finish(self, lines: Vec<ReportLine>) -> Result<SpamReport, PipelineError> {
        self.completion.wait().await?;

        let stats = self.stats.snapshot();
        tracing::info!(
            target: "report",
            emails = stats.emails_received,
            users = stats.users_forwarded,
            batches = stats.batches_dispatched,
            dropped_batches = stats.batches_dropped,
            failed_classifications = stats.classifications_failed,
            lines = lines.len(),
            "spam report complete"
        );
        Ok(SpamReport { lines, stats })
    }

    /// Cancels the stages still running and waits for them to stop.
    pub async fn abort(self) -> Result<StatsSnapshot, PipelineError> {
        self.completion.abort();
        self.completion.wait().await?;
        Ok(self.stats.snapshot())
    }
}

/// Spawns resolve → batch lookup → classify → report over `emails`.
pub fn start_spam_report<I>(
    emails: I,
    services: &Services,
    settings: &PipelineSettings,
) -> Result<RunningReport, PipelineError>
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    validate(settings)?;
    let stats = Arc::new(PipelineStats::default());

    let (lines, completion) = Pipeline::from_items(emails, settings.stream_capacity)
        .then(
            UserResolverStage::new(services.users.clone(), stats.clone())
                .with_concurrency_limit(settings.max_concurrent_resolutions),
        )
        .then(MessageBatchingStage::new(
            services.messages.clone(),
            settings.max_batch_users,
            settings.batch_workers,
            stats.clone(),
        ))
        .then(SpamClassificationStage::new(
            services.classifier.clone(),
            settings.max_concurrent_classifications,
            stats.clone(),
        ))
        .then(ReportStage::new(stats.clone()))
        .into_stream();

    Ok(RunningReport {
        lines,
        completion,
        stats,
    })
}

/// Runs the whole pipeline and returns the lines once every stage has drained.
pub async fn run_spam_report<I>(
    emails: I,
    services: &Services,
    settings: &PipelineSettings,
) -> Result<SpamReport, PipelineError>
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    let mut running = start_spam_report(emails, services, settings)?;
    let mut lines = Vec::new();
    while let Some(line) = running.next_line().await {
        lines.push(line);
    }
    running.finish(lines).await
}

fn validate(settings: &PipelineSettings) -> Result<(), PipelineError> {
    if settings.max_batch_users == 0 {
        return Err(PipelineError::InvalidSettings("max_batch_users must be at least 1"));
    }
    if settings.max_concurrent_classifications == 0 {
        return Err(PipelineError::InvalidSettings(
            "max_concurrent_classifications must be at least 1",
        ));
    }
    if settings.batch_workers == 0 {
        return Err(PipelineError::InvalidSettings("batch_workers must be at least 1"));
    }
    if settings.max_concurrent_resolutions == Some(0) {
        return Err(PipelineError::InvalidSettings(
            "max_concurrent_resolutions must be at least 1 when set",
        ));
    }
    Ok(())
}
