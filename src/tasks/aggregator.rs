use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{MessageResult, ReportLine};

use super::{orchestrator::Stage, stats::PipelineStats};

/// Spam first, then ascending message id.
pub fn report_order(a: &MessageResult, b: &MessageResult) -> Ordering {
    b.has_spam
        .cmp(&a.has_spam)
        .then_with(|| a.id.cmp(&b.id))
}

pub fn render_report(mut results: Vec<MessageResult>) -> Vec<ReportLine> {
    results.sort_by(report_order);
    results.iter().map(MessageResult::render).collect()
}

/// Collects every result before emitting anything; the order is global.
pub struct ReportStage {
    stats: Arc<PipelineStats>,
}

impl ReportStage {
    pub fn new(stats: Arc<PipelineStats>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl Stage for ReportStage {
    type Input = MessageResult;
    type Output = ReportLine;

    fn name(&self) -> &'static str {
        "combine_results"
    }

    async fn run(self, mut input: mpsc::Receiver<MessageResult>, output: mpsc::Sender<ReportLine>) {
        let mut results = Vec::new();
        while let Some(result) = input.recv().await {
            results.push(result);
        }
        tracing::debug!(target: "report", results = results.len(), "results collected");

        for line in render_report(results) {
            if output.send(line).await.is_err() {
                break;
            }
            self.stats.record_report_lines(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{domain::MessageId, tasks::orchestrator::Pipeline};

    use super::*;

    #[test]
    fn spam_first_then_ascending_id() {
        let lines = render_report(vec![
            MessageResult::new(MessageId(5), true),
            MessageResult::new(MessageId(2), false),
            MessageResult::new(MessageId(1), true),
        ]);
        assert_eq!(lines, vec!["true 1", "true 5", "false 2"]);
    }

    #[test]
    fn order_is_total_over_mixed_input() {
        let mut results: Vec<MessageResult> = (1..=40u64)
            .rev()
            .map(|id| MessageResult::new(MessageId(id * 7 % 41), id % 4 == 0))
            .collect();
        results.sort_by(report_order);

        let split = results.iter().position(|r| !r.has_spam).unwrap();
        assert!(results[..split].iter().all(|r| r.has_spam));
        assert!(results[split..].iter().all(|r| !r.has_spam));
        for group in [&results[..split], &results[split..]] {
            assert!(group.windows(2).all(|w| w[0].id < w[1].id));
        }
    }

    #[tokio::test]
    async fn stage_emits_sorted_lines_after_input_closes() {
        let stats = Arc::new(PipelineStats::default());
        let results = vec![
            MessageResult::new(MessageId(9), false),
            MessageResult::new(MessageId(3), true),
            MessageResult::new(MessageId(4), false),
        ];

        let lines = Pipeline::from_items(results, 1)
            .then(ReportStage::new(stats.clone()))
            .collect()
            .await
            .unwrap();

        assert_eq!(lines, vec!["true 3", "false 4", "false 9"]);
        assert_eq!(stats.snapshot().report_lines, 3);
    }
}
