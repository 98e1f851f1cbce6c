use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for items the stages absorbed or passed on.
///
/// Dropped batches and messages never reach the report; these counters are
/// the only place they remain visible.
#[derive(Debug, Default)]
pub struct PipelineStats {
    emails_received: AtomicU64,
    resolve_failures: AtomicU64,
    duplicate_users: AtomicU64,
    users_forwarded: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_dropped: AtomicU64,
    messages_listed: AtomicU64,
    classifications_failed: AtomicU64,
    results_classified: AtomicU64,
    report_lines: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub emails_received: u64,
    pub resolve_failures: u64,
    pub duplicate_users: u64,
    pub users_forwarded: u64,
    pub batches_dispatched: u64,
    pub batches_dropped: u64,
    pub messages_listed: u64,
    pub classifications_failed: u64,
    pub results_classified: u64,
    pub report_lines: u64,
}

macro_rules! counters {
    ($($field:ident => $record:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub fn $record(&self, count: u64) {
                    self.$field.fetch_add(count, Ordering::Relaxed);
                }
            )*

            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    emails_received => record_emails,
    resolve_failures => record_resolve_failures,
    duplicate_users => record_duplicates,
    users_forwarded => record_users,
    batches_dispatched => record_batches,
    batches_dropped => record_dropped_batches,
    messages_listed => record_messages,
    classifications_failed => record_failed_classifications,
    results_classified => record_results,
    report_lines => record_report_lines,
}
