use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::Scheduler;
use crate::storage::JobList;

/// Produce a global batch every `frequency` and push it onto `queue`.
///
/// The first batch is produced immediately. Empty batches are not sent. A
/// failed selection is logged and retried on the next tick. Returns once the
/// receiving side of `queue` is dropped.
pub async fn run(
    scheduler: Scheduler,
    frequency: Duration,
    batch_size: usize,
    queue: mpsc::Sender<JobList>,
) {
    tracing::info!(
        frequency_secs = frequency.as_secs(),
        batch_size,
        "Starting feed scheduler"
    );

    let mut ticker = tokio::time::interval(frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if queue.is_closed() {
            break;
        }

        let jobs = match scheduler.new_batch(batch_size).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to produce batch of jobs");
                continue;
            }
        };

        if jobs.is_empty() {
            tracing::debug!("No feeds due for refresh");
            continue;
        }

        tracing::debug!(jobs = jobs.len(), "Queueing batch");
        if queue.send(jobs).await.is_err() {
            break;
        }
    }

    tracing::info!("Job queue closed, stopping feed scheduler");
}
