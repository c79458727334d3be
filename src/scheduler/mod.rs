//! Batch producers that decide which feeds to refresh next.
//!
//! - [`Scheduler::new_batch`] - automatic scheduling across all users, paced
//!   by each feed's publishing cadence and cut off by its parsing error count
//! - [`Scheduler::new_user_batch`] - a user's "refresh everything now" request,
//!   which bypasses both checks
//! - [`run`] - the periodic loop feeding global batches into a job queue
//!
//! Selection never claims feeds. Two producers running at the same time (a
//! global tick racing a manual refresh, or two scheduler processes) can hand
//! out the same feed twice, so fetch workers must tolerate redundant
//! refreshes.

mod runner;

pub use runner::run;

use chrono::{DateTime, Utc};

use crate::policy::RefreshPolicy;
use crate::storage::{Database, JobList, Selection, StoreError};

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    policy: RefreshPolicy,
}

impl Scheduler {
    pub fn new(db: Database, policy: RefreshPolicy) -> Self {
        Self { db, policy }
    }

    /// Up to `batch_size` due feeds across all users, least recently checked first.
    pub async fn new_batch(&self, batch_size: usize) -> Result<JobList, StoreError> {
        self.new_batch_at(batch_size, Utc::now()).await
    }

    /// [`new_batch`](Self::new_batch) evaluated at `now` instead of the wall clock.
    pub async fn new_batch_at(
        &self,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> Result<JobList, StoreError> {
        let selection = Selection::Due {
            policy: &self.policy,
            now,
        };
        let jobs = self.db.fetch_batch(&selection, batch_size).await?;
        tracing::debug!(
            jobs = jobs.len(),
            batch_size,
            error_threshold = self.policy.error_threshold(),
            "Produced global batch"
        );
        Ok(jobs)
    }

    /// Up to `batch_size` of the user's enabled feeds, least recently checked first.
    ///
    /// The parsing error threshold and the cadence interval do not apply: a
    /// manual refresh overrides automatic pacing.
    pub async fn new_user_batch(
        &self,
        user_id: i64,
        batch_size: usize,
    ) -> Result<JobList, StoreError> {
        let jobs = self
            .db
            .fetch_batch(&Selection::User { user_id }, batch_size)
            .await?;
        tracing::debug!(user_id, jobs = jobs.len(), batch_size, "Produced user batch");
        Ok(jobs)
    }
}
