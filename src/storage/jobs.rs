use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::{CandidateRow, JobList, StoreError};
use crate::policy::RefreshPolicy;

// ============================================================================
// Selection Strategy
// ============================================================================

/// Which feeds a batch is drawn from.
///
/// Both variants share the row shape, the `checked_at` ordering and the
/// limit; they differ in the SQL predicate and in the per-row cadence check.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    /// Automatic scheduling across all users: enabled feeds under the error
    /// threshold that have entries and whose adaptive interval has elapsed.
    ///
    /// The cadence check runs in Rust on each row, so this query has no SQL
    /// `LIMIT`. It streams every enabled feed under the threshold with
    /// `checked_at <= now`, oldest first, until the batch fills. When few of
    /// those feeds are due, that is close to a full scan of `feeds`.
    Due {
        policy: &'a RefreshPolicy,
        now: DateTime<Utc>,
    },
    /// Manual refresh of one user's enabled feeds. Error count and cadence
    /// are ignored.
    User { user_id: i64 },
}

impl Selection<'_> {
    fn build_query(&self, limit: usize) -> QueryBuilder<'static, Sqlite> {
        match *self {
            Selection::Due { policy, now } => {
                let mut builder = QueryBuilder::new(
                    r#"
                    SELECT f.id AS id, f.user_id AS user_id, f.checked_at AS checked_at,
                           f.parsing_error_count AS parsing_error_count,
                           t.last_published_at AS last_published_at
                    FROM feeds f
                    JOIN (
                        SELECT feed_id, MAX(published_at) AS last_published_at
                        FROM entries
                        GROUP BY feed_id
                    ) t ON t.feed_id = f.id
                    WHERE f.disabled = 0 AND f.parsing_error_count < "#,
                );
                // Prefilter only; admits() applies the same threshold per row
                builder.push_bind(policy.error_threshold());
                // Every interval is >= 0, so this only prunes feeds that cannot be due
                builder.push(" AND f.checked_at <= ");
                builder.push_bind(now.timestamp());
                // No LIMIT: the cadence filter runs per row, the scan stops once full
                builder.push(" ORDER BY f.checked_at ASC, f.id ASC");
                builder
            }
            Selection::User { user_id } => {
                let mut builder = QueryBuilder::new(
                    r#"
                    SELECT f.id AS id, f.user_id AS user_id, f.checked_at AS checked_at,
                           f.parsing_error_count AS parsing_error_count,
                           NULL AS last_published_at
                    FROM feeds f
                    WHERE f.disabled = 0 AND f.user_id = "#,
                );
                builder.push_bind(user_id);
                builder.push(" ORDER BY f.checked_at ASC, f.id ASC LIMIT ");
                builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
                builder
            }
        }
    }

    fn admits(&self, row: &CandidateRow) -> bool {
        match *self {
            Selection::Due { policy, now } => {
                policy.accepts_error_count(row.parsing_error_count)
                    && row
                        .last_published_at
                        .is_some_and(|published| policy.is_due(row.checked_at, published, now))
            }
            Selection::User { .. } => true,
        }
    }
}

impl Database {
    // ========================================================================
    // Batch Materializer
    // ========================================================================

    /// Run `selection` and collect up to `limit` jobs in row order.
    ///
    /// The row stream lives only inside this call; it is dropped on every
    /// return, including the error paths. A row that fails to decode aborts
    /// the whole batch.
    ///
    /// # Errors
    ///
    /// `StoreError::Query` if the statement fails, `StoreError::Decode` if a
    /// row does not have the expected shape.
    pub async fn fetch_batch(
        &self,
        selection: &Selection<'_>,
        limit: usize,
    ) -> Result<JobList, StoreError> {
        let mut jobs = JobList::new();
        if limit == 0 {
            return Ok(jobs);
        }

        let mut builder = selection.build_query(limit);
        let mut rows = builder.build().fetch(&self.pool);

        while let Some(row) = rows.try_next().await.map_err(StoreError::Query)? {
            let candidate = CandidateRow::from_row(&row).map_err(StoreError::Decode)?;
            if !selection.admits(&candidate) {
                continue;
            }
            jobs.push(candidate.into_job());
            if jobs.len() >= limit {
                break;
            }
        }

        Ok(jobs)
    }
}
