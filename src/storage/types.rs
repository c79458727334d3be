use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database
    #[error("The feed database is locked by another process. Please try again later.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

/// Failure while producing a batch of jobs.
///
/// Neither variant is retried here; the scheduling loop or the caller decides.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The selection statement could not be executed
    #[error("unable to fetch batch of jobs: {0}")]
    Query(#[source] sqlx::Error),

    /// A returned row could not be converted into a job
    #[error("unable to fetch job: {0}")]
    Decode(#[source] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// One feed to refresh, identified together with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Job {
    pub feed_id: i64,
    pub user_id: i64,
}

/// Jobs in selection order, least recently checked feed first.
pub type JobList = Vec<Job>;

/// Feed scheduling metadata
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub disabled: bool,
    /// Parsing failures since the last successful fetch (circuit breaker)
    pub parsing_error_count: i64,
    /// Unix seconds of the last check, 0 if never checked
    pub checked_at: i64,
}

/// Row shape shared by every selection query
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CandidateRow {
    pub id: i64,
    pub user_id: i64,
    pub checked_at: i64,
    pub parsing_error_count: i64,
    /// Newest entry of the feed; NULL when the selection does not aggregate entries
    pub last_published_at: Option<i64>,
}

impl CandidateRow {
    pub(crate) fn into_job(self) -> Job {
        Job {
            feed_id: self.id,
            user_id: self.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("(code: 14) unable to open database file"));
        assert!(!is_lock_message("no such table: feeds"));
    }

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::Query(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("unable to fetch batch of jobs"));
        let err = StoreError::Decode(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("unable to fetch job"));
    }

    #[test]
    fn test_job_serializes_as_flat_object() {
        let job = Job {
            feed_id: 7,
            user_id: 2,
        };
        assert_eq!(
            serde_json::to_string(&job).unwrap(),
            r#"{"feed_id":7,"user_id":2}"#
        );
    }
}
