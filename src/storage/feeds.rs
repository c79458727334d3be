use anyhow::Result;

use super::schema::Database;
use super::types::{DatabaseError, Feed};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================
    //
    // These are the fetch-worker side of the store. Batch selection only
    // reads the columns they maintain.

    /// Register a feed for `user_id`, returning its id.
    pub async fn insert_feed(&self, user_id: i64, checked_at: i64) -> Result<i64> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO feeds (user_id, checked_at) VALUES (?, ?) RETURNING id")
                .bind(user_id)
                .bind(checked_at)
                .fetch_one(&self.pool)
                .await?;
        Ok(id)
    }

    /// Fetch a single feed's scheduling metadata
    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, user_id, disabled, parsing_error_count, checked_at
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Enable or disable a feed. Disabled feeds are never scheduled.
    pub async fn set_feed_disabled(&self, feed_id: i64, disabled: bool) -> Result<()> {
        sqlx::query("UPDATE feeds SET disabled = ? WHERE id = ?")
            .bind(disabled)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record that a feed was checked at `checked_at` (Unix seconds)
    pub async fn mark_feed_checked(&self, feed_id: i64, checked_at: i64) -> Result<()> {
        sqlx::query("UPDATE feeds SET checked_at = ? WHERE id = ?")
            .bind(checked_at)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Circuit Breaker Operations
    // ========================================================================

    /// Increment the parsing error counter for a feed.
    ///
    /// Called by the fetch worker after a failed parse. Returns the new count.
    /// Once it reaches the policy's error threshold the feed drops out of
    /// global batches until the counter is reset.
    pub async fn increment_parsing_errors(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let result: (i64,) = sqlx::query_as(
            "UPDATE feeds SET parsing_error_count = parsing_error_count + 1
             WHERE id = ? RETURNING parsing_error_count",
        )
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(result.0)
    }

    /// Clear the parsing error counter after a successful fetch.
    pub async fn reset_parsing_errors(&self, feed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET parsing_error_count = 0 WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_feed_defaults() {
        let db = test_db().await;
        let id = db.insert_feed(42, 1_700_000_000).await.unwrap();

        let feed = db.get_feed(id).await.unwrap().unwrap();
        assert_eq!(feed.user_id, 42);
        assert!(!feed.disabled);
        assert_eq!(feed.parsing_error_count, 0);
        assert_eq!(feed.checked_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_get_missing_feed_returns_none() {
        let db = test_db().await;
        assert!(db.get_feed(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_feed_disabled_round_trip() {
        let db = test_db().await;
        let id = db.insert_feed(1, 0).await.unwrap();

        db.set_feed_disabled(id, true).await.unwrap();
        assert!(db.get_feed(id).await.unwrap().unwrap().disabled);

        db.set_feed_disabled(id, false).await.unwrap();
        assert!(!db.get_feed(id).await.unwrap().unwrap().disabled);
    }

    #[tokio::test]
    async fn test_mark_feed_checked() {
        let db = test_db().await;
        let id = db.insert_feed(1, 0).await.unwrap();

        db.mark_feed_checked(id, 1_700_000_500).await.unwrap();
        assert_eq!(db.get_feed(id).await.unwrap().unwrap().checked_at, 1_700_000_500);
    }

    #[tokio::test]
    async fn test_increment_and_reset_parsing_errors() {
        let db = test_db().await;
        let id = db.insert_feed(1, 0).await.unwrap();

        assert_eq!(db.increment_parsing_errors(id).await.unwrap(), 1);
        assert_eq!(db.increment_parsing_errors(id).await.unwrap(), 2);
        assert_eq!(db.get_feed(id).await.unwrap().unwrap().parsing_error_count, 2);

        db.reset_parsing_errors(id).await.unwrap();
        assert_eq!(db.get_feed(id).await.unwrap().unwrap().parsing_error_count, 0);
    }

    #[tokio::test]
    async fn test_increment_unknown_feed_fails() {
        let db = test_db().await;
        assert!(db.increment_parsing_errors(12345).await.is_err());
    }
}
