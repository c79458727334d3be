use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// Record an entry published at `published_at` (Unix seconds)
    pub async fn insert_entry(&self, feed_id: i64, published_at: i64) -> Result<i64> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO entries (feed_id, published_at) VALUES (?, ?) RETURNING id")
                .bind(feed_id)
                .bind(published_at)
                .fetch_one(&self.pool)
                .await?;
        Ok(id)
    }

    /// Publication time of the newest entry, or `None` for a feed without entries
    pub async fn last_published_at(&self, feed_id: i64) -> Result<Option<i64>> {
        let (latest,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(published_at) FROM entries WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(latest)
    }
}
