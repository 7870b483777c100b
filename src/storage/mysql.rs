use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::error::StoreError;
use crate::models::{ModerationAction, ReportTarget, SearchPost};
use crate::storage::CommunityStore;

/// MySQL-backed store over the community schema (Posts, Comments, Reports,
/// ReportActions, Statuses, Logins).
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CommunityStore for MySqlStore {
    async fn fetch_posts_for_indexing(&self) -> Result<Vec<SearchPost>, StoreError> {
        let posts = sqlx::query_as::<_, SearchPost>(
            r#"
            SELECT Posts.PostID AS id,
                   Posts.Title AS title,
                   Posts.Description AS description
            FROM Posts
            INNER JOIN Statuses ON Statuses.StatusID = Posts.StatusID
            WHERE Statuses.Status = 'Active'
            ORDER BY Posts.CreatedIn DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn count_pending_reports(&self, target: ReportTarget) -> Result<i64, StoreError> {
        let (sql, id) = match target {
            ReportTarget::Post(id) => (
                "SELECT COUNT(*) FROM Reports WHERE PostID = ? AND ProcessedIn IS NULL",
                id,
            ),
            ReportTarget::Comment(id) => (
                "SELECT COUNT(*) FROM Reports WHERE CommentID = ? AND ProcessedIn IS NULL",
                id,
            ),
        };
        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn mark_reports_processed(&self, target: ReportTarget) -> Result<u64, StoreError> {
        // One conditional update; the NULL check is the concurrency guard.
        let (sql, id) = match target {
            ReportTarget::Post(id) => (
                "UPDATE Reports SET ProcessedIn = NOW() \
                 WHERE Reports.ProcessedIn IS NULL AND PostID = ?",
                id,
            ),
            ReportTarget::Comment(id) => (
                "UPDATE Reports SET ProcessedIn = NOW() \
                 WHERE Reports.ProcessedIn IS NULL AND CommentID = ?",
                id,
            ),
        };
        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn resolve_owning_user(
        &self,
        target: ReportTarget,
    ) -> Result<Option<i32>, StoreError> {
        let (sql, id) = match target {
            ReportTarget::Post(id) => ("SELECT UserID FROM Posts WHERE PostID = ?", id),
            ReportTarget::Comment(id) => {
                ("SELECT UserID FROM Comments WHERE CommentID = ?", id)
            }
        };
        let user_id = sqlx::query_scalar::<_, i32>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user_id)
    }

    async fn insert_report_action(
        &self,
        reported_user_id: i32,
        acting_user_id: i32,
        action: ModerationAction,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO ReportActions (ReportedUserID, ActionUserID, Action, CreatedIn) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(reported_user_id)
        .bind(acting_user_id)
        .bind(action.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn block_content(&self, target: ReportTarget) -> Result<(), StoreError> {
        let (sql, id) = match target {
            ReportTarget::Post(id) => (
                "UPDATE Posts SET StatusID = \
                 (SELECT StatusID FROM Statuses WHERE Status = 'Blocked'), \
                 ModifiedIn = NOW() WHERE PostID = ?",
                id,
            ),
            ReportTarget::Comment(id) => (
                "UPDATE Comments SET StatusID = \
                 (SELECT StatusID FROM Statuses WHERE Status = 'Blocked'), \
                 ModifiedIn = NOW() WHERE CommentID = ?",
                id,
            ),
        };
        sqlx::query(sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn count_block_actions(&self, user_id: i32) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ReportActions RA \
             WHERE RA.ReportedUserID = ? AND RA.Action = 'BLOCK'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn lookup_device_token(&self, user_id: i32) -> Result<Option<String>, StoreError> {
        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT DeviceToken FROM Logins \
             WHERE UserID = ? ORDER BY CreatedIn DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use dotenvy::dotenv;

    async fn connect_test_db() -> Result<MySqlStore> {
        dotenv().ok();
        let database_url = std::env::var("DATABASE_URL")?;
        Ok(MySqlStore::connect(&database_url).await?)
    }

    #[tokio::test]
    #[ignore = "requires a provisioned MySQL via DATABASE_URL"]
    async fn fetches_active_posts() -> Result<()> {
        let store = connect_test_db().await?;
        let posts = store.fetch_posts_for_indexing().await?;
        assert!(posts.iter().all(|post| post.id >= 0));
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a provisioned MySQL via DATABASE_URL"]
    async fn marking_an_unreported_target_affects_no_rows() -> Result<()> {
        let store = connect_test_db().await?;
        let affected = store
            .mark_reports_processed(ReportTarget::Post(-1))
            .await?;
        assert_eq!(affected, 0);
        Ok(())
    }
}
