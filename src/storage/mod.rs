use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{ModerationAction, ReportTarget, SearchPost};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// The narrow relational-store contract the engine core consumes. Everything
/// else the backing database holds (profiles, votes, attachments) is outside
/// this seam.
#[async_trait]
pub trait CommunityStore: Send + Sync + 'static {
    /// Snapshot of the active posts, for (re-)indexing.
    async fn fetch_posts_for_indexing(&self) -> Result<Vec<SearchPost>, StoreError>;

    /// Number of reports against the target that are still pending.
    async fn count_pending_reports(&self, target: ReportTarget) -> Result<i64, StoreError>;

    /// Marks every pending report for the target processed and returns the
    /// affected row count. Must be a single conditional update: the
    /// processed-timestamp NULL check is the concurrency control that lets at
    /// most one moderator win, so a read-then-write pair is not acceptable.
    async fn mark_reports_processed(&self, target: ReportTarget) -> Result<u64, StoreError>;

    /// The user who authored the reported content, if any.
    async fn resolve_owning_user(
        &self,
        target: ReportTarget,
    ) -> Result<Option<i32>, StoreError>;

    /// Appends one audit row for the moderation decision.
    async fn insert_report_action(
        &self,
        reported_user_id: i32,
        acting_user_id: i32,
        action: ModerationAction,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Transitions the target content to blocked, removing it from normal
    /// listings.
    async fn block_content(&self, target: ReportTarget) -> Result<(), StoreError>;

    /// How many BLOCK actions have been recorded against the user, including
    /// any inserted by the current invocation.
    async fn count_block_actions(&self, user_id: i32) -> Result<i64, StoreError>;

    /// The user's most recently registered push device token, if any.
    async fn lookup_device_token(&self, user_id: i32) -> Result<Option<String>, StoreError>;
}
