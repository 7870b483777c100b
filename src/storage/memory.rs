use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::models::{ModerationAction, ReportTarget, SearchPost};
use crate::storage::CommunityStore;

#[derive(Debug, Clone)]
struct StoredPost {
    post: SearchPost,
    user_id: i32,
    blocked: bool,
}

#[derive(Debug, Clone)]
struct StoredComment {
    user_id: i32,
    blocked: bool,
}

#[derive(Debug, Clone)]
struct StoredReport {
    target: ReportTarget,
    processed_at: Option<DateTime<Utc>>,
}

/// One row of the moderation audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportActionRow {
    pub reported_user_id: i32,
    pub acting_user_id: i32,
    pub action: ModerationAction,
    pub created_at: DateTime<Utc>,
}

/// In-memory store used by the demo binary and the test suite.
///
/// Reports live behind one mutex so that marking them processed is a single
/// atomic conditional update, exactly like the SQL `UPDATE … WHERE
/// processed_in IS NULL` it stands in for.
#[derive(Clone, Default)]
pub struct MemoryStore {
    posts: Arc<DashMap<i32, StoredPost>>,
    comments: Arc<DashMap<i32, StoredComment>>,
    reports: Arc<Mutex<Vec<StoredReport>>>,
    actions: Arc<Mutex<Vec<ReportActionRow>>>,
    device_tokens: Arc<DashMap<i32, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self, post: SearchPost, user_id: i32) {
        self.posts.insert(
            post.id,
            StoredPost {
                post,
                user_id,
                blocked: false,
            },
        );
    }

    pub fn add_comment(&self, comment_id: i32, user_id: i32) {
        self.comments.insert(
            comment_id,
            StoredComment {
                user_id,
                blocked: false,
            },
        );
    }

    pub fn file_report(&self, target: ReportTarget) {
        self.reports.lock().unwrap().push(StoredReport {
            target,
            processed_at: None,
        });
    }

    pub fn set_device_token(&self, user_id: i32, token: &str) {
        self.device_tokens.insert(user_id, token.to_string());
    }

    /// Audit trail snapshot, for assertions.
    pub fn report_actions(&self) -> Vec<ReportActionRow> {
        self.actions.lock().unwrap().clone()
    }

    pub fn is_blocked(&self, target: ReportTarget) -> bool {
        match target {
            ReportTarget::Post(id) => self.posts.get(&id).map(|p| p.blocked).unwrap_or(false),
            ReportTarget::Comment(id) => {
                self.comments.get(&id).map(|c| c.blocked).unwrap_or(false)
            }
        }
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn fetch_posts_for_indexing(&self) -> Result<Vec<SearchPost>, StoreError> {
        let mut posts: Vec<SearchPost> = self
            .posts
            .iter()
            .filter(|entry| !entry.blocked)
            .map(|entry| entry.post.clone())
            .collect();
        posts.sort_by_key(|post| post.id);
        Ok(posts)
    }

    async fn count_pending_reports(&self, target: ReportTarget) -> Result<i64, StoreError> {
        let reports = self.reports.lock().unwrap();
        Ok(reports
            .iter()
            .filter(|report| report.target == target && report.processed_at.is_none())
            .count() as i64)
    }

    async fn mark_reports_processed(&self, target: ReportTarget) -> Result<u64, StoreError> {
        let mut reports = self.reports.lock().unwrap();
        let now = Utc::now();
        let mut affected = 0;
        for report in reports
            .iter_mut()
            .filter(|report| report.target == target && report.processed_at.is_none())
        {
            report.processed_at = Some(now);
            affected += 1;
        }
        Ok(affected)
    }

    async fn resolve_owning_user(
        &self,
        target: ReportTarget,
    ) -> Result<Option<i32>, StoreError> {
        Ok(match target {
            ReportTarget::Post(id) => self.posts.get(&id).map(|p| p.user_id),
            ReportTarget::Comment(id) => self.comments.get(&id).map(|c| c.user_id),
        })
    }

    async fn insert_report_action(
        &self,
        reported_user_id: i32,
        acting_user_id: i32,
        action: ModerationAction,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.actions.lock().unwrap().push(ReportActionRow {
            reported_user_id,
            acting_user_id,
            action,
            created_at,
        });
        Ok(())
    }

    async fn block_content(&self, target: ReportTarget) -> Result<(), StoreError> {
        match target {
            ReportTarget::Post(id) => {
                if let Some(mut post) = self.posts.get_mut(&id) {
                    post.blocked = true;
                }
            }
            ReportTarget::Comment(id) => {
                if let Some(mut comment) = self.comments.get_mut(&id) {
                    comment.blocked = true;
                }
            }
        }
        Ok(())
    }

    async fn count_block_actions(&self, user_id: i32) -> Result<i64, StoreError> {
        let actions = self.actions.lock().unwrap();
        Ok(actions
            .iter()
            .filter(|row| {
                row.reported_user_id == user_id && row.action == ModerationAction::Block
            })
            .count() as i64)
    }

    async fn lookup_device_token(&self, user_id: i32) -> Result<Option<String>, StoreError> {
        Ok(self.device_tokens.get(&user_id).map(|t| t.clone()))
    }
}
