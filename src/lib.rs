pub mod error;
pub mod moderation;
mod models;
pub mod notifications;
pub mod search;
pub mod storage;

pub use models::{
    ModerationAction, ModerationOutcome, PostEvent, ReportTarget, ScoredPost, SearchPost,
};

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::error;

use crate::error::SearchError;
use crate::moderation::ReportModerator;
use crate::notifications::{Dispatcher, PushSender};
use crate::search::{PostSearcher, SearchIndex};
use crate::storage::CommunityStore;

/// The engine core: free-text search over posts plus the report-resolution
/// workflow, wired over a store, an index, and a push sender.
///
/// Content CRUD itself lives with the out-of-scope controllers; they feed
/// `post_created`/`post_updated`/`post_deleted` so the index stays current
/// incrementally, with [`rebuild_index`](Self::rebuild_index) as the full
/// recovery path.
pub struct CommunityEngine<S: CommunityStore, I: SearchIndex> {
    store: Arc<S>,
    searcher: PostSearcher<I>,
    moderator: ReportModerator<S>,
    event_tx: broadcast::Sender<PostEvent>,
}

impl<S: CommunityStore, I: SearchIndex> CommunityEngine<S, I> {
    pub fn new(store: S, index: I, push_sender: Arc<dyn PushSender>) -> Self {
        let store = Arc::new(store);
        let dispatcher = Dispatcher::new(push_sender);
        let moderator = ReportModerator::new(Arc::clone(&store), dispatcher);
        let (event_tx, _) = broadcast::channel(100);
        Self {
            store,
            searcher: PostSearcher::new(index),
            moderator,
            event_tx,
        }
    }

    /// Stream of content events as they reach the index.
    pub fn subscribe(&self) -> BroadcastStream<PostEvent> {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    pub async fn post_created(&self, post: SearchPost) -> Result<(), SearchError> {
        self.searcher
            .index()
            .index_posts(std::slice::from_ref(&post))
            .await?;
        let _ = self.event_tx.send(PostEvent::Created(post));
        Ok(())
    }

    pub async fn post_updated(&self, post: SearchPost) -> Result<(), SearchError> {
        self.searcher
            .index()
            .index_posts(std::slice::from_ref(&post))
            .await?;
        let _ = self.event_tx.send(PostEvent::Updated(post));
        Ok(())
    }

    pub async fn post_deleted(&self, id: i32) -> Result<(), SearchError> {
        self.searcher.index().remove_post(id).await?;
        let _ = self.event_tx.send(PostEvent::Deleted(id));
        Ok(())
    }

    /// Re-indexes the full active-post snapshot from the store. Recovery
    /// path for a cold start or an index that drifted from missed events.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let posts = self.store.fetch_posts_for_indexing().await?;
        self.searcher.index().index_posts(&posts).await?;
        Ok(posts.len())
    }

    /// Ranked, deduplicated free-text search over the current active posts.
    ///
    /// Best-effort: infrastructure failures are logged and degrade to an
    /// empty result set so the serving path never crashes on search.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchPost> {
        let posts = match self.store.fetch_posts_for_indexing().await {
            Ok(posts) => posts,
            Err(err) => {
                error!("fetching posts for search failed: {err}");
                return Vec::new();
            }
        };
        match self.searcher.search(&posts, query, max_results).await {
            Ok(results) => results,
            Err(err) => {
                error!("search failed: {err}");
                Vec::new()
            }
        }
    }

    /// Applies a moderator decision to a reported post or comment. See
    /// [`ReportModerator::resolve_report`].
    pub async fn resolve_report(
        &self,
        action: &str,
        comment_id: Option<i32>,
        post_id: Option<i32>,
        acting_user_id: i32,
    ) -> ModerationOutcome {
        self.moderator
            .resolve_report(action, comment_id, post_id, acting_user_id)
            .await
    }

    /// Pending-report count for a target, for moderation dashboards.
    pub async fn pending_reports(&self, target: ReportTarget) -> Result<i64> {
        Ok(self.store.count_pending_reports(target).await?)
    }
}
