use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::SearchError;
use crate::models::{ScoredPost, SearchPost};

pub mod fuzzy;
pub mod memory;
pub mod tantivy_index;

pub use memory::MemoryIndex;
pub use tantivy_index::TantivyIndex;

/// Maximum edit distance a query term may differ from an indexed term and
/// still count as a match.
pub const FUZZY_DISTANCE: usize = 2;

/// Minimum whole-string similarity (0..=100) for the approximate branch.
pub const SIMILARITY_CUTOFF: f64 = 60.0;

/// A searchable representation of post text.
///
/// Implementations answer the tokenized-relevance branch only; the
/// approximate whole-string branch lives in [`PostSearcher`], above the trait.
#[async_trait]
pub trait SearchIndex: Clone + Send + Sync + 'static {
    /// Adds a batch of posts to the index. Idempotent: a post id that is
    /// already indexed has its postings replaced, never duplicated. An empty
    /// batch is a no-op; a negative id fails before anything is written.
    async fn index_posts(&self, posts: &[SearchPost]) -> Result<(), SearchError>;

    /// Drops a post from the index. Unknown ids are a no-op.
    async fn remove_post(&self, id: i32) -> Result<(), SearchError>;

    /// Fuzzy-tolerant term search, ranked by descending score and truncated
    /// at `max_results`. A blank query matches nothing.
    async fn query(&self, text: &str, max_results: usize)
        -> Result<Vec<ScoredPost>, SearchError>;
}

/// Splits text into lowercase alphanumeric terms. Stemmer-free on purpose:
/// typo tolerance comes from the edit-distance match, not from stemming.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Two-branch search over a candidate snapshot of posts.
///
/// Branch one is the index's tokenized relevance query; branch two keeps any
/// candidate whose whole text is approximately similar to the raw query. The
/// branches are unioned by post id, first occurrence wins, so a post matched
/// by both appears exactly once. Only the token branch honors `max_results`;
/// the union can therefore exceed it.
#[derive(Clone)]
pub struct PostSearcher<I: SearchIndex> {
    index: I,
}

impl<I: SearchIndex> PostSearcher<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn search(
        &self,
        posts: &[SearchPost],
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchPost>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        // The candidate set is (re-)indexed before every query; indexing is
        // idempotent so this only costs work for unseen or changed posts.
        self.index.index_posts(posts).await?;
        let hits = self.index.query(query, max_results).await?;

        let mut approximate: Vec<(i32, f64)> = posts
            .iter()
            .filter_map(|post| {
                let text = format!("{} {}", post.title, post.description);
                let ratio = fuzzy::similarity_ratio(query, &text);
                (ratio >= SIMILARITY_CUTOFF).then_some((post.id, ratio))
            })
            .collect();
        approximate.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for id in hits
            .iter()
            .map(|hit| hit.id)
            .chain(approximate.iter().map(|(id, _)| *id))
        {
            if seen.insert(id) {
                // The index may know posts outside this candidate snapshot;
                // those are not part of the answer.
                if let Some(post) = posts.iter().find(|post| post.id == id) {
                    results.push(post.clone());
                }
            }
        }

        Ok(results)
    }
}
