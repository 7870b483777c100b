use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::SearchError;
use crate::models::{ScoredPost, SearchPost};
use crate::search::fuzzy::edit_distance_within;
use crate::search::{tokenize, SearchIndex, FUZZY_DISTANCE};

/// In-memory inverted index with tf-idf scoring and edit-distance term
/// tolerance.
///
/// Writers take the lock exclusively, so readers always observe a fully
/// applied batch, never half of one. A poisoned lock (a writer panicked
/// mid-commit) surfaces as `IndexUnavailable`.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    inner: Arc<RwLock<IndexInner>>,
}

#[derive(Default)]
struct IndexInner {
    /// term -> post id -> term frequency
    postings: HashMap<String, HashMap<i32, u32>>,
    /// post id -> term -> term frequency, kept for removal and re-indexing
    doc_terms: HashMap<i32, HashMap<String, u32>>,
}

impl IndexInner {
    fn remove(&mut self, id: i32) {
        if let Some(terms) = self.doc_terms.remove(&id) {
            for term in terms.keys() {
                if let Some(docs) = self.postings.get_mut(term) {
                    docs.remove(&id);
                    if docs.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
        }
    }

    fn insert(&mut self, post: &SearchPost) {
        // Replace, never append: re-indexing a known id must not duplicate
        // postings or leave terms of an older revision behind.
        self.remove(post.id);

        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in tokenize(&post.title)
            .into_iter()
            .chain(tokenize(&post.description))
        {
            *counts.entry(term).or_insert(0) += 1;
        }
        for (term, tf) in &counts {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(post.id, *tf);
        }
        self.doc_terms.insert(post.id, counts);
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn index_posts(&self, posts: &[SearchPost]) -> Result<(), SearchError> {
        if posts.is_empty() {
            return Ok(());
        }
        if let Some(post) = posts.iter().find(|post| post.id < 0) {
            return Err(SearchError::InvalidDocumentId(post.id));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        for post in posts {
            inner.insert(post);
        }
        Ok(())
    }

    async fn remove_post(&self, id: i32) -> Result<(), SearchError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        inner.remove(id);
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredPost>, SearchError> {
        let query_terms = tokenize(text);
        if query_terms.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let inner = self
            .inner
            .read()
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        let doc_count = inner.doc_terms.len() as f32;
        let mut scores: HashMap<i32, f32> = HashMap::new();

        for query_term in &query_terms {
            for (term, docs) in &inner.postings {
                let Some(distance) = edit_distance_within(query_term, term, FUZZY_DISTANCE)
                else {
                    continue;
                };
                // Rarer terms weigh more; farther matches weigh less.
                let idf = (1.0 + doc_count / (1.0 + docs.len() as f32)).ln();
                let weight = idf / (1.0 + distance as f32);
                for (&id, &tf) in docs {
                    *scores.entry(id).or_insert(0.0) += tf as f32 * weight;
                }
            }
        }

        let mut hits: Vec<ScoredPost> = scores
            .into_iter()
            .map(|(id, score)| ScoredPost { id, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(max_results);
        Ok(hits)
    }
}
