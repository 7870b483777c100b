use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument, Term};

use crate::error::SearchError;
use crate::models::{ScoredPost, SearchPost};
use crate::search::{SearchIndex, FUZZY_DISTANCE};

/// RAM-resident tantivy index over post title and description.
///
/// The post id is indexed raw so a re-index can delete the previous revision
/// by term before adding the new one, which keeps `index_posts` idempotent.
#[derive(Clone)]
pub struct TantivyIndex {
    index: Index,
    writer: Arc<Mutex<IndexWriter>>,
    id_field: Field,
    title_field: Field,
    description_field: Field,
}

impl TantivyIndex {
    pub fn new() -> Result<Self, SearchError> {
        let mut builder = Schema::builder();
        let id_field = builder.add_text_field("post_id", STRING | STORED);
        let title_field = builder.add_text_field("title", TEXT | STORED);
        let description_field = builder.add_text_field("description", TEXT | STORED);
        let schema = builder.build();

        let index = Index::create_in_ram(schema);
        let writer = index.writer(50_000_000)?;

        Ok(Self {
            index,
            writer: Arc::new(Mutex::new(writer)),
            id_field,
            title_field,
            description_field,
        })
    }

    fn id_term(&self, id: i32) -> Term {
        Term::from_field_text(self.id_field, &id.to_string())
    }
}

#[async_trait]
impl SearchIndex for TantivyIndex {
    async fn index_posts(&self, posts: &[SearchPost]) -> Result<(), SearchError> {
        if posts.is_empty() {
            return Ok(());
        }
        if let Some(post) = posts.iter().find(|post| post.id < 0) {
            return Err(SearchError::InvalidDocumentId(post.id));
        }

        let mut writer = self
            .writer
            .lock()
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        for post in posts {
            writer.delete_term(self.id_term(post.id));
            writer.add_document(doc!(
                self.id_field => post.id.to_string(),
                self.title_field => post.title.to_lowercase(),
                self.description_field => post.description.to_lowercase(),
            ))?;
        }
        writer.commit()?;
        Ok(())
    }

    async fn remove_post(&self, id: i32) -> Result<(), SearchError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|err| SearchError::IndexUnavailable(err.to_string()))?;
        writer.delete_term(self.id_term(id));
        writer.commit()?;
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredPost>, SearchError> {
        if text.trim().is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let reader = self.index.reader()?;
        let searcher = reader.searcher();

        let parser = QueryParser::for_index(
            &self.index,
            vec![self.title_field, self.description_field],
        );
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        // Lenient parse: user typos in query syntax must not fail the search.
        let (parsed, _errors) = parser.parse_query_lenient(&text.to_lowercase());
        subqueries.push((Occur::Should, parsed));

        for term in text.split_whitespace() {
            let term = term.to_lowercase();
            for field in [self.title_field, self.description_field] {
                subqueries.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(
                        Term::from_field_text(field, &term),
                        FUZZY_DISTANCE as u8,
                        true,
                    )),
                ));
            }
        }

        let top_docs = searcher.search(
            &BooleanQuery::new(subqueries),
            &TopDocs::with_limit(max_results),
        )?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|value| value.as_str())
                .and_then(|raw| raw.parse::<i32>().ok());
            if let Some(id) = id {
                hits.push(ScoredPost { id, score });
            }
        }
        Ok(hits)
    }
}
