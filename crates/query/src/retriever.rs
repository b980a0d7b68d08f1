use anyhow::Result;
use neo4rs::{Graph, Query};
use tracing::warn;

use index::{EmbedRole, EmbeddingOracle, VECTOR_INDEX_NAME};

use crate::cache::EmbeddingCache;

const EMBEDDING_CACHE_SIZE: usize = 1024;

/// Similarity retrieval scoped to one character's mentioned segments, with
/// two context-enhancement strategies on top of the basic search.
pub struct Retriever<E> {
    graph: Graph,
    embedder: E,
    cache: EmbeddingCache,
}

impl<E: EmbeddingOracle> Retriever<E> {
    pub fn new(graph: Graph, embedder: E) -> Self {
        Self {
            graph,
            embedder,
            cache: EmbeddingCache::new(EMBEDDING_CACHE_SIZE),
        }
    }

    /// Unexpanded: raw segment text, highest similarity first.
    pub async fn basic(
        &self,
        character: &str,
        user_input: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let Some(query_vector) = self.query_embedding(user_input).await else {
            return Ok(Vec::new());
        };

        let query = Query::new(
            r#"
            CALL db.index.vector.queryNodes($indexName, $limit, $queryVector)
            YIELD node, score
            MATCH (node)-[:MENTIONED_IN]->(:Character {name: $character})
            RETURN node.text AS text, score
            ORDER BY score DESC
            "#
            .to_string(),
        )
        .param("indexName", VECTOR_INDEX_NAME.to_string())
        .param("limit", top_k as i64)
        .param("queryVector", query_vector)
        .param("character", character.to_string());

        self.collect_texts(query).await
    }

    /// Windowed: each hit is expanded to the longest available chain of up to
    /// three consecutive segments centered on it, joined in reading order.
    pub async fn windowed(
        &self,
        character: &str,
        user_input: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let Some(query_vector) = self.query_embedding(user_input).await else {
            return Ok(Vec::new());
        };

        let query = Query::new(
            r#"
            CALL db.index.vector.queryNodes($indexName, $limit, $queryVector)
            YIELD node, score
            MATCH (node)-[:MENTIONED_IN]->(:Character {name: $character})
            MATCH window = (:Chunk)-[:NEXT*0..1]->(node)-[:NEXT*0..1]->(:Chunk)
            WITH node, score, window
            ORDER BY length(window) DESC
            WITH node, score, collect(nodes(window))[0] AS chain
            UNWIND chain AS link
            WITH node, score, link
            ORDER BY link.chunkSeqId ASC
            WITH node, score, collect(link.text) AS textList
            RETURN reduce(joined = "", t IN textList |
                       joined + CASE WHEN joined = "" THEN "" ELSE " \n " END + t) AS text,
                   score
            ORDER BY score DESC
            "#
            .to_string(),
        )
        .param("indexName", VECTOR_INDEX_NAME.to_string())
        .param("limit", top_k as i64)
        .param("queryVector", query_vector)
        .param("character", character.to_string());

        self.collect_texts(query).await
    }

    /// Relationship-annotated: each hit keeps its raw text but gains a
    /// one-line header naming the book and every character the segment
    /// mentions.
    pub async fn with_relationships(
        &self,
        character: &str,
        user_input: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let Some(query_vector) = self.query_embedding(user_input).await else {
            return Ok(Vec::new());
        };

        let query = Query::new(
            r#"
            CALL db.index.vector.queryNodes($indexName, $limit, $queryVector)
            YIELD node, score
            MATCH (node)-[:MENTIONED_IN]->(:Character {name: $character})
            OPTIONAL MATCH (node)-[:PART_OF]->(book:Book)
            OPTIONAL MATCH (node)-[:MENTIONED_IN]->(other:Character)
            WITH node, score, book, collect(other.name) AS mentioned
            RETURN "Book: " + coalesce(book.title, node.bookTitle) + " | Characters: " +
                   reduce(joined = "", n IN mentioned |
                       joined + CASE WHEN joined = "" THEN "" ELSE ", " END + n) +
                   "\n\n" + node.text AS text,
                   score
            ORDER BY score DESC
            "#
            .to_string(),
        )
        .param("indexName", VECTOR_INDEX_NAME.to_string())
        .param("limit", top_k as i64)
        .param("queryVector", query_vector)
        .param("character", character.to_string());

        self.collect_texts(query).await
    }

    /// An embedding failure means no similarity search is possible; callers
    /// get an empty context list, never an error.
    async fn query_embedding(&self, text: &str) -> Option<Vec<f64>> {
        if let Some(cached) = self.cache.get(text) {
            return Some(cached);
        }

        match self.embedder.embed(text, EmbedRole::Query).await {
            Ok(vector) => {
                let vector: Vec<f64> = vector.into_iter().map(f64::from).collect();
                self.cache.set(text, vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!(error = %e, "Failed to embed query, returning no context");
                None
            }
        }
    }

    async fn collect_texts(&self, query: Query) -> Result<Vec<String>> {
        let mut result = self.graph.execute(query).await?;
        let mut texts = Vec::new();

        while let Some(row) = result.next().await? {
            texts.push(row.get::<String>("text")?);
        }

        Ok(texts)
    }
}
