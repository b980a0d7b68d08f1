use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use tracing::{info, warn};

use crate::embeddings::{EmbedRole, EmbeddingOracle};

pub const VECTOR_INDEX_NAME: &str = "book_chunks";

/// Width of the reference deployment's embeddings. Fixed at index creation;
/// changing it means rebuilding the index.
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// Maintains the vector index over segment text and fills in missing
/// embeddings.
pub struct VectorIndexer<E> {
    graph: Graph,
    embedder: E,
    dimensions: usize,
}

impl<E: EmbeddingOracle> VectorIndexer<E> {
    pub fn new(graph: Graph, embedder: E) -> Self {
        Self {
            graph,
            embedder,
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    pub async fn init_index(&self) -> Result<()> {
        // Index options cannot be parameterized.
        let cypher = format!(
            r#"
            CREATE VECTOR INDEX {VECTOR_INDEX_NAME} IF NOT EXISTS
            FOR (c:Chunk) ON (c.textEmbedding)
            OPTIONS {{
                indexConfig: {{
                    `vector.dimensions`: {},
                    `vector.similarity_function`: 'cosine'
                }}
            }}
            "#,
            self.dimensions
        );

        self.graph
            .run(Query::new(cypher))
            .await
            .context("Failed to create vector index")?;
        Ok(())
    }

    /// Embed and store every segment that does not have a vector yet. One
    /// failed segment is logged and skipped; the pass continues.
    pub async fn embed_pending(&self) -> Result<usize> {
        let query = Query::new(
            r#"
            MATCH (chunk:Chunk)
            WHERE chunk.textEmbedding IS NULL
            RETURN chunk.chunkId as chunkId, chunk.text as text
            "#
            .to_string(),
        );

        let mut result = self.graph.execute(query).await?;
        let mut pending = Vec::new();

        while let Some(row) = result.next().await? {
            let chunk_id: String = row.get("chunkId")?;
            let text: String = row.get("text")?;
            pending.push((chunk_id, text));
        }

        info!(pending = pending.len(), "Embedding segments without vectors");

        let mut embedded = 0;

        for (i, (chunk_id, text)) in pending.iter().enumerate() {
            let vector = match self.embedder.embed(text, EmbedRole::Document).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(chunk_id = %chunk_id, error = %e, "Failed to embed segment, skipping");
                    continue;
                }
            };

            let store = Query::new(
                r#"
                MATCH (chunk:Chunk {chunkId: $chunkId})
                CALL db.create.setNodeVectorProperty(chunk, "textEmbedding", $embedding)
                RETURN chunk.chunkId
                "#
                .to_string(),
            )
            .param("chunkId", chunk_id.clone())
            .param(
                "embedding",
                vector.iter().map(|v| *v as f64).collect::<Vec<f64>>(),
            );

            self.graph
                .run(store)
                .await
                .context(format!("Failed to store embedding for {}", chunk_id))?;

            embedded += 1;
            if (i + 1) % 10 == 0 {
                info!(processed = i + 1, total = pending.len(), "Embedding progress");
            }
        }

        Ok(embedded)
    }
}
