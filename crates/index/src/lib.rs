pub mod embeddings;
pub mod graph;
pub mod vector;

pub use embeddings::{EmbedClient, EmbedRole, EmbeddingOracle};
pub use graph::{BookInfo, CharacterStats, GraphLinker, chapter_groups, merge_plan, parse_relationship_triple};
pub use vector::{EMBEDDING_DIMENSIONS, VECTOR_INDEX_NAME, VectorIndexer};

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{debug, info};

use extract::{AliasResolver, CharacterProfiler, CompletionOracle, SegmentAnalyzer};
use ingest::{Segmenter, SegmenterConfig};

/// The index-time pipeline for one book: segment, analyze, profile, link,
/// embed, deduplicate. Sequential by design; each oracle call blocks the
/// next. Idempotent per (title, text).
pub struct BookIndexer<O, E> {
    linker: GraphLinker,
    analyzer: SegmentAnalyzer<O>,
    profiler: CharacterProfiler<O>,
    resolver: AliasResolver<O>,
    vectors: VectorIndexer<E>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexReport {
    pub segments: usize,
    pub characters_found: usize,
    pub characters_profiled: usize,
    pub aliases_merged: usize,
    pub segments_embedded: usize,
}

impl<O, E> BookIndexer<O, E>
where
    O: CompletionOracle + Clone,
    E: EmbeddingOracle,
{
    pub fn new(graph: neo4rs::Graph, oracle: O, embedder: E) -> Self {
        Self {
            linker: GraphLinker::new(graph.clone()),
            analyzer: SegmentAnalyzer::new(oracle.clone()),
            profiler: CharacterProfiler::new(oracle.clone()),
            resolver: AliasResolver::new(oracle),
            vectors: VectorIndexer::new(graph, embedder),
        }
    }

    /// Constraints and the vector index must exist before the first
    /// embed-and-store call.
    pub async fn init(&self) -> Result<()> {
        self.linker.init_schema().await?;
        self.vectors.init_index().await?;
        Ok(())
    }

    pub async fn index_book(&self, text: &str, title: &str, author: &str) -> Result<IndexReport> {
        let segmenter = Segmenter::new(SegmenterConfig::default());
        let segments = segmenter.segment(text, title, author);
        info!(book = title, segments = segments.len(), "Indexing book");

        // One oracle call per segment, strictly sequential. A bad segment
        // degrades to the neutral record and indexing continues.
        let mut analyses = Vec::with_capacity(segments.len());
        for segment in &segments {
            let analysis = self.analyzer.analyze(&segment.text, title).await;
            debug!(
                segment = %segment.segment_id,
                characters = analysis.characters_mentioned.len(),
                "Analyzed segment"
            );
            analyses.push(analysis);
        }

        self.linker.upsert_book(title, author).await?;
        for (segment, analysis) in segments.iter().zip(&analyses) {
            self.linker.upsert_segment(segment, analysis).await?;
        }

        // Characters in deterministic order; empty names were already
        // filtered at extraction time.
        let names: Vec<String> = analyses
            .iter()
            .flat_map(|a| a.characters_mentioned.iter().cloned())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        info!(characters = names.len(), "Profiling characters");

        let segment_texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let mut profiled = 0;

        for name in &names {
            match self.profiler.profile(name, &segment_texts).await {
                Some(profile) => {
                    self.linker.upsert_character(name, &profile).await?;
                    profiled += 1;
                }
                None => {
                    debug!(character = %name, "No profile for character, skipping node");
                }
            }
        }

        self.linker.create_chapters(&segments).await?;
        self.linker.link_mentions(title).await?;
        self.linker.link_part_of(title).await?;
        self.linker.link_sequence(title).await?;
        self.linker.link_character_relations(&analyses).await?;

        let segments_embedded = self.vectors.embed_pending().await?;

        // The destructive merge runs last, after every mention edge exists.
        let groups = self.resolver.find_duplicates(&names).await;
        let aliases_merged = self.linker.merge_duplicates(&groups).await?;

        info!(
            book = title,
            characters_profiled = profiled,
            aliases_merged,
            "Book indexing complete"
        );

        Ok(IndexReport {
            segments: segments.len(),
            characters_found: names.len(),
            characters_profiled: profiled,
            aliases_merged,
            segments_embedded,
        })
    }
}
