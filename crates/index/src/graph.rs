use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use extract::{CharacterProfile, SegmentAnalysis};
use ingest::Segment;

/// Segments per chapter group. A structural heuristic, not real chapters.
pub const CHAPTER_WINDOW: usize = 10;

/// Writes book structure into the graph store. Every write is a
/// MERGE-by-identity-key upsert, so re-indexing the same book is idempotent;
/// the one destructive operation is the alias merge.
pub struct GraphLinker {
    graph: Graph,
}

impl GraphLinker {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Uniqueness constraint on segment ids, lookup index on character names.
    pub async fn init_schema(&self) -> Result<()> {
        let query = Query::new(
            "CREATE CONSTRAINT unique_chunk_id IF NOT EXISTS \
             FOR (c:Chunk) REQUIRE c.chunkId IS UNIQUE"
                .to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("Failed to create chunk id constraint")?;

        let query = Query::new(
            "CREATE INDEX character_name_index IF NOT EXISTS \
             FOR (c:Character) ON (c.name)"
                .to_string(),
        );
        self.graph
            .run(query)
            .await
            .context("Failed to create character name index")?;

        Ok(())
    }

    pub async fn upsert_book(&self, title: &str, author: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (book:Book {title: $title})
            ON CREATE SET
                book.author = $author,
                book.source = $source
            "#
            .to_string(),
        )
        .param("title", title.to_string())
        .param("author", author.to_string())
        .param("source", format!("{} by {}", title, author));

        self.graph.run(query).await.context("Failed to upsert book")?;
        Ok(())
    }

    /// Segment node plus its extracted-entity fields. Immutable after
    /// creation; only the embedding is added later.
    pub async fn upsert_segment(&self, segment: &Segment, analysis: &SegmentAnalysis) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (chunk:Chunk {chunkId: $chunkId})
            ON CREATE SET
                chunk.bookTitle = $bookTitle,
                chunk.bookAuthor = $bookAuthor,
                chunk.chunkSeqId = $chunkSeqId,
                chunk.text = $text,
                chunk.charactersMentioned = $charactersMentioned,
                chunk.locations = $locations,
                chunk.keyEvents = $keyEvents,
                chunk.moodTone = $moodTone,
                chunk.relationships = $relationships,
                chunk.themes = $themes,
                chunk.dialogueSpeakers = $dialogueSpeakers,
                chunk.narrativeStyle = $narrativeStyle,
                chunk.source = $source
            "#
            .to_string(),
        )
        .param("chunkId", segment.segment_id.clone())
        .param("bookTitle", segment.book_title.clone())
        .param("bookAuthor", segment.book_author.clone())
        .param("chunkSeqId", segment.seq_id as i64)
        .param("text", segment.text.clone())
        .param("charactersMentioned", analysis.characters_mentioned.clone())
        .param("locations", analysis.locations.clone())
        .param("keyEvents", analysis.key_events.clone())
        .param("moodTone", analysis.mood_tone.clone())
        .param("relationships", analysis.relationships.clone())
        .param("themes", analysis.themes.clone())
        .param("dialogueSpeakers", analysis.dialogue_speakers.clone())
        .param("narrativeStyle", analysis.narrative_style.clone())
        .param("source", segment.source.clone());

        self.graph
            .run(query)
            .await
            .context(format!("Failed to upsert segment {}", segment.segment_id))?;
        Ok(())
    }

    pub async fn upsert_character(&self, name: &str, profile: &CharacterProfile) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (char:Character {name: $name})
            ON CREATE SET
                char.personality = $personality,
                char.speechPattern = $speechPattern,
                char.keyPhrases = $keyPhrases,
                char.relationships = $relationships,
                char.roleInStory = $roleInStory,
                char.characterArc = $characterArc,
                char.dialogueStyle = $dialogueStyle,
                char.emotionalRange = $emotionalRange,
                char.background = $background
            "#
            .to_string(),
        )
        .param("name", name.to_string())
        .param("personality", profile.personality.clone())
        .param("speechPattern", profile.speech_pattern.clone())
        .param("keyPhrases", profile.key_phrases.clone())
        .param("relationships", profile.relationships.clone())
        .param("roleInStory", profile.role_in_story.clone())
        .param("characterArc", profile.character_arc.clone())
        .param("dialogueStyle", profile.dialogue_style.clone())
        .param("emotionalRange", profile.emotional_range.clone())
        .param("background", profile.background.clone());

        self.graph
            .run(query)
            .await
            .context(format!("Failed to upsert character {}", name))?;
        Ok(())
    }

    /// Chapter nodes over fixed windows of segments, each linked by a
    /// SECTION edge to its first segment.
    pub async fn create_chapters(&self, segments: &[Segment]) -> Result<()> {
        for chapter in chapter_groups(segments) {
            let query = Query::new(
                r#"
                MERGE (chapter:Chapter {chapterNumber: $chapterNumber, bookTitle: $bookTitle})
                ON CREATE SET
                    chapter.title = $title,
                    chapter.startChunkId = $startChunkId,
                    chapter.endChunkId = $endChunkId
                "#
                .to_string(),
            )
            .param("chapterNumber", chapter.number as i64)
            .param("bookTitle", chapter.book_title.clone())
            .param("title", format!("Chapter {}", chapter.number))
            .param("startChunkId", chapter.start_chunk_id.clone())
            .param("endChunkId", chapter.end_chunk_id.clone());

            self.graph
                .run(query)
                .await
                .context("Failed to upsert chapter")?;

            let query = Query::new(
                r#"
                MATCH (chapter:Chapter {chapterNumber: $chapterNumber, bookTitle: $bookTitle}),
                      (first:Chunk {chunkId: $startChunkId})
                MERGE (chapter)-[:SECTION]->(first)
                "#
                .to_string(),
            )
            .param("chapterNumber", chapter.number as i64)
            .param("bookTitle", chapter.book_title)
            .param("startChunkId", chapter.start_chunk_id);

            self.graph
                .run(query)
                .await
                .context("Failed to link chapter section")?;
        }

        Ok(())
    }

    /// Mention edges for every (segment, character) pair where the name is in
    /// the segment's extracted character list.
    pub async fn link_mentions(&self, book_title: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (chunk:Chunk {bookTitle: $bookTitle}), (char:Character)
            WHERE char.name IN chunk.charactersMentioned
            MERGE (chunk)-[:MENTIONED_IN]->(char)
            "#
            .to_string(),
        )
        .param("bookTitle", book_title.to_string());

        self.graph
            .run(query)
            .await
            .context("Failed to link mentions")?;
        Ok(())
    }

    pub async fn link_part_of(&self, book_title: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (chunk:Chunk {bookTitle: $bookTitle}), (book:Book {title: $bookTitle})
            MERGE (chunk)-[:PART_OF]->(book)
            "#
            .to_string(),
        )
        .param("bookTitle", book_title.to_string());

        self.graph
            .run(query)
            .await
            .context("Failed to link segments to book")?;
        Ok(())
    }

    /// The NEXT chain: one linear sequence per book, no duplicates on re-run.
    pub async fn link_sequence(&self, book_title: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (a:Chunk {bookTitle: $bookTitle}), (b:Chunk {bookTitle: $bookTitle})
            WHERE b.chunkSeqId = a.chunkSeqId + 1
            MERGE (a)-[:NEXT]->(b)
            "#
            .to_string(),
        )
        .param("bookTitle", book_title.to_string());

        self.graph
            .run(query)
            .await
            .context("Failed to link segment sequence")?;
        Ok(())
    }

    /// Typed RELATES_TO edges from extracted "char1-relation-char2" triples.
    /// Triples that don't resolve both endpoints are skipped silently.
    pub async fn link_character_relations(&self, analyses: &[SegmentAnalysis]) -> Result<()> {
        for analysis in analyses {
            for raw in &analysis.relationships {
                let Some((char1, relation, char2)) = parse_relationship_triple(raw) else {
                    debug!(triple = raw, "Skipping malformed relationship triple");
                    continue;
                };

                let query = Query::new(
                    r#"
                    MATCH (a:Character {name: $char1}), (b:Character {name: $char2})
                    MERGE (a)-[r:RELATES_TO {type: $relType}]->(b)
                    "#
                    .to_string(),
                )
                .param("char1", char1)
                .param("char2", char2)
                .param("relType", relation);

                self.graph
                    .run(query)
                    .await
                    .context("Failed to link character relation")?;
            }
        }

        Ok(())
    }

    /// Apply an alias-merge mapping. Two-phase: the full plan is computed up
    /// front, then edges are repointed and alias nodes deleted in one pass.
    /// An alias that no longer exists is a no-op, as is a rename whose target
    /// name is already taken.
    pub async fn merge_duplicates(&self, groups: &HashMap<String, Vec<String>>) -> Result<usize> {
        let plan = merge_plan(groups);

        for step in &plan.steps {
            info!(alias = %step.alias, pivot = %step.pivot, "Merging character alias");

            let query = Query::new(
                r#"
                MATCH (alias:Character {name: $alias})
                MATCH (pivot:Character {name: $pivot})
                WHERE alias <> pivot
                OPTIONAL MATCH (chunk:Chunk)-[:MENTIONED_IN]->(alias)
                FOREACH (c IN CASE WHEN chunk IS NULL THEN [] ELSE [chunk] END |
                    MERGE (c)-[:MENTIONED_IN]->(pivot)
                )
                DETACH DELETE alias
                "#
                .to_string(),
            )
            .param("alias", step.alias.clone())
            .param("pivot", step.pivot.clone());

            self.graph
                .run(query)
                .await
                .context("Failed to merge character alias")?;
        }

        for (pivot, canonical) in &plan.renames {
            let query = Query::new(
                r#"
                MATCH (char:Character {name: $pivot})
                WHERE NOT EXISTS { MATCH (:Character {name: $canonical}) }
                SET char.name = $canonical
                "#
                .to_string(),
            )
            .param("pivot", pivot.clone())
            .param("canonical", canonical.clone());

            self.graph
                .run(query)
                .await
                .context("Failed to rename canonical character")?;
        }

        Ok(plan.steps.len())
    }

    pub async fn list_characters(&self) -> Result<Vec<String>> {
        let query = Query::new(
            "MATCH (char:Character) RETURN char.name as name ORDER BY char.name".to_string(),
        );

        let mut result = self.graph.execute(query).await?;
        let mut names = Vec::new();

        while let Some(row) = result.next().await? {
            names.push(row.get::<String>("name")?);
        }

        Ok(names)
    }

    pub async fn get_character(&self, name: &str) -> Result<Option<CharacterProfile>> {
        let query = Query::new(
            r#"
            MATCH (char:Character {name: $name})
            RETURN char.personality as personality,
                   char.speechPattern as speechPattern,
                   char.keyPhrases as keyPhrases,
                   char.relationships as relationships,
                   char.roleInStory as roleInStory,
                   char.characterArc as characterArc,
                   char.dialogueStyle as dialogueStyle,
                   char.emotionalRange as emotionalRange,
                   char.background as background
            "#
            .to_string(),
        )
        .param("name", name.to_string());

        let mut result = self.graph.execute(query).await?;

        let Some(row) = result.next().await? else {
            return Ok(None);
        };

        Ok(Some(CharacterProfile {
            personality: row.get("personality").unwrap_or_default(),
            speech_pattern: row.get("speechPattern").unwrap_or_default(),
            key_phrases: row.get("keyPhrases").unwrap_or_default(),
            relationships: row.get("relationships").unwrap_or_default(),
            role_in_story: row.get("roleInStory").unwrap_or_default(),
            character_arc: row.get("characterArc").unwrap_or_default(),
            dialogue_style: row.get("dialogueStyle").unwrap_or_default(),
            emotional_range: row.get("emotionalRange").unwrap_or_default(),
            background: row.get("background").unwrap_or_default(),
        }))
    }

    pub async fn book_info(&self) -> Result<Option<BookInfo>> {
        let query = Query::new(
            r#"
            MATCH (chunk:Chunk)
            RETURN DISTINCT chunk.bookTitle as title, chunk.bookAuthor as author
            LIMIT 1
            "#
            .to_string(),
        );

        let mut result = self.graph.execute(query).await?;

        let Some(row) = result.next().await? else {
            return Ok(None);
        };

        Ok(Some(BookInfo {
            title: row.get("title")?,
            author: row.get("author")?,
        }))
    }

    /// Deduplication accounting for the stats surface.
    pub async fn character_statistics(&self) -> Result<CharacterStats> {
        let total = self
            .count("MATCH (char:Character) RETURN count(char) as count")
            .await?;
        let mentioned = self
            .count(
                "MATCH (char:Character)<-[:MENTIONED_IN]-(:Chunk) \
                 RETURN count(DISTINCT char) as count",
            )
            .await?;
        let analyzed = self
            .count(
                "MATCH (char:Character) \
                 WHERE char.personality IS NOT NULL AND char.personality <> '' \
                 RETURN count(char) as count",
            )
            .await?;

        Ok(CharacterStats {
            total_characters: total,
            mentioned_characters: mentioned,
            analyzed_characters: analyzed,
        })
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;

        let count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0) as usize,
            None => 0,
        };

        Ok(count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterStats {
    pub total_characters: usize,
    pub mentioned_characters: usize,
    pub analyzed_characters: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterGroup {
    pub number: usize,
    pub book_title: String,
    pub start_chunk_id: String,
    pub end_chunk_id: String,
}

/// Group segments into fixed windows by integer-dividing sequence index.
pub fn chapter_groups(segments: &[Segment]) -> Vec<ChapterGroup> {
    let mut by_chapter: HashMap<usize, (&Segment, &Segment)> = HashMap::new();

    for segment in segments {
        let number = segment.seq_id / CHAPTER_WINDOW + 1;
        by_chapter
            .entry(number)
            .and_modify(|(start, end)| {
                if segment.seq_id < start.seq_id {
                    *start = segment;
                }
                if segment.seq_id > end.seq_id {
                    *end = segment;
                }
            })
            .or_insert((segment, segment));
    }

    let mut groups: Vec<ChapterGroup> = by_chapter
        .into_iter()
        .map(|(number, (start, end))| ChapterGroup {
            number,
            book_title: start.book_title.clone(),
            start_chunk_id: start.segment_id.clone(),
            end_chunk_id: end.segment_id.clone(),
        })
        .collect();

    groups.sort_by_key(|g| g.number);
    groups
}

/// Parse a "char1-relation-char2" triple. Extra hyphens beyond the third part
/// are dropped, mirroring how the extraction prompt formats these.
pub fn parse_relationship_triple(raw: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() < 3 {
        return None;
    }

    let char1 = parts[0].trim();
    let relation = parts[1].trim();
    let char2 = parts[2].trim();

    if char1.is_empty() || relation.is_empty() || char2.is_empty() {
        return None;
    }

    Some((char1.to_string(), relation.to_string(), char2.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    pub pivot: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergePlan {
    pub steps: Vec<MergeStep>,
    pub renames: Vec<(String, String)>,
}

/// Compute the full alias->pivot remap before touching the graph, so an
/// interrupted merge never leaves a half-planned state behind.
///
/// The first listed variation is the merge pivot; if the oracle's canonical
/// label differs from it, a rename is queued after the merges.
pub fn merge_plan(groups: &HashMap<String, Vec<String>>) -> MergePlan {
    let mut plan = MergePlan::default();

    let mut canonicals: Vec<&String> = groups.keys().collect();
    canonicals.sort();

    for canonical in canonicals {
        let variations = &groups[canonical];
        if variations.len() <= 1 {
            continue;
        }

        let pivot = &variations[0];

        for alias in &variations[1..] {
            if alias == pivot {
                continue;
            }
            plan.steps.push(MergeStep {
                pivot: pivot.clone(),
                alias: alias.clone(),
            });
        }

        if pivot != canonical {
            plan.renames.push((pivot.clone(), canonical.clone()));
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(seq: usize) -> Segment {
        Segment::new(format!("text {seq}"), "Test Book", "Nobody", seq)
    }

    #[test]
    fn test_chapter_groups_window_of_ten() {
        let segments: Vec<Segment> = (0..25).map(segment).collect();
        let groups = chapter_groups(&segments);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].number, 1);
        assert_eq!(groups[0].start_chunk_id, "test_book_chunk_0000");
        assert_eq!(groups[0].end_chunk_id, "test_book_chunk_0009");
        assert_eq!(groups[1].number, 2);
        assert_eq!(groups[1].start_chunk_id, "test_book_chunk_0010");
        assert_eq!(groups[2].number, 3);
        assert_eq!(groups[2].end_chunk_id, "test_book_chunk_0024");
    }

    #[test]
    fn test_chapter_groups_empty() {
        assert!(chapter_groups(&[]).is_empty());
    }

    #[test]
    fn test_parse_relationship_triple() {
        assert_eq!(
            parse_relationship_triple("Harry-friends_with-Ron"),
            Some(("Harry".into(), "friends_with".into(), "Ron".into()))
        );
        // Extra hyphens beyond the third part are dropped.
        assert_eq!(
            parse_relationship_triple("Harry-enemy-He-Who-Must-Not-Be-Named"),
            Some(("Harry".into(), "enemy".into(), "He".into()))
        );
        assert_eq!(parse_relationship_triple("Harry-Ron"), None);
        assert_eq!(parse_relationship_triple("--"), None);
        assert_eq!(parse_relationship_triple(""), None);
    }

    #[test]
    fn test_merge_plan_pivot_and_rename() {
        let mut groups = HashMap::new();
        groups.insert(
            "Tom Riddle".to_string(),
            vec![
                "Tom".to_string(),
                "Voldemort".to_string(),
                "Tom Riddle".to_string(),
            ],
        );

        let plan = merge_plan(&groups);

        // Everything merges into the first-listed variation...
        assert_eq!(
            plan.steps,
            vec![
                MergeStep {
                    pivot: "Tom".into(),
                    alias: "Voldemort".into()
                },
                MergeStep {
                    pivot: "Tom".into(),
                    alias: "Tom Riddle".into()
                },
            ]
        );
        // ...then the pivot takes the oracle's canonical label.
        assert_eq!(plan.renames, vec![("Tom".into(), "Tom Riddle".into())]);
    }

    #[test]
    fn test_merge_plan_no_rename_when_pivot_is_canonical() {
        let mut groups = HashMap::new();
        groups.insert(
            "Hermione Granger".to_string(),
            vec!["Hermione Granger".to_string(), "Hermione".to_string()],
        );

        let plan = merge_plan(&groups);
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.renames.is_empty());
    }

    #[test]
    fn test_merge_plan_ignores_singletons_and_empty() {
        assert_eq!(merge_plan(&HashMap::new()), MergePlan::default());

        let mut groups = HashMap::new();
        groups.insert("Hagrid".to_string(), vec!["Hagrid".to_string()]);
        assert_eq!(merge_plan(&groups), MergePlan::default());
    }
}
