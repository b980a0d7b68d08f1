pub mod dedup;
pub mod normalizer;
pub mod oracle;
pub mod profiler;
pub mod prompt;
pub mod schema;
#[cfg(test)]
mod testing;

pub use dedup::{ALIAS_BATCH_SIZE, AliasResolver};
pub use oracle::{CohereClient, CompletionOptions, CompletionOracle, OracleError, complete_json};
pub use profiler::CharacterProfiler;
pub use schema::{CharacterProfile, SegmentAnalysis};

use tracing::warn;

const ANALYSIS_OPTS: CompletionOptions = CompletionOptions {
    temperature: 0.3,
    max_tokens: 500,
};

/// Pulls structured entities out of one segment of book text.
pub struct SegmentAnalyzer<O> {
    oracle: O,
}

impl<O: CompletionOracle> SegmentAnalyzer<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Never fails: a broken oracle or malformed reply degrades to the
    /// neutral default record, so one bad segment cannot abort indexing.
    pub async fn analyze(&self, segment_text: &str, book_title: &str) -> SegmentAnalysis {
        let prompt = prompt::build_analysis_prompt(segment_text, book_title);

        match complete_json(&self.oracle, &prompt, ANALYSIS_OPTS, 2).await {
            Ok(value) => SegmentAnalysis::from_value(&value),
            Err(e) => {
                warn!(book = book_title, error = %e, "Segment analysis failed, using neutral record");
                SegmentAnalysis::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedOracle, FailingOracle};

    #[tokio::test]
    async fn test_analyze_parses_fenced_reply() {
        let reply = r#"```json
{
    "characters_mentioned": ["Harry", "Ron"],
    "locations": ["Great Hall"],
    "key_events": ["the feast begins"],
    "mood_tone": "festive",
    "relationships": ["Harry-friends_with-Ron"],
    "themes": ["belonging"],
    "dialogue_speakers": ["Ron"],
    "narrative_style": "third person"
}
```"#;
        let analyzer = SegmentAnalyzer::new(CannedOracle::new(vec![reply.to_string()]));

        let analysis = analyzer.analyze("Some passage", "Test Book").await;
        assert_eq!(analysis.characters_mentioned, vec!["Harry", "Ron"]);
        assert_eq!(analysis.mood_tone, "festive");
        assert_eq!(analysis.dialogue_speakers, vec!["Ron"]);
    }

    #[tokio::test]
    async fn test_analyze_defaults_when_oracle_always_fails() {
        let analyzer = SegmentAnalyzer::new(FailingOracle);

        let analysis = analyzer.analyze("Some passage", "Test Book").await;
        assert_eq!(analysis, SegmentAnalysis::default());
    }

    #[tokio::test]
    async fn test_analyze_defaults_on_persistent_garbage() {
        let analyzer = SegmentAnalyzer::new(CannedOracle::new(vec![
            "I would rather chat about the weather.".to_string(),
            "Still not JSON.".to_string(),
        ]));

        let analysis = analyzer.analyze("Some passage", "Test Book").await;
        assert_eq!(analysis, SegmentAnalysis::default());
    }
}
