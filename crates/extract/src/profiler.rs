use tracing::warn;

use crate::oracle::{CompletionOptions, CompletionOracle, complete_json};
use crate::prompt;
use crate::schema::CharacterProfile;

/// Number of mentioning segments fed to the oracle per character.
const MAX_CONTEXT_SEGMENTS: usize = 5;

const PROFILE_OPTS: CompletionOptions = CompletionOptions {
    temperature: 0.4,
    max_tokens: 800,
};

/// Synthesizes a persona profile for a character from the segments that
/// mention them.
pub struct CharacterProfiler<O> {
    oracle: O,
}

impl<O: CompletionOracle> CharacterProfiler<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Returns `None` when no segment mentions the character, or when the
    /// oracle fails: callers read `None` as "insufficient data", never as an
    /// error.
    pub async fn profile(
        &self,
        character_name: &str,
        segment_texts: &[String],
    ) -> Option<CharacterProfile> {
        let needle = character_name.to_lowercase();

        let mentioning: Vec<&str> = segment_texts
            .iter()
            .filter(|text| text.to_lowercase().contains(&needle))
            .take(MAX_CONTEXT_SEGMENTS)
            .map(|s| s.as_str())
            .collect();

        if mentioning.is_empty() {
            return None;
        }

        let context = mentioning.join("\n\n");
        let prompt = prompt::build_profile_prompt(character_name, &context);

        match complete_json(&self.oracle, &prompt, PROFILE_OPTS, 2).await {
            Ok(value) => Some(CharacterProfile::from_value(&value)),
            Err(e) => {
                warn!(character = character_name, error = %e, "Character profiling failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedOracle, FailingOracle};

    fn segments() -> Vec<String> {
        vec![
            "Harry looked at the castle.".to_string(),
            "Ron laughed at breakfast.".to_string(),
            "HARRY shouted across the hall.".to_string(),
            "A quiet chapter about the weather.".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_profile_returns_none_when_never_mentioned() {
        let profiler = CharacterProfiler::new(FailingOracle);
        let result = profiler.profile("Hermione", &segments()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_profile_returns_none_on_oracle_failure() {
        let profiler = CharacterProfiler::new(FailingOracle);
        let result = profiler.profile("Harry", &segments()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_profile_matches_case_insensitively() {
        let oracle = CannedOracle::new(vec![r#"{"personality": "bold"}"#.to_string()]);
        let profiler = CharacterProfiler::new(oracle);

        let profile = profiler.profile("harry", &segments()).await.unwrap();
        assert_eq!(profile.personality, "bold");

        // Both the lowercase and uppercase mentions made it into the prompt.
        let prompts = profiler.oracle.prompts();
        assert!(prompts[0].contains("Harry looked at the castle."));
        assert!(prompts[0].contains("HARRY shouted across the hall."));
        assert!(!prompts[0].contains("quiet chapter"));
    }

    #[tokio::test]
    async fn test_profile_caps_context_at_five_segments() {
        let many: Vec<String> = (0..9).map(|i| format!("Harry does thing {i}.")).collect();
        let oracle = CannedOracle::new(vec!["{}".to_string()]);
        let profiler = CharacterProfiler::new(oracle);

        profiler.profile("Harry", &many).await;

        let prompts = profiler.oracle.prompts();
        assert!(prompts[0].contains("thing 4"));
        assert!(!prompts[0].contains("thing 5"));
    }
}
