use neo4rs::{Graph, Query};
use tracing::warn;

use extract::{CompletionOptions, CompletionOracle};

const RESPONSE_OPTS: CompletionOptions = CompletionOptions {
    temperature: 0.7,
    max_tokens: 300,
};

/// Style fields used for reply generation. Each defaults independently, so a
/// character stored with a partial profile still gets a coherent persona.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterStyle {
    pub personality: String,
    pub speech_pattern: String,
    pub key_phrases: Vec<String>,
    pub dialogue_style: String,
    pub emotional_range: String,
}

impl Default for CharacterStyle {
    fn default() -> Self {
        Self {
            personality: "mysterious".to_string(),
            speech_pattern: "formal".to_string(),
            key_phrases: Vec::new(),
            dialogue_style: "conversational".to_string(),
            emotional_range: "varied".to_string(),
        }
    }
}

/// One oracle call with the persona preamble. A chat turn must always produce
/// text: oracle failure becomes a visible apology, never an exception.
pub async fn generate_reply<O: CompletionOracle>(
    oracle: &O,
    character: &str,
    user_input: &str,
    style: &CharacterStyle,
    context: &[String],
) -> String {
    let preamble = build_persona_preamble(character, style, context);

    match oracle
        .complete(user_input, Some(&preamble), RESPONSE_OPTS)
        .await
    {
        Ok(reply) => reply.trim().to_string(),
        Err(e) => {
            warn!(character, error = %e, "Reply generation failed");
            format!("I'm sorry, I can't respond right now. (Error: {e})")
        }
    }
}

/// Composes the in-character reply from the stored profile and retrieved
/// context.
pub struct PersonaResponder<O> {
    graph: Graph,
    oracle: O,
}

impl<O: CompletionOracle> PersonaResponder<O> {
    pub fn new(graph: Graph, oracle: O) -> Self {
        Self { graph, oracle }
    }

    pub async fn respond(&self, character: &str, user_input: &str, context: &[String]) -> String {
        let style = self.character_style(character).await;
        generate_reply(&self.oracle, character, user_input, &style, context).await
    }

    /// Missing character, missing fields, or a store error all degrade to
    /// the field defaults.
    async fn character_style(&self, character: &str) -> CharacterStyle {
        let query = Query::new(
            r#"
            MATCH (char:Character {name: $character})
            RETURN char.personality as personality,
                   char.speechPattern as speechPattern,
                   char.keyPhrases as keyPhrases,
                   char.dialogueStyle as dialogueStyle,
                   char.emotionalRange as emotionalRange
            "#
            .to_string(),
        )
        .param("character", character.to_string());

        let mut result = match self.graph.execute(query).await {
            Ok(result) => result,
            Err(e) => {
                warn!(character, error = %e, "Failed to load character style");
                return CharacterStyle::default();
            }
        };

        match result.next().await {
            Ok(Some(row)) => {
                let defaults = CharacterStyle::default();
                CharacterStyle {
                    personality: row.get("personality").unwrap_or(defaults.personality),
                    speech_pattern: row.get("speechPattern").unwrap_or(defaults.speech_pattern),
                    key_phrases: row.get("keyPhrases").unwrap_or(defaults.key_phrases),
                    dialogue_style: row.get("dialogueStyle").unwrap_or(defaults.dialogue_style),
                    emotional_range: row.get("emotionalRange").unwrap_or(defaults.emotional_range),
                }
            }
            Ok(None) => CharacterStyle::default(),
            Err(e) => {
                warn!(character, error = %e, "Failed to read character style row");
                CharacterStyle::default()
            }
        }
    }
}

pub fn build_persona_preamble(
    character: &str,
    style: &CharacterStyle,
    context: &[String],
) -> String {
    let context_text = if context.is_empty() {
        "No specific context available.".to_string()
    } else {
        context.join("\n\n")
    };

    format!(
        r#"You are {character} from the book.

Character Profile (from book analysis):
- Personality: {personality}
- Speech Pattern: {speech_pattern}
- Key Phrases: {key_phrases}
- Dialogue Style: {dialogue_style}
- Emotional Range: {emotional_range}

Context from the book:
{context_text}

Guidelines:
- Stay completely in character as {character}
- Use their specific speech patterns and personality from the book
- Reference events and relationships from the book when relevant
- Keep responses natural and conversational
- Don't break character or mention you're an AI
- If you don't know something specific, respond as {character} would"#,
        personality = style.personality,
        speech_pattern = style.speech_pattern,
        key_phrases = style.key_phrases.join(", "),
        dialogue_style = style.dialogue_style,
        emotional_range = style.emotional_range,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedOracle, FailingOracle};

    #[test]
    fn test_preamble_embeds_style_and_context() {
        let style = CharacterStyle {
            personality: "sharp and curious".to_string(),
            speech_pattern: "precise".to_string(),
            key_phrases: vec!["Honestly!".to_string(), "It's in a book.".to_string()],
            dialogue_style: "rapid".to_string(),
            emotional_range: "intense".to_string(),
        };
        let context = vec!["She raised her hand first.".to_string()];

        let preamble = build_persona_preamble("Hermione", &style, &context);

        assert!(preamble.contains("You are Hermione from the book."));
        assert!(preamble.contains("- Personality: sharp and curious"));
        assert!(preamble.contains("Honestly!, It's in a book."));
        assert!(preamble.contains("She raised her hand first."));
        assert!(preamble.contains("mention you're an AI"));
    }

    #[test]
    fn test_preamble_uses_sentinel_when_context_empty() {
        let preamble = build_persona_preamble("Hagrid", &CharacterStyle::default(), &[]);

        assert!(preamble.contains("No specific context available."));
        assert!(preamble.contains("- Personality: mysterious"));
        assert!(preamble.contains("- Speech Pattern: formal"));
        assert!(preamble.contains("- Dialogue Style: conversational"));
        assert!(preamble.contains("- Emotional Range: varied"));
    }

    #[tokio::test]
    async fn test_generate_reply_trims_oracle_text() {
        let oracle = CannedOracle::new(vec!["  Yer a wizard.  \n".to_string()]);
        let reply = generate_reply(
            &oracle,
            "Hagrid",
            "Who am I?",
            &CharacterStyle::default(),
            &[],
        )
        .await;

        assert_eq!(reply, "Yer a wizard.");
        // The persona goes in as preamble, the literal message as the turn.
        let preambles = oracle.preambles();
        assert!(preambles[0].as_deref().unwrap().contains("You are Hagrid"));
        assert_eq!(oracle.prompts(), vec!["Who am I?".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_reply_with_empty_context_is_nonempty() {
        let oracle = CannedOracle::new(vec!["Hello there.".to_string()]);
        let reply = generate_reply(
            &oracle,
            "Hagrid",
            "Hello?",
            &CharacterStyle::default(),
            &[],
        )
        .await;

        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn test_generate_reply_apologizes_on_oracle_failure() {
        let reply = generate_reply(
            &FailingOracle,
            "Hagrid",
            "Hello?",
            &CharacterStyle::default(),
            &[],
        )
        .await;

        assert!(reply.starts_with("I'm sorry, I can't respond right now."));
        assert!(reply.contains("Error:"));
    }
}
