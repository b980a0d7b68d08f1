pub mod cache;
pub mod responder;
pub mod retriever;
#[cfg(test)]
mod testing;

pub use cache::EmbeddingCache;
pub use responder::{CharacterStyle, PersonaResponder, build_persona_preamble, generate_reply};
pub use retriever::Retriever;

use serde::{Deserialize, Serialize};
use tracing::warn;

use extract::CompletionOracle;
use index::EmbeddingOracle;

/// Context strings returned per chat turn.
pub const DEFAULT_TOP_K: usize = 3;

/// How context is gathered for a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Unexpanded similarity hits.
    Basic,
    /// Windowed expansion, falling back to relationship annotation.
    #[default]
    Advanced,
    /// Cascade through every strategy until one yields context.
    #[serde(alias = "chain-based", alias = "chain")]
    Chained,
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalMode::Basic => "basic",
            RetrievalMode::Advanced => "advanced",
            RetrievalMode::Chained => "chained",
        }
    }
}

/// The query-time pipeline: retrieve context for a character and utterance,
/// then answer in persona.
pub struct ChatEngine<O, E> {
    retriever: Retriever<E>,
    responder: PersonaResponder<O>,
}

impl<O, E> ChatEngine<O, E>
where
    O: CompletionOracle,
    E: EmbeddingOracle,
{
    pub fn new(graph: neo4rs::Graph, oracle: O, embedder: E) -> Self {
        Self {
            retriever: Retriever::new(graph.clone(), embedder),
            responder: PersonaResponder::new(graph, oracle),
        }
    }

    pub async fn chat(&self, character: &str, message: &str, mode: RetrievalMode) -> String {
        let context = self.gather_context(character, message, mode).await;
        self.responder.respond(character, message, &context).await
    }

    /// Retrieval failures degrade to an empty context list; the responder
    /// still answers from profile defaults.
    async fn gather_context(
        &self,
        character: &str,
        message: &str,
        mode: RetrievalMode,
    ) -> Vec<String> {
        match mode {
            RetrievalMode::Basic => {
                swallow(self.retriever.basic(character, message, DEFAULT_TOP_K).await)
            }
            RetrievalMode::Advanced => {
                let windowed =
                    swallow(self.retriever.windowed(character, message, DEFAULT_TOP_K).await);
                if !windowed.is_empty() {
                    return windowed;
                }
                swallow(
                    self.retriever
                        .with_relationships(character, message, DEFAULT_TOP_K)
                        .await,
                )
            }
            RetrievalMode::Chained => {
                let annotated = swallow(
                    self.retriever
                        .with_relationships(character, message, DEFAULT_TOP_K)
                        .await,
                );
                if !annotated.is_empty() {
                    return annotated;
                }

                let windowed =
                    swallow(self.retriever.windowed(character, message, DEFAULT_TOP_K).await);
                if !windowed.is_empty() {
                    return windowed;
                }

                swallow(self.retriever.basic(character, message, DEFAULT_TOP_K).await)
            }
        }
    }
}

fn swallow(result: anyhow::Result<Vec<String>>) -> Vec<String> {
    match result {
        Ok(texts) => texts,
        Err(e) => {
            warn!(error = %e, "Context retrieval failed, continuing without context");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_deserializes_surface_names() {
        let basic: RetrievalMode = serde_json::from_str("\"basic\"").unwrap();
        let advanced: RetrievalMode = serde_json::from_str("\"advanced\"").unwrap();
        let chained: RetrievalMode = serde_json::from_str("\"chain-based\"").unwrap();

        assert_eq!(basic, RetrievalMode::Basic);
        assert_eq!(advanced, RetrievalMode::Advanced);
        assert_eq!(chained, RetrievalMode::Chained);
    }

    #[test]
    fn test_mode_defaults_to_advanced() {
        assert_eq!(RetrievalMode::default(), RetrievalMode::Advanced);
        assert_eq!(RetrievalMode::Advanced.as_str(), "advanced");
    }

    #[test]
    fn test_swallow_turns_errors_into_empty_context() {
        assert_eq!(swallow(Ok(vec!["ctx".to_string()])), vec!["ctx"]);
        assert!(swallow(Err(anyhow::anyhow!("index missing"))).is_empty());
    }
}
