use std::collections::HashMap;

use tracing::warn;

use crate::normalizer::string_list;
use crate::oracle::{CompletionOptions, CompletionOracle, complete_json};
use crate::prompt;

/// Names per clustering call, bounding oracle prompt size.
pub const ALIAS_BATCH_SIZE: usize = 10;

const ALIAS_OPTS: CompletionOptions = CompletionOptions {
    temperature: 0.3,
    max_tokens: 500,
};

/// Clusters character-name candidates that refer to the same entity.
///
/// Canonical names are oracle-supplied, not derived locally; the graph-side
/// merge decides how to apply them.
pub struct AliasResolver<O> {
    oracle: O,
}

impl<O: CompletionOracle> AliasResolver<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Maps canonical name -> all surface variations. Only groups with at
    /// least two variations are returned. A failed batch is skipped, never
    /// fatal.
    pub async fn find_duplicates(&self, names: &[String]) -> HashMap<String, Vec<String>> {
        let mut groups = HashMap::new();

        if names.len() < 2 {
            return groups;
        }

        for batch in names.chunks(ALIAS_BATCH_SIZE) {
            if batch.len() < 2 {
                continue;
            }

            let prompt = prompt::build_alias_prompt(batch);

            let value = match complete_json(&self.oracle, &prompt, ALIAS_OPTS, 2).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(batch_size = batch.len(), error = %e, "Alias clustering failed for batch");
                    continue;
                }
            };

            let Some(object) = value.as_object() else {
                warn!("Alias clustering returned a non-object reply, skipping batch");
                continue;
            };

            for (canonical, aliases) in object {
                let aliases = string_list(Some(aliases));
                if aliases.len() >= 2 {
                    groups.insert(canonical.clone(), aliases);
                }
            }
        }

        groups
    }
}
