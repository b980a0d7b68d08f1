use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Content-addressed cache for query embeddings. Chat sessions repeat
/// themselves; there is no reason to re-embed the same utterance.
pub struct EmbeddingCache {
    entries: DashMap<String, Vec<f64>>,
    max_entries: usize,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f64>> {
        let key = hash_text(text);
        self.entries.get(&key).map(|r| r.value().clone())
    }

    pub fn set(&self, text: &str, embedding: Vec<f64>) {
        if self.entries.len() >= self.max_entries {
            // Simple eviction: clear 25% when full.
            let to_remove: Vec<_> = self
                .entries
                .iter()
                .take(self.max_entries / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.entries.remove(&key);
            }
        }

        self.entries.insert(hash_text(text), embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
