use serde::{Deserialize, Serialize};

use extract::OracleError;

/// Embedding role: documents and queries are embedded differently by the
/// reference deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Document,
    Query,
}

impl EmbedRole {
    fn input_type(self) -> &'static str {
        match self {
            EmbedRole::Document => "search_document",
            EmbedRole::Query => "search_query",
        }
    }
}

/// The embedding oracle: text in, fixed-width vector out, possibly failing.
pub trait EmbeddingOracle: Send + Sync {
    fn embed(
        &self,
        text: &str,
        role: EmbedRole,
    ) -> impl Future<Output = Result<Vec<f32>, OracleError>> + Send;
}

/// Cohere-shaped embedding client.
#[derive(Clone)]
pub struct EmbedClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: [&'a str; 1],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbedClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

impl EmbeddingOracle for EmbedClient {
    async fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>, OracleError> {
        let url = format!("{}/v1/embed", self.base_url);

        let request = EmbedRequest {
            model: &self.model,
            texts: [text],
            input_type: role.input_type(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OracleError::Status(response.status()));
        }

        let embed_response: EmbedResponse = response.json().await?;

        embed_response
            .embeddings
            .into_iter()
            .next()
            .ok_or(OracleError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_map_to_input_types() {
        assert_eq!(EmbedRole::Document.input_type(), "search_document");
        assert_eq!(EmbedRole::Query.input_type(), "search_query");
    }
}
