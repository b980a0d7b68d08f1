use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalizer::strip_code_fences;
use crate::prompt;

/// One failure type for every oracle call. Callers never crash on these;
/// each call site declares its own fallback (default record, empty profile,
/// empty context, or a user-visible apology).
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("oracle returned invalid JSON after {0} attempts")]
    InvalidJson(usize),

    #[error("oracle returned an empty result")]
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The text-understanding oracle: text in, text out, possibly failing.
///
/// A trait seam so tests can stand in a failing or canned oracle for the
/// network client.
pub trait CompletionOracle: Send + Sync {
    fn complete(
        &self,
        message: &str,
        preamble: Option<&str>,
        opts: CompletionOptions,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// Cohere-shaped chat client.
#[derive(Clone)]
pub struct CohereClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<&'a str>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

impl CohereClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    async fn chat(
        &self,
        message: &str,
        preamble: Option<&str>,
        opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        let url = format!("{}/v1/chat", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            message,
            preamble,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
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

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.text)
    }
}

impl CompletionOracle for CohereClient {
    async fn complete(
        &self,
        message: &str,
        preamble: Option<&str>,
        opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        self.chat(message, preamble, opts).await
    }
}

/// Ask for structured output and parse it, retrying with a repair prompt when
/// the oracle hands back something that is not JSON.
pub async fn complete_json<O: CompletionOracle>(
    oracle: &O,
    prompt: &str,
    opts: CompletionOptions,
    max_attempts: usize,
) -> Result<serde_json::Value, OracleError> {
    let mut reply = oracle.complete(prompt, None, opts).await?;

    for attempt in 0..max_attempts {
        let cleaned = strip_code_fences(&reply);
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) {
            return Ok(value);
        }

        if attempt < max_attempts - 1 {
            tracing::warn!(attempt = attempt + 1, "Oracle reply was not valid JSON, retrying");
            reply = oracle
                .complete(&prompt::build_repair_prompt(&reply), None, opts)
                .await?;
        }
    }

    Err(OracleError::InvalidJson(max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedOracle, FailingOracle};

    const OPTS: CompletionOptions = CompletionOptions {
        temperature: 0.3,
        max_tokens: 500,
    };

    #[tokio::test]
    async fn test_complete_json_strips_fences() {
        let oracle = CannedOracle::new(vec!["```json\n{\"a\": 1}\n```".to_string()]);
        let value = complete_json(&oracle, "prompt", OPTS, 2).await.unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_complete_json_retries_then_succeeds() {
        let oracle = CannedOracle::new(vec![
            "not json at all".to_string(),
            "{\"fixed\": true}".to_string(),
        ]);
        let value = complete_json(&oracle, "prompt", OPTS, 2).await.unwrap();
        assert_eq!(value["fixed"], true);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_complete_json_gives_up_after_max_attempts() {
        let oracle = CannedOracle::new(vec![
            "still not json".to_string(),
            "nope".to_string(),
        ]);
        let err = complete_json(&oracle, "prompt", OPTS, 2).await.unwrap_err();
        assert!(matches!(err, OracleError::InvalidJson(2)));
    }

    #[tokio::test]
    async fn test_complete_json_propagates_oracle_failure() {
        let err = complete_json(&FailingOracle, "prompt", OPTS, 2).await.unwrap_err();
        assert!(matches!(err, OracleError::Status(_)));
    }
}
