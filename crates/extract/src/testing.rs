use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::oracle::{CompletionOptions, CompletionOracle, OracleError};

/// Oracle that fails every call, for exercising fallback policies.
pub struct FailingOracle;

impl CompletionOracle for FailingOracle {
    async fn complete(
        &self,
        _message: &str,
        _preamble: Option<&str>,
        _opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        Err(OracleError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
    }
}

/// Oracle that replays scripted replies and records what it was asked.
pub struct CannedOracle {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl CannedOracle {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionOracle for CannedOracle {
    async fn complete(
        &self,
        message: &str,
        _preamble: Option<&str>,
        _opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().unwrap().push(message.to_string());

        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| "{}".to_string()))
    }
}
