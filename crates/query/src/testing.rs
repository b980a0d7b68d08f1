use std::collections::VecDeque;
use std::sync::Mutex;

use extract::{CompletionOptions, CompletionOracle, OracleError};

/// Oracle that fails every call.
pub struct FailingOracle;

impl CompletionOracle for FailingOracle {
    async fn complete(
        &self,
        _message: &str,
        _preamble: Option<&str>,
        _opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        Err(OracleError::Empty)
    }
}

/// Oracle that replays scripted replies and records messages and preambles.
pub struct CannedOracle {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    preambles: Mutex<Vec<Option<String>>>,
}

impl CannedOracle {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            preambles: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn preambles(&self) -> Vec<Option<String>> {
        self.preambles.lock().unwrap().clone()
    }
}

impl CompletionOracle for CannedOracle {
    async fn complete(
        &self,
        message: &str,
        preamble: Option<&str>,
        _opts: CompletionOptions,
    ) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(message.to_string());
        self.preambles
            .lock()
            .unwrap()
            .push(preamble.map(str::to_string));

        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| "...".to_string()))
    }
}
