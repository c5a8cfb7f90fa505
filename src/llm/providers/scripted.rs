//! Scripted LLM provider — replays canned replies in order and records
//! every request it receives.
//!
//! Used to drive the pipeline deterministically: queue a classification
//! reply, a generation reply, or an injected failure, then inspect
//! [`ScriptedProvider::calls`] to assert on what would have hit the network.
//! Clones share the same script.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::llm::{LlmRequest, ProviderError};

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<String, ProviderError>>,
    calls: Vec<LlmRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.lock().replies.push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, error: ProviderError) -> Self {
        self.lock().replies.push_back(Err(error));
        self
    }

    /// Requests received so far, oldest first.
    pub fn calls(&self) -> Vec<LlmRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub async fn complete(&self, request: &LlmRequest) -> Result<String, ProviderError> {
        let mut script = self.lock();
        script.calls.push(request.clone());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Request("scripted provider has no replies left".into())))
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A poisoned script only means an assertion panicked mid-call.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}
