//! A language model that replays a script.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tracing::{debug, warn};

use triage_contracts::{
    error::{TriageError, TriageResult},
    llm::{LlmRequest, LlmResponse},
};
use triage_core::traits::LlmProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    /// Fail the call at transport level with this reason.
    Fail(String),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    calls: Vec<LlmRequest>,
}

/// Replays queued replies in order, one per call, and records every request.
///
/// Clones share the same script, so a caller can keep a handle after boxing
/// one into the engine. An empty script fails like an unreachable model.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    script: Arc<Mutex<Script>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, text: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Text(text.into()))
    }

    pub fn fail(&self, reason: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Fail(reason.into()))
    }

    /// Requests received so far, oldest first.
    pub fn calls(&self) -> Vec<LlmRequest> {
        self.lock().calls.clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    fn push(&self, reply: ScriptedReply) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// The script, even if a panicking holder poisoned it. A reply is never
    /// dropped, so the queue stays in step with the scenario.
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("scripted LLM lock was poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, request: &LlmRequest) -> TriageResult<LlmResponse> {
        let next = {
            let mut script = self.lock();
            script.calls.push(request.clone());
            script.replies.pop_front()
        };

        debug!(model = %request.model, scripted = ?next.as_ref().map(|r| matches!(r, ScriptedReply::Text(_))), "scripted completion");
        match next {
            Some(ScriptedReply::Text(text)) => Ok(LlmResponse { text }),
            Some(ScriptedReply::Fail(reason)) => Err(TriageError::Transport {
                model: request.model.clone(),
                reason,
            }),
            None => Err(TriageError::Transport {
                model: request.model.clone(),
                reason: "script exhausted".to_string(),
            }),
        }
    }
}
