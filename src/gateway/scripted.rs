//! Deterministic gateway replaying pre-recorded steps
//!
//! Used by the driver's `--script` mode and throughout the tests. Every call
//! is recorded so callers can inspect the feedback the manager sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::types::TurnIndex;
use crate::gateway::{
    parse_reply, CandidatePayload, DoctrineParams, GatewayError, GenerationGateway,
    GenerationRequest, ScenarioRequest,
};
use crate::validation::Violation;

/// One scripted gateway response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Return this payload
    Payload { payload: CandidatePayload },
    /// Treat this text as a raw model reply
    Reply { text: String },
    /// Fail with a transport error
    Fail { message: String },
    /// Sleep before failing, to exercise the caller's timeout
    Stall { millis: u64 },
    /// Sleep, then return the payload
    Delayed {
        millis: u64,
        payload: CandidatePayload,
    },
}

impl From<CandidatePayload> for ScriptStep {
    fn from(payload: CandidatePayload) -> Self {
        ScriptStep::Payload { payload }
    }
}

/// What the gateway was asked on one call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Turn the request grows from; `None` for an opening scenario
    pub turn: Option<TurnIndex>,
    pub attempt: u32,
    pub doctrine: String,
    pub feedback: Vec<Violation>,
}

#[derive(Debug, Default)]
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<ScriptStep>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn from_payloads(payloads: impl IntoIterator<Item = CandidatePayload>) -> Self {
        Self::new(payloads.into_iter().map(ScriptStep::from))
    }

    /// Load a JSON array of steps
    pub fn from_file(path: &Path) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Transport(format!("{}: {}", path.display(), e)))?;
        let steps: Vec<ScriptStep> = serde_json::from_str(&content)
            .map_err(|e| GatewayError::MalformedPayload(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(steps))
    }

    pub fn push(&self, step: impl Into<ScriptStep>) {
        self.lock_steps().push_back(step.into());
    }

    pub fn remaining(&self) -> usize {
        self.lock_steps().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptStep>> {
        self.steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(
        &self,
        turn: Option<TurnIndex>,
        doctrine: &DoctrineParams,
        feedback: &[Violation],
        attempt: u32,
    ) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                turn,
                attempt,
                doctrine: doctrine.doctrine.clone(),
                feedback: feedback.to_vec(),
            });
    }

    async fn next_step(&self) -> Result<CandidatePayload, GatewayError> {
        let step = self.lock_steps().pop_front();
        match step {
            Some(ScriptStep::Payload { payload }) => Ok(payload),
            Some(ScriptStep::Reply { text }) => parse_reply(&text),
            Some(ScriptStep::Fail { message }) => Err(GatewayError::Transport(message)),
            Some(ScriptStep::Stall { millis }) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Err(GatewayError::Transport("stalled step finished".into()))
            }
            Some(ScriptStep::Delayed { millis, payload }) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(payload)
            }
            None => Err(GatewayError::Transport("script exhausted".into())),
        }
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        self.record(
            Some(request.current.turn()),
            request.doctrine,
            request.feedback,
            request.attempt,
        );
        self.next_step().await
    }

    async fn generate_initial(
        &self,
        request: ScenarioRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        self.record(None, request.doctrine, request.feedback, request.attempt);
        self.next_step().await
    }
}
