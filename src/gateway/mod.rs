//! Generation gateway contract
//!
//! The engine never produces tactical content itself. A gateway receives the
//! current state, the doctrine parameters and any feedback from a rejected
//! attempt, and returns a candidate payload for the next turn. It also
//! builds the opening scenario (terrain and forces) from a research context.

pub mod client;
pub mod llm;
pub mod payload;
pub mod scripted;

pub use client::{ApiFormat, LlmClient};
pub use llm::{extract_json, parse_reply, LlmGateway};
pub use payload::CandidatePayload;
pub use scripted::{RecordedCall, ScriptStep, ScriptedGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::battle::BattlefieldState;
use crate::validation::Violation;

/// Parameters steering generation; never validated by the engine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DoctrineParams {
    /// Doctrine or intent ("Blue holds the river line")
    pub doctrine: String,
    /// Research context the scenario explores
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DoctrineParams {
    pub fn new(doctrine: impl Into<String>) -> Self {
        Self {
            doctrine: doctrine.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One request for a next-turn candidate
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub current: &'a BattlefieldState,
    pub doctrine: &'a DoctrineParams,
    /// Violations of the previous attempt (empty on the first attempt)
    pub feedback: &'a [Violation],
    /// 1-based attempt number within one advance
    pub attempt: u32,
}

/// One request for an opening scenario
#[derive(Debug, Clone, Copy)]
pub struct ScenarioRequest<'a> {
    pub doctrine: &'a DoctrineParams,
    pub feedback: &'a [Violation],
    pub attempt: u32,
}

/// Gateway failures, kept apart from validation rejections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway timed out")]
    Timeout,

    #[error("Gateway transport failure: {0}")]
    Transport(String),

    /// The reply arrived but does not deserialize into a candidate
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Source of candidate payloads
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Candidate for the turn after `request.current`
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError>;

    /// Candidate turn 0; the payload must carry terrain
    async fn generate_initial(
        &self,
        request: ScenarioRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError>;
}

#[async_trait]
impl<G: GenerationGateway + ?Sized> GenerationGateway for Arc<G> {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        (**self).generate(request).await
    }

    async fn generate_initial(
        &self,
        request: ScenarioRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        (**self).generate_initial(request).await
    }
}

#[async_trait]
impl<G: GenerationGateway + ?Sized> GenerationGateway for Box<G> {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        (**self).generate(request).await
    }

    async fn generate_initial(
        &self,
        request: ScenarioRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        (**self).generate_initial(request).await
    }
}
