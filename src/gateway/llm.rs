//! LLM-backed generation gateway
//!
//! Renders the current state, doctrine and feedback as a JSON prompt
//! context, sends it with a rules-bearing system prompt and reads the next
//! turn back out of the reply. Opening scenarios use their own system prompt
//! and a context without a current state.

use async_trait::async_trait;
use serde::Serialize;

use crate::battle::{BattlefieldState, TerrainType, Unit};
use crate::core::config::EngineConfig;
use crate::core::types::TurnIndex;
use crate::gateway::{
    CandidatePayload, DoctrineParams, GatewayError, GenerationGateway, GenerationRequest, LlmClient,
    ScenarioRequest,
};

/// Gateway that asks a chat model for scenarios and turns
pub struct LlmGateway {
    client: LlmClient,
    system_prompt: String,
    scenario_prompt: String,
}

impl LlmGateway {
    pub fn new(client: LlmClient, config: &EngineConfig) -> Self {
        Self {
            client,
            system_prompt: system_prompt(config),
            scenario_prompt: scenario_prompt(config),
        }
    }

    /// Build from LLM_API_KEY / LLM_API_URL / LLM_MODEL
    pub fn from_env(config: &EngineConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(LlmClient::from_env()?, config))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn scenario_prompt(&self) -> &str {
        &self.scenario_prompt
    }
}

#[async_trait]
impl GenerationGateway for LlmGateway {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        let context = PromptContext::new(request.current, request.doctrine, &request);
        let rendered = serde_json::to_string_pretty(&context)
            .map_err(|e| GatewayError::Transport(format!("Failed to render prompt: {}", e)))?;
        let user_prompt = format!(
            "CURRENT STATE:\n{}\n\nProduce turn {} as a single JSON object:",
            rendered,
            request.current.turn() + 1
        );

        tracing::debug!(
            "Requesting turn {} (attempt {}, {} feedback items)",
            request.current.turn() + 1,
            request.attempt,
            request.feedback.len()
        );
        let reply = self.client.complete(&self.system_prompt, &user_prompt).await?;
        parse_reply(&reply)
    }

    async fn generate_initial(
        &self,
        request: ScenarioRequest<'_>,
    ) -> Result<CandidatePayload, GatewayError> {
        let context = ScenarioContext::new(&request);
        let rendered = serde_json::to_string_pretty(&context)
            .map_err(|e| GatewayError::Transport(format!("Failed to render prompt: {}", e)))?;
        let user_prompt = format!(
            "RESEARCH TOPIC:\n{}\n\nProduce the opening turn as a single JSON object:",
            rendered
        );

        tracing::debug!(
            "Requesting opening scenario (attempt {}, {} feedback items)",
            request.attempt,
            request.feedback.len()
        );
        let reply = self.client.complete(&self.scenario_prompt, &user_prompt).await?;
        parse_reply(&reply)
    }
}

/// Read a candidate payload out of a model reply
pub fn parse_reply(reply: &str) -> Result<CandidatePayload, GatewayError> {
    let json = extract_json(reply)?;
    serde_json::from_str(json)
        .map_err(|e| GatewayError::MalformedPayload(format!("Failed to parse candidate: {}", e)))
}

/// Extract the JSON object from a reply (handles surrounding text)
pub fn extract_json(reply: &str) -> Result<&str, GatewayError> {
    let start = reply
        .find('{')
        .ok_or_else(|| GatewayError::MalformedPayload("No JSON found in response".into()))?;
    let end = reply
        .rfind('}')
        .ok_or_else(|| GatewayError::MalformedPayload("No closing brace found in response".into()))?;
    if end < start {
        return Err(GatewayError::MalformedPayload(
            "Closing brace precedes opening brace".into(),
        ));
    }
    Ok(&reply[start..=end])
}

/// Structured context for the user prompt
#[derive(Serialize)]
struct PromptContext<'a> {
    turn: TurnIndex,
    next_turn: TurnIndex,
    doctrine: &'a str,
    research_context: &'a str,
    parameters: &'a std::collections::BTreeMap<String, String>,
    seed: Option<u64>,
    terrain_map: Vec<Vec<u8>>,
    units: Vec<&'a Unit>,
    narrative: Option<&'a str>,
    attempt: u32,
    /// Rules the previous attempt broke, one sentence each
    rejected_because: Vec<String>,
}

impl<'a> PromptContext<'a> {
    fn new(
        state: &'a BattlefieldState,
        doctrine: &'a DoctrineParams,
        request: &GenerationRequest<'_>,
    ) -> Self {
        Self {
            turn: state.turn(),
            next_turn: state.turn() + 1,
            doctrine: &doctrine.doctrine,
            research_context: &doctrine.context,
            parameters: &doctrine.extra,
            seed: doctrine.seed,
            terrain_map: state.terrain().to_codes(),
            units: state.units().collect(),
            narrative: state.narrative(),
            attempt: request.attempt,
            rejected_because: request.feedback.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Structured context for an opening-scenario prompt
#[derive(Serialize)]
struct ScenarioContext<'a> {
    research_context: &'a str,
    doctrine: &'a str,
    parameters: &'a std::collections::BTreeMap<String, String>,
    seed: Option<u64>,
    attempt: u32,
    rejected_because: Vec<String>,
}

impl<'a> ScenarioContext<'a> {
    fn new(request: &ScenarioRequest<'a>) -> Self {
        Self {
            research_context: &request.doctrine.context,
            doctrine: &request.doctrine.doctrine,
            parameters: &request.doctrine.extra,
            seed: request.doctrine.seed,
            attempt: request.attempt,
            rejected_because: request.feedback.iter().map(|v| v.to_string()).collect(),
        }
    }
}

fn scenario_prompt(config: &EngineConfig) -> String {
    let width = config.grid.width;
    let height = config.grid.height;
    let join = |tags: &std::collections::BTreeSet<String>| {
        tags.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    format!(
        r#"You are an expert military simulation engine. Given a research topic, build the
OPENING turn of a tactical wargame: the terrain and both sides' starting forces.

**Output Format:**
A single JSON object, no explanation:
{{
  "description": "one or two sentences setting the tactical situation",
  "terrain": [[0, 0, 1], [2, 3, 0]],
  "units": [{{"id": "B-1", "faction": "Blue", "kind": "Infantry", "position": {{"row": 0, "col": 0}},
             "health": 100, "max_health": 100, "range": 1, "status": "Active", "capabilities": ["infantry"]}}]
}}

**Rules:**
1. "terrain" is exactly {height} rows of {width} integers each.
2. Terrain codes: {legend}. Make the terrain tactically interesting (chokepoints, cover).
3. Sides are "Blue" and "Red". Unit ids are unique and stay fixed for the whole scenario.
4. Every unit stands inside the grid, rows 0..{max_row} and columns 0..{max_col}.
5. Two units may share a cell only if both carry one of: {stacking}.
6. Units cannot stand in Water unless tagged one of: {amphibious}.
7. Tag each unit with its mobility class, one of: {mobility}.
8. Health never exceeds max_health.
9. If the request lists rejected_because, fix every listed problem."#,
        height = height,
        width = width,
        max_row = height.saturating_sub(1),
        max_col = width.saturating_sub(1),
        legend = TerrainType::legend(),
        stacking = join(&config.rules.stacking_tags),
        amphibious = join(&config.rules.amphibious_tags),
        mobility = config.movement.budgets.keys().cloned().collect::<Vec<_>>().join(", "),
    )
}

fn system_prompt(config: &EngineConfig) -> String {
    let width = config.grid.width;
    let height = config.grid.height;
    let budgets = config
        .movement
        .budgets
        .iter()
        .map(|(tag, budget)| format!("{}={}", tag, budget))
        .collect::<Vec<_>>()
        .join(", ");
    let join = |tags: &std::collections::BTreeSet<String>| {
        tags.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    format!(
        r#"You are an expert military simulation engine. Given the current turn of a tactical
wargame, produce the NEXT turn only.

**Output Format:**
A single JSON object, no explanation:
{{
  "description": "one or two sentences explaining the maneuver",
  "units": [{{"id": "B-1", "faction": "Blue", "kind": "Infantry", "position": {{"row": 0, "col": 0}},
             "health": 100, "max_health": 100, "range": 1, "status": "Moving", "capabilities": ["infantry"]}}],
  "terrain": null,
  "reinforcements": [],
  "combat_log": [{{"source": "B-1", "target": "R-2", "action": "Fire", "details": "...", "outcome": "..."}}]
}}

**Rules:**
1. Grid: {height} rows by {width} columns. Rows 0..{max_row}, columns 0..{max_col}.
2. Terrain codes: {legend}. Leave "terrain" null unless the terrain itself changes.
3. Movement: a unit moves at most its budget in king-move steps per turn. Budgets by
   capability tag: {budgets}; any other unit moves {default_budget}.
4. Identity: unit ids never change. Every unit of the current turn must appear again.
   A destroyed unit stays in the list with health 0 and never moves again.
5. New units must be listed in "reinforcements".
6. Two living units may share a cell only if both carry one of: {stacking}.
7. Units cannot stand in Water unless tagged one of: {amphibious}.
8. Health only falls unless the unit is tagged one of: {repair}.
9. combat_log actions: Move, Fire, Suppression, Retreat, Reinforce, Intel. Only reference
   units that are in the list.
10. If the request lists rejected_because, fix every listed problem."#,
        height = height,
        width = width,
        max_row = height.saturating_sub(1),
        max_col = width.saturating_sub(1),
        legend = TerrainType::legend(),
        budgets = budgets,
        default_budget = config.movement.default_budget,
        stacking = join(&config.rules.stacking_tags),
        amphibious = join(&config.rules.amphibious_tags),
        repair = join(&config.rules.repair_tags),
    )
}
