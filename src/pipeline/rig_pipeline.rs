use std::sync::Arc;

use futures::future::BoxFuture;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::openai::{Client, CompletionModel},
};

use super::prompts::{action_instruction, action_preamble, talk_instruction, talk_preamble};
use super::{
    ActionDecision, ActionKind, Channel, DecisionPipeline, GetDaySummary, GetMyPastTalks,
    GetVoteResults, SearchTalksByAgent, SearchTalksByKeyword, TalkDecision, parse_decision,
};
use crate::context::ContextSnapshot;
use crate::error::{ConfigError, PipelineError};
use crate::memory::Transcript;

/// Upper bound on lookup tool round-trips in one decision.
pub const MAX_LOOKUP_TURNS: usize = 5;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Decision pipeline backed by an OpenAI chat model through rig.
///
/// Every call builds a fresh agent whose preamble carries the snapshot and
/// whose tools look up the snapshot's history.
pub struct RigPipeline {
    client: Client,
    model: String,
}

impl RigPipeline {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        RigPipeline {
            client: Client::new(api_key),
            model: model.into(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| ConfigError::MissingEnv(API_KEY_VAR))?;
        Ok(Self::new(&api_key, model))
    }

    fn talk_agent(&self, snapshot: &Arc<ContextSnapshot>, channel: Channel) -> Agent<CompletionModel> {
        self.client
            .agent(&self.model)
            .preamble(&talk_preamble(snapshot, channel))
            .tool(SearchTalksByAgent(Arc::clone(snapshot)))
            .tool(SearchTalksByKeyword(Arc::clone(snapshot)))
            .tool(GetMyPastTalks(Arc::clone(snapshot)))
            .tool(GetDaySummary {
                snapshot: Arc::clone(snapshot),
                include_whispers: true,
            })
            .build()
    }

    fn action_agent(&self, snapshot: &Arc<ContextSnapshot>) -> Agent<CompletionModel> {
        self.client
            .agent(&self.model)
            .preamble(&action_preamble(snapshot))
            .tool(SearchTalksByAgent(Arc::clone(snapshot)))
            .tool(SearchTalksByKeyword(Arc::clone(snapshot)))
            .tool(GetVoteResults(Arc::clone(snapshot)))
            .tool(GetDaySummary {
                snapshot: Arc::clone(snapshot),
                include_whispers: false,
            })
            .build()
    }
}

impl DecisionPipeline for RigPipeline {
    fn talk<'a>(
        &'a self,
        snapshot: Arc<ContextSnapshot>,
        channel: Channel,
        history: &'a mut Transcript,
    ) -> BoxFuture<'a, Result<TalkDecision, PipelineError>> {
        Box::pin(async move {
            let agent = self.talk_agent(&snapshot, channel);
            let answer = agent
                .prompt(talk_instruction(channel))
                .multi_turn(MAX_LOOKUP_TURNS)
                .with_history(history)
                .await
                .map_err(|e| PipelineError::Prompt(e.to_string()))?;
            log::debug!("Pipeline {channel} answer: {answer}");
            parse_decision(&answer)
        })
    }

    fn act(
        &self,
        snapshot: Arc<ContextSnapshot>,
        action: ActionKind,
    ) -> BoxFuture<'_, Result<ActionDecision, PipelineError>> {
        Box::pin(async move {
            let agent = self.action_agent(&snapshot);
            let instruction = action_instruction(action, snapshot.role());
            let answer = agent
                .prompt(instruction.as_str())
                .multi_turn(MAX_LOOKUP_TURNS)
                .await
                .map_err(|e| PipelineError::Prompt(e.to_string()))?;
            log::debug!("Pipeline {action} answer: {answer}");
            parse_decision(&answer)
        })
    }
}
