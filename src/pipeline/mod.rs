mod lookup;
mod prompts;
mod rig_pipeline;

pub use lookup::*;
pub use rig_pipeline::*;

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use strum_macros::Display;

use crate::context::ContextSnapshot;
use crate::error::PipelineError;
use crate::memory::Transcript;

/// The two conversation channels, each with its own pipeline transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Talk,
    Whisper,
}

/// Requests whose answer is the name of an alive agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Vote,
    Divine,
    Guard,
    Attack,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TalkDecision {
    #[serde(default)]
    pub thought: String,
    pub utterance: String,
    pub strategy_memo: String,
    pub suspicion: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionDecision {
    #[serde(default)]
    pub reason: String,
    pub target: String,
    pub strategy_memo: String,
    pub suspicion: IndexMap<String, String>,
}

/// The advanced decision source consulted before the fallback selector.
///
/// Implementations report every internal fault as a `PipelineError`; the
/// caller still checks that an action target is alive.
pub trait DecisionPipeline: Send + Sync {
    /// Produces an utterance for `channel`. `history` is that channel's
    /// transcript for the current day and is extended by the call.
    fn talk<'a>(
        &'a self,
        snapshot: Arc<ContextSnapshot>,
        channel: Channel,
        history: &'a mut Transcript,
    ) -> BoxFuture<'a, Result<TalkDecision, PipelineError>>;

    fn act(
        &self,
        snapshot: Arc<ContextSnapshot>,
        action: ActionKind,
    ) -> BoxFuture<'_, Result<ActionDecision, PipelineError>>;
}

/// Parses the JSON object in a model answer, tolerating prose or a code fence around it.
pub fn parse_decision<T: DeserializeOwned>(answer: &str) -> Result<T, PipelineError> {
    let start = answer.find('{');
    let end = answer.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&answer[start..=end])?),
        _ => Err(PipelineError::Parse(format!(
            "no JSON object in answer: {answer}"
        ))),
    }
}
