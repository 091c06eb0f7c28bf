use indexmap::IndexMap;
use serde::Serialize;

use crate::memory::TurnMemory;
use crate::packet::{GameInfo, Judge, Role, Talk, Vote};

/// Game state accumulated from packets.
#[derive(Debug, Clone, Default)]
pub struct GameView {
    pub info: Option<GameInfo>,
    pub talk_history: Vec<Talk>,
    pub whisper_history: Vec<Talk>,
}

impl GameView {
    pub fn day(&self) -> u32 {
        self.info.as_ref().map_or(0, |info| info.day)
    }

    pub fn alive_agents(&self) -> Vec<String> {
        self.info
            .as_ref()
            .map(GameInfo::alive_agents)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TalkLine {
    pub agent: String,
    pub day: u32,
    pub turn: u32,
    pub idx: u32,
    pub text: String,
}

impl From<&Talk> for TalkLine {
    fn from(talk: &Talk) -> Self {
        TalkLine {
            agent: talk.agent.clone(),
            day: talk.day,
            turn: talk.turn,
            idx: talk.idx,
            text: talk.text.clone(),
        }
    }
}

/// Input of one decision pipeline call.
///
/// Built from owned copies of the game view and the turn memory, so the
/// pipeline can never write through it into either.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    agent_name: String,
    role: Role,
    day: u32,
    alive_agents: Vec<String>,
    talk_history: Vec<TalkLine>,
    whisper_history: Vec<TalkLine>,
    divine_results: Vec<Judge>,
    medium_results: Vec<Judge>,
    votes: Vec<Vote>,
    status_map: IndexMap<String, String>,
    role_map: IndexMap<String, String>,
    profile: String,
    executed_agent: Option<String>,
    attacked_agent: Option<String>,
    strategy_memo: String,
    suspicion: IndexMap<String, String>,
    remain_count: Option<u32>,
    remain_length: Option<u32>,
}

fn content_lines(history: &[Talk]) -> Vec<TalkLine> {
    history
        .iter()
        .filter(|talk| talk.has_content())
        .map(TalkLine::from)
        .collect()
}

impl ContextSnapshot {
    pub fn build(agent_name: &str, role: Role, view: &GameView, memory: &TurnMemory) -> Self {
        let info = view.info.as_ref();
        ContextSnapshot {
            agent_name: agent_name.to_string(),
            role,
            day: view.day(),
            alive_agents: view.alive_agents(),
            talk_history: content_lines(&view.talk_history),
            whisper_history: content_lines(&view.whisper_history),
            divine_results: memory.divine_results.clone(),
            medium_results: memory.medium_results.clone(),
            votes: memory.votes.clone(),
            status_map: info
                .map(|info| {
                    info.status_map
                        .iter()
                        .map(|(name, status)| (name.clone(), status.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            role_map: info
                .map(|info| {
                    info.role_map
                        .iter()
                        .map(|(name, role)| (name.clone(), role.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
            profile: memory.profile.clone(),
            executed_agent: info.and_then(|info| info.executed_agent.clone()),
            attacked_agent: info.and_then(|info| info.attacked_agent.clone()),
            strategy_memo: memory.strategy_memo.clone(),
            suspicion: memory.suspicion.clone(),
            remain_count: info.and_then(|info| info.remain_count),
            remain_length: info.and_then(|info| info.remain_length),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn alive_agents(&self) -> &[String] {
        &self.alive_agents
    }

    pub fn talk_history(&self) -> &[TalkLine] {
        &self.talk_history
    }

    pub fn whisper_history(&self) -> &[TalkLine] {
        &self.whisper_history
    }

    pub fn divine_results(&self) -> &[Judge] {
        &self.divine_results
    }

    pub fn medium_results(&self) -> &[Judge] {
        &self.medium_results
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn status_map(&self) -> &IndexMap<String, String> {
        &self.status_map
    }

    pub fn role_map(&self) -> &IndexMap<String, String> {
        &self.role_map
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn executed_agent(&self) -> Option<&str> {
        self.executed_agent.as_deref()
    }

    pub fn attacked_agent(&self) -> Option<&str> {
        self.attacked_agent.as_deref()
    }

    pub fn strategy_memo(&self) -> &str {
        &self.strategy_memo
    }

    pub fn suspicion(&self) -> &IndexMap<String, String> {
        &self.suspicion
    }

    pub fn remain_count(&self) -> Option<u32> {
        self.remain_count
    }

    pub fn remain_length(&self) -> Option<u32> {
        self.remain_length
    }

    /// Other agents the role map names as werewolves.
    pub fn werewolf_allies(&self) -> Vec<&str> {
        self.role_map
            .iter()
            .filter(|(name, role)| *name != &self.agent_name && role.as_str() == "WEREWOLF")
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
