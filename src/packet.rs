// Inbound protocol messages as the game server sends them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Name,
    Initialize,
    DailyInitialize,
    Talk,
    Whisper,
    DailyFinish,
    Divine,
    Guard,
    Vote,
    Attack,
    Finish,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Werewolf,
    Possessed,
    Seer,
    Bodyguard,
    Villager,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Species {
    Human,
    Werewolf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Alive,
    Dead,
}

/// A divine or medium result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judge {
    pub day: u32,
    pub agent: String,
    pub target: String,
    pub result: Species,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub day: u32,
    pub agent: String,
    pub target: String,
}

/// One utterance in the talk or whisper transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Talk {
    pub idx: u32,
    pub day: u32,
    pub turn: u32,
    pub agent: String,
    pub text: String,
    #[serde(default)]
    pub skip: bool, // The speaker forfeited the turn.
    #[serde(default)]
    pub over: bool, // End-of-turn marker.
}

impl Talk {
    pub fn has_content(&self) -> bool {
        !self.skip && !self.over
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    #[serde(default)]
    pub game_id: String,
    pub day: u32,
    pub agent: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub divine_result: Option<Judge>,
    #[serde(default)]
    pub medium_result: Option<Judge>,
    #[serde(default)]
    pub executed_agent: Option<String>,
    #[serde(default)]
    pub attacked_agent: Option<String>,
    #[serde(default)]
    pub vote_list: Option<Vec<Vote>>,
    #[serde(default)]
    pub attack_vote_list: Option<Vec<Vote>>,
    // Iteration order is the server's order and defines the order of alive agents.
    #[serde(default)]
    pub status_map: IndexMap<String, Status>,
    #[serde(default)]
    pub role_map: IndexMap<String, Role>,
    #[serde(default)]
    pub remain_count: Option<u32>,
    #[serde(default)]
    pub remain_length: Option<u32>,
}

impl GameInfo {
    pub fn alive_agents(&self) -> Vec<String> {
        self.status_map
            .iter()
            .filter(|(_, status)| **status == Status::Alive)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    #[serde(default)]
    pub action: u64, // Milliseconds; 0 means no deadline.
    #[serde(default)]
    pub response: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent_count: Option<u32>,
    #[serde(default)]
    pub max_talk: Option<u32>,
    #[serde(default)]
    pub max_whisper: Option<u32>,
    #[serde(default)]
    pub timeout: Timeout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(default)]
    pub request: Option<RequestKind>,
    #[serde(default)]
    pub info: Option<GameInfo>,
    #[serde(default, rename = "setting")]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub talk_history: Option<Vec<Talk>>,
    #[serde(default)]
    pub whisper_history: Option<Vec<Talk>>,
}

impl Packet {
    pub fn request(kind: RequestKind) -> Self {
        Packet {
            request: Some(kind),
            ..Default::default()
        }
    }
}
