use indexmap::IndexMap;
use rig::completion::Message;

use crate::packet::{GameInfo, Judge, Vote};
use crate::pipeline::Channel;

/// Conversation with the decision pipeline for one channel, in call order.
pub type Transcript = Vec<Message>;

/// Reasoning state the agent carries through one game.
///
/// Everything except the two channel transcripts survives from day to day;
/// the transcripts only hold the current day's exchanges with the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnMemory {
    pub strategy_memo: String,
    pub suspicion: IndexMap<String, String>,
    pub divine_results: Vec<Judge>,
    pub medium_results: Vec<Judge>,
    pub votes: Vec<Vote>,
    pub profile: String,
    talk_transcript: Transcript,
    whisper_transcript: Transcript,
    transcript_day: Option<u32>,
}

impl TurnMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_for_new_game(&mut self) {
        *self = Self::default();
    }

    /// Drops both channel transcripts when `day` is not the day they were built for.
    pub fn reset_if_new_day(&mut self, day: u32) {
        if self.transcript_day != Some(day) {
            self.talk_transcript.clear();
            self.whisper_transcript.clear();
            self.transcript_day = Some(day);
        }
    }

    /// Folds the server's view of the game into memory.
    pub fn absorb(&mut self, info: &GameInfo) {
        if let Some(profile) = &info.profile {
            self.profile = profile.clone();
        }
        if let Some(result) = &info.divine_result {
            if !self.divine_results.contains(result) {
                self.divine_results.push(result.clone());
            }
        }
        if let Some(result) = &info.medium_result {
            if !self.medium_results.contains(result) {
                self.medium_results.push(result.clone());
            }
        }
        if let Some(votes) = &info.vote_list {
            self.votes = votes.clone();
        }
    }

    /// Stores the memo and ratings returned by a successful pipeline call.
    pub fn record_decision(&mut self, strategy_memo: String, suspicion: IndexMap<String, String>) {
        self.strategy_memo = strategy_memo;
        self.suspicion = suspicion;
    }

    pub fn transcript(&self, channel: Channel) -> &Transcript {
        match channel {
            Channel::Talk => &self.talk_transcript,
            Channel::Whisper => &self.whisper_transcript,
        }
    }

    pub fn set_transcript(&mut self, channel: Channel, transcript: Transcript) {
        match channel {
            Channel::Talk => self.talk_transcript = transcript,
            Channel::Whisper => self.whisper_transcript = transcript,
        }
    }

    pub fn transcript_day(&self) -> Option<u32> {
        self.transcript_day
    }
}
