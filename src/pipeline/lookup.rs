// History lookups the pipeline may call while it reasons. Each lookup is a
// plain function over the snapshot, wrapped in a rig tool.

use std::sync::Arc;

use indexmap::IndexMap;
use rig::{completion::ToolDefinition, tool::Tool};
use serde::Deserialize;
use serde_json::json;

use crate::context::{ContextSnapshot, TalkLine};

pub fn talks_by_agent(history: &[TalkLine], agent_name: &str) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter(|talk| talk.agent == agent_name)
        .map(|talk| format!("Day{} Turn{}: {}", talk.day, talk.turn, talk.text))
        .collect();
    if lines.is_empty() {
        return format!("No talks by {agent_name} were found.");
    }
    format!("Talks by {agent_name}:\n{}", lines.join("\n"))
}

pub fn talks_by_keyword(history: &[TalkLine], keyword: &str) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter(|talk| talk.text.contains(keyword))
        .map(|talk| format!("Day{} {}: {}", talk.day, talk.agent, talk.text))
        .collect();
    if lines.is_empty() {
        return format!("No talks containing \"{keyword}\" were found.");
    }
    format!("Talks containing \"{keyword}\":\n{}", lines.join("\n"))
}

pub fn my_past_talks(snapshot: &ContextSnapshot, day: Option<u32>) -> String {
    let lines: Vec<String> = snapshot
        .talk_history()
        .iter()
        .filter(|talk| talk.agent == snapshot.agent_name())
        .filter(|talk| day.is_none_or(|day| talk.day == day))
        .map(|talk| format!("Day{} Turn{}: {}", talk.day, talk.turn, talk.text))
        .collect();
    if lines.is_empty() {
        return "You have not said anything yet.".to_string();
    }
    format!("Your past talks:\n{}", lines.join("\n"))
}

pub fn vote_results(snapshot: &ContextSnapshot, day: Option<u32>) -> String {
    let lines: Vec<String> = snapshot
        .votes()
        .iter()
        .filter(|vote| day.is_none_or(|day| vote.day == day))
        .map(|vote| format!("Day{}: {} -> {}", vote.day, vote.agent, vote.target))
        .collect();
    if lines.is_empty() {
        return "There are no vote results.".to_string();
    }
    format!("Vote results:\n{}", lines.join("\n"))
}

pub fn day_summary(snapshot: &ContextSnapshot, day: u32, include_whispers: bool) -> String {
    let talk_count = snapshot
        .talk_history()
        .iter()
        .filter(|talk| talk.day == day)
        .count();
    let whisper_count = snapshot
        .whisper_history()
        .iter()
        .filter(|talk| talk.day == day)
        .count();
    let tally: IndexMap<&str, &str> = snapshot
        .votes()
        .iter()
        .filter(|vote| vote.day == day)
        .map(|vote| (vote.agent.as_str(), vote.target.as_str()))
        .collect();

    let mut lines = vec![
        format!("=== Day {day} summary ==="),
        format!("Talks: {talk_count}"),
    ];
    if include_whispers && whisper_count > 0 {
        lines.push(format!("Whispers: {whisper_count}"));
    }
    if !tally.is_empty() {
        let tally = serde_json::to_string(&tally).unwrap_or_default();
        lines.push(format!("Votes: {tally}"));
    }
    // Executions and attacks are only reported for the day before the current one.
    if snapshot.day().checked_sub(1) == Some(day) {
        if let Some(executed) = snapshot.executed_agent() {
            lines.push(format!("Executed: {executed}"));
        }
        if let Some(attacked) = snapshot.attacked_agent() {
            lines.push(format!("Attacked: {attacked}"));
        }
    }
    lines.join("\n")
}

#[derive(Debug, thiserror::Error)]
#[error("Lookup error")]
pub struct LookupError;

#[derive(Debug, Deserialize)]
pub struct AgentArgs {
    pub agent_name: String,
}

#[derive(Debug, Deserialize)]
pub struct KeywordArgs {
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
pub struct OptionalDayArgs {
    #[serde(default)]
    pub day: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DayArgs {
    pub day: u32,
}

pub struct SearchTalksByAgent(pub Arc<ContextSnapshot>);

impl Tool for SearchTalksByAgent {
    const NAME: &'static str = "search_talks_by_agent";

    type Error = LookupError;
    type Args = AgentArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List every talk made by one player.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "Exact name of the player"
                    }
                },
                "required": ["agent_name"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(talks_by_agent(self.0.talk_history(), &args.agent_name))
    }
}

pub struct SearchTalksByKeyword(pub Arc<ContextSnapshot>);

impl Tool for SearchTalksByKeyword {
    const NAME: &'static str = "search_talks_by_keyword";

    type Error = LookupError;
    type Args = KeywordArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List talks whose text contains a keyword.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "keyword": {
                        "type": "string",
                        "description": "Text to look for"
                    }
                },
                "required": ["keyword"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(talks_by_keyword(self.0.talk_history(), &args.keyword))
    }
}

pub struct GetMyPastTalks(pub Arc<ContextSnapshot>);

impl Tool for GetMyPastTalks {
    const NAME: &'static str = "get_my_past_talks";

    type Error = LookupError;
    type Args = OptionalDayArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List your own past talks, optionally for a single day.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "day": {
                        "type": "integer",
                        "description": "Day to filter by; omit for all days"
                    }
                }
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(my_past_talks(&self.0, args.day))
    }
}

pub struct GetVoteResults(pub Arc<ContextSnapshot>);

impl Tool for GetVoteResults {
    const NAME: &'static str = "get_vote_results";

    type Error = LookupError;
    type Args = OptionalDayArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "List who voted for whom, optionally for a single day.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "day": {
                        "type": "integer",
                        "description": "Day to filter by; omit for all days"
                    }
                }
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(vote_results(&self.0, args.day))
    }
}

pub struct GetDaySummary {
    pub snapshot: Arc<ContextSnapshot>,
    pub include_whispers: bool,
}

impl Tool for GetDaySummary {
    const NAME: &'static str = "get_day_summary";

    type Error = LookupError;
    type Args = DayArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Summarize one day: number of talks, votes, and who was executed or attacked.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "day": {
                        "type": "integer",
                        "description": "Day to summarize"
                    }
                },
                "required": ["day"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(day_summary(&self.snapshot, args.day, self.include_whispers))
    }
}
