use rand::seq::IndexedRandom;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AgentError, ConfigError};

/// Last-resort decision source: a random line of the comment corpus, or a
/// random alive agent.
#[derive(Debug, Clone)]
pub struct FallbackSelector {
    comments: Arc<[String]>,
}

impl FallbackSelector {
    /// Reads one utterance per line. Blank lines are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let comments: Vec<String> = data
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if comments.is_empty() {
            return Err(ConfigError::EmptyCorpus(path.to_path_buf()));
        }
        Ok(Self::from_comments(comments))
    }

    pub fn from_comments(comments: Vec<String>) -> Self {
        FallbackSelector {
            comments: comments.into(),
        }
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn utterance(&self) -> Result<String, AgentError> {
        self.comments
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(AgentError::NoUtterances)
    }

    pub fn target(alive_agents: &[String]) -> Result<String, AgentError> {
        alive_agents
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(AgentError::NoAliveAgents)
    }
}
