use std::path::PathBuf;

use thiserror::Error;

// Errors that escape `Agent::act` or agent construction.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No result: the action exceeded its deadline")]
    NoResult, // The executor stopped waiting before the handler recorded anything.

    #[error("Action handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("No alive agents to choose a target from")]
    NoAliveAgents,

    #[error("No fallback utterances to choose from")]
    NoUtterances,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Faults of the decision pipeline. Every variant is recovered by the fallback selector.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline prompt error: {0}")]
    Prompt(String),

    #[error("Failed to parse pipeline answer: {0}")]
    Parse(String),

    #[error("Pipeline returned a target that is not alive: {0}")]
    InvalidTarget(String),

    #[error("Pipeline call cancelled")]
    Cancelled,

    #[error("Pipeline panicked: {0}")]
    Panicked(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}

// Construction-time faults. None of these are recovered.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Fallback corpus is empty: {0}")]
    EmptyCorpus(PathBuf),

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Could not create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger already set: {0}")]
    AlreadySet(String),
}

impl From<log::SetLoggerError> for LogError {
    fn from(err: log::SetLoggerError) -> Self {
        LogError::AlreadySet(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            AgentError::HandlerPanicked(err.to_string())
        } else {
            AgentError::NoResult
        }
    }
}
