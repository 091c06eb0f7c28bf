pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod logging;
pub mod memory;
pub mod packet;
pub mod pipeline;

// Re-export commonly used items for easier access
pub use agent::{Agent, Behavior, DefaultBehavior, Turn};
pub use config::AgentConfig;
pub use context::{ContextSnapshot, GameView};
pub use error::{AgentError, ConfigError, PipelineError};
pub use executor::TimeoutExecutor;
pub use fallback::FallbackSelector;
pub use memory::TurnMemory;
pub use packet::{GameInfo, Packet, RequestKind, Role, Settings, Status, Talk};
pub use pipeline::{ActionDecision, ActionKind, Channel, DecisionPipeline, RigPipeline, TalkDecision};
