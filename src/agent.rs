use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::context::{ContextSnapshot, GameView};
use crate::error::{AgentError, PipelineError};
use crate::executor::TimeoutExecutor;
use crate::fallback::FallbackSelector;
use crate::memory::TurnMemory;
use crate::packet::{Packet, RequestKind, Role, Settings};
use crate::pipeline::{ActionKind, Channel, DecisionPipeline};

pub type Handled<T> = BoxFuture<'static, Result<T, AgentError>>;

/// One handler per request kind.
///
/// Every method has a default; a strategy overrides only what it changes.
/// Handlers run on the executor's task and see the game through `Turn`.
pub trait Behavior: Send + Sync {
    fn name(&self, turn: Turn) -> Handled<String> {
        Box::pin(async move { Ok(turn.agent_name().to_string()) })
    }

    fn initialize(&self, turn: Turn) -> Handled<()> {
        Box::pin(async move {
            turn.reset_memory();
            Ok(())
        })
    }

    fn daily_initialize(&self, _turn: Turn) -> Handled<()> {
        Box::pin(async { Ok(()) })
    }

    fn talk(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.speak(Channel::Talk))
    }

    fn whisper(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.speak(Channel::Whisper))
    }

    fn daily_finish(&self, _turn: Turn) -> Handled<()> {
        Box::pin(async { Ok(()) })
    }

    fn divine(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.choose(ActionKind::Divine))
    }

    fn guard(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.choose(ActionKind::Guard))
    }

    fn vote(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.choose(ActionKind::Vote))
    }

    fn attack(&self, turn: Turn) -> Handled<String> {
        Box::pin(turn.choose(ActionKind::Attack))
    }

    fn finish(&self, _turn: Turn) -> Handled<()> {
        Box::pin(async { Ok(()) })
    }
}

/// Pipeline first, random fallback second, for every decision.
#[derive(Debug, Default)]
pub struct DefaultBehavior;

impl Behavior for DefaultBehavior {}

fn lock(memory: &Mutex<TurnMemory>) -> MutexGuard<'_, TurnMemory> {
    memory.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one pipeline call, turning a panic inside it into a pipeline fault.
async fn guarded<T>(call: BoxFuture<'_, Result<T, PipelineError>>) -> Result<T, PipelineError> {
    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))))
}

/// Everything a handler may read or update while it runs.
///
/// Captured when `act` starts. The game view is a copy; the turn memory is
/// shared with the agent.
#[derive(Clone)]
pub struct Turn {
    agent_name: Arc<str>,
    role: Role,
    view: Arc<GameView>,
    memory: Option<Arc<Mutex<TurnMemory>>>,
    pipeline: Option<Arc<dyn DecisionPipeline>>,
    fallback: FallbackSelector,
    cancel: CancellationToken,
}

impl Turn {
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn fallback(&self) -> &FallbackSelector {
        &self.fallback
    }

    /// Starts a new game's memory, keeping what the current game info already tells.
    pub fn reset_memory(&self) {
        if let Some(memory) = &self.memory {
            let mut memory = lock(memory);
            memory.reset_for_new_game();
            if let Some(info) = &self.view.info {
                memory.absorb(info);
            }
        }
    }

    /// Text decision: the pipeline's utterance, or a random line of the corpus.
    pub async fn speak(self, channel: Channel) -> Result<String, AgentError> {
        if let (Some(pipeline), Some(memory)) = (&self.pipeline, &self.memory) {
            match self.consult_talk(pipeline.as_ref(), memory, channel).await {
                Ok(utterance) => return Ok(utterance),
                Err(e) => warn!("Pipeline failed on {channel}, falling back to a random utterance: {e}"),
            }
        }
        self.fallback.utterance()
    }

    /// Target decision: the pipeline's target if it is alive, or a random alive agent.
    pub async fn choose(self, action: ActionKind) -> Result<String, AgentError> {
        let alive = self.view.alive_agents();
        if let (Some(pipeline), Some(memory)) = (&self.pipeline, &self.memory) {
            match self
                .consult_action(pipeline.as_ref(), memory, action, &alive)
                .await
            {
                Ok(target) => return Ok(target),
                Err(e) => warn!("Pipeline failed on {action}, falling back to a random target: {e}"),
            }
        }
        FallbackSelector::target(&alive)
    }

    async fn consult_talk(
        &self,
        pipeline: &dyn DecisionPipeline,
        memory: &Mutex<TurnMemory>,
        channel: Channel,
    ) -> Result<String, PipelineError> {
        let (snapshot, mut history) = {
            let mut memory = lock(memory);
            memory.reset_if_new_day(self.view.day());
            let snapshot = ContextSnapshot::build(&self.agent_name, self.role, &self.view, &memory);
            (Arc::new(snapshot), memory.transcript(channel).clone())
        };

        let decision = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            decision = guarded(pipeline.talk(snapshot, channel, &mut history)) => decision?,
        };

        info!("Pipeline {channel} thought: {}", decision.thought);
        info!("Pipeline memo: {}", decision.strategy_memo);

        let mut memory = lock(memory);
        memory.set_transcript(channel, history);
        memory.record_decision(decision.strategy_memo, decision.suspicion);
        Ok(decision.utterance)
    }

    async fn consult_action(
        &self,
        pipeline: &dyn DecisionPipeline,
        memory: &Mutex<TurnMemory>,
        action: ActionKind,
        alive: &[String],
    ) -> Result<String, PipelineError> {
        let snapshot = {
            let memory = lock(memory);
            Arc::new(ContextSnapshot::build(&self.agent_name, self.role, &self.view, &memory))
        };

        let decision = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            decision = guarded(pipeline.act(snapshot, action)) => decision?,
        };

        info!("Pipeline {action} reason: {}", decision.reason);
        info!("Pipeline {action} target: {}", decision.target);

        lock(memory).record_decision(decision.strategy_memo, decision.suspicion);

        if !alive.contains(&decision.target) {
            return Err(PipelineError::InvalidTarget(decision.target));
        }
        Ok(decision.target)
    }
}

async fn dispatch(
    behavior: Arc<dyn Behavior>,
    request: Option<RequestKind>,
    turn: Turn,
) -> Result<Option<String>, AgentError> {
    let Some(request) = request else {
        return Ok(None);
    };
    match request {
        RequestKind::Name => behavior.name(turn).await.map(Some),
        RequestKind::Talk => behavior.talk(turn).await.map(Some),
        RequestKind::Whisper => behavior.whisper(turn).await.map(Some),
        RequestKind::Vote => behavior.vote(turn).await.map(Some),
        RequestKind::Divine => behavior.divine(turn).await.map(Some),
        RequestKind::Guard => behavior.guard(turn).await.map(Some),
        RequestKind::Attack => behavior.attack(turn).await.map(Some),
        RequestKind::Initialize => behavior.initialize(turn).await.map(|()| None),
        RequestKind::DailyInitialize => behavior.daily_initialize(turn).await.map(|()| None),
        RequestKind::DailyFinish => behavior.daily_finish(turn).await.map(|()| None),
        RequestKind::Finish => behavior.finish(turn).await.map(|()| None),
        RequestKind::Unknown => Ok(None),
    }
}

/// A player for one game.
pub struct Agent {
    name: Arc<str>,
    role: Role,
    kill_on_timeout: bool,
    request: Option<RequestKind>,
    settings: Option<Settings>,
    view: GameView,
    memory: Option<Arc<Mutex<TurnMemory>>>,
    pipeline: Option<Arc<dyn DecisionPipeline>>,
    fallback: FallbackSelector,
    behavior: Arc<dyn Behavior>,
}

impl Agent {
    /// Loads the fallback corpus named in `config`. Turn memory is kept only
    /// when a pipeline is given.
    pub fn new(
        config: &AgentConfig,
        name: impl Into<String>,
        role: Role,
        pipeline: Option<Arc<dyn DecisionPipeline>>,
    ) -> Result<Self, AgentError> {
        let fallback = FallbackSelector::load(&config.path.random_talk)?;
        Ok(Self::with_fallback(name, role, fallback, pipeline).kill_on_timeout(config.agent.kill_on_timeout))
    }

    pub fn with_fallback(
        name: impl Into<String>,
        role: Role,
        fallback: FallbackSelector,
        pipeline: Option<Arc<dyn DecisionPipeline>>,
    ) -> Self {
        let name: String = name.into();
        Agent {
            name: name.into(),
            role,
            kill_on_timeout: false,
            request: None,
            settings: None,
            view: GameView::default(),
            memory: pipeline
                .as_ref()
                .map(|_| Arc::new(Mutex::new(TurnMemory::new()))),
            pipeline,
            fallback,
            behavior: Arc::new(DefaultBehavior),
        }
    }

    pub fn kill_on_timeout(mut self, kill_on_timeout: bool) -> Self {
        self.kill_on_timeout = kill_on_timeout;
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn request(&self) -> Option<RequestKind> {
        self.request
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn alive_agents(&self) -> Vec<String> {
        self.view.alive_agents()
    }

    pub fn pipeline_enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Copy of the current turn memory, if the pipeline is enabled.
    pub fn memory(&self) -> Option<TurnMemory> {
        self.memory.as_deref().map(|memory| lock(memory).clone())
    }

    /// Merges a packet into the accumulated state. Absent fields leave state
    /// untouched; `INITIALIZE` empties both transcripts and the turn memory.
    pub fn apply_packet(&mut self, packet: Packet) {
        debug!("{packet:?}");
        self.request = packet.request;
        if let Some(info) = packet.info {
            self.view.info = Some(info);
        }
        if let Some(settings) = packet.settings {
            self.settings = Some(settings);
        }
        if let Some(talks) = packet.talk_history {
            self.view.talk_history.extend(talks);
        }
        if let Some(whispers) = packet.whisper_history {
            self.view.whisper_history.extend(whispers);
        }

        let new_game = self.request == Some(RequestKind::Initialize);
        if new_game {
            self.view.talk_history.clear();
            self.view.whisper_history.clear();
        }

        if let Some(memory) = &self.memory {
            let mut memory = lock(memory);
            if new_game {
                memory.reset_for_new_game();
            }
            if let Some(info) = &self.view.info {
                memory.absorb(info);
            }
        }
    }

    fn action_timeout_ms(&self) -> u64 {
        self.settings
            .as_ref()
            .map_or(0, |settings| settings.timeout.action)
    }

    fn turn(&self) -> Turn {
        Turn {
            agent_name: Arc::clone(&self.name),
            role: self.role,
            view: Arc::new(self.view.clone()),
            memory: self.memory.clone(),
            pipeline: self.pipeline.clone(),
            fallback: self.fallback.clone(),
            cancel: CancellationToken::new(),
        }
    }

    /// Answers the pending request under the action deadline.
    ///
    /// `Ok(None)` for lifecycle requests. `Err(AgentError::NoResult)` when the
    /// handler did not finish in time.
    pub async fn act(&self) -> Result<Option<String>, AgentError> {
        let turn = self.turn();
        let cancel = turn.cancel.clone();
        let label = self
            .request
            .map_or_else(|| "no request".to_string(), |request| request.to_string());
        let executor = TimeoutExecutor::new(self.action_timeout_ms(), self.kill_on_timeout);

        executor
            .run(label, cancel, dispatch(Arc::clone(&self.behavior), self.request, turn))
            .await
    }
}
