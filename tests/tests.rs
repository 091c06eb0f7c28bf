// ../tests/tests.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rig::completion::Message;
use strum::IntoEnumIterator;

use wolfpack::agent::Handled;
use wolfpack::memory::Transcript;
use wolfpack::packet::Timeout;
use wolfpack::*;

const POOL: [&str; 2] = ["hello", "hi"];

fn pool() -> FallbackSelector {
    FallbackSelector::from_comments(POOL.iter().map(|s| s.to_string()).collect())
}

fn info(day: u32, statuses: &[(&str, Status)]) -> GameInfo {
    GameInfo {
        game_id: "game-1".to_string(),
        day,
        agent: "Minato".to_string(),
        status_map: statuses
            .iter()
            .map(|(name, status)| (name.to_string(), *status))
            .collect(),
        ..Default::default()
    }
}

fn abc(day: u32) -> GameInfo {
    info(
        day,
        &[("A", Status::Alive), ("B", Status::Alive), ("C", Status::Alive)],
    )
}

fn talk(idx: u32, day: u32, agent: &str, text: &str) -> Talk {
    Talk {
        idx,
        day,
        turn: 0,
        agent: agent.to_string(),
        text: text.to_string(),
        skip: false,
        over: false,
    }
}

fn packet(request: RequestKind, info: Option<GameInfo>) -> Packet {
    Packet {
        request: Some(request),
        info,
        ..Default::default()
    }
}

fn with_timeout(action_ms: u64) -> Settings {
    Settings {
        timeout: Timeout {
            action: action_ms,
            response: action_ms,
        },
        ..Default::default()
    }
}

/// Pipeline double. `None` answers make the call fail.
#[derive(Default)]
struct ScriptedPipeline {
    utterance: Option<String>,
    target: Option<String>,
    calls: AtomicUsize,
    history_lens: Mutex<Vec<usize>>,
}

impl ScriptedPipeline {
    fn failing() -> Self {
        Self::default()
    }

    fn answering(utterance: &str, target: &str) -> Self {
        ScriptedPipeline {
            utterance: Some(utterance.to_string()),
            target: Some(target.to_string()),
            ..Default::default()
        }
    }
}

impl DecisionPipeline for ScriptedPipeline {
    fn talk<'a>(
        &'a self,
        snapshot: Arc<ContextSnapshot>,
        _channel: Channel,
        history: &'a mut Transcript,
    ) -> BoxFuture<'a, Result<TalkDecision, PipelineError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history_lens.lock().unwrap().push(history.len());
            let utterance = self
                .utterance
                .clone()
                .ok_or_else(|| PipelineError::Prompt("model offline".to_string()))?;
            history.push(Message::from("your turn"));
            Ok(TalkDecision {
                thought: "think".to_string(),
                utterance,
                strategy_memo: format!("memo from day {}", snapshot.day()),
                suspicion: IndexMap::from([("B".to_string(), "quiet".to_string())]),
            })
        })
    }

    fn act(
        &self,
        _snapshot: Arc<ContextSnapshot>,
        _action: ActionKind,
    ) -> BoxFuture<'_, Result<ActionDecision, PipelineError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let target = self
                .target
                .clone()
                .ok_or_else(|| PipelineError::Prompt("model offline".to_string()))?;
            Ok(ActionDecision {
                reason: "gut feeling".to_string(),
                target,
                strategy_memo: "acted".to_string(),
                suspicion: IndexMap::new(),
            })
        })
    }
}

fn agent_with(pipeline: Option<Arc<dyn DecisionPipeline>>) -> Agent {
    Agent::with_fallback("Minato", Role::Seer, pool(), pipeline)
}

#[tokio::test]
async fn name_request_answers_configured_name() {
    let mut agent = agent_with(None);
    agent.apply_packet(Packet::request(RequestKind::Name));
    assert_eq!(agent.act().await.unwrap(), Some("Minato".to_string()));
}

#[tokio::test]
async fn disabled_pipeline_talks_from_the_pool() {
    let mut agent = agent_with(None);
    agent.apply_packet(packet(RequestKind::Talk, Some(abc(1))));

    for _ in 0..20 {
        let said = agent.act().await.unwrap().unwrap();
        assert!(POOL.contains(&said.as_str()), "unexpected utterance {said}");
    }
    assert!(agent.memory().is_none());
}

#[tokio::test]
async fn failing_pipeline_always_yields_legal_answers() {
    let pipeline = Arc::new(ScriptedPipeline::failing());
    let mut agent = agent_with(Some(pipeline.clone()));
    let alive = ["A", "C"];
    agent.apply_packet(packet(
        RequestKind::DailyInitialize,
        Some(info(
            2,
            &[("A", Status::Alive), ("B", Status::Dead), ("C", Status::Alive)],
        )),
    ));

    for request in [RequestKind::Talk, RequestKind::Whisper] {
        agent.apply_packet(Packet::request(request));
        let said = agent.act().await.unwrap().unwrap();
        assert!(POOL.contains(&said.as_str()));
    }
    for request in [
        RequestKind::Vote,
        RequestKind::Divine,
        RequestKind::Guard,
        RequestKind::Attack,
    ] {
        agent.apply_packet(Packet::request(request));
        let target = agent.act().await.unwrap().unwrap();
        assert!(alive.contains(&target.as_str()), "{request} chose {target}");
    }
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn target_outside_alive_set_falls_back() {
    let pipeline = Arc::new(ScriptedPipeline::answering("unused", "Z"));
    let mut agent = agent_with(Some(pipeline.clone()));
    agent.apply_packet(packet(RequestKind::Divine, Some(abc(1))));

    let target = agent.act().await.unwrap().unwrap();

    assert!(["A", "B", "C"].contains(&target.as_str()));
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn valid_pipeline_target_is_returned() {
    let pipeline = Arc::new(ScriptedPipeline::answering("unused", "B"));
    let mut agent = agent_with(Some(pipeline));
    agent.apply_packet(packet(RequestKind::Vote, Some(abc(1))));

    assert_eq!(agent.act().await.unwrap(), Some("B".to_string()));
    assert_eq!(agent.memory().unwrap().strategy_memo, "acted");
}

#[tokio::test]
async fn pipeline_talk_updates_memory_and_resets_transcript_each_day() {
    let pipeline = Arc::new(ScriptedPipeline::answering("I trust A", "A"));
    let mut agent = agent_with(Some(pipeline.clone()));

    agent.apply_packet(packet(RequestKind::Talk, Some(abc(1))));
    assert_eq!(agent.act().await.unwrap(), Some("I trust A".to_string()));
    assert_eq!(agent.act().await.unwrap(), Some("I trust A".to_string()));

    let memory = agent.memory().unwrap();
    assert_eq!(memory.strategy_memo, "memo from day 1");
    assert_eq!(memory.transcript(Channel::Talk).len(), 2);

    agent.apply_packet(packet(RequestKind::Talk, Some(abc(2))));
    agent.act().await.unwrap();

    let memory = agent.memory().unwrap();
    assert_eq!(memory.strategy_memo, "memo from day 2");
    assert_eq!(memory.suspicion.get("B").map(String::as_str), Some("quiet"));
    assert_eq!(memory.transcript(Channel::Talk).len(), 1);
    assert_eq!(*pipeline.history_lens.lock().unwrap(), vec![0, 1, 0]);
}

#[tokio::test]
async fn initialize_clears_transcripts_and_memory() {
    let pipeline = Arc::new(ScriptedPipeline::answering("hey", "A"));
    let mut agent = agent_with(Some(pipeline));

    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        info: Some(abc(1)),
        talk_history: Some(vec![talk(0, 1, "A", "morning")]),
        whisper_history: Some(vec![talk(0, 1, "C", "psst")]),
        ..Default::default()
    });
    agent.act().await.unwrap();
    assert_eq!(agent.view().talk_history.len(), 1);
    assert!(!agent.memory().unwrap().strategy_memo.is_empty());

    agent.apply_packet(Packet::request(RequestKind::Initialize));

    assert!(agent.view().talk_history.is_empty());
    assert!(agent.view().whisper_history.is_empty());
    assert_eq!(agent.memory().unwrap(), TurnMemory::default());
    assert_eq!(agent.act().await.unwrap(), None);
    assert_eq!(agent.memory().unwrap(), TurnMemory::default());
}

#[tokio::test]
async fn initialize_keeps_the_new_game_profile() {
    let pipeline = Arc::new(ScriptedPipeline::answering("hey", "A"));
    let mut agent = agent_with(Some(pipeline));
    let mut game = abc(0);
    game.profile = Some("A shy librarian".to_string());

    agent.apply_packet(packet(RequestKind::Initialize, Some(game)));
    assert_eq!(agent.act().await.unwrap(), None);

    assert_eq!(agent.memory().unwrap().profile, "A shy librarian");
}

#[tokio::test]
async fn packets_merge_additively() {
    let mut agent = agent_with(None);
    agent.apply_packet(Packet {
        request: Some(RequestKind::DailyInitialize),
        info: Some(abc(1)),
        settings: Some(with_timeout(5000)),
        talk_history: Some(vec![talk(0, 1, "A", "one")]),
        ..Default::default()
    });
    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        talk_history: Some(vec![talk(1, 1, "B", "two")]),
        ..Default::default()
    });

    assert_eq!(agent.request(), Some(RequestKind::Talk));
    assert_eq!(agent.view().day(), 1);
    assert_eq!(agent.settings().unwrap().timeout.action, 5000);
    assert_eq!(agent.view().talk_history.len(), 2);
    assert_eq!(agent.alive_agents(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn lifecycle_and_unknown_requests_answer_nothing() {
    let mut agent = agent_with(None);
    for request in [
        RequestKind::DailyInitialize,
        RequestKind::DailyFinish,
        RequestKind::Finish,
        RequestKind::Unknown,
    ] {
        agent.apply_packet(Packet::request(request));
        assert_eq!(agent.act().await.unwrap(), None);
    }
}

/// Counts handler invocations by name.
#[derive(Default)]
struct RecordingBehavior {
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl RecordingBehavior {
    fn hit(&self, handler: &'static str) {
        *self.calls.lock().unwrap().entry(handler).or_default() += 1;
    }

    fn text(&self, handler: &'static str) -> Handled<String> {
        self.hit(handler);
        Box::pin(async move { Ok(handler.to_string()) })
    }

    fn unit(&self, handler: &'static str) -> Handled<()> {
        self.hit(handler);
        Box::pin(async { Ok(()) })
    }

    fn take(&self) -> HashMap<&'static str, usize> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl Behavior for RecordingBehavior {
    fn name(&self, _turn: Turn) -> Handled<String> {
        self.text("name")
    }
    fn initialize(&self, _turn: Turn) -> Handled<()> {
        self.unit("initialize")
    }
    fn daily_initialize(&self, _turn: Turn) -> Handled<()> {
        self.unit("daily_initialize")
    }
    fn talk(&self, _turn: Turn) -> Handled<String> {
        self.text("talk")
    }
    fn whisper(&self, _turn: Turn) -> Handled<String> {
        self.text("whisper")
    }
    fn daily_finish(&self, _turn: Turn) -> Handled<()> {
        self.unit("daily_finish")
    }
    fn divine(&self, _turn: Turn) -> Handled<String> {
        self.text("divine")
    }
    fn guard(&self, _turn: Turn) -> Handled<String> {
        self.text("guard")
    }
    fn vote(&self, _turn: Turn) -> Handled<String> {
        self.text("vote")
    }
    fn attack(&self, _turn: Turn) -> Handled<String> {
        self.text("attack")
    }
    fn finish(&self, _turn: Turn) -> Handled<()> {
        self.unit("finish")
    }
}

#[tokio::test]
async fn each_request_kind_reaches_exactly_its_handler() {
    let behavior = Arc::new(RecordingBehavior::default());
    let mut agent = agent_with(None).behavior(behavior.clone());

    let expected = [
        (RequestKind::Name, "name", true),
        (RequestKind::Initialize, "initialize", false),
        (RequestKind::DailyInitialize, "daily_initialize", false),
        (RequestKind::Talk, "talk", true),
        (RequestKind::Whisper, "whisper", true),
        (RequestKind::DailyFinish, "daily_finish", false),
        (RequestKind::Divine, "divine", true),
        (RequestKind::Guard, "guard", true),
        (RequestKind::Vote, "vote", true),
        (RequestKind::Attack, "attack", true),
        (RequestKind::Finish, "finish", false),
    ];
    let known: Vec<RequestKind> = RequestKind::iter()
        .filter(|kind| *kind != RequestKind::Unknown)
        .collect();
    assert_eq!(known.len(), expected.len());

    for (request, handler, answers) in expected {
        agent.apply_packet(Packet::request(request));
        let answer = agent.act().await.unwrap();

        assert_eq!(behavior.take(), HashMap::from([(handler, 1)]), "{request}");
        assert_eq!(answer, answers.then(|| handler.to_string()), "{request}");
    }

    agent.apply_packet(Packet::request(RequestKind::Unknown));
    agent.act().await.unwrap();
    assert!(behavior.take().is_empty());
}

/// Talks only after `delay`.
struct SlowBehavior {
    delay: Duration,
}

impl Behavior for SlowBehavior {
    fn talk(&self, turn: Turn) -> Handled<String> {
        let delay = self.delay;
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok("made it".to_string()),
                _ = turn.cancellation().cancelled() => Ok("cancelled".to_string()),
            }
        })
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_miss_is_a_hard_failure() {
    let mut agent = agent_with(None)
        .kill_on_timeout(true)
        .behavior(Arc::new(SlowBehavior {
            delay: Duration::from_secs(30),
        }));
    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        settings: Some(with_timeout(2000)),
        ..Default::default()
    });

    let result = agent.act().await;

    assert!(matches!(result, Err(AgentError::NoResult)));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_never_interrupts() {
    let mut agent = agent_with(None)
        .kill_on_timeout(true)
        .behavior(Arc::new(SlowBehavior {
            delay: Duration::from_secs(600),
        }));
    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        settings: Some(with_timeout(0)),
        ..Default::default()
    });

    assert_eq!(agent.act().await.unwrap(), Some("made it".to_string()));
}

#[tokio::test(start_paused = true)]
async fn handler_within_deadline_completes() {
    let mut agent = agent_with(None).behavior(Arc::new(SlowBehavior {
        delay: Duration::from_secs(1),
    }));
    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        settings: Some(with_timeout(3000)),
        ..Default::default()
    });

    assert_eq!(agent.act().await.unwrap(), Some("made it".to_string()));
}

#[test]
fn agent_construction_requires_a_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("random_talk.txt");
    std::fs::write(&corpus, "").unwrap();
    let config = AgentConfig::from_json(&format!(
        r#"{{"agent": {{"name": "Minato"}}, "path": {{"random_talk": {:?}}}}}"#,
        corpus
    ))
    .unwrap();

    let err = Agent::new(&config, "Minato", Role::Villager, None).err().unwrap();
    assert!(matches!(err, AgentError::Config(ConfigError::EmptyCorpus(_))));

    std::fs::write(&corpus, "hello\nhi\n").unwrap();
    let agent = Agent::new(&config, "Minato", Role::Villager, None).unwrap();
    assert_eq!(agent.name(), "Minato");
    assert!(!agent.pipeline_enabled());
}

/// Pipeline that blows up inside the call.
struct PanickingPipeline;

impl DecisionPipeline for PanickingPipeline {
    fn talk<'a>(
        &'a self,
        _snapshot: Arc<ContextSnapshot>,
        _channel: Channel,
        _history: &'a mut Transcript,
    ) -> BoxFuture<'a, Result<TalkDecision, PipelineError>> {
        Box::pin(async { panic!("talk adapter bug") })
    }

    fn act(
        &self,
        _snapshot: Arc<ContextSnapshot>,
        _action: ActionKind,
    ) -> BoxFuture<'_, Result<ActionDecision, PipelineError>> {
        Box::pin(async { panic!("act adapter bug") })
    }
}

#[tokio::test]
async fn panicking_pipeline_falls_back() {
    let mut agent = agent_with(Some(Arc::new(PanickingPipeline)));

    agent.apply_packet(packet(RequestKind::Talk, Some(abc(1))));
    let said = agent.act().await.unwrap().unwrap();
    assert!(POOL.contains(&said.as_str()));

    agent.apply_packet(Packet::request(RequestKind::Vote));
    let target = agent.act().await.unwrap().unwrap();
    assert!(["A", "B", "C"].contains(&target.as_str()));
}

/// Answers only after `delay`, counting the calls that got that far.
struct SleepyPipeline {
    delay: Duration,
    finished: AtomicUsize,
}

impl SleepyPipeline {
    fn new(delay: Duration) -> Self {
        SleepyPipeline {
            delay,
            finished: AtomicUsize::new(0),
        }
    }
}

impl DecisionPipeline for SleepyPipeline {
    fn talk<'a>(
        &'a self,
        _snapshot: Arc<ContextSnapshot>,
        _channel: Channel,
        history: &'a mut Transcript,
    ) -> BoxFuture<'a, Result<TalkDecision, PipelineError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            history.push(Message::from("late turn"));
            Ok(TalkDecision {
                thought: String::new(),
                utterance: "too late".to_string(),
                strategy_memo: "late memo".to_string(),
                suspicion: IndexMap::from([("A".to_string(), "late".to_string())]),
            })
        })
    }

    fn act(
        &self,
        _snapshot: Arc<ContextSnapshot>,
        _action: ActionKind,
    ) -> BoxFuture<'_, Result<ActionDecision, PipelineError>> {
        Box::pin(async { Err(PipelineError::Prompt("not scripted".to_string())) })
    }
}

fn slow_talk_agent(pipeline: Arc<SleepyPipeline>, kill_on_timeout: bool) -> Agent {
    let mut agent = agent_with(Some(pipeline)).kill_on_timeout(kill_on_timeout);
    agent.apply_packet(Packet {
        request: Some(RequestKind::Talk),
        info: Some(abc(1)),
        settings: Some(with_timeout(2000)),
        ..Default::default()
    });
    agent
}

#[tokio::test(start_paused = true)]
async fn killed_pipeline_call_never_writes_memory() {
    let pipeline = Arc::new(SleepyPipeline::new(Duration::from_secs(60)));
    let agent = slow_talk_agent(pipeline.clone(), true);

    assert!(matches!(agent.act().await, Err(AgentError::NoResult)));
    tokio::time::sleep(Duration::from_secs(120)).await;

    let memory = agent.memory().unwrap();
    assert_eq!(pipeline.finished.load(Ordering::SeqCst), 0);
    assert!(memory.strategy_memo.is_empty());
    assert!(memory.suspicion.is_empty());
    assert!(memory.transcript(Channel::Talk).is_empty());
}

#[tokio::test(start_paused = true)]
async fn detached_pipeline_call_writes_memory_late() {
    let pipeline = Arc::new(SleepyPipeline::new(Duration::from_secs(60)));
    let agent = slow_talk_agent(pipeline.clone(), false);

    assert!(matches!(agent.act().await, Err(AgentError::NoResult)));
    assert!(agent.memory().unwrap().strategy_memo.is_empty());
    tokio::time::sleep(Duration::from_secs(120)).await;

    let memory = agent.memory().unwrap();
    assert_eq!(pipeline.finished.load(Ordering::SeqCst), 1);
    assert_eq!(memory.strategy_memo, "late memo");
    assert_eq!(memory.transcript(Channel::Talk).len(), 1);
}
