//! Scripted collaborators shared by the unit tests

use crate::analyzer::{
    AnalyzerError, AnalyzerResult, FrameAnalyzer, GameMode, Judgement, Rate, SessionResult,
    WeaponGuess, WeaponRecognizer, WeaponSlots,
};
use crate::capture::{Frame, FrameSource, PixelFormat};
use crate::config::Settings;
use crate::recorder::{Recorder, RecorderError, RecorderResult, RecordingOutput};
use crate::runtime::{Event, EventPublisher};
use crate::session::handlers::HandlerDeps;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn blank_frame() -> Frame {
    frame_at(Utc::now())
}

pub fn frame_at(at: DateTime<Utc>) -> Frame {
    Frame::captured_at(2, 2, PixelFormat::Bgra, vec![0; 16], at)
}

/// Frame `secs` seconds after `t0`
pub fn frame_after(t0: DateTime<Utc>, secs: i64) -> Frame {
    frame_at(t0 + Duration::seconds(secs))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detection {
    MatchSelect,
    MatchingStart,
    ScheduleChange,
    SessionStart,
    SessionAbort,
    SessionFinish,
    SessionJudgement,
    SessionResult,
    Loading,
    LoadingEnd,
    PowerOff,
    CommunicationError,
}

#[derive(Default)]
struct Script {
    active: HashSet<Detection>,
    failing: HashSet<Detection>,
    calls: HashMap<Detection, usize>,
    game_mode: Option<GameMode>,
    rate: Option<Rate>,
    judgement: Option<Judgement>,
    result: Option<SessionResult>,
}

/// Analyzer whose detections are switched on and off by the test
#[derive(Default)]
pub struct ScriptedAnalyzer {
    script: Mutex<Script>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, detection: Detection, on: bool) {
        let mut script = self.script.lock();
        if on {
            script.active.insert(detection);
        } else {
            script.active.remove(&detection);
        }
    }

    pub fn fail(&self, detection: Detection) {
        self.script.lock().failing.insert(detection);
    }

    pub fn clear(&self) {
        let mut script = self.script.lock();
        script.active.clear();
        script.failing.clear();
    }

    pub fn calls(&self, detection: Detection) -> usize {
        self.script.lock().calls.get(&detection).copied().unwrap_or(0)
    }

    pub fn set_game_mode(&self, mode: GameMode) {
        self.script.lock().game_mode = Some(mode);
    }

    pub fn set_rate(&self, rate: Rate) {
        self.script.lock().rate = Some(rate);
    }

    pub fn set_judgement(&self, judgement: Judgement) {
        self.script.lock().judgement = Some(judgement);
    }

    pub fn set_result(&self, result: SessionResult) {
        self.script.lock().result = Some(result);
    }

    fn check(&self, detection: Detection) -> AnalyzerResult<bool> {
        let mut script = self.script.lock();
        *script.calls.entry(detection).or_insert(0) += 1;
        if script.failing.contains(&detection) {
            return Err(AnalyzerError::Backend(format!("{:?} model unavailable", detection)));
        }
        Ok(script.active.contains(&detection))
    }
}

#[async_trait]
impl FrameAnalyzer for ScriptedAnalyzer {
    async fn detect_match_select(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::MatchSelect)
    }

    async fn extract_game_mode(&self, _frame: &Frame) -> AnalyzerResult<Option<GameMode>> {
        Ok(self.script.lock().game_mode)
    }

    async fn extract_rate(&self, _frame: &Frame, _mode: GameMode) -> AnalyzerResult<Option<Rate>> {
        Ok(self.script.lock().rate.clone())
    }

    async fn detect_matching_start(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::MatchingStart)
    }

    async fn detect_schedule_change(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::ScheduleChange)
    }

    async fn detect_session_start(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::SessionStart)
    }

    async fn detect_session_abort(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::SessionAbort)
    }

    async fn detect_session_finish(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::SessionFinish)
    }

    async fn detect_session_judgement(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::SessionJudgement)
    }

    async fn extract_session_judgement(&self, _frame: &Frame) -> AnalyzerResult<Option<Judgement>> {
        Ok(self.script.lock().judgement)
    }

    async fn detect_session_result(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::SessionResult)
    }

    async fn extract_session_result(
        &self,
        _frame: &Frame,
        _mode: Option<GameMode>,
    ) -> AnalyzerResult<Option<SessionResult>> {
        Ok(self.script.lock().result.clone())
    }

    async fn detect_loading(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::Loading)
    }

    async fn detect_loading_end(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::LoadingEnd)
    }

    async fn detect_power_off(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::PowerOff)
    }

    async fn detect_communication_error(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        self.check(Detection::CommunicationError)
    }
}

/// Recorder that logs operations and fails on request
#[derive(Default)]
pub struct FakeRecorder {
    ops: Mutex<Vec<&'static str>>,
    attempts: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    unreachable: Mutex<HashSet<&'static str>>,
}

impl FakeRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject `op`; setup failures are always reported as unreachable
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    /// Report the device as unreachable for `op`
    pub fn lose_connection(&self, op: &'static str) {
        self.unreachable.lock().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().remove(op);
        self.unreachable.lock().remove(op);
    }

    /// Successful operations in call order
    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().clone()
    }

    /// Calls of `op`, failed or not
    pub fn attempts(&self, op: &'static str) -> usize {
        self.attempts.lock().get(op).copied().unwrap_or(0)
    }

    fn run(&self, op: &'static str) -> RecorderResult<()> {
        *self.attempts.lock().entry(op).or_insert(0) += 1;
        let unreachable = self.unreachable.lock().contains(op);
        if unreachable || (op == "setup" && self.failing.lock().contains(op)) {
            return Err(RecorderError::Unreachable("ws://127.0.0.1:4455".to_string()));
        }
        if self.failing.lock().contains(op) {
            return Err(RecorderError::Rejected {
                operation: op.to_string(),
                message: "output is busy".to_string(),
            });
        }
        self.ops.lock().push(op);
        Ok(())
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn setup(&self) -> RecorderResult<()> {
        self.run("setup")
    }

    async fn start(&self) -> RecorderResult<()> {
        self.run("start")
    }

    async fn pause(&self) -> RecorderResult<()> {
        self.run("pause")
    }

    async fn resume(&self) -> RecorderResult<()> {
        self.run("resume")
    }

    async fn stop(&self) -> RecorderResult<RecordingOutput> {
        self.run("stop")?;
        Ok(RecordingOutput {
            output_files: vec!["recordings/session.mkv".to_string()],
        })
    }

    async fn cancel(&self) -> RecorderResult<()> {
        self.run("cancel")
    }

    async fn teardown(&self) -> RecorderResult<()> {
        self.run("teardown")
    }
}

/// Weapon recognizer returning a fixed guess for every requested slot
pub struct FakeWeaponRecognizer {
    pub visible: AtomicBool,
    pub score: Mutex<f64>,
    pub recognize_calls: AtomicUsize,
    pub cancel_requests: AtomicUsize,
}

impl FakeWeaponRecognizer {
    pub fn new(score: f64) -> Arc<Self> {
        Arc::new(Self {
            visible: AtomicBool::new(true),
            score: Mutex::new(score),
            recognize_calls: AtomicUsize::new(0),
            cancel_requests: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WeaponRecognizer for FakeWeaponRecognizer {
    async fn detect_weapon_display(&self, _frame: &Frame) -> AnalyzerResult<bool> {
        Ok(self.visible.load(Ordering::SeqCst))
    }

    async fn recognize_weapons(
        &self,
        _frame: &Frame,
        target_slots: &[usize],
        _previous: &WeaponSlots,
    ) -> AnalyzerResult<Vec<Option<WeaponGuess>>> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        let score = *self.score.lock();
        Ok(target_slots
            .iter()
            .map(|slot| {
                Some(WeaponGuess {
                    name: format!("weapon-{}", slot),
                    score,
                })
            })
            .collect())
    }

    fn request_cancel(&self) {
        self.cancel_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Produces `remaining` frames as fast as possible, then reports errors
pub struct CountingSource {
    remaining: usize,
}

impl CountingSource {
    pub fn finite(frames: usize) -> Self {
        Self { remaining: frames }
    }
}

impl FrameSource for CountingSource {
    fn id(&self) -> &str {
        "counting"
    }

    fn capture(&mut self) -> anyhow::Result<Frame> {
        if self.remaining == 0 {
            anyhow::bail!("source exhausted");
        }
        self.remaining -= 1;
        Ok(blank_frame())
    }
}

/// Fails `failures` times before producing frames
pub struct FlakySource {
    failures: usize,
}

impl FlakySource {
    pub fn new(failures: usize) -> Self {
        Self { failures }
    }
}

impl FrameSource for FlakySource {
    fn id(&self) -> &str {
        "flaky"
    }

    fn capture(&mut self) -> anyhow::Result<Frame> {
        if self.failures > 0 {
            self.failures -= 1;
            anyhow::bail!("device busy");
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
        Ok(blank_frame())
    }
}

/// Publisher whose queue is read directly by the test
pub fn test_publisher() -> (EventPublisher, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (EventPublisher::from_sender(tx), rx)
}

/// Event types queued so far
pub fn drain_types(rx: &mut mpsc::Receiver<Event>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type);
    }
    types
}

pub fn test_deps(
    analyzer: Arc<ScriptedAnalyzer>,
    weapons: Option<Arc<FakeWeaponRecognizer>>,
) -> (HandlerDeps, mpsc::Receiver<Event>) {
    let (events, rx) = test_publisher();
    let weapons = weapons.map(|w| w as Arc<dyn WeaponRecognizer>);
    let deps = HandlerDeps::new(analyzer, weapons, events, &Settings::default());
    (deps, rx)
}
