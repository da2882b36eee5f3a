//! Session orchestrator
//!
//! Owns the state machine, the current context and the recorder. Each cycle
//! takes one frame, asks the registry for a decision and executes it. Manual
//! commands from the [`CommandBus`](crate::runtime::CommandBus) run through
//! the same execute path between frames.

use super::command::{RecordingAction, RecordingCommand};
use super::context::RecordingContext;
use super::frame_processing::{FrameProcessingService, PowerOffStatus};
use super::handlers::HandlerDeps;
use super::phase::SessionPhase;
use super::registry::PhaseHandlerRegistry;
use crate::analyzer::{FrameAnalyzer, WeaponRecognizer};
use crate::capture::{Frame, LatestFrameSlot};
use crate::config::Settings;
use crate::recorder::{
    FailureKind, RecordState, Recorder, RecorderError, RecorderResult, RecordingOutput,
    RecordingTimeline, SessionStateMachine, StateEvent,
};
use crate::runtime::{
    events, CommandError, CommandReceiver, CommandRequest, CommandResult, EventPublisher,
};
use crate::utils::{AppError, AppResult, ErrorResponse};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Why [`Orchestrator::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The console was switched off
    PowerOff,
    /// Shutdown was requested
    Shutdown,
}

/// Fatal recorder failure; the same action is held back until `retry_at`
#[derive(Debug, Clone)]
struct RecorderFault {
    action: RecordingAction,
    error: RecorderError,
    retry_at: DateTime<Utc>,
}

pub struct Orchestrator {
    recorder: Arc<dyn Recorder>,
    analyzer: Arc<dyn FrameAnalyzer>,
    weapons: Option<Arc<dyn WeaponRecognizer>>,
    registry: PhaseHandlerRegistry,
    machine: SessionStateMachine,
    context: RecordingContext,
    timeline: RecordingTimeline,
    frames: FrameProcessingService,
    events: EventPublisher,
    commands: Option<CommandReceiver>,
    frame_timeout: Duration,
    recorder_retry_backoff: chrono::Duration,
    recorder_fault: Option<RecorderFault>,
    /// Capture time of the newest processed frame, the clock for manual commands
    last_frame_at: Option<DateTime<Utc>>,
    ready: bool,
}

impl Orchestrator {
    pub fn new(
        recorder: Arc<dyn Recorder>,
        analyzer: Arc<dyn FrameAnalyzer>,
        weapons: Option<Arc<dyn WeaponRecognizer>>,
        frames: Arc<LatestFrameSlot>,
        events: EventPublisher,
        settings: &Settings,
    ) -> Self {
        let deps = HandlerDeps::new(analyzer.clone(), weapons.clone(), events.clone(), settings);
        let frames = FrameProcessingService::new(
            frames,
            analyzer.clone(),
            events.clone(),
            settings.power_off_interval(),
            settings.power_off_threshold,
        );

        Self {
            recorder,
            analyzer,
            weapons,
            registry: PhaseHandlerRegistry::new(deps),
            machine: SessionStateMachine::new(),
            context: RecordingContext::new(),
            timeline: RecordingTimeline::new(),
            frames,
            events,
            commands: None,
            frame_timeout: settings.frame_timeout(),
            recorder_retry_backoff: chrono::Duration::from_std(settings.recorder_retry_backoff())
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
            recorder_fault: None,
            last_frame_at: None,
            ready: false,
        }
    }

    /// Accept manual commands from a bus
    pub fn with_commands(mut self, commands: CommandReceiver) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn state(&self) -> RecordState {
        self.machine.state()
    }

    pub fn context(&self) -> &RecordingContext {
        &self.context
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::classify(&self.context, self.machine.state())
    }

    pub fn timeline(&self) -> &RecordingTimeline {
        &self.timeline
    }

    /// Connect to the recorder. The loop refuses to run until this succeeds.
    pub async fn setup(&mut self) -> AppResult<()> {
        if let Err(e) = self.recorder.setup().await {
            tracing::error!("Recorder setup failed: {}", e);
            return Err(e.into());
        }
        self.ready = true;
        tracing::info!("Orchestrator ready");
        Ok(())
    }

    /// Run cycles until power-off or shutdown. The recorder is torn down on
    /// either exit.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> AppResult<LoopExit> {
        if !self.ready {
            return Err(AppError::InvalidState(
                "orchestrator started without a successful setup".to_string(),
            ));
        }

        tracing::info!("Orchestrator loop started");
        let exit = loop {
            if *shutdown.borrow() {
                break LoopExit::Shutdown;
            }

            while let Some(request) = self.commands.as_mut().and_then(CommandReceiver::try_recv) {
                self.handle_request(request).await;
            }

            let frame = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break LoopExit::Shutdown;
                    }
                    continue;
                }
                request = next_command(&mut self.commands) => {
                    match request {
                        Some(request) => self.handle_request(request).await,
                        None => {
                            tracing::debug!("Command bus closed");
                            self.commands = None;
                        }
                    }
                    continue;
                }
                frame = self.frames.acquire(self.frame_timeout) => frame,
            };

            let Some(frame) = frame else {
                tracing::trace!("No frame within {:?}", self.frame_timeout);
                continue;
            };

            if let Some(exit) = self.run_cycle(&frame).await {
                break exit;
            }
        };

        tracing::info!("Orchestrator loop exited: {:?}", exit);
        if let Err(e) = self.recorder.teardown().await {
            tracing::warn!("Recorder teardown failed: {}", e);
        }
        self.ready = false;
        Ok(exit)
    }

    /// One frame through power-off check, dispatch and execution
    pub async fn run_cycle(&mut self, frame: &Frame) -> Option<LoopExit> {
        self.last_frame_at = Some(frame.timestamp());
        if self.frames.check_power_off(frame).await == PowerOffStatus::Final {
            self.power_off(frame.timestamp()).await;
            return Some(LoopExit::PowerOff);
        }

        let command = self
            .registry
            .dispatch(frame, &self.context, self.machine.state())
            .await;
        // Failures are already logged and published
        let _ = self.execute(command, frame.timestamp()).await;
        None
    }

    /// Execute `command` and install its context on success.
    ///
    /// When the recorder call fails the previous context stays in place, so
    /// the same decision is taken again on the next frame. After a fatal
    /// failure that action is held back for the retry backoff.
    pub async fn execute(
        &mut self,
        command: RecordingCommand,
        at: DateTime<Utc>,
    ) -> AppResult<RecordState> {
        let RecordingCommand {
            action,
            context,
            reason,
        } = command;

        let Some(event) = action.state_event() else {
            let mut context = context;
            if action == RecordingAction::ResetMetadata {
                tracing::info!("Resetting session: {}", reason);
                // A recording in progress keeps its time limits
                if matches!(self.machine.state(), RecordState::Recording | RecordState::Paused) {
                    if let Some(started) = self.context.battle_started_at {
                        context = context.with_battle_started_at(started);
                    }
                }
            }
            self.context = context;
            return Ok(self.machine.state());
        };

        let from = self.machine.state();
        if SessionStateMachine::transition(from, event).is_none() {
            tracing::warn!("Ignoring {} while {} ({})", action, from, reason);
            return Err(AppError::InvalidState(format!("cannot {} while {}", action, from)));
        }

        if let Some(fault) = &self.recorder_fault {
            if fault.action == action && at < fault.retry_at {
                tracing::debug!(
                    "Holding {} until {} after fatal recorder error",
                    action,
                    fault.retry_at
                );
                return Err(fault.error.clone().into());
            }
        }

        if matches!(event, StateEvent::Stop | StateEvent::Cancel) {
            if let Some(weapons) = &self.weapons {
                weapons.request_cancel();
            }
        }

        let output = match self.drive_recorder(event).await {
            Ok(output) => output,
            Err(e) => {
                let kind = e.kind();
                tracing::error!("Recorder failed to {} ({:?}): {}", action, kind, e);
                if kind == FailureKind::Fatal {
                    self.recorder_fault = Some(RecorderFault {
                        action,
                        error: e.clone(),
                        retry_at: at + self.recorder_retry_backoff,
                    });
                }
                let error = AppError::from(e);
                let response = ErrorResponse::from(&error);
                self.events.emit_value(
                    events::RECORDER_ERROR,
                    json!({
                        "code": response.code,
                        "message": response.message,
                        "kind": kind,
                        "action": action.to_string(),
                    }),
                );
                return Err(error);
            }
        };

        self.recorder_fault = None;
        let state = self.machine.handle(event);
        tracing::info!("Executed {} ({}), recorder now {}", action, reason, state);

        match event {
            StateEvent::Start => {
                self.timeline.begin(at);
                self.events
                    .emit_value(events::RECORDING_STARTED, json!({ "reason": reason }));
                // Elapsed-time limits need a start even when no detector saw one
                self.context = match context.battle_started_at {
                    Some(_) => context,
                    None => context.with_battle_started_at(at),
                };
            }
            StateEvent::Pause => {
                self.timeline.close(at);
                self.events
                    .emit_value(events::RECORDING_PAUSED, json!({ "reason": reason }));
                self.context = context;
            }
            StateEvent::Resume => {
                self.timeline.open(at);
                self.events
                    .emit_value(events::RECORDING_RESUMED, json!({ "reason": reason }));
                self.context = context;
            }
            StateEvent::Stop => {
                self.timeline.close(at);
                let output = output.unwrap_or_default();
                self.events.emit_value(
                    events::RECORDING_STOPPED,
                    json!({
                        "reason": reason,
                        "durationMs": self.timeline.duration_ms(at),
                        "segmentCount": self.timeline.segment_count(),
                        "outputFiles": &output.output_files,
                    }),
                );
                self.complete_session(context, output).await;
            }
            StateEvent::Cancel => {
                self.timeline.close(at);
                self.events
                    .emit_value(events::RECORDING_CANCELLED, json!({ "reason": reason }));
                self.events.emit_value(
                    events::SESSION_CANCELLED,
                    json!({ "reason": reason, "metadata": &context.metadata }),
                );
                self.context = RecordingContext::new();
            }
        }

        Ok(state)
    }

    async fn drive_recorder(&self, event: StateEvent) -> RecorderResult<Option<RecordingOutput>> {
        match event {
            StateEvent::Start => self.recorder.start().await.map(|_| None),
            StateEvent::Pause => self.recorder.pause().await.map(|_| None),
            StateEvent::Resume => self.recorder.resume().await.map(|_| None),
            StateEvent::Stop => self.recorder.stop().await.map(Some),
            StateEvent::Cancel => self.recorder.cancel().await.map(|_| None),
        }
    }

    /// Read the stashed result screen, announce the session and start over
    async fn complete_session(&mut self, context: RecordingContext, output: RecordingOutput) {
        let mut metadata = context.metadata.clone();
        if let Some(frame) = &context.result_frame {
            match self
                .analyzer
                .extract_session_result(frame, metadata.game_mode)
                .await
            {
                Ok(Some(result)) => metadata.result = Some(result),
                Ok(None) => tracing::debug!("Result screen unreadable"),
                Err(e) => tracing::warn!("Result extraction failed: {}", e),
            }
        }

        self.events.emit_value(
            events::SESSION_COMPLETED,
            json!({
                "metadata": &metadata,
                "completed": context.completed,
                "weapons": &context.weapons.best,
                "outputFiles": &output.output_files,
            }),
        );
        self.context = RecordingContext::new();
    }

    async fn power_off(&mut self, at: DateTime<Utc>) {
        tracing::info!("Power-off confirmed while {}", self.machine.state());
        if matches!(self.machine.state(), RecordState::Recording | RecordState::Paused) {
            let command = RecordingCommand::stop(self.context.clone(), "power off");
            if let Err(e) = self.execute(command, at).await {
                tracing::warn!("Could not stop recording on power-off: {}", e);
            }
        }
        self.context = RecordingContext::new();
    }

    async fn handle_request(&mut self, request: CommandRequest) {
        tracing::info!("Manual command: {}", request.name);
        let result = self.execute_manual(&request.name, &request.payload).await;
        request.respond(result);
    }

    /// Run a named command. The only payload field read is an optional
    /// `"reason"` string carried into the published events.
    async fn execute_manual(&mut self, name: &str, payload: &Value) -> CommandResult {
        if name == "status" {
            return Ok(self.status());
        }

        let Some(action) = RecordingAction::from_name(name) else {
            return Err(CommandError::Unknown(name.to_string()));
        };

        let reason = payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("manual")
            .to_string();

        let command = match action {
            RecordingAction::ResetMetadata => RecordingCommand::reset_metadata(reason),
            // A manual pause is only lifted by a manual resume
            RecordingAction::Pause | RecordingAction::Resume => {
                RecordingCommand::new(action, self.context.with_resume_trigger(None), reason)
            }
            _ => RecordingCommand::new(action, self.context.clone(), reason),
        };

        // Manual recovery always reaches the recorder
        self.recorder_fault = None;
        let at = self.last_frame_at.unwrap_or_else(Utc::now);
        self.execute(command, at)
            .await
            .map(|_| self.status())
            .map_err(|e| CommandError::Failed(e.to_string()))
    }

    fn status(&self) -> Value {
        json!({
            "state": self.machine.state().to_string(),
            "phase": self.phase().to_string(),
        })
    }
}

async fn next_command(commands: &mut Option<CommandReceiver>) -> Option<CommandRequest> {
    match commands {
        Some(commands) => commands.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{GameMode, Judgement, SessionResult};
    use crate::runtime::{CommandBus, Event};
    use crate::testing::{
        drain_types, frame_after, test_publisher, Detection, FakeRecorder, FakeWeaponRecognizer,
        ScriptedAnalyzer,
    };
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    struct Harness {
        orchestrator: Orchestrator,
        analyzer: Arc<ScriptedAnalyzer>,
        recorder: Arc<FakeRecorder>,
        slot: Arc<LatestFrameSlot>,
        rx: mpsc::Receiver<Event>,
    }

    fn harness(weapons: Option<Arc<FakeWeaponRecognizer>>) -> Harness {
        let analyzer = ScriptedAnalyzer::new();
        let recorder = FakeRecorder::new();
        let slot = Arc::new(LatestFrameSlot::new());
        let (events, rx) = test_publisher();
        let settings = Settings {
            frame_timeout_ms: 20,
            ..Settings::default()
        };
        let orchestrator = Orchestrator::new(
            recorder.clone(),
            analyzer.clone(),
            weapons.map(|w| w as Arc<dyn WeaponRecognizer>),
            slot.clone(),
            events,
            &settings,
        );
        Harness {
            orchestrator,
            analyzer,
            recorder,
            slot,
            rx,
        }
    }

    fn take_event(rx: &mut mpsc::Receiver<Event>, event_type: &str) -> Option<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).find(|e| e.event_type == event_type)
    }

    #[tokio::test]
    async fn test_full_session_walkthrough() {
        let t0 = Utc::now();
        let Harness {
            mut orchestrator,
            analyzer,
            recorder,
            mut rx,
            ..
        } = harness(None);
        orchestrator.setup().await.unwrap();

        analyzer.set(Detection::MatchSelect, true);
        analyzer.set_game_mode(GameMode::Regular);
        orchestrator.run_cycle(&frame_after(t0, 0)).await;
        assert_eq!(orchestrator.context().metadata.game_mode, Some(GameMode::Regular));

        analyzer.clear();
        analyzer.set(Detection::MatchingStart, true);
        orchestrator.run_cycle(&frame_after(t0, 2)).await;
        assert_eq!(orchestrator.phase(), SessionPhase::Matching);

        analyzer.clear();
        analyzer.set(Detection::SessionStart, true);
        orchestrator.run_cycle(&frame_after(t0, 10)).await;
        assert_eq!(orchestrator.state(), RecordState::Recording);
        assert_eq!(orchestrator.phase(), SessionPhase::InGame);

        analyzer.clear();
        analyzer.set(Detection::SessionFinish, true);
        orchestrator.run_cycle(&frame_after(t0, 200)).await;
        assert_eq!(orchestrator.state(), RecordState::Paused);
        assert!(orchestrator.context().finish);

        analyzer.clear();
        analyzer.set(Detection::SessionJudgement, true);
        analyzer.set_judgement(Judgement::Win);
        orchestrator.run_cycle(&frame_after(t0, 205)).await;
        assert_eq!(orchestrator.state(), RecordState::Recording);
        assert_eq!(orchestrator.phase(), SessionPhase::PostFinish);

        orchestrator.run_cycle(&frame_after(t0, 206)).await;
        assert_eq!(orchestrator.context().metadata.judgement, Some(Judgement::Win));

        analyzer.clear();
        analyzer.set(Detection::Loading, true);
        orchestrator.run_cycle(&frame_after(t0, 210)).await;
        assert_eq!(orchestrator.state(), RecordState::Paused);

        analyzer.clear();
        analyzer.set(Detection::LoadingEnd, true);
        orchestrator.run_cycle(&frame_after(t0, 215)).await;
        assert_eq!(orchestrator.state(), RecordState::Recording);

        analyzer.clear();
        analyzer.set(Detection::SessionResult, true);
        analyzer.set_result(SessionResult {
            kill: Some(7),
            death: Some(3),
            ..SessionResult::default()
        });
        orchestrator.run_cycle(&frame_after(t0, 220)).await;
        assert_eq!(orchestrator.phase(), SessionPhase::Result);
        orchestrator.run_cycle(&frame_after(t0, 225)).await;
        assert_eq!(orchestrator.state(), RecordState::Recording);

        analyzer.clear();
        orchestrator.run_cycle(&frame_after(t0, 230)).await;
        assert_eq!(orchestrator.state(), RecordState::Stopped);
        assert_eq!(orchestrator.phase(), SessionPhase::Standby);
        assert!(orchestrator.context().metadata.started_at.is_none());

        assert_eq!(
            recorder.ops(),
            vec!["setup", "start", "pause", "resume", "pause", "resume", "stop"]
        );

        let stopped = take_event(&mut rx, events::RECORDING_STOPPED).unwrap();
        assert_eq!(stopped.payload["segmentCount"], 3);
        // 10..200 + 205..210 + 215..230
        assert_eq!(stopped.payload["durationMs"], 210_000);

        let completed = take_event(&mut rx, events::SESSION_COMPLETED).unwrap();
        assert_eq!(completed.payload["completed"], true);
        assert_eq!(completed.payload["metadata"]["judgement"], "win");
        assert_eq!(completed.payload["metadata"]["result"]["kill"], 7);
        assert_eq!(completed.payload["outputFiles"][0], "recordings/session.mkv");
    }

    #[tokio::test]
    async fn test_recorder_failure_keeps_context_and_retries() {
        let t0 = Utc::now();
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();

        h.analyzer.set(Detection::MatchingStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.analyzer.clear();
        h.analyzer.set(Detection::SessionStart, true);

        h.recorder.fail("start");
        h.orchestrator.run_cycle(&frame_after(t0, 5)).await;
        assert_eq!(h.orchestrator.state(), RecordState::Idle);
        assert!(h.orchestrator.context().battle_started_at.is_none());

        let error = take_event(&mut h.rx, events::RECORDER_ERROR).unwrap();
        assert_eq!(error.payload["code"], "RECORDER_ERROR");
        assert_eq!(error.payload["kind"], "transient");
        assert_eq!(error.payload["action"], "start");

        // Transient failures are retried on the very next frame
        h.orchestrator.run_cycle(&frame_after(t0, 6)).await;
        assert_eq!(h.recorder.attempts("start"), 2);
        assert!(take_event(&mut h.rx, events::RECORDER_ERROR).is_some());

        h.recorder.heal("start");
        h.orchestrator.run_cycle(&frame_after(t0, 7)).await;
        assert_eq!(h.orchestrator.state(), RecordState::Recording);
        assert!(h.orchestrator.context().battle_started_at.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_recorder_is_not_retried_every_frame() {
        let t0 = Utc::now();
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();

        h.analyzer.set(Detection::MatchingStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.analyzer.clear();
        h.analyzer.set(Detection::SessionStart, true);
        h.recorder.lose_connection("start");

        h.orchestrator.run_cycle(&frame_after(t0, 5)).await;
        let error = take_event(&mut h.rx, events::RECORDER_ERROR).unwrap();
        assert_eq!(error.payload["kind"], "fatal");

        for secs in [6, 10, 34] {
            h.orchestrator.run_cycle(&frame_after(t0, secs)).await;
        }
        assert_eq!(h.recorder.attempts("start"), 1);
        let types = drain_types(&mut h.rx);
        assert!(!types.contains(&events::RECORDER_ERROR.to_string()));

        // Default backoff is 30s of frame time
        h.orchestrator.run_cycle(&frame_after(t0, 35)).await;
        assert_eq!(h.recorder.attempts("start"), 2);
        assert!(take_event(&mut h.rx, events::RECORDER_ERROR).is_some());

        // A manual command always reaches the recorder
        h.recorder.heal("start");
        let status = h.orchestrator.execute_manual("start", &Value::Null).await.unwrap();
        assert_eq!(status["state"], "recording");
        assert_eq!(h.recorder.attempts("start"), 3);
    }

    #[tokio::test]
    async fn test_manual_start_enforces_battle_ceiling() {
        let t0 = Utc::now();
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;

        h.orchestrator.execute_manual("start", &Value::Null).await.unwrap();
        assert_eq!(h.orchestrator.context().battle_started_at, Some(t0));

        h.orchestrator.run_cycle(&frame_after(t0, 700)).await;
        assert_eq!(h.orchestrator.state(), RecordState::Stopped);
        assert_eq!(h.recorder.ops(), vec!["setup", "start", "stop"]);
        let stopped = take_event(&mut h.rx, events::RECORDING_STOPPED).unwrap();
        assert_eq!(stopped.payload["reason"], "10 minute ceiling");
    }

    #[tokio::test]
    async fn test_reset_while_recording_keeps_battle_start() {
        let t0 = Utc::now();
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.orchestrator.execute_manual("start", &Value::Null).await.unwrap();

        h.orchestrator.run_cycle(&frame_after(t0, 100)).await;
        h.orchestrator.execute_manual("reset", &Value::Null).await.unwrap();
        assert_eq!(h.orchestrator.context().battle_started_at, Some(t0));
        assert!(h.orchestrator.context().metadata.started_at.is_none());

        h.orchestrator.run_cycle(&frame_after(t0, 650)).await;
        assert_eq!(h.orchestrator.state(), RecordState::Stopped);
        let stopped = take_event(&mut h.rx, events::RECORDING_STOPPED).unwrap();
        assert_eq!(stopped.payload["reason"], "10 minute ceiling");
    }

    #[tokio::test]
    async fn test_manual_commands_use_frame_clock() {
        let t0 = Utc::now() - chrono::Duration::hours(1);
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.orchestrator.execute_manual("start", &Value::Null).await.unwrap();
        h.orchestrator.run_cycle(&frame_after(t0, 40)).await;
        h.orchestrator.execute_manual("stop", &Value::Null).await.unwrap();

        let stopped = take_event(&mut h.rx, events::RECORDING_STOPPED).unwrap();
        assert_eq!(stopped.payload["durationMs"], 40_000);
    }

    #[tokio::test]
    async fn test_manual_reason_from_payload() {
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();

        let payload = json!({ "reason": "streamer hotkey" });
        h.orchestrator.execute_manual("start", &payload).await.unwrap();
        let started = take_event(&mut h.rx, events::RECORDING_STARTED).unwrap();
        assert_eq!(started.payload["reason"], "streamer hotkey");

        h.orchestrator.execute_manual("pause", &json!({})).await.unwrap();
        let paused = take_event(&mut h.rx, events::RECORDING_PAUSED).unwrap();
        assert_eq!(paused.payload["reason"], "manual");
    }

    #[tokio::test]
    async fn test_early_abort_cancels_and_resets() {
        let t0 = Utc::now();
        let weapons = FakeWeaponRecognizer::new(0.9);
        weapons.visible.store(false, Ordering::SeqCst);
        let mut h = harness(Some(weapons.clone()));
        h.orchestrator.setup().await.unwrap();

        h.analyzer.set(Detection::MatchingStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.analyzer.clear();
        h.analyzer.set(Detection::SessionStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 5)).await;
        h.analyzer.clear();
        h.analyzer.set(Detection::SessionAbort, true);
        h.orchestrator.run_cycle(&frame_after(t0, 35)).await;

        assert_eq!(h.orchestrator.state(), RecordState::Stopped);
        assert_eq!(h.orchestrator.phase(), SessionPhase::Standby);
        assert_eq!(h.recorder.ops(), vec!["setup", "start", "cancel"]);
        assert_eq!(weapons.cancel_requests.load(Ordering::SeqCst), 1);

        let types = drain_types(&mut h.rx);
        assert!(types.contains(&events::RECORDING_CANCELLED.to_string()));
        assert!(types.contains(&events::SESSION_CANCELLED.to_string()));
        assert!(!types.contains(&events::SESSION_COMPLETED.to_string()));
    }

    #[tokio::test]
    async fn test_run_requires_setup() {
        let mut h = harness(None);
        h.recorder.fail("setup");
        assert!(matches!(
            h.orchestrator.setup().await,
            Err(AppError::Recorder(_))
        ));

        let (_tx, shutdown) = watch::channel(false);
        assert!(matches!(
            h.orchestrator.run(shutdown).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(h.recorder.ops().is_empty());
    }

    #[tokio::test]
    async fn test_power_off_stops_recording_and_exits() {
        let t0 = Utc::now();
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();

        h.analyzer.set(Detection::MatchingStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 0)).await;
        h.analyzer.clear();
        h.analyzer.set(Detection::SessionStart, true);
        h.orchestrator.run_cycle(&frame_after(t0, 1)).await;
        assert_eq!(h.orchestrator.state(), RecordState::Recording);

        h.analyzer.clear();
        h.analyzer.set(Detection::PowerOff, true);
        let slot = h.slot.clone();
        let feeder = tokio::spawn(async move {
            for i in 1..100 {
                slot.put(frame_after(t0, i * 5));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let (_tx, shutdown) = watch::channel(false);
        let exit = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.run(shutdown))
            .await
            .unwrap()
            .unwrap();
        feeder.abort();

        assert_eq!(exit, LoopExit::PowerOff);
        assert_eq!(h.orchestrator.state(), RecordState::Stopped);
        assert_eq!(
            h.recorder.ops(),
            vec!["setup", "start", "stop", "teardown"]
        );
        let stopped = take_event(&mut h.rx, events::RECORDING_STOPPED).unwrap();
        assert_eq!(stopped.payload["reason"], "power off");
    }

    #[tokio::test]
    async fn test_manual_commands_through_bus() {
        let Harness {
            mut orchestrator,
            recorder,
            slot,
            rx: _rx,
            ..
        } = harness(None);
        orchestrator.setup().await.unwrap();
        let (bus, receiver) = CommandBus::new(8);
        let orchestrator = orchestrator.with_commands(receiver);

        let (shutdown_tx, shutdown) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut orchestrator = orchestrator;
            let exit = orchestrator.run(shutdown).await;
            (orchestrator, exit)
        });

        let status = bus.dispatch("status", Value::Null).await.unwrap();
        assert_eq!(status, json!({ "state": "idle", "phase": "standby" }));

        let status = bus.dispatch("start", Value::Null).await.unwrap();
        assert_eq!(status["state"], "recording");
        let status = bus.dispatch("pause", Value::Null).await.unwrap();
        assert_eq!(status["state"], "paused");

        // Paused without a trigger: frames do not resume it
        slot.put(crate::testing::blank_frame());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = bus.dispatch("status", Value::Null).await.unwrap();
        assert_eq!(status["state"], "paused");

        assert!(matches!(
            bus.dispatch("start", Value::Null).await,
            Err(CommandError::Failed(_))
        ));
        assert_eq!(
            bus.dispatch("rewind", Value::Null).await,
            Err(CommandError::Unknown("rewind".to_string()))
        );

        let status = bus.dispatch("resume", Value::Null).await.unwrap();
        assert_eq!(status["state"], "recording");

        shutdown_tx.send(true).unwrap();
        let (orchestrator, exit) = task.await.unwrap();
        assert_eq!(exit.unwrap(), LoopExit::Shutdown);
        assert_eq!(orchestrator.timeline().segment_count(), 2);
        assert_eq!(
            recorder.ops(),
            vec!["setup", "start", "pause", "resume", "teardown"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_without_frames() {
        let mut h = harness(None);
        h.orchestrator.setup().await.unwrap();
        let (tx, shutdown) = watch::channel(false);

        let mut orchestrator = h.orchestrator;
        let task = tokio::spawn(async move { orchestrator.run(shutdown).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), LoopExit::Shutdown);
        assert_eq!(h.recorder.ops(), vec!["setup", "teardown"]);
    }
}
