// Test doubles for the player core

use crate::config::ContextOptions;
use crate::context::PlayerContext;
use crate::engine::{AudioEngine, DataSource, EngineEvent, EngineFactory};
use crate::error::{AudioError, Result};
use crate::listener::{
    InternalThreadEventListener, OnBufferingUpdateListener, OnCompletionListener, OnErrorListener,
    OnInfoListener, OnPreparedListener, OnSeekCompleteListener,
};
use crate::message::PlayerId;
use crate::player::MediaPlayer;
use crate::status::stream_type;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn mock_context() -> (Arc<PlayerContext>, Arc<MockEngineFactory>) {
    mock_context_with(
        ContextOptions::default()
            .with_message_timeout(Some(Duration::from_secs(2)))
            .with_prepare_timeout(Some(Duration::from_secs(2))),
    )
}

pub(crate) fn mock_context_with(
    options: ContextOptions,
) -> (Arc<PlayerContext>, Arc<MockEngineFactory>) {
    let factory = Arc::new(MockEngineFactory::default());
    let context = PlayerContext::builder()
        .engine_factory(factory.clone())
        .options(options)
        .build()
        .unwrap();
    (context, factory)
}

/// Blocks the internal thread inside one engine call until released
pub(crate) struct Gate {
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: Mutex::new((false, false)),
            changed: Condvar::new(),
        }
    }

    fn pass(&self) {
        let mut state = self.state.lock();
        state.0 = true;
        self.changed.notify_all();
        while !state.1 {
            self.changed.wait(&mut state);
        }
    }

    pub(crate) fn wait_entered(&self) {
        let mut state = self.state.lock();
        while !state.0 {
            self.changed.wait(&mut state);
        }
    }

    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        state.1 = true;
        self.changed.notify_all();
    }
}

/// Observable and scriptable state of a `MockEngine`
pub(crate) struct MockEngineState {
    pub calls: Vec<String>,
    pub fade_enabled: bool,
    pub has_next_player: bool,
    pub looping: bool,
    pub stream_type: i32,
    pub duration_ms: i32,
    pub position_ms: i32,
    /// Never report completion of `prepare`
    pub hold_prepare: bool,
    /// Failure reported by the next prepare completion
    pub prepare_result: Option<AudioError>,
    pub dropped: bool,
    failures: HashMap<&'static str, AudioError>,
    panic_on: Option<&'static str>,
    gates: HashMap<&'static str, Arc<Gate>>,
    pending_events: Vec<EngineEvent>,
}

impl Default for MockEngineState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            fade_enabled: false,
            has_next_player: false,
            looping: false,
            stream_type: stream_type::MUSIC,
            duration_ms: 120_000,
            position_ms: 0,
            hold_prepare: false,
            prepare_result: None,
            dropped: false,
            failures: HashMap::new(),
            panic_on: None,
            gates: HashMap::new(),
            pending_events: Vec::new(),
        }
    }
}

impl MockEngineState {
    /// Make the next call of `method` fail with `err`
    pub fn fail_next(&mut self, method: &'static str, err: AudioError) {
        self.failures.insert(method, err);
    }

    /// Make the next call of `method` panic on the internal thread
    pub fn panic_next(&mut self, method: &'static str) {
        self.panic_on = Some(method);
    }

    /// Make every call of `method` block until the gate is released
    pub fn install_gate(&mut self, method: &'static str) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.gates.insert(method, Arc::clone(&gate));
        gate
    }

    /// Deliver `event` on the next poll
    pub fn push_event(&mut self, event: EngineEvent) {
        self.pending_events.push(event);
    }

    /// Whether a recorded call starts with `prefix`
    pub fn has_call(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.split('(').next() == Some(method))
            .count()
    }
}

pub(crate) type MockHandle = Arc<Mutex<MockEngineState>>;

pub(crate) struct MockEngine {
    state: MockHandle,
    prepare_pending: bool,
    seek_pending: bool,
}

impl MockEngine {
    fn record(&mut self, method: &'static str, call: String) -> Result<()> {
        let (gate, failure, panics) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            let panics = state.panic_on == Some(method);
            if panics {
                state.panic_on = None;
            }
            (state.gates.get(method).cloned(), state.failures.remove(method), panics)
        };
        if let Some(gate) = gate {
            gate.pass();
        }
        if panics {
            panic!("mock engine panicked in {}", method);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AudioEngine for MockEngine {
    fn set_fade_enabled(&mut self, enabled: bool) {
        self.state.lock().fade_enabled = enabled;
    }

    fn set_data_source(&mut self, source: &DataSource) -> Result<()> {
        self.record("set_data_source", format!("set_data_source({:?})", source))
    }

    fn prepare(&mut self) -> Result<()> {
        self.record("prepare", "prepare()".to_string())?;
        self.prepare_pending = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.record("start", "start()".to_string())
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop", "stop()".to_string())
    }

    fn pause(&mut self) -> Result<()> {
        self.record("pause", "pause()".to_string())
    }

    fn reset(&mut self) -> Result<()> {
        self.record("reset", "reset()".to_string())?;
        self.prepare_pending = false;
        self.seek_pending = false;
        Ok(())
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.record("set_volume", format!("set_volume({}, {})", left, right))
    }

    fn duration_ms(&mut self) -> Result<i32> {
        self.record("get_duration", "get_duration()".to_string())?;
        Ok(self.state.lock().duration_ms)
    }

    fn position_ms(&mut self) -> Result<i32> {
        self.record("get_current_position", "get_current_position()".to_string())?;
        Ok(self.state.lock().position_ms)
    }

    fn seek_to(&mut self, msec: i32) -> Result<()> {
        self.record("seek_to", format!("seek_to({})", msec))?;
        self.state.lock().position_ms = msec;
        self.seek_pending = true;
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.record("set_looping", format!("set_looping({})", looping))?;
        self.state.lock().looping = looping;
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    fn set_audio_stream_type(&mut self, stream_type: i32) -> Result<()> {
        self.record("set_audio_stream_type", format!("set_audio_stream_type({})", stream_type))?;
        self.state.lock().stream_type = stream_type;
        Ok(())
    }

    fn audio_stream_type(&self) -> i32 {
        self.state.lock().stream_type
    }

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<()> {
        self.record("attach_aux_effect", format!("attach_aux_effect({})", effect_id))
    }

    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<()> {
        self.record("set_aux_effect_send_level", format!("set_aux_effect_send_level({})", level))
    }

    fn set_has_next_player(&mut self, has_next: bool) {
        self.state.lock().has_next_player = has_next;
    }

    fn next_poll_delay(&self) -> Option<Duration> {
        let state = self.state.lock();
        let prepare_due = self.prepare_pending && !state.hold_prepare;
        if prepare_due || self.seek_pending || !state.pending_events.is_empty() {
            Some(Duration::ZERO)
        } else {
            Some(IDLE_POLL_INTERVAL)
        }
    }

    fn poll(&mut self, events: &mut Vec<EngineEvent>) {
        let mut state = self.state.lock();
        if self.prepare_pending && !state.hold_prepare {
            self.prepare_pending = false;
            let result = match state.prepare_result.take() {
                Some(err) => Err(err),
                None => Ok(()),
            };
            events.push(EngineEvent::PrepareCompleted(result));
        }
        if self.seek_pending {
            self.seek_pending = false;
            events.push(EngineEvent::SeekCompleted(Ok(())));
        }
        events.append(&mut state.pending_events);
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.state.lock().dropped = true;
    }
}

/// Creates `MockEngine`s and keeps a handle on each one
#[derive(Default)]
pub(crate) struct MockEngineFactory {
    engines: Mutex<Vec<MockHandle>>,
    create_failure: Mutex<Option<AudioError>>,
}

impl MockEngineFactory {
    /// Handle of the `index`-th engine created
    pub fn engine(&self, index: usize) -> MockHandle {
        Arc::clone(&self.engines.lock()[index])
    }

    pub fn fail_next_create(&self, err: AudioError) {
        *self.create_failure.lock() = Some(err);
    }
}

impl EngineFactory for MockEngineFactory {
    fn create_engine(&self) -> Result<Box<dyn AudioEngine>> {
        if let Some(err) = self.create_failure.lock().take() {
            return Err(err);
        }
        let state: MockHandle = Arc::new(Mutex::new(MockEngineState::default()));
        self.engines.lock().push(Arc::clone(&state));
        Ok(Box::new(MockEngine {
            state,
            prepare_pending: false,
            seek_pending: false,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ListenerEvent {
    Completion,
    Prepared,
    SeekComplete,
    BufferingUpdate(i32),
    Info { what: i32, extra: i32 },
    Error { what: i32, extra: i32 },
    EnterInternalThread,
    LeaveInternalThread,
}

/// Records every listener callback
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    changed: Condvar,
    error_handled: bool,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Self::with_error_handled(false)
    }

    pub fn with_error_handled(error_handled: bool) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            changed: Condvar::new(),
            error_handled,
        })
    }

    /// Register as every listener except the internal-thread one
    pub fn attach(self: &Arc<Self>, player: &MediaPlayer) {
        let completion: Arc<dyn OnCompletionListener> = self.clone();
        let prepared: Arc<dyn OnPreparedListener> = self.clone();
        let seek: Arc<dyn OnSeekCompleteListener> = self.clone();
        let buffering: Arc<dyn OnBufferingUpdateListener> = self.clone();
        let info: Arc<dyn OnInfoListener> = self.clone();
        let error: Arc<dyn OnErrorListener> = self.clone();

        player.set_on_completion_listener(Some(&completion)).unwrap();
        player.set_on_prepared_listener(Some(&prepared)).unwrap();
        player.set_on_seek_complete_listener(Some(&seek)).unwrap();
        player.set_on_buffering_update_listener(Some(&buffering)).unwrap();
        player.set_on_info_listener(Some(&info)).unwrap();
        player.set_on_error_listener(Some(&error)).unwrap();
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().push(event);
        self.changed.notify_all();
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    pub fn contains<P>(&self, predicate: P) -> bool
    where
        P: Fn(&ListenerEvent) -> bool,
    {
        self.events.lock().iter().any(predicate)
    }

    /// Wait until a recorded event matches `predicate`
    pub fn wait_for<P>(&self, predicate: P) -> bool
    where
        P: Fn(&ListenerEvent) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        let mut events = self.events.lock();
        loop {
            if events.iter().any(&predicate) {
                return true;
            }
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                return events.iter().any(&predicate);
            }
        }
    }
}

impl OnCompletionListener for RecordingListener {
    fn on_completion(&self, _player: PlayerId) {
        self.record(ListenerEvent::Completion);
    }
}

impl OnPreparedListener for RecordingListener {
    fn on_prepared(&self, _player: PlayerId) {
        self.record(ListenerEvent::Prepared);
    }
}

impl OnSeekCompleteListener for RecordingListener {
    fn on_seek_complete(&self, _player: PlayerId) {
        self.record(ListenerEvent::SeekComplete);
    }
}

impl OnBufferingUpdateListener for RecordingListener {
    fn on_buffering_update(&self, _player: PlayerId, percent: i32) {
        self.record(ListenerEvent::BufferingUpdate(percent));
    }
}

impl OnInfoListener for RecordingListener {
    fn on_info(&self, _player: PlayerId, what: i32, extra: i32) -> bool {
        self.record(ListenerEvent::Info { what, extra });
        true
    }
}

impl OnErrorListener for RecordingListener {
    fn on_error(&self, _player: PlayerId, what: i32, extra: i32) -> bool {
        self.record(ListenerEvent::Error { what, extra });
        self.error_handled
    }
}

impl InternalThreadEventListener for RecordingListener {
    fn on_enter_internal_thread(&self, _player: PlayerId) {
        self.record(ListenerEvent::EnterInternalThread);
    }

    fn on_leave_internal_thread(&self, _player: PlayerId) {
        self.record(ListenerEvent::LeaveInternalThread);
    }
}
