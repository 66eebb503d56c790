// Media player state machine
//
// `MediaPlayer` is the client handle. It validates calls on the calling thread
// and posts them to the context's internal thread, where `PlayerWorker` owns
// the engine and performs the transitions.

use crate::context::{ContextMessage, PlayerContext};
use crate::engine::{AudioEngine, CompletionKind, DataSource, EngineEvent};
use crate::error::Result;
use crate::listener::{
    InternalThreadEventListener, ListenerSet, OnBufferingUpdateListener, OnCompletionListener,
    OnErrorListener, OnInfoListener, OnPreparedListener, OnSeekCompleteListener,
};
use crate::message::{Message, PlayerId, Reply, Request};
use crate::protocol::{reply_channel, Responder};
use crate::state::{check_state_mask, check_state_transition, Operation, PlayerState, StateMask};
use crate::status::{
    aux_effect, error_what, stream_type, translate_to_error_what, PlayerResult, StatusCode,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Arguments of `MediaPlayer::initialize`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeArgs {
    /// Fade in/out on start, pause and stop
    pub use_fade: bool,
}

struct PlayerCore {
    state: PlayerState,
    listeners: ListenerSet,
}

/// State shared by the client handle and the internal-thread worker.
/// State and listeners are guarded by one lock.
pub(crate) struct PlayerShared {
    id: PlayerId,
    core: Mutex<PlayerCore>,
}

impl PlayerShared {
    fn new(id: PlayerId) -> Self {
        Self {
            id,
            core: Mutex::new(PlayerCore {
                state: PlayerState::Created,
                listeners: ListenerSet::new(),
            }),
        }
    }

    pub(crate) fn id(&self) -> PlayerId {
        self.id
    }

    pub(crate) fn state(&self) -> PlayerState {
        self.core.lock().state
    }

    /// Snapshot of the listeners, to be invoked without holding the lock
    pub(crate) fn listeners(&self) -> ListenerSet {
        self.core.lock().listeners.clone()
    }

    fn update_listeners<F>(&self, update: F)
    where
        F: FnOnce(&mut ListenerSet),
    {
        update(&mut self.core.lock().listeners);
    }

    /// The only mutator of the state field
    pub(crate) fn set_state(&self, next: PlayerState) -> bool {
        let mut core = self.core.lock();
        let current = core.state;

        if !check_state_transition(current, next) {
            log::error!("{} set_state(); illegal transition {:?} -> {:?}", self.id, current, next);
            return false;
        }
        if current != next {
            log::debug!("{} set_state(); {:?} -> {:?}", self.id, current, next);
        }
        core.state = next;
        true
    }

    /// Report an error and enter `Error`.
    ///
    /// `on_error` runs first; when it is missing or returns `false`,
    /// `on_completion` follows. Returns whether the error was handled.
    pub(crate) fn raise_error(&self, what: i32, extra: i32) -> bool {
        log::error!("Player {} error({}, {})", self.id, what, extra);

        let listeners = self.listeners();
        let handled = listeners.notify_error(self.id, what, extra);
        if !handled {
            listeners.notify_completion(self.id);
        }

        self.set_state(PlayerState::Error);
        handled
    }
}

fn illegal_state_status(operation: Operation, state: PlayerState) -> StatusCode {
    let sets_data_source = matches!(
        operation,
        Operation::SetDataSourcePath
            | Operation::SetDataSourceUri
            | Operation::SetDataSourceFd
            | Operation::SetDataSourceFdRange
    );
    if sets_data_source && state == PlayerState::Error {
        StatusCode::InErrorState
    } else {
        StatusCode::IllegalState
    }
}

fn log_illegal_state(id: PlayerId, operation: Operation, state: PlayerState) {
    match operation {
        // polled frequently by UIs, stay quiet
        Operation::GetCurrentPosition => {}
        Operation::GetDuration => {
            log::error!(
                "Player {}: get_duration called without a prepared source ({:?})",
                id,
                state
            )
        }
        _ => log::error!("Player {}: {} called in state {:?}", id, operation, state),
    }
}

/// Internal-thread half of a player. Owns the engine.
pub(crate) struct PlayerWorker {
    shared: Arc<PlayerShared>,
    engine: Box<dyn AudioEngine>,
    pending_prepare: Option<Responder>,
    next_player: Option<PlayerId>,
    events: Vec<EngineEvent>,
}

impl PlayerWorker {
    pub(crate) fn new(
        shared: Arc<PlayerShared>,
        mut engine: Box<dyn AudioEngine>,
        use_fade: bool,
    ) -> Self {
        engine.set_fade_enabled(use_fade);
        shared.set_state(PlayerState::Idle);
        Self {
            shared,
            engine,
            pending_prepare: None,
            next_player: None,
            events: Vec::new(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<PlayerShared> {
        &self.shared
    }

    pub(crate) fn on_enter(&self) {
        self.shared.listeners().notify_enter_internal_thread(self.shared.id);
    }

    pub(crate) fn on_leave(&self) {
        self.shared.listeners().notify_leave_internal_thread(self.shared.id);
    }

    pub(crate) fn next_poll_delay(&self) -> Option<Duration> {
        self.engine.next_poll_delay()
    }

    /// Handle one posted message. `peers` are the other players of the context.
    pub(crate) fn handle_message(
        &mut self,
        message: Message,
        peers: &HashMap<PlayerId, PlayerWorker>,
    ) {
        let Message { request, responder } = message;
        let operation = request.operation();
        let state = self.shared.state();

        // the state may have moved since the client checked it
        if !check_state_mask(state, operation.allowed_states()) {
            log_illegal_state(self.shared.id, operation, state);
            Message::reply(responder, Reply::from_status(illegal_state_status(operation, state)));
            return;
        }

        let reply = match self.execute(request, state, peers) {
            Ok(reply) => reply,
            Err(status) => {
                log::warn!("Player {}: {} failed: {}", self.shared.id, operation, status);
                // a rejected argument leaves the engine untouched
                if status != StatusCode::IllegalArgument && operation.failure_is_fatal(state) {
                    self.shared.raise_error(translate_to_error_what(status), 0);
                }
                Reply::from_status(status)
            }
        };

        Message::reply(responder, reply);
    }

    fn execute(
        &mut self,
        request: Request,
        state: PlayerState,
        peers: &HashMap<PlayerId, PlayerWorker>,
    ) -> PlayerResult<Reply> {
        match request {
            Request::SetDataSourcePath(path) => self.set_data_source(DataSource::Path(path)),
            Request::SetDataSourceUri(uri) => self.set_data_source(DataSource::Uri(uri)),
            Request::SetDataSourceFd(fd) => self.set_data_source(DataSource::Fd {
                fd,
                offset: 0,
                length: -1,
            }),
            Request::SetDataSourceFdRange { fd, offset, length } => {
                self.set_data_source(DataSource::Fd { fd, offset, length })
            }
            Request::Prepare { completion } => {
                self.engine.prepare()?;
                self.shared.set_state(PlayerState::PreparingSync);
                self.pending_prepare = Some(completion);
                Ok(Reply::ok())
            }
            Request::PrepareAsync => {
                self.engine.prepare()?;
                self.shared.set_state(PlayerState::PreparingAsync);
                Ok(Reply::ok())
            }
            Request::Start => {
                self.engine.start()?;
                self.shared.set_state(PlayerState::Started);
                Ok(Reply::ok())
            }
            Request::Stop => {
                self.engine.stop()?;
                self.shared.set_state(PlayerState::Stopped);
                Ok(Reply::ok())
            }
            Request::Pause => {
                self.engine.pause()?;
                let next = if state == PlayerState::PlaybackCompleted {
                    PlayerState::PlaybackCompleted
                } else {
                    PlayerState::Paused
                };
                self.shared.set_state(next);
                Ok(Reply::ok())
            }
            Request::Reset => {
                self.engine.reset()?;
                if let Some(waiter) = self.pending_prepare.take() {
                    waiter.respond_status(StatusCode::IllegalState);
                }
                self.next_player = None;
                self.engine.set_has_next_player(false);
                self.shared.set_state(PlayerState::Idle);
                Ok(Reply::ok())
            }
            Request::SetVolume { left, right } => {
                self.engine.set_volume(left, right)?;
                Ok(Reply::ok())
            }
            Request::GetDuration => Ok(Reply::with_int(self.engine.duration_ms()?)),
            Request::GetCurrentPosition => Ok(Reply::with_int(self.engine.position_ms()?)),
            Request::SeekTo { msec } => {
                self.engine.seek_to(msec)?;
                Ok(Reply::ok())
            }
            Request::SetLooping(looping) => {
                self.engine.set_looping(looping)?;
                Ok(Reply::ok())
            }
            Request::IsLooping => Ok(Reply::with_bool(self.engine.is_looping())),
            Request::IsPlaying => Ok(Reply::with_bool(state == PlayerState::Started)),
            Request::SetAudioStreamType(stream_type) => {
                self.engine.set_audio_stream_type(stream_type)?;
                Ok(Reply::ok())
            }
            Request::SetNextMediaPlayer(next) => self.set_next_player(next, peers),
            Request::AttachAuxEffect(effect_id) => {
                self.engine.attach_aux_effect(effect_id)?;
                Ok(Reply::ok())
            }
            Request::SetAuxEffectSendLevel(level) => {
                self.engine.set_aux_effect_send_level(level)?;
                Ok(Reply::ok())
            }
        }
    }

    fn set_data_source(&mut self, source: DataSource) -> PlayerResult<Reply> {
        self.engine.set_data_source(&source)?;
        self.shared.set_state(PlayerState::Initialized);
        Ok(Reply::ok())
    }

    fn set_next_player(
        &mut self,
        next: Option<PlayerId>,
        peers: &HashMap<PlayerId, PlayerWorker>,
    ) -> PlayerResult<Reply> {
        match next {
            None => {
                self.engine.set_has_next_player(false);
                self.next_player = None;
            }
            Some(id) => {
                let peer = peers.get(&id).ok_or(StatusCode::IllegalArgument)?;
                let ready = StateMask::of(PlayerState::Prepared)
                    .with(PlayerState::Paused)
                    .with(PlayerState::PlaybackCompleted);
                if !ready.contains(peer.shared().state()) {
                    return Err(StatusCode::IllegalState);
                }
                self.engine.set_has_next_player(true);
                self.next_player = Some(id);
            }
        }
        Ok(Reply::ok())
    }

    /// Advance the engine and fold its events into the state machine.
    /// Returns the player to start when playback handed over to it.
    pub(crate) fn poll(&mut self) -> Option<PlayerId> {
        let mut events = std::mem::take(&mut self.events);
        self.engine.poll(&mut events);

        let mut start_next = None;
        for event in events.drain(..) {
            match event {
                EngineEvent::BufferingUpdate(percent) => {
                    if self.shared.state() == PlayerState::Started {
                        self.shared
                            .listeners()
                            .notify_buffering_update(self.shared.id, percent);
                    }
                }
                EngineEvent::PlaybackCompleted(kind) => {
                    if let Some(next) = self.on_playback_completed(kind) {
                        start_next = Some(next);
                    }
                }
                EngineEvent::PrepareCompleted(result) => self.on_prepare_completed(result),
                EngineEvent::SeekCompleted(result) => self.on_seek_completed(result),
                EngineEvent::Info { what, extra } => {
                    self.shared.listeners().notify_info(self.shared.id, what, extra);
                }
            }
        }

        self.events = events;
        start_next
    }

    fn on_playback_completed(&mut self, kind: CompletionKind) -> Option<PlayerId> {
        let playing = StateMask::of(PlayerState::Started).with(PlayerState::Paused);
        if !playing.contains(self.shared.state()) {
            return None;
        }

        match kind {
            CompletionKind::Normal | CompletionKind::StartNextPlayer => {
                self.shared.set_state(PlayerState::PlaybackCompleted);
                self.shared.listeners().notify_completion(self.shared.id);
                if kind == CompletionKind::StartNextPlayer {
                    self.next_player
                } else {
                    None
                }
            }
            CompletionKind::Looped => {
                self.shared.listeners().notify_seek_complete(self.shared.id);
                None
            }
        }
    }

    fn on_prepare_completed(&mut self, result: Result<()>) {
        let state = self.shared.state();
        if !StateMask::PREPARING.contains(state) {
            log::error!("Player {}: prepare completed in state {:?}", self.shared.id, state);
            self.shared.raise_error(error_what::UNKNOWN_ERROR, 0);
            return;
        }

        let status = match result {
            Ok(()) => {
                self.shared.set_state(PlayerState::Prepared);
                self.shared.listeners().notify_prepared(self.shared.id);
                StatusCode::Success
            }
            Err(e) => {
                log::error!("Player {}: prepare failed: {}", self.shared.id, e);
                self.shared
                    .raise_error(error_what::INVALID_OPERATION, StatusCode::from(&e).code());
                StatusCode::InternalError
            }
        };

        if let Some(waiter) = self.pending_prepare.take() {
            waiter.respond_status(status);
        }
    }

    fn on_seek_completed(&mut self, result: Result<()>) {
        match result {
            Ok(()) => self.shared.listeners().notify_seek_complete(self.shared.id),
            Err(e) => {
                log::error!("Player {}: seek failed: {}", self.shared.id, e);
                self.shared
                    .raise_error(error_what::INVALID_OPERATION, StatusCode::from(&e).code());
            }
        }
    }

    /// The previous player of a chain finished and hands over to this one
    pub(crate) fn start_as_next_player(&mut self) {
        let ready = StateMask::of(PlayerState::Prepared)
            .with(PlayerState::Paused)
            .with(PlayerState::PlaybackCompleted);
        if !ready.contains(self.shared.state()) {
            return;
        }

        match self.engine.start() {
            Ok(()) => {
                log::debug!("Player {} started as next player", self.shared.id);
                self.shared.set_state(PlayerState::Started);
            }
            Err(e) => {
                let status = StatusCode::from(&e);
                self.shared.raise_error(translate_to_error_what(status), 0);
            }
        }
    }
}

/// Media player bound to a `PlayerContext`
pub struct MediaPlayer {
    context: Arc<PlayerContext>,
    shared: Arc<PlayerShared>,
}

impl MediaPlayer {
    /// Create a player in state `Created`
    pub fn new(context: &Arc<PlayerContext>) -> Self {
        let id = NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Player {} created", id);
        Self {
            context: Arc::clone(context),
            shared: Arc::new(PlayerShared::new(id)),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.shared.id
    }

    pub fn state(&self) -> PlayerState {
        self.shared.state()
    }

    pub fn context(&self) -> &Arc<PlayerContext> {
        &self.context
    }

    /// Register with the internal thread and create the engine
    pub fn initialize(&self, args: InitializeArgs) -> PlayerResult {
        match self.state() {
            PlayerState::Created => {}
            PlayerState::End => return Err(StatusCode::InvalidHandle),
            state => {
                log::error!("Player {}: initialize called in state {:?}", self.id(), state);
                return Err(StatusCode::IllegalState);
            }
        }

        let (responder, waiter) = reply_channel();
        let reply = self.context.post_and_wait(
            ContextMessage::Register {
                shared: Arc::clone(&self.shared),
                use_fade: args.use_fade,
                responder,
            },
            waiter,
        );

        if let Err(status) = reply.status.into_result() {
            log::error!("Player {}: initialize failed: {}", self.id(), status);
            if status == StatusCode::TimedOut {
                // registration may still go through later
                let _ = self.context.post(ContextMessage::Unregister {
                    id: self.id(),
                    responder: None,
                });
            }
            self.shared.set_state(PlayerState::End);
            return Err(status);
        }

        log::info!("Player {} initialized (fade: {})", self.id(), args.use_fade);
        Ok(())
    }

    /// Unregister from the internal thread and drop the engine.
    /// Always succeeds and may be called repeatedly.
    pub fn release(&self) -> PlayerResult {
        match self.state() {
            PlayerState::End => return Ok(()),
            PlayerState::Created => {}
            _ => {
                let id = self.id();
                if self.context.is_internal_thread() {
                    let _ = self.context.post(ContextMessage::Unregister { id, responder: None });
                } else {
                    let (responder, waiter) = reply_channel();
                    let reply = self.context.post_and_wait(
                        ContextMessage::Unregister {
                            id,
                            responder: Some(responder),
                        },
                        waiter,
                    );
                    if reply.status != StatusCode::Success {
                        log::warn!("Player {}: unregister returned {}", id, reply.status);
                    }
                }
            }
        }

        self.shared.update_listeners(ListenerSet::clear);
        self.shared.set_state(PlayerState::End);
        log::info!("Player {} released", self.id());
        Ok(())
    }

    pub fn set_data_source_path(&self, path: &str) -> PlayerResult {
        self.check_handle()?;
        if path.is_empty() {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetDataSourcePath(path.to_string())).map(|_| ())
    }

    pub fn set_data_source_uri(&self, uri: &str) -> PlayerResult {
        self.check_handle()?;
        if uri.is_empty() {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetDataSourceUri(uri.to_string())).map(|_| ())
    }

    pub fn set_data_source_fd(&self, fd: i32) -> PlayerResult {
        self.check_handle()?;
        if fd < 0 {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetDataSourceFd(fd)).map(|_| ())
    }

    pub fn set_data_source_fd_range(&self, fd: i32, offset: i64, length: i64) -> PlayerResult {
        self.check_handle()?;
        if fd < 0 || offset < 0 || length < 0 {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetDataSourceFdRange { fd, offset, length })
            .map(|_| ())
    }

    /// Prepare synchronously: blocks until preparation finished
    pub fn prepare(&self) -> PlayerResult {
        self.check_handle()?;
        self.check_state(Operation::Prepare)?;

        let (completion, prepared) = reply_channel();
        self.send(Request::Prepare { completion }).status.into_result()?;

        prepared
            .wait(self.context.options().prepare_timeout)
            .status
            .into_result()
    }

    /// Start preparing without waiting. The outcome is reported through the
    /// prepared or error listener.
    pub fn prepare_async(&self) -> PlayerResult {
        self.check_handle()?;
        self.check_state(Operation::PrepareAsync)?;
        self.context.post(ContextMessage::Player {
            id: self.id(),
            message: Message::oneway(Request::PrepareAsync),
        })
    }

    pub fn start(&self) -> PlayerResult {
        self.check_handle()?;
        self.call(Request::Start).map(|_| ())
    }

    pub fn stop(&self) -> PlayerResult {
        self.check_handle()?;
        self.call(Request::Stop).map(|_| ())
    }

    pub fn pause(&self) -> PlayerResult {
        self.check_handle()?;
        self.call(Request::Pause).map(|_| ())
    }

    pub fn reset(&self) -> PlayerResult {
        self.check_handle()?;
        self.call(Request::Reset).map(|_| ())
    }

    pub fn set_volume(&self, left: f32, right: f32) -> PlayerResult {
        self.check_handle()?;
        if !is_valid_level(left) || !is_valid_level(right) {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetVolume { left, right }).map(|_| ())
    }

    /// Duration in milliseconds
    pub fn duration(&self) -> PlayerResult<i32> {
        self.check_handle()?;
        self.call(Request::GetDuration)?.into_int()
    }

    /// Playback position in milliseconds
    pub fn current_position(&self) -> PlayerResult<i32> {
        self.check_handle()?;
        self.call(Request::GetCurrentPosition)?.into_int()
    }

    pub fn seek_to(&self, msec: i32) -> PlayerResult {
        self.check_handle()?;
        if msec < 0 {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SeekTo { msec }).map(|_| ())
    }

    pub fn set_looping(&self, looping: bool) -> PlayerResult {
        self.check_handle()?;
        self.call(Request::SetLooping(looping)).map(|_| ())
    }

    pub fn is_looping(&self) -> PlayerResult<bool> {
        self.check_handle()?;
        self.call(Request::IsLooping)?.into_bool()
    }

    pub fn is_playing(&self) -> PlayerResult<bool> {
        self.check_handle()?;
        self.call(Request::IsPlaying)?.into_bool()
    }

    pub fn set_audio_stream_type(&self, stream_type: i32) -> PlayerResult {
        self.check_handle()?;
        if !stream_type::is_valid(stream_type) {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetAudioStreamType(stream_type)).map(|_| ())
    }

    /// Chain `next` to start when this player completes; `None` clears it
    pub fn set_next_media_player(&self, next: Option<&MediaPlayer>) -> PlayerResult {
        self.check_handle()?;
        let next_id = match next {
            None => None,
            Some(next) => {
                if next.id() == self.id() || !Arc::ptr_eq(&next.context, &self.context) {
                    return Err(StatusCode::IllegalArgument);
                }
                match next.state() {
                    PlayerState::End => return Err(StatusCode::InvalidHandle),
                    PlayerState::Created => return Err(StatusCode::IllegalState),
                    _ => Some(next.id()),
                }
            }
        };
        self.call(Request::SetNextMediaPlayer(next_id)).map(|_| ())
    }

    pub fn attach_aux_effect(&self, effect_id: i32) -> PlayerResult {
        self.check_handle()?;
        if !aux_effect::is_valid(effect_id) {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::AttachAuxEffect(effect_id)).map(|_| ())
    }

    pub fn set_aux_effect_send_level(&self, level: f32) -> PlayerResult {
        self.check_handle()?;
        if !is_valid_level(level) {
            return Err(StatusCode::IllegalArgument);
        }
        self.call(Request::SetAuxEffectSendLevel(level)).map(|_| ())
    }

    pub fn set_on_completion_listener(
        &self,
        listener: Option<&Arc<dyn OnCompletionListener>>,
    ) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_completion(listener));
        Ok(())
    }

    pub fn set_on_prepared_listener(
        &self,
        listener: Option<&Arc<dyn OnPreparedListener>>,
    ) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_prepared(listener));
        Ok(())
    }

    pub fn set_on_seek_complete_listener(
        &self,
        listener: Option<&Arc<dyn OnSeekCompleteListener>>,
    ) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_seek_complete(listener));
        Ok(())
    }

    pub fn set_on_buffering_update_listener(
        &self,
        listener: Option<&Arc<dyn OnBufferingUpdateListener>>,
    ) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_buffering_update(listener));
        Ok(())
    }

    pub fn set_on_info_listener(&self, listener: Option<&Arc<dyn OnInfoListener>>) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_info(listener));
        Ok(())
    }

    pub fn set_on_error_listener(
        &self,
        listener: Option<&Arc<dyn OnErrorListener>>,
    ) -> PlayerResult {
        self.check_alive()?;
        self.shared.update_listeners(|set| set.set_error(listener));
        Ok(())
    }

    /// Only legal before `initialize()`
    pub fn set_internal_thread_event_listener(
        &self,
        listener: Option<&Arc<dyn InternalThreadEventListener>>,
    ) -> PlayerResult {
        match self.state() {
            PlayerState::Created => {
                self.shared.update_listeners(|set| set.set_internal_thread(listener));
                Ok(())
            }
            PlayerState::End => Err(StatusCode::InvalidHandle),
            _ => Err(StatusCode::IllegalState),
        }
    }

    fn check_alive(&self) -> PlayerResult {
        if self.state() == PlayerState::End {
            Err(StatusCode::InvalidHandle)
        } else {
            Ok(())
        }
    }

    /// Released players are invalid handles; players not yet initialized
    /// accept no operation
    fn check_handle(&self) -> PlayerResult {
        match self.state() {
            PlayerState::End => Err(StatusCode::InvalidHandle),
            PlayerState::Created => Err(StatusCode::IllegalState),
            _ => Ok(()),
        }
    }

    fn check_state(&self, operation: Operation) -> PlayerResult {
        let state = self.state();
        if check_state_mask(state, operation.allowed_states()) {
            Ok(())
        } else {
            log_illegal_state(self.id(), operation, state);
            Err(illegal_state_status(operation, state))
        }
    }

    /// Check the state, then post `request` and wait for its reply
    fn call(&self, request: Request) -> PlayerResult<Reply> {
        self.check_state(request.operation())?;
        let reply = self.send(request);
        reply.status.into_result()?;
        Ok(reply)
    }

    fn send(&self, request: Request) -> Reply {
        let (message, waiter) = Message::blocking(request);
        self.context.post_and_wait(
            ContextMessage::Player {
                id: self.id(),
                message,
            },
            waiter,
        )
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

fn is_valid_level(level: f32) -> bool {
    level.is_finite() && level >= 0.0
}
