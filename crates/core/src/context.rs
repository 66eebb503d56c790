// Shared player context: owns the internal thread that drives every engine
//
// Engines live on the internal thread only. Client threads reach them by
// posting messages; results come back through per-message reply slots.

use crate::config::ContextOptions;
use crate::engine::EngineFactory;
use crate::error::{AudioError, Result};
use crate::handler_thread::{EventHandler, MessageHandlerThread};
use crate::message::{Message, PlayerId, Reply};
use crate::player::{PlayerShared, PlayerWorker};
use crate::protocol::{ReplyWaiter, Responder};
use crate::status::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Attachment of the internal thread to a host runtime (e.g. a VM).
///
/// Called on the internal thread when it starts and before it exits.
pub trait HostThreadHooks: Send + Sync {
    /// Return `false` if the thread could not be attached
    fn attach_current_thread(&self) -> bool;

    fn detach_current_thread(&self);
}

pub(crate) enum ContextMessage {
    Register {
        shared: Arc<PlayerShared>,
        use_fade: bool,
        responder: Responder,
    },
    Unregister {
        id: PlayerId,
        responder: Option<Responder>,
    },
    Player {
        id: PlayerId,
        message: Message,
    },
}

/// Context shared by all players created on it
pub struct PlayerContext {
    thread: MessageHandlerThread<ContextMessage>,
    options: ContextOptions,
}

impl PlayerContext {
    pub fn builder() -> PlayerContextBuilder {
        PlayerContextBuilder::default()
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Whether the caller is the internal thread
    pub fn is_internal_thread(&self) -> bool {
        self.thread.is_current_thread()
    }

    pub fn is_shut_down(&self) -> bool {
        self.thread.is_stop_requested()
    }

    /// Stop the internal thread. Every engine is dropped on it and every
    /// caller still waiting receives `DeadObject`.
    pub fn shutdown(&self) {
        if !self.thread.is_stop_requested() {
            log::info!("Shutting down player context");
        }
        self.thread.join();
    }

    pub(crate) fn post(&self, message: ContextMessage) -> std::result::Result<(), StatusCode> {
        self.thread.post(message).map_err(|rejected| {
            log::warn!("Context is shut down, message dropped");
            drop(rejected);
            StatusCode::DeadObject
        })
    }

    /// Post a message and block until its result is published.
    ///
    /// Refused with `IllegalState` on the internal thread, which would
    /// otherwise wait on itself.
    pub(crate) fn post_and_wait(&self, message: ContextMessage, waiter: ReplyWaiter) -> Reply {
        if self.is_internal_thread() {
            log::error!("Blocking call issued from the internal thread");
            return Reply::from_status(StatusCode::IllegalState);
        }
        if let Err(status) = self.post(message) {
            return Reply::from_status(status);
        }
        waiter.wait(self.options.message_timeout)
    }
}

impl Drop for PlayerContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PlayerContext")
            .field("options", &self.options)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[derive(Default)]
pub struct PlayerContextBuilder {
    factory: Option<Arc<dyn EngineFactory>>,
    hooks: Option<Arc<dyn HostThreadHooks>>,
    options: ContextOptions,
}

impl PlayerContextBuilder {
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn host_hooks(mut self, hooks: Arc<dyn HostThreadHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the internal thread
    pub fn build(self) -> Result<Arc<PlayerContext>> {
        let factory = self
            .factory
            .ok_or_else(|| AudioError::InitializationError("No engine factory".to_string()))?;

        let handler = ContextHandler {
            factory,
            hooks: self.hooks,
            attached: false,
            workers: HashMap::new(),
        };
        let thread = MessageHandlerThread::start(
            &self.options.thread_name,
            handler,
            self.options.max_continuous_messages,
        )?;

        log::info!("Player context created ({})", self.options.thread_name);
        Ok(Arc::new(PlayerContext {
            thread,
            options: self.options,
        }))
    }
}

/// Internal-thread side of the context
struct ContextHandler {
    factory: Arc<dyn EngineFactory>,
    hooks: Option<Arc<dyn HostThreadHooks>>,
    attached: bool,
    workers: HashMap<PlayerId, PlayerWorker>,
}

impl ContextHandler {
    fn register(&mut self, shared: Arc<PlayerShared>, use_fade: bool, responder: Responder) {
        let id = shared.id();
        if self.workers.contains_key(&id) {
            responder.respond_status(StatusCode::IllegalState);
            return;
        }
        match self.factory.create_engine() {
            Ok(engine) => {
                let worker = PlayerWorker::new(shared, engine, use_fade);
                worker.on_enter();
                self.workers.insert(id, worker);
                log::debug!("Player {} registered", id);
                responder.respond(Reply::ok());
            }
            Err(e) => {
                log::error!("Failed to create engine for player {}: {}", id, e);
                responder.respond_status(StatusCode::from(&e));
            }
        }
    }

    fn unregister(&mut self, id: PlayerId, responder: Option<Responder>) {
        if let Some(worker) = self.workers.remove(&id) {
            worker.on_leave();
            drop(worker);
            log::debug!("Player {} unregistered", id);
        }
        Message::reply(responder, Reply::ok());
    }

    fn dispatch(&mut self, id: PlayerId, message: Message) {
        // take the worker out so it can inspect its peers
        match self.workers.remove(&id) {
            Some(mut worker) => {
                worker.handle_message(message, &self.workers);
                self.workers.insert(id, worker);
            }
            None => {
                log::warn!("Message for unregistered player {}", id);
                Message::reply(message.responder, Reply::from_status(StatusCode::InvalidHandle));
            }
        }
    }

    fn poll_engines(&mut self) {
        let mut next_players = Vec::new();
        for worker in self.workers.values_mut() {
            if let Some(next) = worker.poll() {
                next_players.push(next);
            }
        }
        for next in next_players {
            self.start_next_player(next);
        }
    }

    fn start_next_player(&mut self, next: PlayerId) {
        match self.workers.get_mut(&next) {
            Some(worker) => worker.start_as_next_player(),
            None => log::warn!("Next player {} is no longer registered", next),
        }
    }
}

impl EventHandler<ContextMessage> for ContextHandler {
    fn on_enter_handler_thread(&mut self) {
        if let Some(hooks) = &self.hooks {
            self.attached = hooks.attach_current_thread();
            if !self.attached {
                log::error!("Failed to attach internal thread to host runtime");
            }
        }
        log::debug!("Internal thread entered");
    }

    fn on_handle_message(&mut self, message: ContextMessage) -> bool {
        match message {
            ContextMessage::Register {
                shared,
                use_fade,
                responder,
            } => self.register(shared, use_fade, responder),
            ContextMessage::Unregister { id, responder } => self.unregister(id, responder),
            ContextMessage::Player { id, message } => self.dispatch(id, message),
        }
        true
    }

    fn on_receive_message_timeout(&mut self) -> bool {
        self.poll_engines();
        true
    }

    fn on_leave_handler_thread(&mut self, stop_requested: bool) {
        log::debug!(
            "Internal thread leaving (stop requested: {}), {} player(s) still registered",
            stop_requested,
            self.workers.len()
        );
        for (_, worker) in self.workers.drain() {
            worker.on_leave();
        }
        if self.attached {
            if let Some(hooks) = &self.hooks {
                hooks.detach_current_thread();
            }
            self.attached = false;
        }
    }

    fn determine_wait_timeout(&mut self) -> Option<Duration> {
        self.workers
            .values()
            .filter_map(PlayerWorker::next_poll_delay)
            .min()
    }
}
