// Player event listeners
//
// Listeners are held weakly: the player never keeps an observer alive, and a
// dropped observer is skipped silently.

use crate::message::PlayerId;
use std::sync::{Arc, Weak};

/// Implementations should be lightweight and non-blocking;
/// they run on the internal thread or on the calling thread.
pub trait OnCompletionListener: Send + Sync {
    fn on_completion(&self, player: PlayerId);
}

pub trait OnPreparedListener: Send + Sync {
    fn on_prepared(&self, player: PlayerId);
}

pub trait OnSeekCompleteListener: Send + Sync {
    fn on_seek_complete(&self, player: PlayerId);
}

pub trait OnBufferingUpdateListener: Send + Sync {
    fn on_buffering_update(&self, player: PlayerId, percent: i32);
}

/// Returns `true` if the info was handled
pub trait OnInfoListener: Send + Sync {
    fn on_info(&self, player: PlayerId, what: i32, extra: i32) -> bool;
}

/// Returns `true` if the error was handled. An unhandled error is followed
/// by an `on_completion` call. The player enters `Error` either way.
pub trait OnErrorListener: Send + Sync {
    fn on_error(&self, player: PlayerId, what: i32, extra: i32) -> bool;
}

/// Notified when a player starts or stops being driven by the internal thread
pub trait InternalThreadEventListener: Send + Sync {
    fn on_enter_internal_thread(&self, player: PlayerId);
    fn on_leave_internal_thread(&self, player: PlayerId);
}

impl<F: Fn(PlayerId) + Send + Sync> OnCompletionListener for F {
    fn on_completion(&self, player: PlayerId) {
        self(player)
    }
}

impl<F: Fn(PlayerId) + Send + Sync> OnPreparedListener for F {
    fn on_prepared(&self, player: PlayerId) {
        self(player)
    }
}

impl<F: Fn(PlayerId) + Send + Sync> OnSeekCompleteListener for F {
    fn on_seek_complete(&self, player: PlayerId) {
        self(player)
    }
}

impl<F: Fn(PlayerId, i32) + Send + Sync> OnBufferingUpdateListener for F {
    fn on_buffering_update(&self, player: PlayerId, percent: i32) {
        self(player, percent)
    }
}

impl<F: Fn(PlayerId, i32, i32) -> bool + Send + Sync> OnInfoListener for F {
    fn on_info(&self, player: PlayerId, what: i32, extra: i32) -> bool {
        self(player, what, extra)
    }
}

impl<F: Fn(PlayerId, i32, i32) -> bool + Send + Sync> OnErrorListener for F {
    fn on_error(&self, player: PlayerId, what: i32, extra: i32) -> bool {
        self(player, what, extra)
    }
}

/// At most one listener per category
#[derive(Clone, Default)]
pub struct ListenerSet {
    completion: Option<Weak<dyn OnCompletionListener>>,
    prepared: Option<Weak<dyn OnPreparedListener>>,
    seek_complete: Option<Weak<dyn OnSeekCompleteListener>>,
    buffering_update: Option<Weak<dyn OnBufferingUpdateListener>>,
    info: Option<Weak<dyn OnInfoListener>>,
    error: Option<Weak<dyn OnErrorListener>>,
    internal_thread: Option<Weak<dyn InternalThreadEventListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_completion(&mut self, listener: Option<&Arc<dyn OnCompletionListener>>) {
        self.completion = listener.map(Arc::downgrade);
    }

    pub fn set_prepared(&mut self, listener: Option<&Arc<dyn OnPreparedListener>>) {
        self.prepared = listener.map(Arc::downgrade);
    }

    pub fn set_seek_complete(&mut self, listener: Option<&Arc<dyn OnSeekCompleteListener>>) {
        self.seek_complete = listener.map(Arc::downgrade);
    }

    pub fn set_buffering_update(&mut self, listener: Option<&Arc<dyn OnBufferingUpdateListener>>) {
        self.buffering_update = listener.map(Arc::downgrade);
    }

    pub fn set_info(&mut self, listener: Option<&Arc<dyn OnInfoListener>>) {
        self.info = listener.map(Arc::downgrade);
    }

    pub fn set_error(&mut self, listener: Option<&Arc<dyn OnErrorListener>>) {
        self.error = listener.map(Arc::downgrade);
    }

    pub fn set_internal_thread(&mut self, listener: Option<&Arc<dyn InternalThreadEventListener>>) {
        self.internal_thread = listener.map(Arc::downgrade);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn notify_completion(&self, player: PlayerId) {
        if let Some(listener) = self.completion.as_ref().and_then(Weak::upgrade) {
            listener.on_completion(player);
        }
    }

    pub fn notify_prepared(&self, player: PlayerId) {
        if let Some(listener) = self.prepared.as_ref().and_then(Weak::upgrade) {
            listener.on_prepared(player);
        }
    }

    pub fn notify_seek_complete(&self, player: PlayerId) {
        if let Some(listener) = self.seek_complete.as_ref().and_then(Weak::upgrade) {
            listener.on_seek_complete(player);
        }
    }

    pub fn notify_buffering_update(&self, player: PlayerId, percent: i32) {
        if let Some(listener) = self.buffering_update.as_ref().and_then(Weak::upgrade) {
            listener.on_buffering_update(player, percent);
        }
    }

    /// `false` when no live listener handled it
    pub fn notify_info(&self, player: PlayerId, what: i32, extra: i32) -> bool {
        self.info
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|listener| listener.on_info(player, what, extra))
            .unwrap_or(false)
    }

    /// `false` when no live listener handled it
    pub fn notify_error(&self, player: PlayerId, what: i32, extra: i32) -> bool {
        self.error
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|listener| listener.on_error(player, what, extra))
            .unwrap_or(false)
    }

    pub fn notify_enter_internal_thread(&self, player: PlayerId) {
        if let Some(listener) = self.internal_thread.as_ref().and_then(Weak::upgrade) {
            listener.on_enter_internal_thread(player);
        }
    }

    pub fn notify_leave_internal_thread(&self, player: PlayerId) {
        if let Some(listener) = self.internal_thread.as_ref().and_then(Weak::upgrade) {
            listener.on_leave_internal_thread(player);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_listener_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let listener: Arc<dyn OnCompletionListener> = Arc::new(move |_player: PlayerId| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut set = ListenerSet::new();
        set.set_completion(Some(&listener));
        set.notify_completion(1);
        set.notify_completion(1);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_listener_is_skipped() {
        let mut set = ListenerSet::new();
        {
            let listener: Arc<dyn OnErrorListener> =
                Arc::new(|_player: PlayerId, _what: i32, _extra: i32| true);
            set.set_error(Some(&listener));
            assert!(set.notify_error(1, 0, 0));
        }
        assert!(!set.notify_error(1, 0, 0));
    }

    #[test]
    fn test_last_write_wins_and_none_clears() {
        let first: Arc<dyn OnInfoListener> = Arc::new(|_p: PlayerId, _w: i32, _e: i32| false);
        let second: Arc<dyn OnInfoListener> = Arc::new(|_p: PlayerId, _w: i32, _e: i32| true);

        let mut set = ListenerSet::new();
        set.set_info(Some(&first));
        assert!(!set.notify_info(1, 0, 0));
        set.set_info(Some(&second));
        assert!(set.notify_info(1, 0, 0));
        set.set_info(None);
        assert!(!set.notify_info(1, 0, 0));
    }

    #[test]
    fn test_set_does_not_keep_listener_alive() {
        let listener: Arc<dyn OnPreparedListener> = Arc::new(|_player: PlayerId| {});
        let mut set = ListenerSet::new();
        set.set_prepared(Some(&listener));
        let snapshot = set.clone();
        assert_eq!(Arc::strong_count(&listener), 1);
        drop(snapshot);
    }
}
