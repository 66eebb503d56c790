// Single-consumer message loop running on a dedicated thread

use crate::error::{AudioError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Callbacks invoked on the handler thread.
/// All methods run on the handler thread only.
pub trait EventHandler<M>: Send + 'static {
    /// Called once when the thread starts, before any message
    fn on_enter_handler_thread(&mut self) {}

    /// Handle one message. Return `false` to terminate the loop.
    fn on_handle_message(&mut self, message: M) -> bool;

    /// Called when the wait timed out or after a burst of messages.
    /// Return `false` to terminate the loop.
    fn on_receive_message_timeout(&mut self) -> bool {
        true
    }

    /// Called once when the loop ends; `stop_requested` is false if a handler
    /// callback ended it
    fn on_leave_handler_thread(&mut self, _stop_requested: bool) {}

    /// How long to wait for the next message (`None` = until one arrives)
    fn determine_wait_timeout(&mut self) -> Option<Duration> {
        None
    }
}

struct MessageQueue<M> {
    messages: VecDeque<M>,
    stop_requested: bool,
}

struct QueueShared<M> {
    queue: Mutex<MessageQueue<M>>,
    available: Condvar,
}

enum Received<M> {
    Message(M),
    Timeout,
    Stop,
}

impl<M> QueueShared<M> {
    fn receive(&self, timeout: Option<Duration>) -> Received<M> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut queue = self.queue.lock();

        loop {
            if queue.stop_requested {
                return Received::Stop;
            }
            if let Some(message) = queue.messages.pop_front() {
                return Received::Message(message);
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut queue, deadline).timed_out() {
                        if queue.stop_requested {
                            return Received::Stop;
                        }
                        return match queue.messages.pop_front() {
                            Some(message) => Received::Message(message),
                            None => Received::Timeout,
                        };
                    }
                }
                None => self.available.wait(&mut queue),
            }
        }
    }
}

/// Owns the handler thread and its FIFO queue
pub struct MessageHandlerThread<M: Send + 'static> {
    shared: Arc<QueueShared<M>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl<M: Send + 'static> MessageHandlerThread<M> {
    /// Spawn the thread and start handling messages with `handler`.
    ///
    /// After `max_continuous_messages` messages handled back to back the
    /// loop calls `on_receive_message_timeout` even if more are queued.
    pub fn start<H>(name: &str, handler: H, max_continuous_messages: usize) -> Result<Self>
    where
        H: EventHandler<M>,
    {
        let shared = Arc::new(QueueShared {
            queue: Mutex::new(MessageQueue {
                messages: VecDeque::new(),
                stop_requested: false,
            }),
            available: Condvar::new(),
        });

        let loop_shared = Arc::clone(&shared);
        let max_continuous = max_continuous_messages.max(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(loop_shared, handler, max_continuous))
            .map_err(|e| AudioError::ThreadError(format!("Failed to spawn {}: {}", name, e)))?;

        let thread_id = handle.thread().id();
        log::debug!("Handler thread {} started", name);

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    /// Queue a message. Hands it back if the thread is stopping.
    pub fn post(&self, message: M) -> std::result::Result<(), M> {
        let mut queue = self.shared.queue.lock();
        if queue.stop_requested {
            return Err(message);
        }
        queue.messages.push_back(message);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Whether the caller is running on the handler thread
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.queue.lock().stop_requested
    }

    /// Stop the loop, wait for the thread and drop every message still queued
    pub fn join(&self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.stop_requested = true;
            self.shared.available.notify_all();
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if self.is_current_thread() {
                log::warn!("join() called from the handler thread itself, not waiting");
            } else if handle.join().is_err() {
                log::error!("Handler thread panicked");
            }
        }

        let leftover: Vec<M> = self.shared.queue.lock().messages.drain(..).collect();
        if !leftover.is_empty() {
            log::debug!("Dropping {} unhandled message(s)", leftover.len());
        }
        drop(leftover);
    }
}

impl<M: Send + 'static> Drop for MessageHandlerThread<M> {
    fn drop(&mut self) {
        self.join();
    }
}

/// Closes the queue when the loop exits, including by unwinding.
/// Later posts are refused and queued messages are dropped.
struct CloseOnExit<'a, M> {
    shared: &'a QueueShared<M>,
}

impl<M> Drop for CloseOnExit<'_, M> {
    fn drop(&mut self) {
        let leftover: Vec<M> = {
            let mut queue = self.shared.queue.lock();
            queue.stop_requested = true;
            queue.messages.drain(..).collect()
        };
        if thread::panicking() {
            log::error!("Handler thread panicked, {} message(s) dropped", leftover.len());
        } else if !leftover.is_empty() {
            log::debug!("Handler loop ended, {} message(s) dropped", leftover.len());
        }
    }
}

fn run_loop<M, H>(shared: Arc<QueueShared<M>>, mut handler: H, max_continuous: usize)
where
    H: EventHandler<M>,
{
    let _close = CloseOnExit { shared: &shared };
    handler.on_enter_handler_thread();

    let mut continuous = 0;
    let stop_requested = loop {
        let timeout = if continuous >= max_continuous {
            Some(Duration::ZERO)
        } else {
            handler.determine_wait_timeout()
        };

        match shared.receive(timeout) {
            Received::Stop => break true,
            Received::Message(message) if continuous < max_continuous => {
                continuous += 1;
                if !handler.on_handle_message(message) {
                    break false;
                }
            }
            Received::Message(message) => {
                // burst limit reached, poll before handling the next one
                continuous = 0;
                if !handler.on_receive_message_timeout() {
                    drop(message);
                    break false;
                }
                continuous += 1;
                if !handler.on_handle_message(message) {
                    break false;
                }
            }
            Received::Timeout => {
                continuous = 0;
                if !handler.on_receive_message_timeout() {
                    break false;
                }
            }
        }
    };

    handler.on_leave_handler_thread(stop_requested);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Event {
        Enter,
        Message(u32),
        Poll,
        Leave(bool),
    }

    struct Recorder {
        events: mpsc::Sender<Event>,
        poll_interval: Option<Duration>,
    }

    impl EventHandler<u32> for Recorder {
        fn on_enter_handler_thread(&mut self) {
            let _ = self.events.send(Event::Enter);
        }

        fn on_handle_message(&mut self, message: u32) -> bool {
            let _ = self.events.send(Event::Message(message));
            message != 0
        }

        fn on_receive_message_timeout(&mut self) -> bool {
            let _ = self.events.send(Event::Poll);
            true
        }

        fn on_leave_handler_thread(&mut self, stop_requested: bool) {
            let _ = self.events.send(Event::Leave(stop_requested));
        }

        fn determine_wait_timeout(&mut self) -> Option<Duration> {
            self.poll_interval
        }
    }

    fn recorder(poll_interval: Option<Duration>) -> (Recorder, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (
            Recorder {
                events: tx,
                poll_interval,
            },
            rx,
        )
    }

    #[test]
    fn test_messages_are_handled_in_fifo_order() {
        let (handler, rx) = recorder(None);
        let thread = MessageHandlerThread::start("fifo", handler, 64).unwrap();
        for i in 1..=5 {
            thread.post(i).unwrap();
        }
        thread.post(0).unwrap();
        thread.join();

        let events: Vec<Event> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                Event::Enter,
                Event::Message(1),
                Event::Message(2),
                Event::Message(3),
                Event::Message(4),
                Event::Message(5),
                Event::Message(0),
                Event::Leave(false),
            ]
        );
    }

    #[test]
    fn test_timeout_polls_handler() {
        let (handler, rx) = recorder(Some(Duration::from_millis(5)));
        let thread = MessageHandlerThread::start("poll", handler, 4).unwrap();
        thread::sleep(Duration::from_millis(50));
        thread.join();

        let events: Vec<Event> = rx.iter().collect();
        assert_eq!(events.first(), Some(&Event::Enter));
        assert!(events.iter().filter(|e| **e == Event::Poll).count() >= 2);
        assert_eq!(events.last(), Some(&Event::Leave(true)));
    }

    #[test]
    fn test_burst_limit_forces_poll() {
        let (handler, rx) = recorder(None);
        let thread = MessageHandlerThread::start("burst", handler, 2).unwrap();
        {
            // hold the queue so all messages are visible at once
            let mut queue = thread.shared.queue.lock();
            queue.messages.extend([1, 2, 3, 4, 0]);
            thread.shared.available.notify_one();
        }
        let events: Vec<Event> = rx.iter().take_while(|e| *e != Event::Message(0)).collect();
        thread.join();

        assert_eq!(
            events,
            vec![
                Event::Enter,
                Event::Message(1),
                Event::Message(2),
                Event::Poll,
                Event::Message(3),
                Event::Message(4),
                Event::Poll,
            ]
        );
    }

    #[test]
    fn test_post_after_join_is_rejected() {
        let (handler, _rx) = recorder(None);
        let thread = MessageHandlerThread::start("closed", handler, 4).unwrap();
        thread.join();
        assert!(thread.is_stop_requested());
        assert_eq!(thread.post(7), Err(7));
    }

    #[test]
    fn test_handler_ending_the_loop_closes_the_queue() {
        let (handler, rx) = recorder(None);
        let thread = MessageHandlerThread::start("ended", handler, 4).unwrap();
        thread.post(0).unwrap();

        let events: Vec<Event> = rx.iter().take(3).collect();
        assert_eq!(events, vec![Event::Enter, Event::Message(0), Event::Leave(false)]);

        wait_for_stop(&thread);
        assert_eq!(thread.post(3), Err(3));
    }

    struct Panicking;

    impl EventHandler<u32> for Panicking {
        fn on_handle_message(&mut self, message: u32) -> bool {
            if message == 13 {
                panic!("handler failed on {}", message);
            }
            true
        }
    }

    #[test]
    fn test_panicking_handler_closes_the_queue() {
        let thread = MessageHandlerThread::start("panicking", Panicking, 4).unwrap();
        thread.post(1).unwrap();
        thread.post(13).unwrap();

        wait_for_stop(&thread);
        assert_eq!(thread.post(2), Err(2));
        thread.join();
    }

    fn wait_for_stop<M: Send + 'static>(thread: &MessageHandlerThread<M>) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !thread.is_stop_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(thread.is_stop_requested());
    }

    #[test]
    fn test_is_current_thread() {
        let (handler, _rx) = recorder(None);
        let thread = MessageHandlerThread::start("current", handler, 4).unwrap();
        assert!(!thread.is_current_thread());
    }
}
