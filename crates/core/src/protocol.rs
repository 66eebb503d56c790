// Result-wait protocol between a blocked caller and the internal thread
//
// Every blocking message owns its own reply slot, so publishing a result wakes
// exactly the caller that posted it.

use crate::message::Reply;
use crate::status::StatusCode;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct ReplySlot {
    reply: Mutex<Option<Reply>>,
    published: Condvar,
}

impl ReplySlot {
    fn publish(&self, reply: Reply) {
        let mut slot = self.reply.lock();
        if slot.is_none() {
            *slot = Some(reply);
            self.published.notify_all();
        }
    }
}

/// Create a connected responder/waiter pair for one message
pub fn reply_channel() -> (Responder, ReplyWaiter) {
    let slot = Arc::new(ReplySlot {
        reply: Mutex::new(None),
        published: Condvar::new(),
    });
    (
        Responder {
            slot: Some(Arc::clone(&slot)),
        },
        ReplyWaiter { slot },
    )
}

/// Sending half, held by whoever processes the message.
///
/// Dropping a responder that was never used publishes `DeadObject`.
pub struct Responder {
    slot: Option<Arc<ReplySlot>>,
}

impl Responder {
    /// Publish the result and wake the waiter
    pub fn respond(mut self, reply: Reply) {
        if let Some(slot) = self.slot.take() {
            slot.publish(reply);
        }
    }

    /// Publish a bare status
    pub fn respond_status(self, status: StatusCode) {
        self.respond(Reply::from_status(status));
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            log::debug!("Message dropped without reply, resolving waiter with DeadObject");
            slot.publish(Reply::from_status(StatusCode::DeadObject));
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.slot.is_some())
            .finish()
    }
}

/// Receiving half, held by the blocked caller
pub struct ReplyWaiter {
    slot: Arc<ReplySlot>,
}

impl ReplyWaiter {
    /// Block until the result is published.
    ///
    /// Returns a `TimedOut` reply if `timeout` elapses first.
    pub fn wait(self, timeout: Option<Duration>) -> Reply {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut reply = self.slot.reply.lock();

        loop {
            if let Some(result) = reply.take() {
                return result;
            }
            match deadline {
                Some(deadline) => {
                    if self.slot.published.wait_until(&mut reply, deadline).timed_out() {
                        return reply
                            .take()
                            .unwrap_or_else(|| Reply::from_status(StatusCode::TimedOut));
                    }
                }
                None => self.slot.published.wait(&mut reply),
            }
        }
    }

    /// Whether a result has been published
    pub fn is_ready(&self) -> bool {
        self.slot.reply.lock().is_some()
    }
}

impl fmt::Debug for ReplyWaiter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReplyWaiter")
            .field("ready", &self.is_ready())
            .finish()
    }
}
