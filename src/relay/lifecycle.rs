//! Subscription records and the relay-level terminal latch.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::Shared;
use crate::subscriber::{Subscriber, Terminal};
use crate::{Result, SluiceError};

pub(crate) type SharedSubscriber<T, E> = Arc<Mutex<Box<dyn Subscriber<T, E>>>>;

/// Where the relay is in its subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Live,
    Cancelled,
    Terminated,
}

/// Outcome of attaching a subscriber.
pub(crate) enum Begin<E> {
    /// A fresh live subscription; the source must be (re)wired.
    Live { id: u64 },
    /// The stream already ended; the subscriber only gets the terminal.
    Replay { id: u64, terminal: Terminal<E> },
}

struct Record<T, E> {
    id: u64,
    subscriber: SharedSubscriber<T, E>,
}

/// Single-subscriber lifecycle.
///
/// The terminal signal is kept here rather than per subscription, so that
/// subscribers attaching after the end still observe it.
pub(crate) struct Lifecycle<T, E> {
    next_id: u64,
    current: Option<Record<T, E>>,
    phase: Phase,
    latched: Option<Terminal<E>>,
}

impl<T, E: Clone> Lifecycle<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            current: None,
            phase: Phase::Idle,
            latched: None,
        }
    }

    pub(crate) fn begin(&mut self, subscriber: SharedSubscriber<T, E>) -> Result<Begin<E>> {
        if self.current.is_some() {
            return Err(SluiceError::AlreadySubscribed);
        }
        let id = self.next_id;
        self.next_id += 1;

        if let Some(terminal) = &self.latched {
            self.phase = Phase::Terminated;
            return Ok(Begin::Replay {
                id,
                terminal: terminal.clone(),
            });
        }

        self.current = Some(Record { id, subscriber });
        self.phase = Phase::Live;
        Ok(Begin::Live { id })
    }

    /// Drop the live record if `id` is current. Returns whether it was.
    pub(crate) fn cancel(&mut self, id: u64) -> bool {
        if !self.is_live(id) {
            return false;
        }
        self.current = None;
        self.phase = Phase::Cancelled;
        true
    }

    /// The terminal was handed to the live subscriber.
    pub(crate) fn finish(&mut self) {
        self.current = None;
        self.phase = Phase::Terminated;
    }

    /// Record the source's terminal signal. The first one wins.
    pub(crate) fn latch(&mut self, terminal: &Terminal<E>) -> bool {
        if self.latched.is_some() {
            return false;
        }
        self.latched = Some(terminal.clone());
        true
    }
}

impl<T, E> Lifecycle<T, E> {
    pub(crate) fn is_live(&self, id: u64) -> bool {
        self.current.as_ref().is_some_and(|r| r.id == id)
    }

    pub(crate) fn live(&self) -> Option<(u64, SharedSubscriber<T, E>)> {
        self.current
            .as_ref()
            .map(|r| (r.id, Arc::clone(&r.subscriber)))
    }

    pub(crate) fn current_id(&self) -> Option<u64> {
        self.current.as_ref().map(|r| r.id)
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }
}

/// Handle for one subscription: signal demand or cancel.
///
/// Cheap to clone. All methods are safe to call from inside subscriber
/// callbacks and from other threads. Once the relay is gone, or the
/// subscription is cancelled or terminated, `request` and `cancel` are
/// no-ops.
pub struct Subscription<T, E> {
    pub(super) id: u64,
    pub(super) relay: Weak<Shared<T, E>>,
}

impl<T, E> Clone for Subscription<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            relay: Weak::clone(&self.relay),
        }
    }
}

impl<T, E> fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<T, E> Subscription<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ask for `n` more items. `n == 0` is a protocol violation and is
    /// rejected without touching the relay.
    pub fn request(&self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(SluiceError::InvalidDemand { requested: n });
        }
        match self.relay.upgrade() {
            Some(shared) => shared.request(self.id, n),
            None => Ok(()),
        }
    }

    /// Stop receiving. Idempotent. When called outside a delivery, no
    /// callback for this subscription fires after it returns.
    pub fn cancel(&self) {
        if let Some(shared) = self.relay.upgrade() {
            shared.cancel(self.id);
        }
    }

    /// Whether this subscription no longer receives items (cancelled,
    /// terminated, or replay-only).
    pub fn is_cancelled(&self) -> bool {
        match self.relay.upgrade() {
            Some(shared) => !shared.is_live(self.id),
            None => true,
        }
    }
}
