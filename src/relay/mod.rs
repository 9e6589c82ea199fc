//! Push-to-pull relay with backpressure.
//!
//! A [`Relay`] sits between a push-based [`ReadStream`] and a demand-driven
//! [`Subscriber`]. It never hands the subscriber more items than requested,
//! buffers the rest, and pauses the source once the backlog beyond
//! outstanding demand reaches the configured high-water mark. The source is
//! resumed when the backlog has been drained.
//!
//! # Delivery loop
//!
//! Every event (item, end, failure, request, cancel, subscribe) records its
//! effect on the relay state under one mutex and then runs the drain loop.
//! The loop picks the next action under the lock and performs it with the
//! lock released:
//!
//! ```text
//!   source ──item/end/fail──┐                 ┌──► on_subscribe / on_next
//!                           ▼                 │    on_complete / on_error
//!   request(n) ───────► [ State ] ──next_action──►
//!   cancel()   ───────►   buffer              │
//!   subscribe()───────►   demand              └──► pause() / resume()
//!                         controller               wire / unwire handlers
//!                         lifecycle
//! ```
//!
//! Only one caller runs the loop at a time. Re-entrant calls (a subscriber
//! requesting from `on_next`, a source emitting from inside `resume()`) and
//! calls from other threads find the loop busy, leave their effect in the
//! state and return; the running loop picks it up. Callbacks are therefore
//! serialized and delivered in arrival order, and nothing recurses.
//!
//! Terminal signals are not demand-gated: once every preceding item has
//! been delivered, `on_complete`/`on_error` fires even with zero demand.

pub mod buffer;
pub mod controller;
pub mod demand;
mod lifecycle;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

pub use buffer::{Entry, RelayBuffer};
pub use controller::{SourceCommand, SourceController};
pub use demand::{Demand, UNBOUNDED};
pub use lifecycle::Subscription;

use lifecycle::{Begin, Lifecycle, Phase, SharedSubscriber};

use crate::config::RelayConfig;
use crate::source::ReadStream;
use crate::subscriber::{Subscriber, Terminal};
use crate::telemetry;
use crate::Result;

/// Observable relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Never subscribed.
    Idle,
    /// Live subscription, nothing buffered.
    Active,
    /// Live subscription with items waiting for demand.
    PausedLocal,
    /// The terminal marker is buffered and being drained towards the subscriber.
    Terminating,
    /// The terminal signal was delivered; later subscribers get a replay.
    Terminated,
    /// The last subscription was cancelled.
    Cancelled,
}

/// Point-in-time counters for a relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Items currently buffered.
    pub buffered: usize,
    /// Outstanding demand ([`UNBOUNDED`] for unbounded).
    pub demand: u64,
    /// Whether the relay currently holds the source paused.
    pub source_paused: bool,
    /// Items handed to `on_next` so far.
    pub delivered: u64,
    /// Items and terminal signals discarded so far.
    pub dropped: u64,
    /// `pause()` calls made on the source.
    pub pauses: u64,
    /// `resume()` calls made on the source.
    pub resumes: u64,
}

/// Work picked by the drain loop, performed outside the state lock.
enum Action<T, E> {
    Wire(u64),
    Unwire(u64),
    Source(SourceCommand),
    Subscribed {
        id: u64,
        subscriber: SharedSubscriber<T, E>,
        subscription: Subscription<T, E>,
    },
    Replay {
        subscriber: SharedSubscriber<T, E>,
        subscription: Subscription<T, E>,
        terminal: Terminal<E>,
    },
    Next {
        subscriber: SharedSubscriber<T, E>,
        item: T,
    },
    Terminal {
        subscriber: SharedSubscriber<T, E>,
        terminal: Terminal<E>,
    },
}

struct State<T, E> {
    buffer: RelayBuffer<T, E>,
    demand: Demand,
    controller: SourceController,
    lifecycle: Lifecycle<T, E>,
    pending: VecDeque<Action<T, E>>,
    draining: bool,
    stats: RelayStats,
}

impl<T, E: Clone> State<T, E> {
    fn new(high_water_mark: usize) -> Self {
        Self {
            buffer: RelayBuffer::new(),
            demand: Demand::new(),
            controller: SourceController::new(high_water_mark),
            lifecycle: Lifecycle::new(),
            pending: VecDeque::new(),
            draining: false,
            stats: RelayStats::default(),
        }
    }

    /// Buffered items that outstanding demand will not take right away.
    fn excess(&self) -> usize {
        let demand = usize::try_from(self.demand.outstanding()).unwrap_or(usize::MAX);
        self.buffer.size().saturating_sub(demand)
    }

    fn next_action(&mut self) -> Option<Action<T, E>> {
        while let Some(action) = self.pending.pop_front() {
            match &action {
                // Superseded by a cancel that happened before we got here.
                Action::Wire(id) | Action::Subscribed { id, .. }
                    if !self.lifecycle.is_live(*id) =>
                {
                    continue;
                }
                Action::Source(SourceCommand::Pause) => self.stats.pauses += 1,
                Action::Source(SourceCommand::Resume) => self.stats.resumes += 1,
                _ => {}
            }
            return Some(action);
        }

        if let Some((id, subscriber)) = self.lifecycle.live() {
            if self.buffer.head_is_item() && self.demand.try_consume() {
                if let Some(Entry::Item(item)) = self.buffer.dequeue() {
                    self.stats.delivered += 1;
                    return Some(Action::Next { subscriber, item });
                }
            } else if self.buffer.head_is_terminal() {
                if let Some(Entry::Terminal(terminal)) = self.buffer.dequeue() {
                    self.lifecycle.finish();
                    self.demand.reset();
                    self.pending.push_back(Action::Unwire(id));
                    return Some(Action::Terminal {
                        subscriber,
                        terminal,
                    });
                }
            }
        }

        if let Some(cmd) = self.controller.on_buffer_shrank(self.buffer.size()) {
            self.stats.resumes += 1;
            return Some(Action::Source(cmd));
        }

        None
    }
}

pub(crate) struct Shared<T, E> {
    config: RelayConfig,
    source: Arc<dyn ReadStream<T, E>>,
    state: Mutex<State<T, E>>,
    // Subscription whose handlers are registered on the source. Taken
    // before `state` when both are needed.
    wired: Mutex<Option<u64>>,
}

impl<T, E> Shared<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_live(&self, id: u64) -> bool {
        self.lock().lifecycle.is_live(id)
    }

    fn subscribe(
        self: &Arc<Self>,
        subscriber: Box<dyn Subscriber<T, E>>,
    ) -> Result<Subscription<T, E>> {
        let subscriber: SharedSubscriber<T, E> = Arc::new(Mutex::new(subscriber));
        let mut state = self.lock();

        let subscription = match state.lifecycle.begin(Arc::clone(&subscriber))? {
            Begin::Live { id } => {
                // Leftovers from a cancelled predecessor are not ours.
                let dropped = state.buffer.clear();
                state.stats.dropped += dropped as u64;
                state.demand.reset();

                let subscription = self.subscription(id);
                state.pending.push_back(Action::Subscribed {
                    id,
                    subscriber,
                    subscription: subscription.clone(),
                });
                state.pending.push_back(Action::Wire(id));
                debug!(relay = %self.config.name, subscription = id, "subscribed");
                subscription
            }
            Begin::Replay { id, terminal } => {
                let subscription = self.subscription(id);
                debug!(
                    relay = %self.config.name,
                    subscription = id,
                    error = terminal.is_error(),
                    "replaying terminal to late subscriber"
                );
                state.pending.push_back(Action::Replay {
                    subscriber,
                    subscription: subscription.clone(),
                    terminal,
                });
                subscription
            }
        };

        self.drain(state);
        Ok(subscription)
    }

    fn subscription(self: &Arc<Self>, id: u64) -> Subscription<T, E> {
        Subscription {
            id,
            relay: Arc::downgrade(self),
        }
    }

    fn on_item(self: &Arc<Self>, id: u64, item: T) {
        let mut state = self.lock();
        if !state.lifecycle.is_live(id) || state.buffer.enqueue(item).is_err() {
            state.stats.dropped += 1;
            drop(state);
            trace!(relay = %self.config.name, subscription = id, "dropped item");
            metrics::counter!(telemetry::ITEMS_DROPPED_TOTAL, "relay" => self.config.name.clone())
                .increment(1);
            return;
        }

        let excess = state.excess();
        if let Some(cmd) = state.controller.on_buffer_grew(excess) {
            state.pending.push_back(Action::Source(cmd));
        }
        self.drain(state);
    }

    fn on_terminal(self: &Arc<Self>, id: u64, terminal: Terminal<E>) {
        let mut state = self.lock();
        // Signals for a dead subscription, and any after the first, are
        // discarded.
        if !state.lifecycle.is_live(id) || !state.lifecycle.latch(&terminal) {
            state.stats.dropped += 1;
            drop(state);
            trace!(
                relay = %self.config.name,
                subscription = id,
                error = terminal.is_error(),
                "dropped terminal signal"
            );
            metrics::counter!(telemetry::ITEMS_DROPPED_TOTAL, "relay" => self.config.name.clone())
                .increment(1);
            return;
        }
        state.buffer.enqueue_terminal(terminal);
        self.drain(state);
    }

    pub(crate) fn request(self: &Arc<Self>, id: u64, n: u64) -> Result<()> {
        let mut state = self.lock();
        if !state.lifecycle.is_live(id) {
            return Ok(());
        }
        state.demand.add(n)?;
        self.drain(state);
        Ok(())
    }

    pub(crate) fn cancel(self: &Arc<Self>, id: u64) {
        let mut state = self.lock();
        if !state.lifecycle.cancel(id) {
            return;
        }

        let dropped = state.buffer.clear();
        state.stats.dropped += dropped as u64;
        state.demand.reset();
        // A paused producer would otherwise stay stalled forever.
        if let Some(cmd) = state.controller.release() {
            state.pending.push_back(Action::Source(cmd));
        }
        drop(state);

        debug!(relay = %self.config.name, subscription = id, dropped, "cancelled");
        let relay = self.config.name.clone();
        metrics::counter!(telemetry::CANCELLATIONS_TOTAL, "relay" => relay.clone()).increment(1);
        if dropped > 0 {
            metrics::counter!(telemetry::ITEMS_DROPPED_TOTAL, "relay" => relay)
                .increment(dropped as u64);
        }

        // Detach right away, even from inside a callback; only resume()
        // waits for the running delivery to finish.
        self.unwire(id);
        self.drain(self.lock());
    }

    /// Run the delivery loop unless another caller is already running it.
    fn drain<'a>(self: &'a Arc<Self>, mut state: MutexGuard<'a, State<T, E>>) {
        if state.draining {
            return;
        }
        state.draining = true;
        loop {
            let Some(action) = state.next_action() else {
                state.draining = false;
                return;
            };
            drop(state);
            self.perform(action);
            state = self.lock();
        }
    }

    fn perform(self: &Arc<Self>, action: Action<T, E>) {
        let relay = &self.config.name;
        match action {
            Action::Wire(id) => self.wire(id),
            Action::Unwire(id) => self.unwire(id),
            Action::Source(SourceCommand::Pause) => {
                debug!(relay = %relay, "pausing source");
                metrics::counter!(telemetry::SOURCE_PAUSES_TOTAL, "relay" => relay.clone())
                    .increment(1);
                self.source.pause();
            }
            Action::Source(SourceCommand::Resume) => {
                debug!(relay = %relay, "resuming source");
                metrics::counter!(telemetry::SOURCE_RESUMES_TOTAL, "relay" => relay.clone())
                    .increment(1);
                self.source.resume();
                self.lock().controller.resume_returned();
            }
            Action::Subscribed {
                subscriber,
                subscription,
                ..
            } => {
                lock_subscriber(&subscriber).on_subscribe(&subscription);
            }
            Action::Replay {
                subscriber,
                subscription,
                terminal,
            } => {
                metrics::counter!(
                    telemetry::TERMINATIONS_TOTAL,
                    "relay" => relay.clone(),
                    "kind" => terminal.kind()
                )
                .increment(1);
                let mut subscriber = lock_subscriber(&subscriber);
                subscriber.on_subscribe(&subscription);
                subscriber.on_terminal(terminal);
            }
            Action::Next { subscriber, item } => {
                metrics::counter!(telemetry::ITEMS_DELIVERED_TOTAL, "relay" => relay.clone())
                    .increment(1);
                lock_subscriber(&subscriber).on_next(item);
            }
            Action::Terminal {
                subscriber,
                terminal,
            } => {
                debug!(relay = %relay, error = terminal.is_error(), "delivering terminal");
                metrics::counter!(
                    telemetry::TERMINATIONS_TOTAL,
                    "relay" => relay.clone(),
                    "kind" => terminal.kind()
                )
                .increment(1);
                lock_subscriber(&subscriber).on_terminal(terminal);
            }
        }
    }

    /// Point the source's handlers at this relay for subscription `id`.
    /// Handlers hold a weak reference so the source never keeps the relay
    /// alive.
    fn wire(self: &Arc<Self>, id: u64) {
        let mut wired = lock_wired(&self.wired);
        // Cancelled between being scheduled and now.
        if !self.is_live(id) {
            return;
        }
        *wired = Some(id);

        let weak = Arc::downgrade(self);
        self.source.item_handler(Some(Arc::new(move |item| {
            if let Some(shared) = weak.upgrade() {
                shared.on_item(id, item);
            }
        })));

        let weak = Arc::downgrade(self);
        self.source.end_handler(Some(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_terminal(id, Terminal::Complete);
            }
        })));

        let weak = Arc::downgrade(self);
        self.source.failure_handler(Some(Arc::new(move |error| {
            if let Some(shared) = weak.upgrade() {
                shared.on_terminal(id, Terminal::Failed(error));
            }
        })));
    }

    /// Clear the source's handlers if they still belong to subscription
    /// `id`. A successor's handlers are left alone.
    fn unwire(&self, id: u64) {
        let mut wired = lock_wired(&self.wired);
        if *wired != Some(id) {
            return;
        }
        *wired = None;
        self.source.item_handler(None);
        self.source.end_handler(None);
        self.source.failure_handler(None);
    }
}

fn lock_wired(wired: &Mutex<Option<u64>>) -> MutexGuard<'_, Option<u64>> {
    wired.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_subscriber<T, E>(
    subscriber: &SharedSubscriber<T, E>,
) -> MutexGuard<'_, Box<dyn Subscriber<T, E>>> {
    subscriber.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Adapts one push-based [`ReadStream`] to a single demand-driven
/// [`Subscriber`] at a time.
///
/// ```rust
/// # use std::sync::{Arc, Mutex};
/// # use sluice::{ItemHandler, EndHandler, FailureHandler, ReadStream, Relay, RelayConfig, Subscriber};
/// # #[derive(Default)]
/// # struct Source { items: Mutex<Option<ItemHandler<u32>>> }
/// # impl ReadStream<u32, String> for Source {
/// #     fn item_handler(&self, h: Option<ItemHandler<u32>>) { *self.items.lock().unwrap() = h; }
/// #     fn end_handler(&self, _h: Option<EndHandler>) {}
/// #     fn failure_handler(&self, _h: Option<FailureHandler<String>>) {}
/// #     fn pause(&self) {}
/// #     fn resume(&self) {}
/// # }
/// # impl Source { fn emit(&self, v: u32) { let h = self.items.lock().unwrap().clone(); if let Some(h) = h { h(v) } } }
/// struct Printer;
///
/// impl Subscriber<u32, String> for Printer {
///     fn on_next(&mut self, item: u32) { println!("got {item}"); }
///     fn on_complete(&mut self) {}
///     fn on_error(&mut self, _error: String) {}
/// }
///
/// let source = Arc::new(Source::default());
/// let relay: Relay<u32, String> = Relay::new(source.clone(), RelayConfig::new().high_water_mark(8));
/// let subscription = relay.subscribe(Printer)?;
///
/// source.emit(1); // buffered: no demand yet
/// subscription.request(1)?; // prints "got 1"
/// assert_eq!(relay.stats().delivered, 1);
/// # Ok::<(), sluice::SluiceError>(())
/// ```
pub struct Relay<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Relay<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a relay over `source`. Nothing is wired until the first
    /// subscription.
    pub fn new(source: Arc<dyn ReadStream<T, E>>, config: RelayConfig) -> Self {
        let state = State::new(config.high_water_mark);
        Self {
            shared: Arc::new(Shared {
                config,
                source,
                state: Mutex::new(state),
                wired: Mutex::new(None),
            }),
        }
    }

    /// Create a relay with [`RelayConfig::default`].
    pub fn with_defaults(source: Arc<dyn ReadStream<T, E>>) -> Self {
        Self::new(source, RelayConfig::default())
    }

    /// Attach a subscriber.
    ///
    /// Fails with [`SluiceError::AlreadySubscribed`](crate::SluiceError::AlreadySubscribed)
    /// while another subscription is live. After a cancellation the source is
    /// re-wired for the new subscriber; after termination the subscriber
    /// immediately receives the terminal signal instead.
    pub fn subscribe<S>(&self, subscriber: S) -> Result<Subscription<T, E>>
    where
        S: Subscriber<T, E> + 'static,
    {
        self.shared.subscribe(Box::new(subscriber))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    pub fn state(&self) -> RelayState {
        let state = self.shared.lock();
        match state.lifecycle.phase() {
            Phase::Idle => RelayState::Idle,
            Phase::Cancelled => RelayState::Cancelled,
            Phase::Terminated => RelayState::Terminated,
            Phase::Live if state.buffer.has_pending_terminal() => RelayState::Terminating,
            Phase::Live if state.buffer.size() > 0 => RelayState::PausedLocal,
            Phase::Live => RelayState::Active,
        }
    }

    pub fn stats(&self) -> RelayStats {
        let state = self.shared.lock();
        RelayStats {
            buffered: state.buffer.size(),
            demand: state.demand.outstanding(),
            source_paused: state.controller.is_paused(),
            ..state.stats
        }
    }
}

impl<T, E> fmt::Debug for Relay<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("name", &self.shared.config.name)
            .finish_non_exhaustive()
    }
}

impl<T, E> Drop for Relay<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    fn drop(&mut self) {
        // Cancel whatever is live so the source's handlers are detached and
        // a paused producer is resumed.
        let live = self.shared.lock().lifecycle.current_id();
        if let Some(id) = live {
            self.shared.cancel(id);
        }
    }
}
