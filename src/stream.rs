//! `futures::Stream` facade over a relay subscription.
//!
//! [`RelayStream`] is a pull consumer: it requests `request_batch` items
//! from the relay whenever its inbox is empty and no demand is outstanding,
//! so at most one batch is ever in flight and the relay's backpressure
//! reaches whatever drives the stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use futures_util::Stream;

use crate::relay::{Relay, Subscription};
use crate::subscriber::Subscriber;
use crate::Result;

struct Inbox<T, E> {
    items: VecDeque<std::result::Result<T, E>>,
    outstanding: u64,
    done: bool,
    waker: Option<Waker>,
}

fn lock_inbox<T, E>(inbox: &Mutex<Inbox<T, E>>) -> MutexGuard<'_, Inbox<T, E>> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscriber half: parks deliveries in the inbox and wakes the poller.
struct InboxSubscriber<T, E> {
    inbox: Arc<Mutex<Inbox<T, E>>>,
}

impl<T, E> InboxSubscriber<T, E> {
    fn push(&self, entry: Option<std::result::Result<T, E>>) {
        let waker = {
            let mut inbox = lock_inbox(&self.inbox);
            match entry {
                Some(Ok(item)) => {
                    inbox.outstanding = inbox.outstanding.saturating_sub(1);
                    inbox.items.push_back(Ok(item));
                }
                Some(Err(e)) => {
                    inbox.items.push_back(Err(e));
                    inbox.done = true;
                }
                None => inbox.done = true,
            }
            inbox.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send, E: Send> Subscriber<T, E> for InboxSubscriber<T, E> {
    fn on_next(&mut self, item: T) {
        self.push(Some(Ok(item)));
    }

    fn on_complete(&mut self) {
        self.push(None);
    }

    fn on_error(&mut self, error: E) {
        self.push(Some(Err(error)));
    }
}

/// Pull-based view of a [`Relay`].
///
/// Yields `Ok(item)` per item, `Err(cause)` once if the source failed, then
/// `None`. Dropping the stream cancels the subscription and releases the
/// source.
pub struct RelayStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    subscription: Subscription<T, E>,
    inbox: Arc<Mutex<Inbox<T, E>>>,
    batch: u64,
    // Keeps the relay (and its wiring to the source) alive.
    relay: Relay<T, E>,
}

impl<T, E> RelayStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Subscribe to `relay` and wrap the subscription as a stream.
    pub fn new(relay: Relay<T, E>) -> Result<Self> {
        let inbox = Arc::new(Mutex::new(Inbox {
            items: VecDeque::new(),
            outstanding: 0,
            done: false,
            waker: None,
        }));
        let subscription = relay.subscribe(InboxSubscriber {
            inbox: Arc::clone(&inbox),
        })?;
        let batch = relay.config().request_batch.max(1);
        Ok(Self {
            subscription,
            inbox,
            batch,
            relay,
        })
    }

    /// The relay this stream reads from.
    pub fn relay(&self) -> &Relay<T, E> {
        &self.relay
    }
}

impl<T, E> Relay<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Subscribe and consume the relay as a [`Stream`].
    pub fn into_stream(self) -> Result<RelayStream<T, E>> {
        RelayStream::new(self)
    }
}

impl<T, E> Stream for RelayStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    type Item = std::result::Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let mut inbox = lock_inbox(&this.inbox);
            if let Some(entry) = inbox.items.pop_front() {
                return Poll::Ready(Some(entry));
            }
            if inbox.done {
                return Poll::Ready(None);
            }
            if inbox.outstanding > 0 {
                inbox.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }

            inbox.outstanding = this.batch;
            drop(inbox);
            // May deliver synchronously into the inbox; look again.
            if this.subscription.request(this.batch).is_err() {
                return Poll::Ready(None);
            }
        }
    }
}

impl<T, E> Drop for RelayStream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
