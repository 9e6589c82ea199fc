//! Async push source: pumps a `Stream` into [`ReadStream`] handlers.
//!
//! [`StreamSource`] spawns a task that reads from the wrapped stream and
//! pushes each item to the registered item handler. The task only pulls the
//! next item while a handler is registered and the source is not paused, so
//! pausing a [`StreamSource`] stops the wrapped stream from being polled. At
//! most the item already in flight is pushed after `pause()`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use futures_util::{StreamExt, stream};
//! use sluice::{RelayConfig, bounded_stream};
//!
//! # async fn demo() -> sluice::Result<()> {
//! let inner = stream::iter((0..1000).map(Ok::<u32, String>));
//! let mut relayed = bounded_stream(inner, RelayConfig::new().high_water_mark(32))?;
//! while let Some(item) = relayed.next().await {
//!     println!("{item:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::config::RelayConfig;
use crate::relay::Relay;
use crate::source::{EndHandler, FailureHandler, ItemHandler, ReadStream};
use crate::stream::RelayStream;
use crate::Result;

struct Handlers<T, E> {
    item: Option<ItemHandler<T>>,
    end: Option<EndHandler>,
    failure: Option<FailureHandler<E>>,
}

impl<T, E> Default for Handlers<T, E> {
    fn default() -> Self {
        Self {
            item: None,
            end: None,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Flow {
    paused: bool,
    wired: bool,
}

impl Flow {
    fn runnable(&self) -> bool {
        self.wired && !self.paused
    }
}

fn lock_handlers<T, E>(handlers: &Mutex<Handlers<T, E>>) -> MutexGuard<'_, Handlers<T, E>> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`ReadStream`] fed by a spawned task reading an async stream.
///
/// `Ok` items go to the item handler, the first `Err` goes to the failure
/// handler and stops the pump, exhaustion goes to the end handler. The
/// pump task is aborted when the source is dropped.
pub struct StreamSource<T, E> {
    handlers: Arc<Mutex<Handlers<T, E>>>,
    flow: watch::Sender<Flow>,
    task: JoinHandle<()>,
}

impl<T, E> StreamSource<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start pumping `inner`. Nothing is pulled until an item handler is
    /// registered.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn<S>(inner: S) -> Self
    where
        S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
    {
        let handlers = Arc::new(Mutex::new(Handlers::default()));
        let (flow, mut runnable) = watch::channel(Flow {
            paused: false,
            wired: false,
        });

        let task = tokio::spawn({
            let handlers = Arc::clone(&handlers);
            async move {
                let mut inner = Box::pin(inner);
                loop {
                    if runnable.wait_for(Flow::runnable).await.is_err() {
                        break; // source dropped
                    }
                    match inner.next().await {
                        Some(Ok(item)) => {
                            let handler = lock_handlers(&handlers).item.clone();
                            match handler {
                                Some(handler) => handler(item),
                                None => trace!("item pulled after handler was cleared"),
                            }
                        }
                        Some(Err(e)) => {
                            let handler = lock_handlers(&handlers).failure.clone();
                            if let Some(handler) = handler {
                                handler(e);
                            }
                            break;
                        }
                        None => {
                            let handler = lock_handlers(&handlers).end.clone();
                            if let Some(handler) = handler {
                                handler();
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            handlers,
            flow,
            task,
        }
    }

    /// Whether the pump task has stopped (stream exhausted, failed, or
    /// aborted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Whether the source is currently paused.
    pub fn is_paused(&self) -> bool {
        self.flow.borrow().paused
    }
}

impl<T, E> ReadStream<T, E> for StreamSource<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn item_handler(&self, handler: Option<ItemHandler<T>>) {
        let wired = handler.is_some();
        lock_handlers(&self.handlers).item = handler;
        self.flow.send_modify(|f| f.wired = wired);
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        lock_handlers(&self.handlers).end = handler;
    }

    fn failure_handler(&self, handler: Option<FailureHandler<E>>) {
        lock_handlers(&self.handlers).failure = handler;
    }

    fn pause(&self) {
        self.flow.send_modify(|f| f.paused = true);
    }

    fn resume(&self) {
        self.flow.send_modify(|f| f.paused = false);
    }
}

impl<T, E> Drop for StreamSource<T, E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Relay an async stream with backpressure.
///
/// Wires `inner` through a [`StreamSource`] and a [`Relay`] configured by
/// `config` and returns the pull side. The wrapped stream is not polled
/// while the relay holds more than `config.high_water_mark` items beyond
/// outstanding demand. Dropping the returned stream stops the pump.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn bounded_stream<T, E, S>(inner: S, config: RelayConfig) -> Result<RelayStream<T, E>>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
    S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
{
    config.validate()?;
    let source = Arc::new(StreamSource::spawn(inner));
    Relay::new(source, config).into_stream()
}
