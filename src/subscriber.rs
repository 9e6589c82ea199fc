//! Pull-side contract: a consumer that signals demand and receives
//! serialized callbacks.

use crate::relay::Subscription;

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal<E> {
    /// The source was exhausted.
    Complete,
    /// The source failed with the given cause.
    Failed(E),
}

impl<E> Terminal<E> {
    pub fn is_error(&self) -> bool {
        matches!(self, Terminal::Failed(_))
    }

    /// Metric label for this terminal kind.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Terminal::Complete => "complete",
            Terminal::Failed(_) => "error",
        }
    }
}

/// A demand-driven consumer.
///
/// Callbacks for one relay are never invoked concurrently. After
/// `on_complete` or `on_error` no further callback fires. Calling
/// [`Subscription::request`] or [`Subscription::cancel`] from inside a
/// callback is allowed; the effect is folded into the ongoing delivery.
pub trait Subscriber<T, E>: Send {
    /// Called once, before any other callback, with the subscription handle.
    fn on_subscribe(&mut self, _subscription: &Subscription<T, E>) {}

    fn on_next(&mut self, item: T);

    fn on_complete(&mut self);

    fn on_error(&mut self, error: E);

    /// Dispatch a terminal signal to `on_complete` / `on_error`.
    fn on_terminal(&mut self, terminal: Terminal<E>) {
        match terminal {
            Terminal::Complete => self.on_complete(),
            Terminal::Failed(e) => self.on_error(e),
        }
    }
}
