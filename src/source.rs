//! Push-side contract: a source that emits items through registered
//! handlers and accepts advisory flow control.

use std::sync::Arc;

/// Called once per emitted item.
pub type ItemHandler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Called when the source is exhausted.
pub type EndHandler = Arc<dyn Fn() + Send + Sync>;

/// Called when the source fails. The cause is handed over verbatim.
pub type FailureHandler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// A push-based source with pause/resume flow control.
///
/// At most one handler of each kind is registered at a time; registering a
/// new one replaces the old, and `None` unregisters it.
///
/// `pause()` is advisory. A source may still emit a few items after it
/// returns, and the relay buffers them. A source may also emit items
/// synchronously from inside `resume()`.
pub trait ReadStream<T, E>: Send + Sync {
    /// Register (or clear) the per-item handler.
    fn item_handler(&self, handler: Option<ItemHandler<T>>);

    /// Register (or clear) the end-of-stream handler.
    fn end_handler(&self, handler: Option<EndHandler>);

    /// Register (or clear) the failure handler.
    fn failure_handler(&self, handler: Option<FailureHandler<E>>);

    /// Ask the source to stop emitting.
    fn pause(&self);

    /// Ask the source to continue emitting.
    fn resume(&self);
}
